//! Demo configuration: defaults, optional YAML file, CLI overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing and sizing knobs for the demo scenarios.
///
/// Every delay is expressed in "time units" of `unit_ms` milliseconds so the
/// whole demo can be scaled down for tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub unit_ms: u64,
    /// Tasks emitted in the single producer/consumer scenario.
    pub producer_tasks: usize,
    /// Tasks emitted in the multiple-consumer scenario.
    pub multi_producer_tasks: usize,
    /// Consumers racing in the multiple-consumer scenario.
    pub consumers: usize,
    /// Bounded wait of the timeout consumer, in units.
    pub timeout_units: u32,
    /// Consecutive timeouts after which the timeout consumer gives up.
    pub max_timeouts: u32,
    /// How long the orchestrator lets the timeout consumer run, in units.
    pub timeout_run_units: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            unit_ms: 1000,
            producer_tasks: 5,
            multi_producer_tasks: 8,
            consumers: 2,
            timeout_units: 2,
            max_timeouts: 3,
            timeout_run_units: 8,
        }
    }
}

impl DemoConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: DemoConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_ms == 0 {
            return Err(ConfigError::Invalid("unit_ms must be > 0".to_string()));
        }
        if self.consumers == 0 {
            return Err(ConfigError::Invalid("consumers must be > 0".to_string()));
        }
        if self.max_timeouts == 0 {
            return Err(ConfigError::Invalid("max_timeouts must be > 0".to_string()));
        }
        Ok(())
    }

    /// Length of one time unit.
    pub fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }

    /// Delay between two producer pushes (half a unit).
    pub fn producer_pace(&self) -> Duration {
        self.unit() / 2
    }

    pub fn timeout_wait(&self) -> Duration {
        self.unit() * self.timeout_units
    }

    pub fn timeout_run(&self) -> Duration {
        self.unit() * self.timeout_run_units
    }
}
