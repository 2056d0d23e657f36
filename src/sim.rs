//! Demo scenarios and the throughput benchmark built on the queue roles.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::DemoConfig;
use crate::error::Result;
use crate::roles::{
    Consumer, ConsumerReport, ExitReason, Producer, TimeoutConsumer, join_role, spawn_role,
};
use crate::task_queue::TaskQueue;
use crate::types::{Task, TaskId};

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain old data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let seconds = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    Some((seconds(usage.ru_utime), seconds(usage.ru_stime)))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Which part of the demo to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    All,
    Basic,
    ProducerConsumer,
    MultipleConsumers,
    Timeout,
}

/// Observations from the non-threaded walkthrough of the queue API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicSummary {
    pub len_after_push: usize,
    pub popped: Option<TaskId>,
    pub len_after_pop: usize,
    pub cleared: usize,
}

/// Results of a demo run; scenarios that did not run stay `None`.
#[derive(Clone, Debug, Default)]
pub struct DemoSummary {
    pub basic: Option<BasicSummary>,
    pub producer_consumer: Option<ConsumerReport>,
    pub multiple_consumers: Option<Vec<ConsumerReport>>,
    pub timeout_consumer: Option<ConsumerReport>,
    pub leftover: usize,
}

impl DemoSummary {
    /// True if any task id was processed twice within one scenario.
    pub fn has_duplicates(&self) -> bool {
        self.producer_consumer
            .iter()
            .chain(&self.timeout_consumer)
            .any(|report| has_duplicate_ids([report]))
            || self
                .multiple_consumers
                .as_ref()
                .is_some_and(|reports| has_duplicate_ids(reports))
    }
}

fn has_duplicate_ids<'a>(reports: impl IntoIterator<Item = &'a ConsumerReport>) -> bool {
    let mut seen = HashSet::new();
    reports
        .into_iter()
        .flat_map(|report| report.processed_ids.iter())
        .any(|id| !seen.insert(*id))
}

impl fmt::Display for DemoSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DEMO SUMMARY")?;
        if let Some(basic) = &self.basic {
            writeln!(f, "basic_len_after_push={}", basic.len_after_push)?;
            match basic.popped {
                Some(id) => writeln!(f, "basic_popped={id}")?,
                None => writeln!(f, "basic_popped=none")?,
            }
            writeln!(f, "basic_len_after_pop={}", basic.len_after_pop)?;
        }
        if let Some(report) = &self.producer_consumer {
            writeln!(f, "producer_consumer_processed={}", report.processed)?;
        }
        if let Some(reports) = &self.multiple_consumers {
            let per_consumer: Vec<usize> = reports.iter().map(|r| r.processed).collect();
            let total: usize = per_consumer.iter().sum();
            writeln!(f, "multi_consumer_processed={per_consumer:?}")?;
            writeln!(f, "multi_consumer_total={total}")?;
        }
        if let Some(report) = &self.timeout_consumer {
            writeln!(f, "timeout_consumer_processed={}", report.processed)?;
            writeln!(f, "timeout_consumer_exit={:?}", report.exit)?;
        }
        writeln!(f, "duplicate_tasks={}", self.has_duplicates())?;
        write!(f, "leftover_tasks={}", self.leftover)
    }
}

/// Push three tasks, inspect the length, pop one, and clear the rest.
pub fn basic_operations(queue: &TaskQueue) -> BasicSummary {
    info!("basic async queue operations");
    queue.push(Task::new(101, "Initialize system", 1));
    queue.push(Task::new(102, "Load configuration", 2));
    queue.push(Task::new(103, "Start services", 3));
    let len_after_push = queue.len();
    info!(len = len_after_push, "queue length");

    let popped = queue.try_pop().map(|task| {
        info!("popped {task}");
        task.id
    });
    let len_after_pop = queue.len();
    info!(len = len_after_pop, "queue length after pop");

    let mut cleared = 0;
    while queue.try_pop().is_some() {
        cleared += 1;
    }

    BasicSummary {
        len_after_push,
        popped,
        len_after_pop,
        cleared,
    }
}

/// One producer, one blocking consumer.
pub fn producer_consumer(queue: &Arc<TaskQueue>, config: &DemoConfig) -> Result<ConsumerReport> {
    info!("producer-consumer pattern with threads");
    let producer = {
        let queue = Arc::clone(queue);
        let producer = Producer::new(config.producer_tasks, config.producer_pace());
        spawn_role("producer", move || producer.run(&queue))?
    };
    let consumer = {
        let queue = Arc::clone(queue);
        let consumer = Consumer::new(config.unit());
        spawn_role("consumer", move || consumer.run(&queue))?
    };

    join_role(producer)?;
    join_role(consumer)
}

/// One producer racing `config.consumers` blocking consumers.
///
/// The producer emits a single sentinel; the remaining ones are pushed here
/// once it has finished so that sentinels == consumers.
pub fn multiple_consumers(
    queue: &Arc<TaskQueue>,
    config: &DemoConfig,
) -> Result<Vec<ConsumerReport>> {
    info!(consumers = config.consumers, "multiple consumers demo");
    let producer = {
        let queue = Arc::clone(queue);
        let producer = Producer::new(config.multi_producer_tasks, config.producer_pace());
        spawn_role("producer", move || producer.run(&queue))?
    };

    let mut consumers = Vec::with_capacity(config.consumers);
    for index in 1..=config.consumers {
        let queue = Arc::clone(queue);
        let consumer = Consumer::new(config.unit());
        consumers.push(spawn_role(&format!("consumer{index}"), move || {
            consumer.run(&queue)
        })?);
    }

    join_role(producer)?;
    for _ in 1..config.consumers {
        queue.push(Task::terminate());
    }

    consumers.into_iter().map(join_role).collect()
}

/// Timeout consumer over two preloaded tasks, stopped after a fixed run time.
pub fn timeout_consumer(queue: &Arc<TaskQueue>, config: &DemoConfig) -> Result<ConsumerReport> {
    info!("timeout operations demo");
    queue.push(Task::new(201, "Timeout test task 1", 2));
    queue.push(Task::new(202, "Timeout test task 2", 1));

    let stop = Arc::new(AtomicBool::new(false));
    let handle = {
        let queue = Arc::clone(queue);
        let stop = Arc::clone(&stop);
        let consumer =
            TimeoutConsumer::new(config.timeout_wait(), config.max_timeouts, config.unit() / 2);
        spawn_role("timeout_consumer", move || consumer.run(&queue, &stop))?
    };

    thread::sleep(config.timeout_run());
    stop.store(true, Ordering::SeqCst);
    join_role(handle)
}

/// Process whatever is still queued, one unit per task.
pub fn drain_remaining(queue: &TaskQueue, unit: Duration) -> usize {
    let mut drained = 0;
    while let Some(mut task) = queue.try_pop() {
        if task.is_sentinel() {
            warn!("discarding stray sentinel");
            continue;
        }
        info!("processing leftover {task}");
        thread::sleep(unit);
        task.complete();
        info!("completed {task}");
        drained += 1;
    }
    drained
}

/// Run the selected scenarios against one shared queue.
pub fn run_demo(scenario: Scenario, config: &DemoConfig) -> Result<DemoSummary> {
    config.validate()?;
    let queue = Arc::new(TaskQueue::new());
    let mut summary = DemoSummary::default();
    let start = Instant::now();

    if matches!(scenario, Scenario::All | Scenario::Basic) {
        summary.basic = Some(basic_operations(&queue));
    }
    if matches!(scenario, Scenario::All | Scenario::ProducerConsumer) {
        summary.producer_consumer = Some(producer_consumer(&queue, config)?);
    }
    if matches!(scenario, Scenario::All | Scenario::MultipleConsumers) {
        summary.multiple_consumers = Some(multiple_consumers(&queue, config)?);
    }
    if matches!(scenario, Scenario::All | Scenario::Timeout) {
        summary.timeout_consumer = Some(timeout_consumer(&queue, config)?);
    }

    summary.leftover = drain_remaining(&queue, config.unit());
    debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "demo finished"
    );
    Ok(summary)
}

/// Shape of a benchmark run.
#[derive(Clone, Copy, Debug)]
pub struct BenchConfig {
    pub producers: usize,
    pub consumers: usize,
    pub tasks_per_producer: usize,
}

/// Aggregated metrics from a single benchmark run.
#[derive(Clone, Debug)]
pub struct BenchResult {
    pub producers: usize,
    pub consumers: usize,
    pub total_tasks: usize,
    pub processed: usize,
    pub elapsed_ms: f64,
    pub throughput: f64,
    pub cpu_user_s: Option<f64>,
    pub cpu_sys_s: Option<f64>,
    pub duplicate_tasks: bool,
    pub leftover: usize,
}

impl BenchResult {
    pub const CSV_HEADER: &'static str = "producers,consumers,total_tasks,processed,elapsed_ms,throughput_tasks_per_s,cpu_user_s,cpu_sys_s,duplicate_tasks,leftover";

    pub fn csv_row(&self) -> String {
        let cpu = |value: Option<f64>| {
            value
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "NA".to_string())
        };
        format!(
            "{},{},{},{},{:.2},{:.2},{},{},{},{}",
            self.producers,
            self.consumers,
            self.total_tasks,
            self.processed,
            self.elapsed_ms,
            self.throughput,
            cpu(self.cpu_user_s),
            cpu(self.cpu_sys_s),
            self.duplicate_tasks,
            self.leftover
        )
    }
}

/// Push `producers × tasks_per_producer` tasks through `consumers` threads
/// with no simulated work and measure hand-off throughput.
pub fn run_benchmark(bench: BenchConfig) -> Result<BenchResult> {
    debug_assert!(bench.producers > 0, "producers must be > 0");
    debug_assert!(bench.consumers > 0, "consumers must be > 0");
    let queue = Arc::new(TaskQueue::new());
    let total_tasks = bench.producers * bench.tasks_per_producer;

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();

    let mut consumers = Vec::with_capacity(bench.consumers);
    for index in 0..bench.consumers {
        let queue = Arc::clone(&queue);
        consumers.push(spawn_role(&format!("bench-consumer-{index}"), move || {
            Consumer::new(Duration::ZERO).run(&queue)
        })?);
    }

    let mut producers = Vec::with_capacity(bench.producers);
    for index in 0..bench.producers {
        let queue = Arc::clone(&queue);
        let per_producer = bench.tasks_per_producer;
        producers.push(spawn_role(&format!("bench-producer-{index}"), move || {
            let base = index * per_producer;
            for offset in 0..per_producer {
                let id = (base + offset) as TaskId + 1;
                queue.push(Task::new(id, format!("bench-{id}"), (offset % 3) as u8 + 1));
            }
        })?);
    }
    for handle in producers {
        join_role(handle)?;
    }
    // Producers are done: one sentinel per consumer.
    for _ in 0..bench.consumers {
        queue.push(Task::terminate());
    }

    let mut reports = Vec::with_capacity(bench.consumers);
    for handle in consumers {
        reports.push(join_role(handle)?);
    }
    debug_assert!(reports.iter().all(|r| r.exit == ExitReason::Sentinel));

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let leftover = std::iter::from_fn(|| queue.try_pop()).count();
    let processed: usize = reports.iter().map(|r| r.processed).sum();
    let throughput = if elapsed_ms > 0.0 {
        processed as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    Ok(BenchResult {
        producers: bench.producers,
        consumers: bench.consumers,
        total_tasks,
        processed,
        elapsed_ms,
        throughput,
        cpu_user_s,
        cpu_sys_s,
        duplicate_tasks: has_duplicate_ids(&reports),
        leftover,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> DemoConfig {
        DemoConfig {
            unit_ms: 5,
            ..DemoConfig::default()
        }
    }

    #[test]
    fn basic_operations_walkthrough() {
        let queue = TaskQueue::new();
        let summary = basic_operations(&queue);
        assert_eq!(summary.len_after_push, 3);
        assert_eq!(summary.popped, Some(101));
        assert_eq!(summary.len_after_pop, 2);
        assert_eq!(summary.cleared, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn multiple_consumers_share_all_tasks_and_leave_no_sentinel() {
        let queue = Arc::new(TaskQueue::new());
        let config = DemoConfig {
            consumers: 3,
            multi_producer_tasks: 12,
            ..fast_config()
        };
        let reports = multiple_consumers(&queue, &config).expect("multi consumer demo");
        assert_eq!(reports.len(), 3);
        assert_eq!(reports.iter().map(|r| r.processed).sum::<usize>(), 12);
        assert!(!has_duplicate_ids(&reports));
        assert!(queue.is_empty());
    }

    #[test]
    fn full_demo_reports_expected_counts() {
        let summary = run_demo(Scenario::All, &fast_config()).expect("demo run");
        assert_eq!(summary.producer_consumer.as_ref().map(|r| r.processed), Some(5));
        let multi_total: usize = summary
            .multiple_consumers
            .as_ref()
            .map(|reports| reports.iter().map(|r| r.processed).sum())
            .unwrap_or_default();
        assert_eq!(multi_total, 8);
        let timeout = summary.timeout_consumer.as_ref().expect("timeout report");
        assert_eq!(timeout.processed_ids, vec![201, 202]);
        assert!(!summary.has_duplicates());
        assert_eq!(summary.leftover, 0);

        let rendered = summary.to_string();
        assert!(rendered.starts_with("DEMO SUMMARY"));
        assert!(rendered.contains("multi_consumer_total=8"));
    }

    #[test]
    fn single_scenario_leaves_other_sections_empty() {
        let summary = run_demo(Scenario::Basic, &fast_config()).expect("demo run");
        assert!(summary.basic.is_some());
        assert!(summary.producer_consumer.is_none());
        assert!(!summary.to_string().contains("producer_consumer_processed"));
    }

    #[test]
    fn drain_skips_stray_sentinels() {
        let queue = TaskQueue::new();
        queue.push(Task::terminate());
        queue.push(Task::new(1001, "leftover", 2));
        assert_eq!(drain_remaining(&queue, Duration::ZERO), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn benchmark_delivers_every_task_once() {
        let result = run_benchmark(BenchConfig {
            producers: 3,
            consumers: 4,
            tasks_per_producer: 200,
        })
        .expect("benchmark run");
        assert_eq!(result.total_tasks, 600);
        assert_eq!(result.processed, 600);
        assert!(!result.duplicate_tasks);
        assert_eq!(result.leftover, 0);
        assert_eq!(
            result.csv_row().split(',').count(),
            BenchResult::CSV_HEADER.split(',').count()
        );
    }
}
