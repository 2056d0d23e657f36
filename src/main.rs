use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relay_queue::config::DemoConfig;
use relay_queue::sim::{self, BenchConfig, BenchResult, Scenario};

#[derive(Parser, Debug)]
#[command(name = "relay_queue")]
#[command(about = "Producer/consumer demos over a blocking task queue", long_about = None)]
struct Args {
    /// YAML file with demo timings and sizes
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Length of one time unit in milliseconds
    #[arg(long, global = true)]
    unit_ms: Option<u64>,

    /// Force debug logging regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every scenario in sequence (default)
    Demo,
    /// Push, inspect, and pop without threads
    Basic,
    /// One producer and one blocking consumer
    ProducerConsumer,
    /// One producer and several competing consumers
    Multi {
        /// Number of consumers
        #[arg(long)]
        consumers: Option<usize>,
    },
    /// Consumer with bounded waits and a stop flag
    Timeout,
    /// Measure hand-off throughput and print one CSV row
    Bench {
        #[arg(long, default_value_t = 2)]
        producers: usize,
        #[arg(long, default_value_t = 4)]
        consumers: usize,
        #[arg(long, default_value_t = 10_000)]
        tasks_per_producer: usize,
    },
}

fn load_config(args: &Args) -> anyhow::Result<DemoConfig> {
    let mut config = match &args.config {
        Some(path) => DemoConfig::from_file(path)?,
        None => DemoConfig::default(),
    };
    if let Some(unit_ms) = args.unit_ms {
        config.unit_ms = unit_ms;
    }
    if let Some(Command::Multi {
        consumers: Some(consumers),
    }) = &args.command
    {
        config.consumers = *consumers;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    relay_queue::logging::init(args.verbose);

    let config = load_config(&args)?;
    tracing::debug!(?config, "configuration loaded");

    let scenario = match &args.command {
        None | Some(Command::Demo) => Scenario::All,
        Some(Command::Basic) => Scenario::Basic,
        Some(Command::ProducerConsumer) => Scenario::ProducerConsumer,
        Some(Command::Multi { .. }) => Scenario::MultipleConsumers,
        Some(Command::Timeout) => Scenario::Timeout,
        Some(Command::Bench {
            producers,
            consumers,
            tasks_per_producer,
        }) => {
            if *producers == 0 || *consumers == 0 {
                anyhow::bail!("bench: producers and consumers must be > 0");
            }
            let result = sim::run_benchmark(BenchConfig {
                producers: *producers,
                consumers: *consumers,
                tasks_per_producer: *tasks_per_producer,
            })?;
            println!("{}", BenchResult::CSV_HEADER);
            println!("{}", result.csv_row());
            if result.leftover > 0 {
                eprintln!("# warning,leftover_tasks,{}", result.leftover);
            }
            if result.duplicate_tasks {
                eprintln!("# violation,duplicate_tasks");
            }
            return Ok(());
        }
    };

    let summary = sim::run_demo(scenario, &config)?;
    println!("{summary}");
    Ok(())
}
