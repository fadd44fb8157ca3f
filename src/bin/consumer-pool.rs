use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use consumer_pool::{read_specs, CommandJob, ConsumerPool, PoolConfig, Result, Tally};

#[derive(Parser)]
#[command(
    name = "consumer-pool",
    version,
    about = "Run a stream of commands on a fixed pool of workers"
)]
struct Cli {
    /// Number of workers [default: $MAX_THREADS, or the CPU count]
    #[arg(long, value_name = "N", value_parser = parse_workers)]
    workers: Option<usize>,

    /// JSON file with pool settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File of JSON command specs [default: stdin]
    #[arg(long, value_name = "FILE")]
    jobs: Option<PathBuf>,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(tally) if tally.failed() == 0 => {}
        Ok(_) => exit(1),
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<Arc<Tally>> {
    let mut config = match &cli.config {
        Some(path) => PoolConfig::from_reader(File::open(path)?)?,
        None => PoolConfig::from_env()?,
    };
    if let Some(workers) = cli.workers {
        config.size = workers;
    }

    let pool = ConsumerPool::from_config(&config)?;
    info!("consumer-pool {}", env!("CARGO_PKG_VERSION"));
    info!("Workers: {}", pool.size());

    let input: Box<dyn Read> = match &cli.jobs {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };

    let tally = Arc::new(Tally::default());
    pool.start()?;
    let queued = enqueue_all(&pool, input, &tally);
    // Drain whatever was queued even if the input turned out malformed.
    pool.poison();
    pool.join()?;
    let queued = queued?;

    info!(
        "{} commands run: {} succeeded, {} failed",
        queued,
        tally.succeeded(),
        tally.failed()
    );
    Ok(tally)
}

fn enqueue_all(pool: &ConsumerPool, input: impl Read, tally: &Arc<Tally>) -> Result<usize> {
    let mut queued = 0;
    for spec in read_specs(input) {
        pool.enq(CommandJob::new(spec?, tally.clone()));
        queued += 1;
    }
    Ok(queued)
}

fn parse_workers(value: &str) -> std::result::Result<usize, String> {
    consumer_pool::parse_size(value).map_err(|e| e.to_string())
}
