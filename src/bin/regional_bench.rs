// src/bin/regional_bench.rs

use std::sync::Arc;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tokio::sync::{Barrier, Semaphore};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regional_fallback::config::{RedisConfig, RegionalConfig};
use regional_fallback::resilience::{LoggingSink, RegionalExecutor, ResponseSource};
use regional_fallback::storage::{DurableStore, MemoryStorage, RedisStorage};
use regional_fallback::Region;

#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "regional_bench",
    about = "A benchmarking tool for the regional fallback executor"
)]
struct Opt {
    /// Storage backend for the durable cache tier
    #[structopt(short, long, possible_values = &["memory", "redis"], default_value = "memory")]
    storage: String,

    /// Redis URL (when using Redis storage)
    #[structopt(long, default_value = "redis://localhost:6379")]
    redis_url: String,

    /// Primary region for every call
    #[structopt(short, long, default_value = "us")]
    primary: Region,

    /// Probability that a call to the primary region fails
    #[structopt(short, long, default_value = "0.0")]
    failure_rate: f64,

    /// Number of distinct operation names
    #[structopt(short, long, default_value = "100")]
    operations: usize,

    /// Number of concurrent callers to simulate
    #[structopt(short = "u", long, default_value = "10")]
    num_callers: usize,

    /// Number of calls per caller
    #[structopt(short = "r", long, default_value = "100")]
    requests_per_caller: usize,

    /// Number of iterations to run
    #[structopt(short, long, default_value = "3")]
    iterations: usize,

    /// Maximum concurrency level
    #[structopt(short = "c", long, default_value = "100")]
    concurrency: usize,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Disable logs
    #[structopt(long)]
    disable_logs: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    primary: u64,
    fallback: u64,
    cached: u64,
    errors: u64,
}

impl Tally {
    fn record(&mut self, source: ResponseSource) {
        match source {
            ResponseSource::Primary => self.primary += 1,
            ResponseSource::Fallback => self.fallback += 1,
            ResponseSource::FallbackCache | ResponseSource::StaleCache => self.cached += 1,
        }
    }

    fn merge(&mut self, other: Tally) {
        self.primary += other.primary;
        self.fallback += other.fallback;
        self.cached += other.cached;
        self.errors += other.errors;
    }

    fn total(&self) -> u64 {
        self.primary + self.fallback + self.cached + self.errors
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let filter = if opt.disable_logs {
        "regional_bench=error,regional_fallback=error".to_string()
    } else {
        let log_level = match opt.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        format!("regional_bench={},regional_fallback={}", log_level, log_level)
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(filter))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RegionalConfig::default();

    let store: Arc<dyn DurableStore> = match opt.storage.as_str() {
        "memory" => {
            let mut memory = config.cache.memory.clone();
            memory.max_entries = 100_000;
            Arc::new(MemoryStorage::new(memory))
        }
        "redis" => {
            let redis_config = RedisConfig {
                url: opt.redis_url.clone(),
                connection_timeout: Duration::from_secs(5),
            };
            match RedisStorage::new(redis_config).await {
                Ok(storage) => Arc::new(storage),
                Err(e) => {
                    error!("Failed to connect to Redis: {}", e);
                    return Err(format!("Failed to connect to Redis: {}", e).into());
                }
            }
        }
        other => return Err(format!("Unknown storage backend: {}", other).into()),
    };

    let executor = Arc::new(RegionalExecutor::new(&config, store, Arc::new(LoggingSink)));
    let name = format!(
        "{} primary, {:.0}% failures, {} storage",
        opt.primary,
        opt.failure_rate * 100.0,
        opt.storage
    );

    run_benchmark(executor, &name, opt).await
}

async fn run_benchmark(
    executor: Arc<RegionalExecutor<Arc<dyn DurableStore>>>,
    name: &str,
    opt: Opt,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("\nRunning benchmark: {}", name);
    println!("======================={}", "=".repeat(name.len()));

    let mut total_duration = Duration::from_secs(0);
    let mut total = Tally::default();

    for iteration in 0..opt.iterations {
        info!("Starting iteration {} of {}", iteration + 1, opt.iterations);

        let start_time = Instant::now();
        let barrier = Arc::new(Barrier::new(opt.num_callers));
        let semaphore = Arc::new(Semaphore::new(opt.concurrency));
        let mut handles = Vec::with_capacity(opt.num_callers);

        for caller in 0..opt.num_callers {
            let executor = Arc::clone(&executor);
            let barrier = Arc::clone(&barrier);
            let semaphore = Arc::clone(&semaphore);
            let opt = opt.clone();

            handles.push(tokio::spawn(async move {
                barrier.wait().await;

                let mut tally = Tally::default();
                for i in 0..opt.requests_per_caller {
                    let Ok(_permit) = semaphore.acquire().await else {
                        break;
                    };
                    let operation = format!("getOrder:{}", (caller + i) % opt.operations.max(1));
                    let primary = opt.primary;
                    let failure_rate = opt.failure_rate;

                    let result = executor
                        .execute_with_fallback(primary, &operation, move |region| async move {
                            if region == primary && rand::random::<f64>() < failure_rate {
                                Err(format!("{} service unavailable", region))
                            } else {
                                Ok(format!("order-from-{}", region))
                            }
                        })
                        .await;

                    match result {
                        Ok(response) => tally.record(response.source),
                        Err(e) => {
                            tally.errors += 1;
                            warn!("Regional call failed: {}", e);
                        }
                    }
                }
                tally
            }));
        }

        let results = futures::future::join_all(handles).await;

        let mut iteration_tally = Tally::default();
        for result in results.into_iter().flatten() {
            iteration_tally.merge(result);
        }

        let elapsed = start_time.elapsed();
        total_duration += elapsed;
        total.merge(iteration_tally);

        println!(
            "Iteration {}: {:?}, {} primary, {} fallback, {} cached, {} errors, {:.2} calls/sec",
            iteration + 1,
            elapsed,
            iteration_tally.primary,
            iteration_tally.fallback,
            iteration_tally.cached,
            iteration_tally.errors,
            iteration_tally.total() as f64 / elapsed.as_secs_f64()
        );
    }

    let calls = total.total().max(1) as f64;
    let avg_duration = total_duration / opt.iterations.max(1) as u32;

    println!("\nBenchmark Results for {}:", name);
    println!("  Total Calls:        {}", total.total());
    println!("  Primary:            {} ({:.1}%)", total.primary, 100.0 * total.primary as f64 / calls);
    println!("  Fallback:           {} ({:.1}%)", total.fallback, 100.0 * total.fallback as f64 / calls);
    println!("  From cache:         {} ({:.1}%)", total.cached, 100.0 * total.cached as f64 / calls);
    println!("  Errors:             {} ({:.1}%)", total.errors, 100.0 * total.errors as f64 / calls);
    println!("  Avg. Duration:      {:?}", avg_duration);
    println!(
        "  Avg. Throughput:    {:.2} calls/second",
        total.total() as f64 / total_duration.as_secs_f64()
    );

    let counts = executor.replication().counts();
    println!(
        "  Replication:        {} scheduled, {} replicated, {} skipped",
        counts.scheduled, counts.replicated, counts.skipped
    );

    Ok(())
}
