// src/bin/regional_cli.rs

use indicatif::{ProgressBar, ProgressStyle};
use prettytable::{Cell, Row, Table};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regional_fallback::config::RegionalConfig;
use regional_fallback::resilience::{HealthMonitor, LoggingSink, RegionalExecutor, ResponseSource};
use regional_fallback::storage::MemoryStorage;
use regional_fallback::Region;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "regional_cli",
    about = "Simulate order traffic against flaky regional services"
)]
struct Opt {
    /// Region every request is sent to first
    #[structopt(short, long, default_value = "us")]
    primary: Region,

    /// Number of requests to simulate
    #[structopt(short = "n", long, default_value = "50")]
    num_requests: usize,

    /// Number of distinct operation names (each gets its own cache entry)
    #[structopt(short, long, default_value = "5")]
    operations: usize,

    /// Time between requests in milliseconds
    #[structopt(short = "t", long, default_value = "50")]
    request_interval_ms: u64,

    /// Probability that a call to the us region fails
    #[structopt(long, default_value = "0.0")]
    fail_us: f64,

    /// Probability that a call to the eu region fails
    #[structopt(long, default_value = "0.0")]
    fail_eu: f64,

    /// Probability that a call to the asia region fails
    #[structopt(long, default_value = "0.0")]
    fail_asia: f64,

    /// Consecutive failures before a breaker opens
    #[structopt(long, default_value = "5")]
    failure_threshold: usize,

    /// Milliseconds an open breaker waits before a trial call
    #[structopt(long, default_value = "2000")]
    open_timeout_ms: u64,

    /// Milliseconds before a fallback result is replicated
    #[structopt(long, default_value = "500")]
    replication_delay_ms: u64,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Disable logs
    #[structopt(long)]
    disable_logs: bool,
}

impl Opt {
    fn failure_rate(&self, region: Region) -> f64 {
        match region {
            Region::Us => self.fail_us,
            Region::Eu => self.fail_eu,
            Region::Asia => self.fail_asia,
        }
    }

    fn config(&self) -> RegionalConfig {
        let mut config = RegionalConfig::default();
        config.circuit_breaker.failure_threshold = self.failure_threshold;
        config.circuit_breaker.open_timeout = Duration::from_millis(self.open_timeout_ms);
        config.replication.delay = Duration::from_millis(self.replication_delay_ms);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let filter = if opt.disable_logs {
        "regional_cli=error,regional_fallback=error".to_string()
    } else {
        let log_level = match opt.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        format!("regional_cli={},regional_fallback={}", log_level, log_level)
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(filter))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = opt.config();
    config.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || stop_flag.store(true, Ordering::SeqCst))?;

    let storage = MemoryStorage::new(config.cache.memory.clone());
    let executor = RegionalExecutor::new(&config, storage, Arc::new(LoggingSink));
    let monitor = Arc::new(HealthMonitor::new());
    let _sync = monitor.spawn_breaker_sync(Arc::clone(executor.breakers()), Duration::from_millis(100));

    info!(
        primary = %opt.primary,
        requests = opt.num_requests,
        "Starting regional traffic simulation"
    );

    let progress = ProgressBar::new(opt.num_requests as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut sources: HashMap<ResponseSource, u64> = HashMap::new();
    let mut failures = 0u64;
    let interval = Duration::from_millis(opt.request_interval_ms);
    let start_time = Instant::now();

    for i in 0..opt.num_requests {
        if stop.load(Ordering::SeqCst) {
            warn!("Interrupted after {} requests", i);
            break;
        }
        let request_time = Instant::now();
        let operation = format!("getOrder:{}", i % opt.operations.max(1));

        let result = executor
            .execute_with_fallback(opt.primary, &operation, |region| {
                let rate = opt.failure_rate(region);
                async move {
                    if rand::random::<f64>() < rate {
                        Err(format!("{} service unavailable", region))
                    } else {
                        Ok(format!("order-from-{}", region))
                    }
                }
            })
            .await;

        match result {
            Ok(response) => *sources.entry(response.source).or_insert(0) += 1,
            Err(e) => {
                failures += 1;
                progress.set_message(format!("last error: {}", e));
            }
        }
        progress.inc(1);

        let elapsed = request_time.elapsed();
        if elapsed < interval {
            time::sleep(interval - elapsed).await;
        }
    }
    progress.finish_with_message("done");

    // Let replications that are already due run before reporting
    time::sleep(config.replication.delay).await;
    let elapsed = start_time.elapsed();

    let mut outcome = Table::new();
    outcome.add_row(Row::new(vec![Cell::new("Outcome"), Cell::new("Count")]));
    for source in [
        ResponseSource::Primary,
        ResponseSource::Fallback,
        ResponseSource::FallbackCache,
        ResponseSource::StaleCache,
    ] {
        let count = sources.get(&source).copied().unwrap_or(0);
        outcome.add_row(Row::new(vec![
            Cell::new(source.as_str()),
            Cell::new(&count.to_string()),
        ]));
    }
    outcome.add_row(Row::new(vec![Cell::new("error"), Cell::new(&failures.to_string())]));

    let mut regions = Table::new();
    regions.add_row(Row::new(vec![
        Cell::new("Region"),
        Cell::new("Breaker"),
        Cell::new("Failures"),
        Cell::new("Rejected"),
        Cell::new("Health"),
        Cell::new("Last failure"),
    ]));
    for snapshot in executor.breakers().snapshots().await {
        let health = monitor
            .get_region_health(snapshot.region)
            .await
            .map(|h| h.status.clone())
            .unwrap_or_else(|| "-".to_string());
        let last_failure = snapshot
            .last_failure_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        regions.add_row(Row::new(vec![
            Cell::new(snapshot.region.code()),
            Cell::new(snapshot.state.as_str()),
            Cell::new(&snapshot.consecutive_failures.to_string()),
            Cell::new(&snapshot.rejected_calls.to_string()),
            Cell::new(&health),
            Cell::new(&last_failure),
        ]));
    }

    let counts = executor.replication().counts();
    let mut replication = Table::new();
    replication.add_row(Row::new(vec![
        Cell::new("Scheduled"),
        Cell::new("Replicated"),
        Cell::new("Skipped"),
        Cell::new("Failed"),
    ]));
    replication.add_row(Row::new(vec![
        Cell::new(&counts.scheduled.to_string()),
        Cell::new(&counts.replicated.to_string()),
        Cell::new(&counts.skipped.to_string()),
        Cell::new(&counts.failed.to_string()),
    ]));

    println!("\nSimulation Results ({:?}):", elapsed);
    outcome.printstd();
    println!("\nRegions:");
    regions.printstd();
    println!("\nReplication:");
    replication.printstd();

    Ok(())
}
