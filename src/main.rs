use dotenv::dotenv;
use prettytable::{Cell, Row, Table};
use std::sync::Arc;
use tracing::{error, info, warn};

use regional_fallback::resilience::LoggingSink;
use regional_fallback::storage::{MemoryStorage, RedisStorage};
use regional_fallback::{init_logging, DurableStore, HealthMonitor, RegionalConfig, RegionalExecutor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();
    info!("Regional fallback layer starting up");

    let config = match RegionalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    info!(
        failure_threshold = config.circuit_breaker.failure_threshold,
        success_threshold = config.circuit_breaker.success_threshold,
        open_timeout = ?config.circuit_breaker.open_timeout,
        "Configuration loaded"
    );

    let store = build_store(&config).await;
    if let Err(e) = store.ping().await {
        warn!("Durable cache tier is not reachable: {}", e);
    }

    let executor = RegionalExecutor::new(&config, store, Arc::new(LoggingSink));
    let monitor = Arc::new(HealthMonitor::new());

    if config.health.sync_with_breakers {
        let _sync = monitor.spawn_breaker_sync(Arc::clone(executor.breakers()), config.health.sync_interval);
        info!(interval = ?config.health.sync_interval, "Health monitor follows circuit breakers");
    }

    let mut breakers = Table::new();
    breakers.add_row(Row::new(vec![
        Cell::new("Region"),
        Cell::new("Breaker"),
        Cell::new("Fallback"),
        Cell::new("Failures"),
    ]));
    for snapshot in executor.breakers().snapshots().await {
        let fallback = executor
            .fallback_region(snapshot.region)
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        breakers.add_row(Row::new(vec![
            Cell::new(snapshot.region.code()),
            Cell::new(snapshot.state.as_str()),
            Cell::new(&fallback),
            Cell::new(&snapshot.consecutive_failures.to_string()),
        ]));
    }
    breakers.printstd();

    let mut health = Table::new();
    health.add_row(Row::new(vec![
        Cell::new("Region"),
        Cell::new("Healthy"),
        Cell::new("Status"),
        Cell::new("Last checked"),
    ]));
    let mut statuses: Vec<_> = monitor.get_health_status().await.into_values().collect();
    statuses.sort_by_key(|s| s.region);
    for status in statuses {
        health.add_row(Row::new(vec![
            Cell::new(status.region.code()),
            Cell::new(&status.healthy.to_string()),
            Cell::new(&status.status),
            Cell::new(&status.last_checked.to_rfc3339()),
        ]));
    }
    health.printstd();

    info!("Regional fallback layer initialized successfully");
    Ok(())
}

async fn build_store(config: &RegionalConfig) -> Arc<dyn DurableStore> {
    if let Some(redis) = &config.redis {
        match RedisStorage::new(redis.clone()).await {
            Ok(storage) => {
                info!(url = %redis.url, "Using Redis for the durable cache tier");
                return Arc::new(storage);
            }
            Err(e) => warn!("Falling back to in-memory cache tier: {}", e),
        }
    }

    Arc::new(MemoryStorage::new(config.cache.memory.clone()))
}
