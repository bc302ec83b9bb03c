// src/tests/regional_scenarios.rs

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::info;

use crate::config::{InMemoryConfig, RegionalConfig};
use crate::region::Region;
use crate::resilience::{CircuitState, HealthMonitor, RegionalExecutor, ResponseSource};
use crate::storage::MemoryStorage;
use crate::test_utils::{fast_config, RecordingSink, ScriptedService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: String,
    region: Region,
    total_cents: u64,
}

fn memory_store() -> MemoryStorage {
    MemoryStorage::new(InMemoryConfig {
        max_entries: 100,
        use_background_task: false,
        cleanup_interval: Duration::from_secs(60),
    })
}

// A region goes down, callers are served through the fallback, the region comes back
#[tokio::test]
async fn test_outage_and_recovery() {
    let config = fast_config();
    let sink = Arc::new(RecordingSink::default());
    let executor = RegionalExecutor::new(&config, memory_store(), sink.clone());
    let service = ScriptedService::new();

    info!("Taking the us region down");
    service.set_down(Region::Us, true);

    let mut sources = Vec::new();
    for _ in 0..5 {
        let response = executor
            .execute_with_fallback(Region::Us, "getOrder", |region| {
                let service = service.clone();
                async move { service.call(region).await }
            })
            .await
            .unwrap();
        assert_eq!(response.value, "order-from-eu");
        sources.push(response.source);
    }

    assert_eq!(sources[0], ResponseSource::Fallback);
    assert!(sources[1..].iter().all(|s| *s == ResponseSource::FallbackCache));
    assert_eq!(service.calls(Region::Us), 3, "breaker opens after three failures");
    assert_eq!(service.calls(Region::Eu), 1);

    let us = executor.breakers().get(Region::Us).unwrap();
    assert_eq!(us.state().await, CircuitState::Open);

    // Still open when replication comes due
    time::sleep(Duration::from_millis(80)).await;
    let counts = executor.replication().counts();
    assert_eq!(counts.skipped, 1);
    assert!(sink.tasks().is_empty());

    info!("Bringing the us region back");
    service.set_down(Region::Us, false);
    time::sleep(Duration::from_millis(60)).await;

    for _ in 0..2 {
        let response = executor
            .execute_with_fallback(Region::Us, "getOrder", |region| {
                let service = service.clone();
                async move { service.call(region).await }
            })
            .await
            .unwrap();
        assert_eq!(response.source, ResponseSource::Primary);
        assert_eq!(response.value, "order-from-us");
    }

    assert_eq!(us.state().await, CircuitState::Closed);
}

#[tokio::test]
async fn test_structured_results_survive_the_cache() {
    let executor = RegionalExecutor::new(
        &RegionalConfig::default(),
        memory_store(),
        Arc::new(RecordingSink::default()),
    );

    let eu_down = |region: Region| async move {
        if region == Region::Eu {
            return Err("eu unavailable".to_string());
        }
        Ok(Order {
            id: "ord-1".to_string(),
            region,
            total_cents: 1250,
        })
    };

    let first = executor
        .execute_with_fallback(Region::Eu, "getOrder:ord-1", eu_down)
        .await
        .unwrap();
    assert_eq!(first.source, ResponseSource::Fallback);
    assert_eq!(first.value.region, Region::Asia);

    let second = executor
        .execute_with_fallback(Region::Eu, "getOrder:ord-1", eu_down)
        .await
        .unwrap();
    assert_eq!(second.source, ResponseSource::FallbackCache);
    assert_eq!(second.value, first.value);
}

#[tokio::test]
async fn test_health_monitor_follows_breakers_when_wired() {
    let executor = RegionalExecutor::new(&fast_config(), memory_store(), Arc::new(RecordingSink::default()));
    let monitor = Arc::new(HealthMonitor::new());
    let _sync = monitor.spawn_breaker_sync(Arc::clone(executor.breakers()), Duration::from_millis(10));

    let service = ScriptedService::new();
    service.set_down(Region::Asia, true);
    for _ in 0..3 {
        executor
            .execute_with_fallback(Region::Asia, "listOrders", |region| {
                let service = service.clone();
                async move { service.call(region).await }
            })
            .await
            .unwrap();
    }

    time::sleep(Duration::from_millis(50)).await;
    assert!(!monitor.is_region_healthy(Region::Asia).await);
    assert!(monitor.is_region_healthy(Region::Us).await);

    // Wait out the open timeout; the next admitted call moves to half-open
    time::sleep(Duration::from_millis(120)).await;
    service.set_down(Region::Asia, false);
    executor
        .execute_with_fallback(Region::Asia, "listOrders", |region| {
            let service = service.clone();
            async move { service.call(region).await }
        })
        .await
        .unwrap();

    time::sleep(Duration::from_millis(50)).await;
    let status = monitor.get_region_health(Region::Asia).await.unwrap();
    assert!(status.healthy);
    assert_eq!(status.status, crate::resilience::STATUS_RECOVERING);
}
