// src/resilience/tests/health_monitor_tests.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::error::RegionalError;
use crate::region::Region;
use crate::resilience::{
    BreakerRegistry, CircuitBreakerConfig, CircuitState, HealthMonitor, STATUS_HEALTHY,
    STATUS_RECOVERING, STATUS_UNHEALTHY,
};

#[tokio::test]
async fn test_all_regions_start_healthy() {
    let monitor = HealthMonitor::new();

    let all = monitor.get_health_status().await;
    assert_eq!(all.len(), Region::ALL.len());
    for region in Region::ALL {
        let status = &all[&region];
        assert_eq!(status.region, region);
        assert!(status.healthy);
        assert_eq!(status.status, STATUS_HEALTHY);
        assert!(monitor.is_region_healthy(region).await);
    }
}

#[tokio::test]
async fn test_update_replaces_snapshot() {
    let monitor = HealthMonitor::new();
    let before = monitor.get_region_health(Region::Eu).await.unwrap();

    monitor
        .update_region_health(Region::Eu, false, "MAINTENANCE")
        .await;

    let after = monitor.get_region_health(Region::Eu).await.unwrap();
    assert!(!after.healthy);
    assert_eq!(after.status, "MAINTENANCE");
    assert!(after.last_checked >= before.last_checked);
    assert!(!monitor.is_region_healthy(Region::Eu).await);

    // Readers holding the old snapshot keep a consistent view
    assert!(before.healthy);
    assert_eq!(before.status, STATUS_HEALTHY);

    // Other regions are untouched
    assert!(monitor.is_region_healthy(Region::Us).await);
}

#[tokio::test]
async fn test_full_snapshot_is_a_copy() {
    let monitor = HealthMonitor::new();
    let snapshot = monitor.get_health_status().await;

    monitor
        .update_region_health(Region::Asia, false, STATUS_UNHEALTHY)
        .await;

    assert!(snapshot[&Region::Asia].healthy);
    assert!(!monitor.is_region_healthy(Region::Asia).await);
}

#[tokio::test]
async fn test_record_breaker_state_labels() {
    let monitor = HealthMonitor::new();

    monitor
        .record_breaker_state(Region::Us, CircuitState::Open)
        .await;
    let status = monitor.get_region_health(Region::Us).await.unwrap();
    assert!(!status.healthy);
    assert_eq!(status.status, STATUS_UNHEALTHY);

    monitor
        .record_breaker_state(Region::Us, CircuitState::HalfOpen)
        .await;
    let status = monitor.get_region_health(Region::Us).await.unwrap();
    assert!(status.healthy);
    assert_eq!(status.status, STATUS_RECOVERING);

    monitor
        .record_breaker_state(Region::Us, CircuitState::Closed)
        .await;
    assert_eq!(
        monitor.get_region_health(Region::Us).await.unwrap().status,
        STATUS_HEALTHY
    );
}

#[tokio::test]
async fn test_monitor_is_not_driven_by_breakers_by_default() {
    let breakers = BreakerRegistry::new(CircuitBreakerConfig {
        failure_threshold: 1,
        ..CircuitBreakerConfig::default()
    });
    let monitor = HealthMonitor::new();

    let _ = breakers
        .get(Region::Eu)
        .unwrap()
        .execute(|| async { Err::<(), _>(RegionalError::upstream(Region::Eu, "down")) })
        .await;

    assert!(!breakers.is_available(Region::Eu).await);
    assert!(monitor.is_region_healthy(Region::Eu).await);
}

#[tokio::test]
async fn test_breaker_sync_mirrors_state() {
    let breakers = Arc::new(BreakerRegistry::new(CircuitBreakerConfig {
        failure_threshold: 1,
        ..CircuitBreakerConfig::default()
    }));
    let monitor = Arc::new(HealthMonitor::new());
    let handle = monitor.spawn_breaker_sync(Arc::clone(&breakers), Duration::from_millis(10));

    let _ = breakers
        .get(Region::Asia)
        .unwrap()
        .execute(|| async { Err::<(), _>(RegionalError::upstream(Region::Asia, "down")) })
        .await;

    time::sleep(Duration::from_millis(60)).await;

    let status = monitor.get_region_health(Region::Asia).await.unwrap();
    assert!(!status.healthy);
    assert_eq!(status.status, STATUS_UNHEALTHY);
    assert!(monitor.is_region_healthy(Region::Us).await);

    // Dropping the monitor stops the task
    drop(monitor);
    time::timeout(Duration::from_millis(200), handle)
        .await
        .expect("sync task should stop once the monitor is dropped")
        .unwrap();
}

#[test]
fn test_display_format() {
    let monitor = HealthMonitor::new();
    let status = tokio_test::block_on(monitor.get_region_health(Region::Eu)).unwrap();
    let text = status.to_string();
    assert!(text.starts_with("OrderRegionalHealth{region=eu, healthy=true, status='HEALTHY'"));
}

#[tokio::test]
async fn test_status_serializes_for_reporting() {
    let monitor = HealthMonitor::new();
    monitor
        .update_region_health(Region::Asia, false, STATUS_UNHEALTHY)
        .await;
    let status = monitor.get_region_health(Region::Asia).await.unwrap();

    let json = serde_json::to_value(&*status).unwrap();
    assert_eq!(json["region"], "asia");
    assert_eq!(json["healthy"], false);
    assert_eq!(json["status"], STATUS_UNHEALTHY);
    assert!(json["last_checked"].as_str().is_some());
}
