use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task;
use tokio::time;
use tracing::{debug, info, warn};

use crate::region::Region;
use crate::resilience::circuit_breaker::{BreakerRegistry, CircuitState};

pub const STATUS_HEALTHY: &str = "HEALTHY";
pub const STATUS_RECOVERING: &str = "RECOVERING";
pub const STATUS_UNHEALTHY: &str = "UNHEALTHY";

/// Health snapshot of one regional service; replaced whole on every update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalHealthStatus {
    pub region: Region,
    pub healthy: bool,
    pub status: String,
    pub last_checked: DateTime<Utc>,
}

impl RegionalHealthStatus {
    fn new(region: Region, healthy: bool, status: impl Into<String>) -> Self {
        Self {
            region,
            healthy,
            status: status.into(),
            last_checked: Utc::now(),
        }
    }
}

impl fmt::Display for RegionalHealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OrderRegionalHealth{{region={}, healthy={}, status='{}', lastChecked={}}}",
            self.region,
            self.healthy,
            self.status,
            self.last_checked.to_rfc3339()
        )
    }
}

fn breaker_health(state: CircuitState) -> (bool, &'static str) {
    match state {
        CircuitState::Closed => (true, STATUS_HEALTHY),
        CircuitState::HalfOpen => (true, STATUS_RECOVERING),
        CircuitState::Open => (false, STATUS_UNHEALTHY),
    }
}

/// Operator-facing health record per region.
///
/// Nothing updates it on its own: the executor's breakers keep their own counters. An
/// operator can wire the two together with [`HealthMonitor::record_breaker_state`] or
/// [`HealthMonitor::spawn_breaker_sync`].
#[derive(Debug)]
pub struct HealthMonitor {
    statuses: RwLock<HashMap<Region, Arc<RegionalHealthStatus>>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    /// Every known region starts out healthy
    pub fn new() -> Self {
        let statuses = Region::ALL
            .iter()
            .map(|&region| {
                (
                    region,
                    Arc::new(RegionalHealthStatus::new(region, true, STATUS_HEALTHY)),
                )
            })
            .collect();

        Self {
            statuses: RwLock::new(statuses),
        }
    }

    /// Copy of every region's current snapshot
    pub async fn get_health_status(&self) -> HashMap<Region, RegionalHealthStatus> {
        self.statuses
            .read()
            .await
            .iter()
            .map(|(region, status)| (*region, (**status).clone()))
            .collect()
    }

    pub async fn get_region_health(&self, region: Region) -> Option<Arc<RegionalHealthStatus>> {
        self.statuses.read().await.get(&region).cloned()
    }

    pub async fn is_region_healthy(&self, region: Region) -> bool {
        self.get_region_health(region)
            .await
            .is_some_and(|status| status.healthy)
    }

    /// Replace the snapshot for `region`
    pub async fn update_region_health(&self, region: Region, healthy: bool, status: &str) {
        let next = Arc::new(RegionalHealthStatus::new(region, healthy, status));
        let previous = self.statuses.write().await.insert(region, next);

        if previous.map(|p| p.healthy) != Some(healthy) {
            if healthy {
                info!(region = %region, status, "Region is now healthy");
            } else {
                warn!(region = %region, status, "Region is now unhealthy");
            }
        }
    }

    /// Record a breaker state as a health snapshot
    pub async fn record_breaker_state(&self, region: Region, state: CircuitState) {
        let (healthy, label) = breaker_health(state);
        self.update_region_health(region, healthy, label).await;
    }

    /// Poll every breaker on `interval` and mirror its state here.
    ///
    /// The task ends once the monitor is dropped.
    pub fn spawn_breaker_sync(
        self: &Arc<Self>,
        breakers: Arc<BreakerRegistry>,
        interval: Duration,
    ) -> task::JoinHandle<()> {
        let monitor = Arc::downgrade(self);

        task::spawn(async move {
            let mut interval_timer = time::interval(interval);

            loop {
                interval_timer.tick().await;

                let Some(monitor) = monitor.upgrade() else {
                    break;
                };

                for snapshot in breakers.snapshots().await {
                    let current = monitor.get_region_health(snapshot.region).await;
                    let (_, label) = breaker_health(snapshot.state);
                    // Only replace on change so last_checked marks the transition
                    if current.map(|c| c.status != label).unwrap_or(true) {
                        monitor
                            .record_breaker_state(snapshot.region, snapshot.state)
                            .await;
                    }
                }
            }

            debug!("Health sync task stopped");
        })
    }
}
