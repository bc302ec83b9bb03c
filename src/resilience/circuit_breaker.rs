use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use crate::config::CircuitBreakerConfig;
use crate::error::{RegionalError, Result};
use crate::region::Region;

/// The state of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are failing and not being sent
    Open,
    /// Circuit is partially open, trial requests test recovery
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Mutable part of a breaker; always read and written under one lock
#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    consecutive_failures: usize,
    consecutive_successes: usize,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a breaker, for reporting
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub region: Region,
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub consecutive_successes: usize,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub rejected_calls: u64,
}

/// Circuit breaker guarding one region's service
#[derive(Debug)]
pub struct CircuitBreaker {
    region: Region,
    core: Mutex<BreakerCore>,
    /// Calls refused while open
    rejected: AtomicU64,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(region: Region, config: CircuitBreakerConfig) -> Self {
        Self {
            region,
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure: None,
                last_failure_at: None,
            }),
            rejected: AtomicU64::new(0),
            config,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Run `work` through the breaker.
    ///
    /// An open breaker fails fast with [`RegionalError::CircuitOpen`] without invoking
    /// `work`, unless `open_timeout` has passed since the last failure, in which case it
    /// moves to half-open and lets this call through as a trial. The outcome of `work`
    /// is recorded and its error, if any, is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit().await?;

        // The lock is not held while the work runs
        let result = work().await;

        match &result {
            Ok(_) => self.on_success().await,
            Err(_) => self.on_failure().await,
        }

        result
    }

    async fn admit(&self) -> Result<()> {
        let mut core = self.core.lock().await;

        if core.state == CircuitState::Open {
            let expired = core
                .last_failure
                .is_some_and(|at| at.elapsed() > self.config.open_timeout);

            if !expired {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(RegionalError::CircuitOpen {
                    region: self.region,
                });
            }

            core.state = CircuitState::HalfOpen;
            debug!(region = %self.region, "Circuit breaker state transitioned to half-open");
        }

        Ok(())
    }

    async fn on_success(&self) {
        let mut core = self.core.lock().await;
        core.consecutive_failures = 0;

        if core.state == CircuitState::HalfOpen {
            core.consecutive_successes += 1;

            if core.consecutive_successes >= self.config.success_threshold {
                core.state = CircuitState::Closed;
                core.consecutive_successes = 0;
                info!(region = %self.region, "Circuit breaker recovered to closed state");
            }
        }
    }

    async fn on_failure(&self) {
        let mut core = self.core.lock().await;
        core.last_failure = Some(Instant::now());
        core.last_failure_at = Some(Utc::now());
        core.consecutive_failures += 1;

        match core.state {
            CircuitState::HalfOpen => {
                // A failed trial call re-opens immediately
                core.state = CircuitState::Open;
                core.consecutive_successes = 0;
                warn!(region = %self.region, "Circuit breaker re-opened after failure in half-open state");
            }
            CircuitState::Closed
                if core.consecutive_failures >= self.config.failure_threshold =>
            {
                core.state = CircuitState::Open;
                core.consecutive_successes = 0;
                warn!(
                    region = %self.region,
                    "Circuit breaker opened after {} consecutive failures",
                    core.consecutive_failures
                );
            }
            _ => {}
        }
    }

    /// True unless the breaker is open. Never changes state.
    pub async fn is_available(&self) -> bool {
        self.core.lock().await.state != CircuitState::Open
    }

    /// Get the current state of the circuit breaker
    pub async fn state(&self) -> CircuitState {
        self.core.lock().await.state
    }

    pub async fn snapshot(&self) -> BreakerSnapshot {
        let core = self.core.lock().await;
        BreakerSnapshot {
            region: self.region,
            state: core.state,
            consecutive_failures: core.consecutive_failures,
            consecutive_successes: core.consecutive_successes,
            last_failure_at: core.last_failure_at,
            rejected_calls: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// One breaker per known region, created once and shared by every caller
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: HashMap<Region, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let breakers = Region::ALL
            .iter()
            .map(|&region| (region, Arc::new(CircuitBreaker::new(region, config.clone()))))
            .collect();

        Self { breakers }
    }

    pub fn get(&self, region: Region) -> Option<&Arc<CircuitBreaker>> {
        self.breakers.get(&region)
    }

    /// Whether `region` has a breaker that currently admits calls
    pub async fn is_available(&self, region: Region) -> bool {
        match self.breakers.get(&region) {
            Some(breaker) => breaker.is_available().await,
            None => false,
        }
    }

    /// Snapshots of every breaker, in `Region::ALL` order
    pub async fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut out = Vec::with_capacity(self.breakers.len());
        for region in Region::ALL {
            if let Some(breaker) = self.breakers.get(&region) {
                out.push(breaker.snapshot().await);
            }
        }
        out
    }
}
