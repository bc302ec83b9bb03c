// src/resilience/mod.rs
//! Regional resilience for the order service.
//!
//! 1. **Circuit Breaking** - One breaker per region; open breakers fail fast
//! 2. **Fallback Topology** - Each region names one fallback region
//! 3. **Cross-Region Cache** - Fallback results are cached per origin region and reused
//! 4. **Replication** - Fallback results are pushed back once the primary recovers
//! 5. **Health Monitoring** - Operator-facing health snapshots per region

mod cache;
mod circuit_breaker;
mod executor;
mod fallback;
mod health_monitor;
mod replication;

#[cfg(test)]
mod tests;

// Re-export key components
pub use cache::CrossRegionCache;
pub use circuit_breaker::{
    BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
pub use executor::{RegionalExecutor, RegionalResponse, ResponseSource};
pub use fallback::FallbackTopology;
pub use health_monitor::{
    HealthMonitor, RegionalHealthStatus, STATUS_HEALTHY, STATUS_RECOVERING, STATUS_UNHEALTHY,
};
pub use replication::{
    LoggingSink, ReplicationCounts, ReplicationScheduler, ReplicationSink, ReplicationTask,
};
