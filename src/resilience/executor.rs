use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::RegionalConfig;
use crate::error::{BoxError, RegionalError, Result};
use crate::region::Region;
use crate::region_event;
use crate::resilience::cache::CrossRegionCache;
use crate::resilience::circuit_breaker::{BreakerRegistry, CircuitBreaker};
use crate::resilience::fallback::FallbackTopology;
use crate::resilience::replication::{ReplicationScheduler, ReplicationSink};
use crate::routing;
use crate::storage::DurableStore;

/// Where a returned value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseSource {
    /// Produced by the primary region
    Primary,
    /// Produced by the fallback region and cached
    Fallback,
    /// Read from the cross-region cache while the fallback region was healthy
    FallbackCache,
    /// Read from the cross-region cache after both regions failed
    StaleCache,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Primary => "primary",
            ResponseSource::Fallback => "fallback",
            ResponseSource::FallbackCache => "fallback_cache",
            ResponseSource::StaleCache => "stale_cache",
        }
    }
}

/// Result of a regional call, tagged with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct RegionalResponse<T> {
    pub value: T,
    pub source: ResponseSource,
    /// Region whose breaker admitted the call; `None` for stale cache reads
    pub served_by: Option<Region>,
}

impl<T> RegionalResponse<T> {
    /// True when the value is a last-resort cache read and may be out of date
    pub fn is_stale(&self) -> bool {
        self.source == ResponseSource::StaleCache
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Runs units of work against a primary region with breaker-guarded fallback.
///
/// ```plaintext
/// TryPrimary ──ok──► return
///     │ err
///     ▼
/// SelectFallback ──none──► NoFallbackConfigured
///     │
///     ▼
/// TryFallback (through the fallback's breaker)
///     cache hit ──► return
///     run work ──► cache ──► schedule replication ──► return
///     │ err
///     ▼
/// LastResort: stale cache ──► return, else AllRegionsUnavailable
/// ```
#[derive(Debug)]
pub struct RegionalExecutor<S> {
    breakers: Arc<BreakerRegistry>,
    topology: FallbackTopology,
    cache: CrossRegionCache<S>,
    replication: ReplicationScheduler,
    cache_ttl: Duration,
}

impl<S: DurableStore> RegionalExecutor<S> {
    /// Build every component from `config`. Starts the replication worker, so this must
    /// run inside a tokio runtime.
    pub fn new(config: &RegionalConfig, store: S, sink: Arc<dyn ReplicationSink>) -> Self {
        let breakers = Arc::new(BreakerRegistry::new(config.circuit_breaker.clone()));
        let replication =
            ReplicationScheduler::start(Arc::clone(&breakers), sink, &config.replication);

        Self::from_parts(
            breakers,
            FallbackTopology::from_config(&config.fallback),
            CrossRegionCache::new(store, config.cache.key_prefix.clone()),
            replication,
            config.cache.ttl,
        )
    }

    pub fn from_parts(
        breakers: Arc<BreakerRegistry>,
        topology: FallbackTopology,
        cache: CrossRegionCache<S>,
        replication: ReplicationScheduler,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            breakers,
            topology,
            cache,
            replication,
            cache_ttl,
        }
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn topology(&self) -> &FallbackTopology {
        &self.topology
    }

    pub fn cache(&self) -> &CrossRegionCache<S> {
        &self.cache
    }

    pub fn replication(&self) -> &ReplicationScheduler {
        &self.replication
    }

    fn breaker(&self, region: Region) -> Result<&Arc<CircuitBreaker>> {
        self.breakers
            .get(region)
            .ok_or_else(|| RegionalError::Internal(format!("No circuit breaker for region {}", region)))
    }

    pub async fn is_region_available(&self, region: Region) -> bool {
        self.breakers.is_available(region).await
    }

    pub fn fallback_region(&self, region: Region) -> Option<Region> {
        self.topology.fallback_of(region)
    }

    pub async fn get_available_regions_in_order(&self, preferred: Region) -> Vec<Region> {
        self.topology.available_chain(preferred, &self.breakers).await
    }

    /// Run `work` for `primary`, falling back to its configured fallback region.
    ///
    /// `work` is called with the region it runs in, and [`routing::current_region`]
    /// returns that region for the duration of the call. It runs at most once per
    /// region. Results produced in the fallback region are cached under
    /// `(primary, operation)` and scheduled for replication to `primary`.
    ///
    /// Only [`RegionalError::NoFallbackConfigured`] and
    /// [`RegionalError::AllRegionsUnavailable`] are returned as errors.
    pub async fn execute_with_fallback<T, E, F, Fut>(
        &self,
        primary: Region,
        operation: &str,
        work: F,
    ) -> Result<RegionalResponse<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Region) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let primary_breaker = self.breaker(primary)?;

        region_event!(debug, primary, operation, "Executing in primary region");
        let primary_result = primary_breaker
            .execute(|| routing::with_region(primary, run_work(primary, &work)))
            .await;

        let primary_err = match primary_result {
            Ok(value) => {
                return Ok(RegionalResponse {
                    value,
                    source: ResponseSource::Primary,
                    served_by: Some(primary),
                })
            }
            Err(e) => e,
        };

        region_event!(warn, primary, operation, "Primary region failed: {}", primary_err);

        let fallback = self
            .topology
            .fallback_of(primary)
            .ok_or(RegionalError::NoFallbackConfigured { region: primary })?;
        let fallback_breaker = self.breaker(fallback)?;

        region_event!(
            info,
            fallback,
            operation,
            "Executing in fallback region (primary {} unavailable)",
            primary
        );
        let fallback_result = fallback_breaker
            .execute(|| {
                routing::with_region(fallback, self.run_in_fallback(primary, fallback, operation, &work))
            })
            .await;

        let fallback_err = match fallback_result {
            Ok((value, source)) => {
                return Ok(RegionalResponse {
                    value,
                    source,
                    served_by: Some(fallback),
                })
            }
            Err(e) => e,
        };

        region_event!(error, fallback, operation, "Fallback region also failed: {}", fallback_err);

        if let Some(value) = self.cache.get::<T>(primary, operation).await {
            region_event!(
                warn,
                primary,
                operation,
                "Returning stale cached order data due to regional failures"
            );
            return Ok(RegionalResponse {
                value,
                source: ResponseSource::StaleCache,
                served_by: None,
            });
        }

        Err(RegionalError::AllRegionsUnavailable {
            operation: operation.to_string(),
            source: Box::new(fallback_err),
        })
    }

    // Runs under the fallback breaker, so a cache hit counts as a success there
    async fn run_in_fallback<T, E, F, Fut>(
        &self,
        primary: Region,
        fallback: Region,
        operation: &str,
        work: &F,
    ) -> Result<(T, ResponseSource)>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Region) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        if let Some(cached) = self.cache.get::<T>(primary, operation).await {
            region_event!(debug, fallback, operation, "Returning cached result from fallback region");
            return Ok((cached, ResponseSource::FallbackCache));
        }

        let value = run_work(fallback, work).await?;

        match serde_json::to_vec(&value) {
            Ok(payload) => {
                self.cache
                    .put_encoded(primary, operation, payload.clone(), self.cache_ttl)
                    .await;
                self.replication
                    .schedule(primary, fallback, operation, payload);
            }
            Err(e) => {
                warn!(
                    primary = %primary,
                    operation,
                    "Result not cached or replicated; serialization failed: {}",
                    e
                );
            }
        }

        Ok((value, ResponseSource::Fallback))
    }
}

async fn run_work<T, E, F, Fut>(region: Region, work: &F) -> Result<T>
where
    F: Fn(Region) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<BoxError>,
{
    work(region)
        .await
        .map_err(|e| RegionalError::upstream(region, e))
}
