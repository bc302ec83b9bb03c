// src/config/mod.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RegionalError, Result};
use crate::region::Region;

/// Top-level configuration for the regional resilience layer
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegionalConfig {
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub replication: ReplicationConfig,

    #[serde(default)]
    pub health: HealthConfig,

    /// Durable cache tier; in-memory storage is used when absent
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

/// Configuration for each region's circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,

    /// Consecutive half-open successes before the circuit closes
    #[serde(default = "default_success_threshold")]
    pub success_threshold: usize,

    /// How long an open circuit waits after the last failure before allowing a trial call
    #[serde(default = "default_open_timeout", with = "duration_serde")]
    pub open_timeout: Duration,
}

fn default_failure_threshold() -> usize {
    5
}

fn default_success_threshold() -> usize {
    3
}

fn default_open_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_timeout: default_open_timeout(),
        }
    }
}

/// Region-to-fallback table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_mapping")]
    pub mapping: HashMap<Region, Region>,
}

fn default_mapping() -> HashMap<Region, Region> {
    HashMap::from([
        (Region::Us, Region::Eu),
        (Region::Eu, Region::Asia),
        (Region::Asia, Region::Us),
    ])
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            mapping: default_mapping(),
        }
    }
}

/// Configuration for the cross-region cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Key prefix to use for all keys in storage
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Lifetime of entries in the durable tier
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// Settings for the in-memory durable store used when Redis isn't configured
    #[serde(default)]
    pub memory: InMemoryConfig,
}

fn default_key_prefix() -> String {
    "order".to_string()
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            ttl: default_cache_ttl(),
            memory: InMemoryConfig::default(),
        }
    }
}

/// Configuration for deferred replication back to a primary region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Delay before re-checking the primary region
    #[serde(default = "default_replication_delay", with = "duration_serde")]
    pub delay: Duration,
}

fn default_replication_delay() -> Duration {
    Duration::from_secs(5)
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            delay: default_replication_delay(),
        }
    }
}

/// Configuration for the health monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Drive health snapshots from breaker state (off by default)
    #[serde(default)]
    pub sync_with_breakers: bool,

    /// Polling interval when `sync_with_breakers` is set
    #[serde(default = "default_sync_interval", with = "duration_serde")]
    pub sync_interval: Duration,
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            sync_with_breakers: false,
            sync_interval: default_sync_interval(),
        }
    }
}

/// Configuration for Redis storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Connection timeout
    #[serde(default = "default_conn_timeout", with = "duration_serde")]
    pub connection_timeout: Duration,
}

fn default_conn_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Configuration for in-memory storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryConfig {
    /// Maximum number of entries to store
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Whether to use a background task for expiration
    #[serde(default = "default_use_background_task")]
    pub use_background_task: bool,

    /// How often to run the background expiration task
    #[serde(default = "default_cleanup_interval", with = "duration_serde")]
    pub cleanup_interval: Duration,
}

fn default_max_entries() -> usize {
    10_000
}

fn default_use_background_task() -> bool {
    true
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            use_background_task: default_use_background_task(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl RegionalConfig {
    /// Build the configuration from defaults plus `REGIONAL_*` environment overrides.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_override::<usize>("REGIONAL_FAILURE_THRESHOLD")? {
            self.circuit_breaker.failure_threshold = v;
        }
        if let Some(v) = env_override::<usize>("REGIONAL_SUCCESS_THRESHOLD")? {
            self.circuit_breaker.success_threshold = v;
        }
        if let Some(ms) = env_override::<u64>("REGIONAL_OPEN_TIMEOUT_MS")? {
            self.circuit_breaker.open_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_override::<u64>("REGIONAL_CACHE_TTL_MS")? {
            self.cache.ttl = Duration::from_millis(ms);
        }
        if let Some(prefix) = env_override::<String>("REGIONAL_CACHE_KEY_PREFIX")? {
            self.cache.key_prefix = prefix;
        }
        if let Some(ms) = env_override::<u64>("REGIONAL_REPLICATION_DELAY_MS")? {
            self.replication.delay = Duration::from_millis(ms);
        }
        if let Some(raw) = env_override::<String>("REGIONAL_FALLBACK_MAPPING")? {
            self.fallback.mapping = parse_mapping(&raw)?;
        }
        if let Some(url) = env_override::<String>("REGIONAL_REDIS_URL")? {
            self.redis = Some(RedisConfig {
                url,
                connection_timeout: default_conn_timeout(),
            });
        }
        if let Some(sync) = env_override::<bool>("REGIONAL_HEALTH_SYNC")? {
            self.health.sync_with_breakers = sync;
        }
        Ok(())
    }

    /// Reject settings that would make a breaker unusable
    pub fn validate(&self) -> Result<()> {
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(RegionalError::Config(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker.success_threshold == 0 {
            return Err(RegionalError::Config(
                "success_threshold must be at least 1".to_string(),
            ));
        }
        // tokio intervals panic on a zero period
        if self.health.sync_with_breakers && self.health.sync_interval.is_zero() {
            return Err(RegionalError::Config(
                "health.sync_interval must be non-zero when syncing with breakers".to_string(),
            ));
        }
        if self.cache.memory.use_background_task && self.cache.memory.cleanup_interval.is_zero() {
            return Err(RegionalError::Config(
                "cache.memory.cleanup_interval must be non-zero when cleanup is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_override<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RegionalError::Config(format!("Invalid value for {}: {}", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Parse a mapping such as `us=eu,eu=asia,asia=us`
pub fn parse_mapping(raw: &str) -> Result<HashMap<Region, Region>> {
    let mut mapping = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (from, to) = pair.split_once('=').ok_or_else(|| {
            RegionalError::Config(format!("Invalid fallback mapping entry: {}", pair))
        })?;
        mapping.insert(from.parse::<Region>()?, to.parse::<Region>()?);
    }
    Ok(mapping)
}

// Helper module to serialize/deserialize Duration with serde
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
