// for error definitions
use redis;
use thiserror::Error;

use crate::region::Region;

/// Boxed error produced by a caller-supplied unit of work
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum RegionalError {
    /// The region's breaker is open; no work was attempted
    #[error("Circuit breaker for region {region} is open")]
    CircuitOpen { region: Region },

    /// The topology has no fallback for this region
    #[error("No fallback region configured for {region}")]
    NoFallbackConfigured { region: Region },

    /// The wrapped unit of work itself failed
    #[error("Upstream failure in region {region}")]
    Upstream {
        region: Region,
        #[source]
        source: BoxError,
    },

    /// Primary and fallback both failed and nothing was cached
    #[error("All regional services unavailable for {operation}")]
    AllRegionsUnavailable {
        operation: String,
        #[source]
        source: Box<RegionalError>,
    },

    /// Errors related to the durable store
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegionalError {
    /// Wrap an arbitrary unit-of-work failure
    pub fn upstream(region: Region, err: impl Into<BoxError>) -> Self {
        RegionalError::Upstream {
            region,
            source: err.into(),
        }
    }

    /// True for the errors `execute_with_fallback` hands back to callers
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegionalError::AllRegionsUnavailable { .. } | RegionalError::NoFallbackConfigured { .. }
        )
    }
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Redis connection errors
    #[error("Redis connection error: {0}")]
    RedisConnection(String),

    // Redis authentication errors
    #[error("Redis authentication error: {0}")]
    RedisAuth(String),

    /// Redis command errors
    #[error("Redis command error: {0}")]
    RedisCommand(String),

    /// In-process store refused the write
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Data serialization/deserialization errors
    #[error("Data serialization error: {0}")]
    Serialization(String),
}

// Classify redis errors into storage errors
impl From<redis::RedisError> for RegionalError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::AuthenticationFailed => {
                // authentication errors
                RegionalError::Storage(StorageError::RedisAuth(err.to_string()))
            }
            redis::ErrorKind::IoError | redis::ErrorKind::ClientError => {
                // Connection-related errors
                RegionalError::Storage(StorageError::RedisConnection(err.to_string()))
            }
            _ => {
                // Command/operation related errors
                RegionalError::Storage(StorageError::RedisCommand(err.to_string()))
            }
        }
    }
}

// implement conversions from serde_json::Error to RegionalError
impl From<serde_json::Error> for RegionalError {
    fn from(err: serde_json::Error) -> Self {
        RegionalError::Storage(StorageError::Serialization(err.to_string()))
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, RegionalError>;
