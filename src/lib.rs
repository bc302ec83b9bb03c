// library entry
pub mod config;
pub mod error;
pub mod logging;
pub mod region;
pub mod resilience;
pub mod routing;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod tests;

// Re-export key components for convenience
pub use config::RegionalConfig;
pub use error::{RegionalError, Result};
pub use logging::init as init_logging;
pub use region::Region;
pub use resilience::{HealthMonitor, RegionalExecutor, RegionalResponse, ResponseSource};
pub use storage::DurableStore;
