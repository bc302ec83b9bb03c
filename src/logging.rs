use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Ensure initialization happens only once
static INIT: Once = Once::new();

/// Initialize the logging system with sensible defaults.
///
/// Log level can be set using the RUST_LOG environment variable.
/// Example: RUST_LOG=debug,regional_fallback=trace
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true) // breakers are shared across worker threads
                    .with_line_number(true),
            )
            .init();

        tracing::info!("Logging initialized");
    });
}

/// Macro for logging a routing decision for one regional call
#[macro_export]
macro_rules! region_event {
    ($level:ident, $region:expr, $operation:expr, $($arg:tt)+) => {
        tracing::$level!(
            region = %$region,
            operation = %$operation,
            $($arg)+
        )
    };
}

/// Macro for logging cache tier operations
#[macro_export]
macro_rules! cache_op {
    ($operation:expr, $key:expr, $hit:expr) => {
        tracing::debug!(
            operation = $operation,
            key = $key,
            hit = $hit,
            "Cross-region cache operation"
        )
    };
}
