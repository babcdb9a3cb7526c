//! Structured logging helpers
//!
//! Initializes the tracing subscriber from the environment and provides
//! timing helpers used around backend and provider calls.

use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// The filter is taken from `RUST_LOG` when set, otherwise from the supplied
/// default level. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Await a future and log its wall-clock duration at debug level
pub async fn timed<F, T>(name: &str, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = future.await;
    debug!("{} completed in {:?}", name, start.elapsed());
    result
}
