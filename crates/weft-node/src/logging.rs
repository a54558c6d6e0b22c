//! Tracing subscriber configuration.
//!
//! Level conventions across the stack:
//! - ERROR: unrecoverable failures
//! - WARN: recoverable errors, sends that will be retried
//! - INFO: high-level lifecycle (node up, media bound)
//! - DEBUG: neighbor/route/socket state changes
//! - TRACE: per-frame decisions, dropped frames, timer churn

use tracing_subscriber::EnvFilter;

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize the tracing subscriber with plain-text output.
///
/// `RUST_LOG` overrides `default_level`.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize the tracing subscriber with JSON output, for containerized
/// deployments.
pub fn init_json(default_level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize for tests: captured writer, safe to call repeatedly.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}
