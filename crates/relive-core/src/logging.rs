//! Subscriber setup for hosts that have none of their own

use tracing_subscriber::EnvFilter;

/// Environment variable read before `RUST_LOG`
pub const LOG_ENV: &str = "RELIVE_LOG";

/// Install a fmt subscriber filtered by `RELIVE_LOG`, then `RUST_LOG`,
/// defaulting to `info`.
///
/// Returns `false` if a global subscriber was already set; calling it twice
/// is harmless.
pub fn init() -> bool {
    init_with_default("info")
}

/// Like [`init`] with a custom fallback directive
pub fn init_with_default(default: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default))
        .with_target(false)
        .try_init()
        .is_ok()
}

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default))
}
