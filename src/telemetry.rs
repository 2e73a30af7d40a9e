use tracing_subscriber::EnvFilter;

use crate::config::log_level;

/// Installs a process-wide `tracing` subscriber honoring `LOG_LEVEL`. A
/// second call (e.g. from a test harness that also runs `main`) is a no-op
/// rather than a panic.
pub fn init() {
    let filter = EnvFilter::try_new(log_level()).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
