//! Process-wide structured logging (§6.5): one `tracing_subscriber::fmt`
//! layer with `EnvFilter` read from `BEEHIVE_LOG` (default `info`).

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Call once, at process start.
pub fn init() {
    let filter = EnvFilter::try_from_env("BEEHIVE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
