// crates/server/src/logging.rs
//! Tracing subscriber setup for hosts embedding the export server.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` applies
/// (e.g. `"warn"` or `"curation_export_jobs=info"`).
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
