//! Logging system initialization
//!
//! Console logging through `tracing` with an `EnvFilter`. `RUST_LOG`
//! overrides the configured default level.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `default_level` is used when `RUST_LOG` is not set, e.g. `"info"` or
/// `"seller_scout=debug,info"`.
pub fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}
