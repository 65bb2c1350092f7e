//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events. Applications that want them
//! printed call [`init`] once at startup with the `[logging]` section of
//! their config. `RUST_LOG`, when set, takes precedence over the configured
//! level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Install a global subscriber.
///
/// Returns `false` if a subscriber was already installed, which is harmless
/// when tests call this repeatedly.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.is_ok()
}
