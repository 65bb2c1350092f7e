//! Configuration module for synclink.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `MGSL_CONFIG` environment variable (explicit path)
//! 2. `./synclink.toml` (current directory)
//! 3. `~/.config/synclink/synclink.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\synclink\synclink.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `MGSL_LOG_LEVEL`: logging filter directive
//! - `MGSL_LOG_FORMAT`: `json`, `pretty` or `compact`
//! - `MGSL_WAIT_TIMEOUT_MS`: default event wait timeout
//!
//! # Example
//!
//! ```toml
//! [session]
//! wait_timeout_ms = 500
//!
//! [ports.uplink]
//! port = "MGHDLC1"
//!
//! [ports.uplink.settings]
//! protocol = "hdlc"
//! encoding = "nrzi"
//! crc = "crc32"
//! transmit_clock = "brg"
//! receive_clock = "dpll"
//! internal_clock_rate = 64000
//!
//! [ports.uplink.defaults]
//! interface = "v35"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, PortProfile, SessionConfig};
