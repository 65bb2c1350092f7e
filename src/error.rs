//! Crate-level error type.
//!
//! Each layer has its own error enum. [`Error`] unifies them for
//! applications that load a config, open profiles and drive sessions from
//! one function.

use crate::config::ConfigError;
use crate::driver::DriverStatus;
use crate::port::PortError;
use crate::settings::SettingsError;
use thiserror::Error;

/// Unified error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Driver(#[from] DriverStatus),

    /// A named port profile is missing from the configuration.
    #[error("No port profile named '{0}'")]
    UnknownProfile(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
