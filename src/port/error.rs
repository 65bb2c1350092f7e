//! Port session error types.
//!
//! Open failures are folded into three coarse categories (not found,
//! busy, driver). Every other driver failure passes through unchanged as
//! [`PortError::Driver`].

use crate::driver::{DriverStatus, Signals, WaitError};
use crate::settings::SettingsError;
use thiserror::Error;

/// Errors that can occur during port session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// No device backs the requested port name.
    #[error("SyncLink port not found: {0}")]
    NotFound(String),

    /// The device exists but could not be acquired.
    #[error("SyncLink port {name} is busy or access was denied ({status})")]
    Busy { name: String, status: DriverStatus },

    /// Any other nonzero driver status.
    #[error("Driver error: {0}")]
    Driver(DriverStatus),

    /// A wait expired before the requested condition occurred.
    #[error("Wait timed out")]
    Timeout,

    /// Attempted to use a session that is not open.
    #[error("Port is not open")]
    NotOpen,

    /// Attempted to drive an input-only serial signal.
    #[error("Signals {0} are read-only")]
    ReadOnlySignal(Signals),

    /// Requested read size is outside 1..=max_data_size.
    #[error("Read size {size} outside 1..={max}")]
    InvalidReadSize { size: usize, max: usize },

    /// Settings could not be encoded, decoded or validated.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Classify a failed open by its driver status.
    pub fn from_open_status(name: impl Into<String>, status: DriverStatus) -> Self {
        match status {
            DriverStatus::BAD_DEVICE => Self::not_found(name),
            DriverStatus::ACCESS_DENIED
            | DriverStatus::DEVICE_IN_USE
            | DriverStatus::OPEN_FAILED => Self::Busy {
                name: name.into(),
                status,
            },
            other => Self::Driver(other),
        }
    }

    /// Driver status carried by this error, if any.
    pub fn status(&self) -> Option<DriverStatus> {
        match self {
            Self::Busy { status, .. } => Some(*status),
            Self::Driver(status) => Some(*status),
            Self::Timeout => Some(DriverStatus::WAIT_TIMEOUT),
            _ => None,
        }
    }
}

impl From<DriverStatus> for PortError {
    fn from(status: DriverStatus) -> Self {
        Self::Driver(status)
    }
}

impl From<WaitError> for PortError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::TimedOut => Self::Timeout,
            WaitError::Driver(status) => Self::Driver(status),
        }
    }
}

/// Result type for port session operations.
pub type PortResult<T> = Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("MGHDLC9");
        assert_eq!(err.to_string(), "SyncLink port not found: MGHDLC9");

        let err = PortError::Driver(DriverStatus::GEN_FAILURE);
        assert_eq!(err.to_string(), "Driver error: ERROR_GEN_FAILURE (31)");

        let err = PortError::ReadOnlySignal(Signals::DSR | Signals::CTS);
        assert_eq!(err.to_string(), "Signals (0x50) CTS DSR are read-only");
    }

    #[test]
    fn test_open_status_mapping() {
        assert_eq!(
            PortError::from_open_status("P", DriverStatus::BAD_DEVICE),
            PortError::NotFound("P".into())
        );
        for status in [
            DriverStatus::ACCESS_DENIED,
            DriverStatus::DEVICE_IN_USE,
            DriverStatus::OPEN_FAILED,
        ] {
            assert!(matches!(
                PortError::from_open_status("P", status),
                PortError::Busy { status: s, .. } if s == status
            ));
        }
        assert_eq!(
            PortError::from_open_status("P", DriverStatus::NOT_READY),
            PortError::Driver(DriverStatus::NOT_READY)
        );
    }

    #[test]
    fn test_wait_error_conversion() {
        assert_eq!(PortError::from(WaitError::TimedOut), PortError::Timeout);
        assert_eq!(PortError::Timeout.status(), Some(DriverStatus::WAIT_TIMEOUT));
        assert_eq!(
            PortError::from(WaitError::Driver(DriverStatus::BUSY)),
            PortError::Driver(DriverStatus::BUSY)
        );
    }
}
