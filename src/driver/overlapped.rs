//! Blocking, timed waits built on the driver's overlapped wait requests.
//!
//! Every initiated wait is drained through its completion signal before the
//! signal is released, including after a timeout. A wait that is cancelled
//! but not drained can complete later into freed storage, or hand a stale
//! completion to the next wait on the same handle.

use super::types::{DeviceHandle, DriverStatus, Events, GpioDesc, Timeout, WaitStart};
use super::{Completion, DeviceApi};
use thiserror::Error;
use tracing::{debug, trace};

/// Failure of a timed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The deadline passed before the condition was met.
    #[error("wait timed out")]
    TimedOut,

    /// The driver rejected the wait or the completion signal could not be
    /// created.
    #[error("wait failed: {0}")]
    Driver(#[from] DriverStatus),
}

impl WaitError {
    /// Status code equivalent of this error.
    pub fn status(self) -> DriverStatus {
        match self {
            Self::TimedOut => DriverStatus::WAIT_TIMEOUT,
            Self::Driver(status) => status,
        }
    }
}

/// Wait for any event in `mask`, giving up after `timeout`.
///
/// On success returns the events that satisfied the wait.
pub fn wait_event_timed<D>(
    device: &D,
    handle: DeviceHandle,
    mask: Events,
    timeout: Timeout,
) -> Result<Events, WaitError>
where
    D: DeviceApi + ?Sized,
{
    let completion = run_timed(
        device,
        timeout,
        |c| device.wait_event(handle, mask, c),
        || device.cancel_wait_event(handle),
    )?;
    Ok(completion.events())
}

/// Wait for the GPIO bits selected by `desired.smask` to match
/// `desired.state`, giving up after `timeout`.
///
/// On success returns the GPIO state that completed the wait.
pub fn wait_gpio_timed<D>(
    device: &D,
    handle: DeviceHandle,
    desired: &GpioDesc,
    timeout: Timeout,
) -> Result<GpioDesc, WaitError>
where
    D: DeviceApi + ?Sized,
{
    let completion = run_timed(
        device,
        timeout,
        |c| device.wait_gpio(handle, desired, c),
        || device.cancel_wait_gpio(handle),
    )?;
    Ok(completion.gpio())
}

fn run_timed<D, I, C>(
    device: &D,
    timeout: Timeout,
    initiate: I,
    cancel: C,
) -> Result<D::Completion, WaitError>
where
    D: DeviceApi + ?Sized,
    I: FnOnce(&D::Completion) -> WaitStart,
    C: FnOnce() -> Result<(), DriverStatus>,
{
    let completion = device.create_completion().map_err(|status| {
        debug!(%status, "completion signal allocation failed");
        WaitError::Driver(DriverStatus::GEN_FAILURE)
    })?;

    match initiate(&completion) {
        WaitStart::Ready => {
            trace!("wait satisfied immediately");
            Ok(completion)
        }
        WaitStart::Failed(status) => {
            debug!(%status, "wait request rejected");
            Err(WaitError::Driver(status))
        }
        WaitStart::Pending => {
            if completion.wait(timeout) {
                return Ok(completion);
            }
            debug!(?timeout, "wait timed out, cancelling");
            if let Err(status) = cancel() {
                debug!(%status, "cancel after timeout failed");
            }
            // cancellation always completes the request
            completion.wait(Timeout::Forever);
            Err(WaitError::TimedOut)
        }
    }
}
