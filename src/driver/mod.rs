//! Raw control interface to the SyncLink driver.
//!
//! [`DeviceApi`] exposes every primitive device request as one independent
//! call against a [`DeviceHandle`]. Implementations perform exactly one
//! underlying request per call, with no retry and no interpretation of the
//! result beyond turning a nonzero status into [`DriverStatus`].
//!
//! Two implementations ship with the crate:
//!
//! - [`SimulatedDevice`]: an in-memory driver used by tests and demos
//! - `MghdlcDevice`: the Windows backend over `mghdlc.dll` (feature `mghdlc`)
//!
//! Callers should not drive a `DeviceApi` directly; go through
//! [`crate::port::PortSession`] so the stuck-mode workaround and wait
//! draining rules are honoured.

pub mod mock;
pub mod overlapped;
pub mod types;

#[cfg(all(windows, feature = "mghdlc"))]
pub mod mghdlc;

pub use mock::{Call, SimCompletion, SimulatedDevice};
pub use overlapped::{wait_event_timed, wait_gpio_timed, WaitError};
pub use types::*;

#[cfg(all(windows, feature = "mghdlc"))]
pub use mghdlc::MghdlcDevice;

/// Completion signal for one overlapped wait.
///
/// The signal is auto-resetting and starts unsignaled. It also owns the
/// storage the driver fills in when the wait completes, so it must outlive
/// the wait it was handed to. Dropping it releases the underlying object.
pub trait Completion: Send {
    /// Block until signaled or until `timeout` elapses.
    ///
    /// Returns `true` when the signal fired.
    fn wait(&self, timeout: Timeout) -> bool;

    /// Events reported by a completed event wait.
    fn events(&self) -> Events;

    /// GPIO state reported by a completed GPIO wait.
    fn gpio(&self) -> GpioDesc;
}

/// Primitive device requests.
///
/// All methods take `&self` so one thread may cancel what another thread is
/// blocked on.
pub trait DeviceApi: Send + Sync + std::fmt::Debug {
    /// Completion signal type used by the overlapped waits.
    type Completion: Completion;

    /// Open a port by numeric port id.
    fn open(&self, port_id: u32) -> DriverResult<DeviceHandle>;

    /// Open a port by name (e.g. `MGHDLC1`).
    fn open_by_name(&self, name: &str) -> DriverResult<DeviceHandle>;

    /// Close a handle. On success the handle is set to [`DeviceHandle::INVALID`].
    fn close(&self, handle: &mut DeviceHandle) -> DriverResult<()>;

    fn get_params(&self, handle: DeviceHandle) -> DriverResult<RawParams>;

    fn set_params(&self, handle: DeviceHandle, params: &RawParams) -> DriverResult<()>;

    fn get_option(&self, handle: DeviceHandle, option: DriverOption) -> DriverResult<u32>;

    fn set_option(&self, handle: DeviceHandle, option: DriverOption, value: u32)
        -> DriverResult<()>;

    /// Read the persistent configuration of a port.
    fn get_port_config(&self, port_id: u32) -> DriverResult<PortConfigEx>;

    /// Write the persistent configuration of a port.
    fn set_port_config(&self, port_id: u32, config: &PortConfigEx) -> DriverResult<()>;

    fn get_signals(&self, handle: DeviceHandle) -> DriverResult<Signals>;

    fn set_signals(&self, handle: DeviceHandle, signals: Signals) -> DriverResult<()>;

    /// Allocate a completion signal for one wait.
    fn create_completion(&self) -> DriverResult<Self::Completion>;

    /// Initiate a wait for any event in `mask`. Never blocks.
    fn wait_event(
        &self,
        handle: DeviceHandle,
        mask: Events,
        completion: &Self::Completion,
    ) -> WaitStart;

    fn cancel_wait_event(&self, handle: DeviceHandle) -> DriverResult<()>;

    fn get_gpio(&self, handle: DeviceHandle) -> DriverResult<GpioDesc>;

    fn set_gpio(&self, handle: DeviceHandle, gpio: &GpioDesc) -> DriverResult<()>;

    /// Initiate a wait for the GPIO bits selected by `desired.smask` to reach
    /// `desired.state`. Never blocks.
    fn wait_gpio(
        &self,
        handle: DeviceHandle,
        desired: &GpioDesc,
        completion: &Self::Completion,
    ) -> WaitStart;

    fn cancel_wait_gpio(&self, handle: DeviceHandle) -> DriverResult<()>;

    fn cancel_transmit(&self, handle: DeviceHandle) -> DriverResult<()>;

    fn cancel_receive(&self, handle: DeviceHandle) -> DriverResult<()>;

    fn enable_transmitter(&self, handle: DeviceHandle, enable: bool) -> DriverResult<()>;

    fn enable_receiver(&self, handle: DeviceHandle, mode: ReceiverMode) -> DriverResult<()>;

    /// Set the transmit idle mode, one of the `TXIDLE_*` codes.
    fn set_idle_mode(&self, handle: DeviceHandle, mode: u32) -> DriverResult<()>;

    /// Queue bytes for transmission, returning how many were accepted.
    fn write(&self, handle: DeviceHandle, data: &[u8]) -> DriverResult<usize>;

    /// Block until all queued transmit data has been sent.
    fn wait_all_sent(&self, handle: DeviceHandle) -> DriverResult<()>;

    /// Read received data. Returns 0 when nothing is available or the read
    /// was cancelled.
    fn read(&self, handle: DeviceHandle, buf: &mut [u8]) -> DriverResult<usize>;

    /// Read received data along with its completion status.
    fn read_with_status(
        &self,
        handle: DeviceHandle,
        buf: &mut [u8],
    ) -> DriverResult<(usize, RxStatus)>;

    fn get_assigned_resources(&self, handle: DeviceHandle) -> DriverResult<AssignedResources>;

    /// List configured ports, present or not.
    fn enumerate_ports(&self) -> DriverResult<Vec<PortInfo>>;
}
