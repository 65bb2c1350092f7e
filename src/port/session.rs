//! Port session: the stateful owner of one open SyncLink port.
//!
//! A [`PortSession`] is meant to be shared between threads. A typical
//! layout has one thread reading or waiting, one writing, and a control
//! thread issuing signal, GPIO and settings calls. Blocking I/O never
//! holds the session lock, so any thread can cancel what another thread
//! is blocked on.
//!
//! Settings changes and [`close`](PortSession::close) run the stuck-mode
//! workaround, which briefly flips the port into polled raw mode. Quiesce
//! reads and writes before calling them.

use super::error::{PortError, PortResult};
use crate::config::SessionConfig;
use crate::driver::{
    wait_event_timed, AssignedResources, DeviceApi, DeviceHandle, DriverOption, Events,
    RawParams, ReceiverMode, RxStatus, Timeout, INTERFACE_MASK, MODE_RAW,
};
use crate::settings::{
    decode_defaults, decode_params, decode_params_lenient, decode_tdm_options, encode_defaults,
    encode_params, encode_tdm_options, Defaults, IdlePattern, Interface, Settings,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Size of the throwaway read performed by the stuck-mode workaround.
const FLUSH_READ_SIZE: usize = 256;

/// Mutable session state, guarded by the session lock.
#[derive(Debug)]
pub(super) struct SessionState {
    pub(super) handle: Option<DeviceHandle>,
    settings: Settings,
    defaults: Defaults,
    tx_idle: IdlePattern,
    blocked_io: bool,
}

impl SessionState {
    fn max_read_size(&self) -> usize {
        self.defaults.max_data_size as usize
    }

    /// One full frame for frame-oriented protocols, one byte otherwise.
    fn default_read_size(&self) -> usize {
        if self.settings.protocol.is_frame_oriented() {
            self.max_read_size()
        } else {
            1
        }
    }

    fn resolve_read_size(&self, size: Option<usize>) -> PortResult<usize> {
        let default = self.default_read_size();
        let max = self.max_read_size();
        match size {
            None => Ok(default),
            Some(_) if default == max => Ok(default),
            Some(size) if (1..=max).contains(&size) => Ok(size),
            Some(size) => Err(PortError::InvalidReadSize { size, max }),
        }
    }
}

/// An owned, thread-shareable session on one SyncLink port.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use synclink::driver::SimulatedDevice;
/// use synclink::port::PortSession;
/// use synclink::settings::{Parity, Protocol, Settings};
///
/// let device = Arc::new(SimulatedDevice::new());
/// device.add_port("MGHDLC1");
///
/// let port = PortSession::new(device, "MGHDLC1");
/// port.open()?;
/// port.apply_settings(&Settings {
///     protocol: Protocol::Async,
///     async_data_rate: 4800,
///     async_parity: Parity::Even,
///     ..Settings::default()
/// })?;
/// assert_eq!(port.default_read_size(), 1);
/// # Ok::<(), synclink::port::PortError>(())
/// ```
pub struct PortSession<D: DeviceApi> {
    pub(super) device: Arc<D>,
    name: String,
    port_id: Option<u32>,
    options: SessionConfig,
    pub(super) state: Mutex<SessionState>,
}

impl<D: DeviceApi> PortSession<D> {
    /// Create a closed session for the port called `name`.
    pub fn new(device: Arc<D>, name: impl Into<String>) -> Self {
        Self::with_config(device, name, &SessionConfig::default())
    }

    /// Create a closed session using the I/O options from `config`.
    ///
    /// The numeric port id is resolved once, here. Ports that are not
    /// currently enumerable have no addressable defaults.
    pub fn with_config(device: Arc<D>, name: impl Into<String>, config: &SessionConfig) -> Self {
        let name = name.into();
        let port_id = match device.enumerate_ports() {
            Ok(ports) => ports
                .into_iter()
                .find(|p| p.name.eq_ignore_ascii_case(&name))
                .map(|p| p.port_id),
            Err(status) => {
                debug!(port = %name, %status, "port enumeration failed");
                None
            }
        };
        if port_id.is_none() {
            debug!(port = %name, "port id unresolved, defaults unavailable");
        }

        Self {
            device,
            name,
            port_id,
            options: config.clone(),
            state: Mutex::new(SessionState {
                handle: None,
                settings: Settings::default(),
                defaults: Defaults::default(),
                tx_idle: IdlePattern::default(),
                blocked_io: config.blocked_io,
            }),
        }
    }

    /// Port name this session was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric port id, if the port was enumerable at construction.
    pub fn port_id(&self) -> Option<u32> {
        self.port_id
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    /// Handle of the open port, copied out so the lock is not held across
    /// blocking driver calls.
    pub(super) fn handle(&self) -> PortResult<DeviceHandle> {
        self.state.lock().handle.ok_or(PortError::NotOpen)
    }

    // ========== Lifecycle ==========

    /// Open the port. Does nothing if the session is already open.
    ///
    /// On success the local settings and defaults snapshots are refreshed
    /// from the device, blocking I/O and read-error masking are configured
    /// from the session config, and the stuck-mode workaround runs once.
    ///
    /// # Errors
    /// - [`PortError::NotFound`] when no device backs the name
    /// - [`PortError::Busy`] when the device is in use or access is denied
    /// - [`PortError::Driver`] for any other failure
    pub fn open(&self) -> PortResult<()> {
        let mut state = self.state.lock();
        if state.handle.is_some() {
            return Ok(());
        }

        let mut handle = self.device.open_by_name(&self.name).map_err(|status| {
            warn!(port = %self.name, %status, "open failed");
            PortError::from_open_status(&self.name, status)
        })?;
        state.handle = Some(handle);

        if let Err(err) = self.init_open(&mut state, handle) {
            state.handle = None;
            if let Err(status) = self.device.close(&mut handle) {
                warn!(port = %self.name, %status, "close after failed open");
            }
            return Err(err);
        }

        info!(port = %self.name, settings = %state.settings, "port opened");
        Ok(())
    }

    fn init_open(&self, state: &mut SessionState, handle: DeviceHandle) -> PortResult<()> {
        if let Some(defaults) = self.fetch_defaults()? {
            state.defaults = defaults;
        }
        self.sync_settings(state, handle)?;
        self.push_blocked_io(state, handle, self.options.blocked_io)?;
        self.device.set_option(
            handle,
            DriverOption::RxErrorMask,
            u32::from(self.options.ignore_read_errors),
        )?;
        self.reset_pio(state, handle)
    }

    /// Close the port. Does nothing if the session is already closed.
    ///
    /// The session is closed afterwards even when this returns an error.
    pub fn close(&self) -> PortResult<()> {
        let mut state = self.state.lock();
        let Some(mut handle) = state.handle.take() else {
            return Ok(());
        };

        if let Err(err) = self.reset_pio(&mut state, handle) {
            warn!(port = %self.name, error = %err, "stuck-mode workaround failed on close");
        }
        let result = self.device.close(&mut handle).map_err(PortError::from);
        match &result {
            Ok(()) => info!(port = %self.name, "port closed"),
            Err(err) => warn!(port = %self.name, error = %err, "close failed, handle dropped"),
        }
        result
    }

    /// Work around a driver defect that leaves byte-oriented polled I/O
    /// engaged after a protocol switch.
    ///
    /// Saves the parameters and I/O mode, forces raw polled mode, drains up
    /// to 256 bytes, then restores both. Errors from the drain are ignored.
    /// Once raw mode is set the restore always runs; the first error is
    /// returned afterwards.
    fn reset_pio(&self, state: &mut SessionState, handle: DeviceHandle) -> PortResult<()> {
        let saved = self.device.get_params(handle)?;
        let blocked_io = state.blocked_io;

        let raw = RawParams {
            mode: MODE_RAW,
            ..RawParams::default()
        };
        self.device.set_params(handle, &raw)?;

        // a half-applied poll switch may leave receive blocking, so only
        // drain when both directions are polled
        let drained = self.push_blocked_io(state, handle, false).map(|()| {
            let mut scratch = [0u8; FLUSH_READ_SIZE];
            match self.device.read(handle, &mut scratch) {
                Ok(n) => trace!(port = %self.name, discarded = n, "workaround read"),
                Err(status) => trace!(port = %self.name, %status, "workaround read failed"),
            }
        });

        let restored_io = self.push_blocked_io(state, handle, blocked_io);
        let restored_params = self.device.set_params(handle, &saved).map_err(PortError::from);

        let result = drained.and(restored_io).and(restored_params);
        match &result {
            Ok(()) => debug!(port = %self.name, "stuck-mode workaround done"),
            Err(err) => warn!(port = %self.name, error = %err, "stuck-mode workaround incomplete"),
        }
        result
    }

    /// Run the stuck-mode workaround now.
    ///
    /// [`apply_settings`](Self::apply_settings) and [`close`](Self::close)
    /// already do this. Leaves parameters and I/O mode as they were, but
    /// discards up to 256 bytes of pending receive data.
    pub fn reset_io_mode(&self) -> PortResult<()> {
        let mut state = self.state.lock();
        let handle = state.handle.ok_or(PortError::NotOpen)?;
        self.reset_pio(&mut state, handle)
    }

    fn push_blocked_io(
        &self,
        state: &mut SessionState,
        handle: DeviceHandle,
        blocked: bool,
    ) -> PortResult<()> {
        let polled = u32::from(!blocked);
        self.device.set_option(handle, DriverOption::RxPoll, polled)?;
        self.device.set_option(handle, DriverOption::TxPoll, polled)?;
        state.blocked_io = blocked;
        Ok(())
    }

    /// Whether reads and writes block until data moves.
    pub fn blocked_io(&self) -> bool {
        self.state.lock().blocked_io
    }

    /// Switch between blocking and polled I/O.
    pub fn set_blocked_io(&self, blocked: bool) -> PortResult<()> {
        let mut state = self.state.lock();
        let handle = state.handle.ok_or(PortError::NotOpen)?;
        self.push_blocked_io(&mut state, handle, blocked)
    }

    // ========== Settings ==========

    /// Push `settings` to the device.
    ///
    /// Runs the stuck-mode workaround first. The TDM option word is always
    /// written; the idle pattern only for monosync and bisync. The internal
    /// clock divisor is chosen against the port's base clock.
    pub fn apply_settings(&self, settings: &Settings) -> PortResult<()> {
        let mut state = self.state.lock();
        let handle = state.handle.ok_or(PortError::NotOpen)?;
        settings.validate()?;

        self.reset_pio(&mut state, handle)?;

        if let Err(err) = self.push_settings(&mut state, handle, settings) {
            warn!(port = %self.name, error = %err, "settings push failed, resyncing");
            if let Err(sync_err) = self.sync_settings(&mut state, handle) {
                warn!(port = %self.name, error = %sync_err, "resync after failed push");
            }
            return Err(err);
        }
        state.settings = settings.clone();

        info!(port = %self.name, %settings, "settings applied");
        Ok(())
    }

    fn push_settings(
        &self,
        state: &mut SessionState,
        handle: DeviceHandle,
        settings: &Settings,
    ) -> PortResult<()> {
        self.device.set_option(
            handle,
            DriverOption::MsbFirst,
            u32::from(settings.msb_first),
        )?;
        self.device
            .set_option(handle, DriverOption::Tdm, encode_tdm_options(&settings.tdm))?;

        if settings.protocol.uses_sync_pattern() {
            let idle = IdlePattern::from_pattern(settings.sync_pattern);
            self.device.set_idle_mode(handle, idle.code())?;
            state.tx_idle = idle;
        }

        let base_clock = self.device.get_option(handle, DriverOption::ClockBaseFreq)?;
        let params = encode_params(settings, base_clock);
        Ok(self.device.set_params(handle, &params)?)
    }

    /// Read the current settings back from the device.
    pub fn get_settings(&self) -> PortResult<Settings> {
        let mut state = self.state.lock();
        let handle = state.handle.ok_or(PortError::NotOpen)?;
        self.fetch_settings(&mut state, handle)
    }

    fn fetch_settings(&self, state: &mut SessionState, handle: DeviceHandle) -> PortResult<Settings> {
        let params = self.device.get_params(handle)?;
        let settings = decode_params(&params)?;
        self.complete_settings(state, handle, settings)
    }

    /// Refresh the snapshot without failing on driver codes that have no
    /// named variant. Those fields keep their defaults.
    fn sync_settings(&self, state: &mut SessionState, handle: DeviceHandle) -> PortResult<()> {
        let params = self.device.get_params(handle)?;
        let (settings, unknown) = decode_params_lenient(&params);
        for err in &unknown {
            warn!(port = %self.name, error = %err, "unrecognised driver setting, using default");
        }
        self.complete_settings(state, handle, settings)?;
        Ok(())
    }

    fn complete_settings(
        &self,
        state: &mut SessionState,
        handle: DeviceHandle,
        mut settings: Settings,
    ) -> PortResult<Settings> {
        settings.tdm = decode_tdm_options(self.device.get_option(handle, DriverOption::Tdm)?);
        settings.msb_first = self.device.get_option(handle, DriverOption::MsbFirst)? != 0;
        if settings.protocol.uses_sync_pattern() {
            if let Some(pattern) = state.tx_idle.pattern() {
                settings.sync_pattern = pattern;
            }
        }
        state.settings = settings.clone();
        Ok(settings)
    }

    /// Last settings applied to or read from the device.
    pub fn settings(&self) -> Settings {
        self.state.lock().settings.clone()
    }

    /// Read the persistent defaults of the port.
    ///
    /// Returns `None` when the session is closed or the port id was not
    /// resolved.
    pub fn get_defaults(&self) -> PortResult<Option<Defaults>> {
        let mut state = self.state.lock();
        if state.handle.is_none() {
            return Ok(None);
        }
        let defaults = self.fetch_defaults()?;
        if let Some(defaults) = defaults {
            state.defaults = defaults;
        }
        Ok(defaults)
    }

    fn fetch_defaults(&self) -> PortResult<Option<Defaults>> {
        let Some(port_id) = self.port_id else {
            return Ok(None);
        };
        let config = self.device.get_port_config(port_id)?;
        Ok(Some(decode_defaults(&config)?))
    }

    /// Write the persistent defaults of the port.
    ///
    /// The driver picks them up the next time it loads. Returns `false`,
    /// writing nothing, when the session is closed or the port id was not
    /// resolved.
    pub fn set_defaults(&self, defaults: &Defaults) -> PortResult<bool> {
        let mut state = self.state.lock();
        let (Some(_), Some(port_id)) = (state.handle, self.port_id) else {
            return Ok(false);
        };
        let current = self.device.get_port_config(port_id)?;
        self.device
            .set_port_config(port_id, &encode_defaults(defaults, &current))?;
        state.defaults = *defaults;
        debug!(port = %self.name, ?defaults, "defaults written");
        Ok(true)
    }

    /// Last defaults read from or written to the device.
    pub fn defaults(&self) -> Defaults {
        self.state.lock().defaults
    }

    /// Bytes requested by [`read`](Self::read) when no size is given.
    pub fn default_read_size(&self) -> usize {
        self.state.lock().default_read_size()
    }

    // ========== Data transfer ==========

    /// Read received data.
    ///
    /// Frame-oriented protocols always read one full frame buffer. Other
    /// protocols read one byte unless `size` asks for more. An empty result
    /// means nothing arrived (polled mode) or the read was cancelled.
    pub fn read(&self, size: Option<usize>) -> PortResult<Vec<u8>> {
        let (handle, size) = self.read_target(size)?;
        let mut buf = vec![0u8; size];
        let n = self.device.read(handle, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Read received data along with its completion status.
    pub fn read_with_status(&self, size: Option<usize>) -> PortResult<(Vec<u8>, RxStatus)> {
        let (handle, size) = self.read_target(size)?;
        let mut buf = vec![0u8; size];
        let (n, status) = self.device.read_with_status(handle, &mut buf)?;
        buf.truncate(n);
        Ok((buf, status))
    }

    fn read_target(&self, size: Option<usize>) -> PortResult<(DeviceHandle, usize)> {
        let state = self.state.lock();
        let handle = state.handle.ok_or(PortError::NotOpen)?;
        Ok((handle, state.resolve_read_size(size)?))
    }

    /// Send `data`. Returns whether the driver accepted all of it.
    pub fn write(&self, data: &[u8]) -> PortResult<bool> {
        let handle = self.handle()?;
        let accepted = self.device.write(handle, data)?;
        if accepted != data.len() {
            debug!(port = %self.name, accepted, len = data.len(), "short write");
        }
        Ok(accepted == data.len())
    }

    /// Block until all queued transmit data has been sent.
    pub fn flush(&self) -> PortResult<()> {
        let handle = self.handle()?;
        Ok(self.device.wait_all_sent(handle)?)
    }

    /// Cancel a read blocked on another thread. Safe to call at any time.
    pub fn cancel_read(&self) -> PortResult<()> {
        self.cancel_with(|device, handle| device.cancel_receive(handle))
    }

    /// Cancel a write blocked on another thread. Safe to call at any time.
    pub fn cancel_write(&self) -> PortResult<()> {
        self.cancel_with(|device, handle| device.cancel_transmit(handle))
    }

    /// Cancel an event wait blocked on another thread.
    pub fn cancel_wait(&self) -> PortResult<()> {
        self.cancel_with(|device, handle| device.cancel_wait_event(handle))
    }

    /// Cancel a GPIO wait blocked on another thread.
    pub fn cancel_gpio_wait(&self) -> PortResult<()> {
        self.cancel_with(|device, handle| device.cancel_wait_gpio(handle))
    }

    fn cancel_with(
        &self,
        cancel: impl FnOnce(&D, DeviceHandle) -> crate::driver::DriverResult<()>,
    ) -> PortResult<()> {
        match self.state.lock().handle {
            Some(handle) => Ok(cancel(&*self.device, handle)?),
            None => Ok(()),
        }
    }

    // ========== Receiver and transmitter ==========

    pub fn enable_receiver(&self) -> PortResult<()> {
        self.receiver_mode(ReceiverMode::Enable)
    }

    pub fn disable_receiver(&self) -> PortResult<()> {
        self.receiver_mode(ReceiverMode::Disable)
    }

    /// Drop the current frame and hunt for the next one.
    pub fn force_receiver_idle(&self) -> PortResult<()> {
        self.receiver_mode(ReceiverMode::ForceIdle)
    }

    fn receiver_mode(&self, mode: ReceiverMode) -> PortResult<()> {
        let handle = self.handle()?;
        Ok(self.device.enable_receiver(handle, mode)?)
    }

    pub fn enable_transmitter(&self) -> PortResult<()> {
        let handle = self.handle()?;
        Ok(self.device.enable_transmitter(handle, true)?)
    }

    pub fn disable_transmitter(&self) -> PortResult<()> {
        let handle = self.handle()?;
        Ok(self.device.enable_transmitter(handle, false)?)
    }

    /// Idle pattern last pushed by this session.
    pub fn transmit_idle(&self) -> IdlePattern {
        self.state.lock().tx_idle
    }

    pub fn set_transmit_idle(&self, idle: IdlePattern) -> PortResult<()> {
        let mut state = self.state.lock();
        let handle = state.handle.ok_or(PortError::NotOpen)?;
        self.device.set_idle_mode(handle, idle.code())?;
        state.tx_idle = idle;
        Ok(())
    }

    // ========== Events ==========

    /// Wait for any event in `mask`.
    ///
    /// Returns the events that occurred, or an empty set on timeout, on
    /// error or when `mask` is empty. Use [`wait_checked`](Self::wait_checked)
    /// to tell those apart.
    pub fn wait(&self, mask: Events, timeout: impl Into<Timeout>) -> Events {
        match self.wait_checked(mask, timeout) {
            Ok(events) => events,
            Err(err) => {
                debug!(port = %self.name, %mask, error = %err, "wait returned no events");
                Events::empty()
            }
        }
    }

    /// Wait for any event in `mask`, reporting timeouts as
    /// [`PortError::Timeout`].
    pub fn wait_checked(&self, mask: Events, timeout: impl Into<Timeout>) -> PortResult<Events> {
        if mask.is_empty() {
            return Ok(Events::empty());
        }
        let handle = self.handle()?;
        Ok(wait_event_timed(&*self.device, handle, mask, timeout.into())?)
    }

    /// Wait timeout configured for this session, forever when unset.
    pub fn default_wait_timeout(&self) -> Timeout {
        self.options.wait_timeout()
    }

    // ========== Options ==========

    pub fn get_option(&self, option: DriverOption) -> PortResult<u32> {
        let handle = self.handle()?;
        Ok(self.device.get_option(handle, option)?)
    }

    pub fn set_option(&self, option: DriverOption, value: u32) -> PortResult<()> {
        let handle = self.handle()?;
        self.device.set_option(handle, option, value)?;
        trace!(port = %self.name, ?option, value, "option set");
        Ok(())
    }

    fn flag_option(&self, option: DriverOption) -> PortResult<bool> {
        Ok(self.get_option(option)? != 0)
    }

    pub fn underrun_retry_limit(&self) -> PortResult<u32> {
        self.get_option(DriverOption::UnderrunRetryLimit)
    }

    pub fn set_underrun_retry_limit(&self, limit: u32) -> PortResult<()> {
        self.set_option(DriverOption::UnderrunRetryLimit, limit)
    }

    /// Electrical interface currently selected.
    pub fn interface(&self) -> PortResult<Interface> {
        let code = self.get_option(DriverOption::Interface)? & INTERFACE_MASK;
        Ok(Interface::from_code(code)?)
    }

    pub fn set_interface(&self, interface: Interface) -> PortResult<()> {
        self.set_option(DriverOption::Interface, interface.code())
    }

    /// Reference clock feeding the baud rate generator, in Hz.
    pub fn base_clock_rate(&self) -> PortResult<u32> {
        self.get_option(DriverOption::ClockBaseFreq)
    }

    pub fn set_base_clock_rate(&self, rate: u32) -> PortResult<()> {
        self.set_option(DriverOption::ClockBaseFreq, rate)
    }

    /// Bytes received since the port was opened.
    pub fn receive_count(&self) -> PortResult<u32> {
        self.get_option(DriverOption::RxCount)
    }

    /// Bytes transmitted since the port was opened.
    pub fn transmit_count(&self) -> PortResult<u32> {
        self.get_option(DriverOption::TxCount)
    }

    pub fn underrun_count(&self) -> PortResult<u32> {
        self.get_option(DriverOption::UnderrunCount)
    }

    pub fn transmit_idle_count(&self) -> PortResult<u32> {
        self.get_option(DriverOption::TxIdleCount)
    }

    /// Line termination. The driver stores the inverse.
    pub fn termination(&self) -> PortResult<bool> {
        Ok(!self.flag_option(DriverOption::NoTermination)?)
    }

    pub fn set_termination(&self, enable: bool) -> PortResult<()> {
        self.set_option(DriverOption::NoTermination, u32::from(!enable))
    }

    /// Restart clock recovery.
    pub fn reset_dpll(&self) -> PortResult<()> {
        self.set_option(DriverOption::DpllReset, 1)
    }

    // ========== Resources ==========

    /// Bus, IRQ, DMA and identification data of the open port.
    pub fn resources(&self) -> PortResult<AssignedResources> {
        let handle = self.handle()?;
        Ok(self.device.get_assigned_resources(handle)?)
    }
}

/// Boolean driver options, each a getter and setter pair.
macro_rules! flag_options {
    ($( $(#[$meta:meta])* $get:ident, $set:ident => $option:ident; )+) => {
        impl<D: DeviceApi> PortSession<D> {
            $(
                $(#[$meta])*
                pub fn $get(&self) -> PortResult<bool> {
                    self.flag_option(DriverOption::$option)
                }

                pub fn $set(&self, enable: bool) -> PortResult<()> {
                    self.set_option(DriverOption::$option, u32::from(enable))
                }
            )+
        }
    };
}

flag_options! {
    /// Drop received frames larger than the receive buffer.
    rx_discard_too_large, set_rx_discard_too_large => RxDiscardTooLarge;
    /// Internal loopback of transmit data to the receiver.
    local_loopback, set_local_loopback => EnableLocalLoopback;
    /// Loop received data back out of the transmitter.
    remote_loopback, set_remote_loopback => EnableRemoteLoopback;
    jcr, set_jcr => Jcr;
    /// Let the driver control RTS around transmission.
    rts_output_enable, set_rts_output_enable => RtsDriverControl;
    /// Return data from receive errors instead of discarding it.
    ignore_read_errors, set_ignore_read_errors => RxErrorMask;
    half_duplex, set_half_duplex => HalfDuplex;
    msb_first, set_msb_first => MsbFirst;
    /// Drive the auxiliary clock output.
    enable_clock_output, set_enable_clock_output => AuxClkEnable;
    /// RS-422 output driver enable.
    output_control, set_output_control => Rs422Oe;
}

impl<D: DeviceApi> fmt::Debug for PortSession<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PortSession")
            .field("name", &self.name)
            .field("port_id", &self.port_id)
            .field("open", &state.handle.is_some())
            .field("protocol", &state.settings.protocol)
            .finish()
    }
}

impl<D: DeviceApi> Drop for PortSession<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(port = %self.name, error = %err, "close on drop failed");
        }
    }
}
