//! Simulated SyncLink driver for testing.
//!
//! `SimulatedDevice` keeps per-port driver state in memory and implements
//! [`DeviceApi`] without hardware. Tests feed it receive data, line events
//! and GPIO input changes, then inspect what the code under test sent to
//! the "driver" through the call log.

use super::types::*;
use super::{Completion, DeviceApi};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Base clock reported by simulated ports.
pub const SIM_BASE_CLOCK: u32 = 14_745_600;

/// One request recorded by the simulated driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Close,
    GetParams,
    SetParams(RawParams),
    GetOption(DriverOption),
    SetOption(DriverOption, u32),
    GetPortConfig(u32),
    SetPortConfig(u32, PortConfigEx),
    GetSignals,
    SetSignals(Signals),
    WaitEvent(Events),
    CancelWaitEvent,
    GetGpio,
    SetGpio(GpioDesc),
    WaitGpio(GpioDesc),
    CancelWaitGpio,
    CancelTransmit,
    CancelReceive,
    EnableTransmitter(bool),
    EnableReceiver(ReceiverMode),
    SetIdleMode(u32),
    Write(usize),
    WaitAllSent,
    Read(usize),
    ReadWithStatus(usize),
    GetAssignedResources,
    EnumeratePorts,
}

#[derive(Debug, Default)]
struct SlotState {
    signaled: bool,
    events: Events,
    gpio: GpioDesc,
}

#[derive(Debug, Default)]
struct Slot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

impl Slot {
    fn complete(&self, events: Events, gpio: GpioDesc) {
        let mut state = self.state.lock();
        state.events = events;
        state.gpio = gpio;
        state.signaled = true;
        self.cond.notify_all();
    }

    fn fill(&self, events: Events, gpio: GpioDesc) {
        let mut state = self.state.lock();
        state.events = events;
        state.gpio = gpio;
    }
}

/// Completion signal handed out by [`SimulatedDevice`].
#[derive(Debug)]
pub struct SimCompletion {
    slot: Arc<Slot>,
    live: Arc<AtomicUsize>,
}

impl Completion for SimCompletion {
    fn wait(&self, timeout: Timeout) -> bool {
        let mut state = self.slot.state.lock();
        let deadline = timeout.as_duration().map(|d| Instant::now() + d);
        while !state.signaled {
            match deadline {
                None => self.slot.cond.wait(&mut state),
                Some(deadline) => {
                    if self.slot.cond.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        // auto-reset
        std::mem::take(&mut state.signaled)
    }

    fn events(&self) -> Events {
        self.slot.state.lock().events
    }

    fn gpio(&self) -> GpioDesc {
        self.slot.state.lock().gpio
    }
}

impl Drop for SimCompletion {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct SimPort {
    port_id: u32,
    name: String,
    present: bool,
    open_error: Option<DriverStatus>,
    handle: Option<isize>,
    config: PortConfigEx,
    resources: AssignedResources,
    params: RawParams,
    options: [u32; 25],
    signals: Signals,
    gpio: GpioDesc,
    idle_mode: u32,
    tx_enabled: bool,
    rx_mode: ReceiverMode,
    rx_queue: VecDeque<(Vec<u8>, RxStatus)>,
    rx_cancel_gen: u64,
    tx_stalled: bool,
    tx_cancel_gen: u64,
    tx_log: Vec<Vec<u8>>,
    write_limit: Option<usize>,
    latched_events: Events,
    event_wait: Option<(Events, Arc<Slot>)>,
    gpio_wait: Option<(GpioDesc, Arc<Slot>)>,
}

impl SimPort {
    fn new(port_id: u32, name: &str, present: bool) -> Self {
        let mut options = [0u32; 25];
        options[DriverOption::ClockBaseFreq.id() as usize] = SIM_BASE_CLOCK;
        options[DriverOption::Interface.id() as usize] = 1;
        options[DriverOption::Tdm.id() as usize] = 1;
        Self {
            port_id,
            name: name.to_string(),
            present,
            open_error: None,
            handle: None,
            config: PortConfigEx {
                device_id: 0x0070,
                flags: 1,
                ..Default::default()
            },
            resources: AssignedResources {
                bus_type: 5,
                bus_number: 2,
                device_number: port_id,
                irq_level: 16,
                device_id: 0x0070,
                subsystem_id: 0x0070,
                serial_number: format!("SIM{port_id:05}"),
                ..Default::default()
            },
            params: RawParams {
                flags: HdlcFlags::TXC_BRG | HdlcFlags::RXC_BRG,
                clock_speed: 9600,
                ..Default::default()
            },
            options,
            signals: Signals::empty(),
            gpio: GpioDesc::default(),
            idle_mode: TXIDLE_FLAGS,
            tx_enabled: false,
            rx_mode: ReceiverMode::Disable,
            rx_queue: VecDeque::new(),
            rx_cancel_gen: 0,
            tx_stalled: false,
            tx_cancel_gen: 0,
            tx_log: Vec::new(),
            write_limit: None,
            latched_events: Events::empty(),
            event_wait: None,
            gpio_wait: None,
        }
    }

    fn option(&self, option: DriverOption) -> u32 {
        self.options[option.id() as usize]
    }

    fn frame_oriented(&self) -> bool {
        matches!(self.params.mode, MODE_HDLC | MODE_TDM)
    }

    fn polled_rx(&self) -> bool {
        self.option(DriverOption::RxPoll) != 0
    }

    fn polled_tx(&self) -> bool {
        self.option(DriverOption::TxPoll) != 0
    }

    /// Take `data` into the transmit log, looping it back when enabled.
    fn accept_tx(&mut self, data: &[u8]) -> usize {
        let n = self.write_limit.map_or(data.len(), |limit| data.len().min(limit));
        let sent = data[..n].to_vec();
        if self.loopback() && n > 0 {
            self.rx_queue.push_back((sent.clone(), RxStatus::Ok));
        }
        self.tx_log.push(sent);
        n
    }

    fn loopback(&self) -> bool {
        self.params.loopback != 0 || self.option(DriverOption::EnableLocalLoopback) != 0
    }

    fn gpio_matches(&self, desired: &GpioDesc) -> bool {
        (self.gpio.state & desired.smask) == (desired.state & desired.smask)
    }

    /// Pop one receive unit into `buf`.
    fn take_rx(&mut self, buf: &mut [u8]) -> Option<(usize, RxStatus)> {
        let frame_oriented = self.frame_oriented();
        let (data, status) = self.rx_queue.front_mut()?;
        if frame_oriented {
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            let status = if data.len() > buf.len() {
                RxStatus::BufferTooSmall
            } else {
                *status
            };
            self.rx_queue.pop_front();
            return Some((n, status));
        }
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        let status = *status;
        data.drain(..n);
        if data.is_empty() {
            self.rx_queue.pop_front();
        }
        Some((n, status))
    }

    fn abort_waits(&mut self) {
        if let Some((_, slot)) = self.event_wait.take() {
            slot.complete(Events::empty(), GpioDesc::default());
        }
        if let Some((_, slot)) = self.gpio_wait.take() {
            slot.complete(Events::empty(), self.gpio);
        }
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    ports: Vec<SimPort>,
    next_handle: isize,
    calls: Vec<Call>,
    fail_next_wait: Option<DriverStatus>,
    fail_next_read: Option<DriverStatus>,
    fail_option: Option<(DriverOption, DriverStatus)>,
    fail_completion: bool,
}

impl DeviceState {
    fn by_handle(&mut self, handle: DeviceHandle) -> DriverResult<&mut SimPort> {
        self.ports
            .iter_mut()
            .find(|p| p.handle == Some(handle.0))
            .ok_or(DriverStatus::INVALID_HANDLE)
    }

    fn by_name(&mut self, name: &str) -> Option<&mut SimPort> {
        self.ports
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn by_id(&mut self, port_id: u32) -> DriverResult<&mut SimPort> {
        self.ports
            .iter_mut()
            .find(|p| p.port_id == port_id)
            .ok_or(DriverStatus::BAD_DEVICE)
    }

    fn open_port(&mut self, index: usize) -> DriverResult<DeviceHandle> {
        let handle = 0x100 + self.next_handle;
        let port = &mut self.ports[index];
        if !port.present {
            return Err(DriverStatus::BAD_DEVICE);
        }
        if let Some(err) = port.open_error {
            return Err(err);
        }
        if port.handle.is_some() {
            return Err(DriverStatus::DEVICE_IN_USE);
        }
        port.handle = Some(handle);
        port.options[DriverOption::Interface.id() as usize] = port.config.flags & INTERFACE_MASK;
        self.next_handle += 1;
        Ok(DeviceHandle(handle))
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<DeviceState>,
    rx_ready: Condvar,
    tx_ready: Condvar,
    live_completions: Arc<AtomicUsize>,
}

/// In-memory SyncLink driver.
///
/// Cloning yields another reference to the same simulated hardware, so a
/// test can keep one clone for inspection while a session owns another.
///
/// # Example
/// ```
/// use synclink::driver::{DeviceApi, SimulatedDevice};
///
/// let dev = SimulatedDevice::new();
/// dev.add_port("MGHDLC1");
/// let handle = dev.open_by_name("MGHDLC1").unwrap();
///
/// dev.enqueue_frame("MGHDLC1", b"hello");
/// let mut buf = [0u8; 64];
/// let n = dev.read(handle, &mut buf).unwrap();
/// assert_eq!(&buf[..n], b"hello");
/// ```
#[derive(Clone, Default)]
pub struct SimulatedDevice {
    shared: Arc<Shared>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a present port and return its port id.
    ///
    /// Ports start in HDLC/NRZ/CRC-16 with internally generated 9600 bps
    /// clocks on an RS-232 interface.
    pub fn add_port(&self, name: &str) -> u32 {
        self.insert_port(name, true)
    }

    /// Add a port that is configured but has no hardware behind it.
    pub fn add_absent_port(&self, name: &str) -> u32 {
        self.insert_port(name, false)
    }

    fn insert_port(&self, name: &str, present: bool) -> u32 {
        let mut state = self.shared.state.lock();
        let port_id = state.ports.len() as u32 + 1;
        state.ports.push(SimPort::new(port_id, name, present));
        port_id
    }

    /// Make opening `name` fail with `status`.
    pub fn set_open_error(&self, name: &str, status: Option<DriverStatus>) {
        self.with_port(name, |p| p.open_error = status);
    }

    /// Queue one receive unit (a frame in HDLC/TDM, a run of bytes otherwise).
    pub fn enqueue_frame(&self, name: &str, data: &[u8]) {
        self.enqueue_frame_with_status(name, data, RxStatus::Ok);
    }

    pub fn enqueue_frame_with_status(&self, name: &str, data: &[u8], status: RxStatus) {
        self.with_port(name, |p| p.rx_queue.push_back((data.to_vec(), status)));
        self.shared.rx_ready.notify_all();
    }

    /// Number of queued receive units.
    pub fn pending_rx(&self, name: &str) -> usize {
        self.with_port(name, |p| p.rx_queue.len()).unwrap_or(0)
    }

    /// Buffers accepted by `write`, in order.
    pub fn written(&self, name: &str) -> Vec<Vec<u8>> {
        self.with_port(name, |p| p.tx_log.clone()).unwrap_or_default()
    }

    /// Current packed parameters of a port.
    pub fn params(&self, name: &str) -> Option<RawParams> {
        self.with_port(name, |p| p.params)
    }

    /// Overwrite the packed parameters, as another application would.
    pub fn set_raw_params(&self, name: &str, params: RawParams) {
        self.with_port(name, |p| p.params = params);
    }

    pub fn option(&self, name: &str, option: DriverOption) -> Option<u32> {
        self.with_port(name, |p| p.option(option))
    }

    pub fn set_option_value(&self, name: &str, option: DriverOption, value: u32) {
        self.with_port(name, |p| p.options[option.id() as usize] = value);
    }

    pub fn idle_mode(&self, name: &str) -> Option<u32> {
        self.with_port(name, |p| p.idle_mode)
    }

    pub fn port_config(&self, name: &str) -> Option<PortConfigEx> {
        self.with_port(name, |p| p.config)
    }

    pub fn transmitter_enabled(&self, name: &str) -> bool {
        self.with_port(name, |p| p.tx_enabled).unwrap_or(false)
    }

    pub fn receiver_mode(&self, name: &str) -> Option<ReceiverMode> {
        self.with_port(name, |p| p.rx_mode)
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.with_port(name, |p| p.handle.is_some()).unwrap_or(false)
    }

    /// Set the input signals (DSR, CTS, DCD, RI, TXD, RXD) seen by the host.
    pub fn set_input_signals(&self, name: &str, inputs: Signals) {
        self.with_port(name, |p| {
            p.signals = (p.signals & Signals::WRITABLE) | (inputs - Signals::WRITABLE);
        });
    }

    /// Hold writes in a full transmit queue until released or cancelled.
    ///
    /// Stalled writes block, or return 0 at once when transmit is polled.
    pub fn stall_transmit(&self, name: &str, stalled: bool) {
        self.with_port(name, |p| p.tx_stalled = stalled);
        self.shared.tx_ready.notify_all();
    }

    /// Limit how many bytes each write accepts.
    pub fn set_write_limit(&self, name: &str, limit: Option<usize>) {
        self.with_port(name, |p| p.write_limit = limit);
    }

    /// Report line events. A pending wait whose mask overlaps completes;
    /// otherwise the events are latched for the next wait.
    pub fn raise_events(&self, name: &str, events: Events) {
        self.with_port(name, |p| match p.event_wait.take() {
            Some((mask, slot)) if mask.intersects(events) => {
                slot.complete(events & mask, GpioDesc::default());
            }
            other => {
                p.event_wait = other;
                p.latched_events |= events;
            }
        });
    }

    /// Change GPIO input levels for the bits in `mask`.
    pub fn drive_gpio(&self, name: &str, mask: u32, state: u32) {
        self.with_port(name, |p| {
            p.gpio.state = (p.gpio.state & !mask) | (state & mask);
            if let Some((desired, slot)) = p.gpio_wait.take() {
                if p.gpio_matches(&desired) {
                    slot.complete(Events::empty(), p.gpio);
                } else {
                    p.gpio_wait = Some((desired, slot));
                }
            }
        });
    }

    /// Make the next wait request fail with `status`.
    pub fn fail_next_wait(&self, status: DriverStatus) {
        self.shared.state.lock().fail_next_wait = Some(status);
    }

    /// Make the next read request fail with `status`.
    pub fn fail_next_read(&self, status: DriverStatus) {
        self.shared.state.lock().fail_next_read = Some(status);
    }

    /// Make the next write of `option` fail with `status`.
    pub fn fail_next_option(&self, option: DriverOption, status: DriverStatus) {
        self.shared.state.lock().fail_option = Some((option, status));
    }

    /// Make completion signal allocation fail.
    pub fn fail_completion_create(&self, fail: bool) {
        self.shared.state.lock().fail_completion = fail;
    }

    /// Completion signals currently allocated.
    pub fn live_completions(&self) -> usize {
        self.shared.live_completions.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.state.lock().calls.clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.shared.state.lock().calls.iter().filter(|&c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.shared.state.lock().calls.clear();
    }

    fn with_port<T>(&self, name: &str, f: impl FnOnce(&mut SimPort) -> T) -> Option<T> {
        let mut state = self.shared.state.lock();
        state.by_name(name).map(f)
    }

    fn with_handle<T>(
        &self,
        handle: DeviceHandle,
        call: Call,
        f: impl FnOnce(&mut SimPort) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let mut state = self.shared.state.lock();
        state.calls.push(call);
        f(state.by_handle(handle)?)
    }

    fn blocking_read(
        &self,
        handle: DeviceHandle,
        buf: &mut [u8],
        call: Call,
    ) -> DriverResult<(usize, RxStatus)> {
        let mut state = self.shared.state.lock();
        state.calls.push(call);
        if let Some(status) = state.fail_next_read.take() {
            return Err(status);
        }
        let generation = state.by_handle(handle)?.rx_cancel_gen;
        loop {
            let port = state.by_handle(handle)?;
            if let Some(result) = port.take_rx(buf) {
                return Ok(result);
            }
            if port.polled_rx() {
                return Ok((0, RxStatus::Ok));
            }
            if port.rx_cancel_gen != generation {
                return Ok((0, RxStatus::Cancel));
            }
            self.shared.rx_ready.wait(&mut state);
        }
    }
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SimulatedDevice")
            .field("ports", &state.ports.len())
            .field("live_completions", &self.live_completions())
            .finish()
    }
}

impl DeviceApi for SimulatedDevice {
    type Completion = SimCompletion;

    fn open(&self, port_id: u32) -> DriverResult<DeviceHandle> {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::Open(port_id.to_string()));
        let index = state
            .ports
            .iter()
            .position(|p| p.port_id == port_id)
            .ok_or(DriverStatus::BAD_DEVICE)?;
        state.open_port(index)
    }

    fn open_by_name(&self, name: &str) -> DriverResult<DeviceHandle> {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::Open(name.to_string()));
        let index = state
            .ports
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or(DriverStatus::BAD_DEVICE)?;
        state.open_port(index)
    }

    fn close(&self, handle: &mut DeviceHandle) -> DriverResult<()> {
        self.with_handle(*handle, Call::Close, |p| {
            p.handle = None;
            p.abort_waits();
            p.rx_cancel_gen += 1;
            p.tx_cancel_gen += 1;
            Ok(())
        })?;
        self.shared.rx_ready.notify_all();
        self.shared.tx_ready.notify_all();
        *handle = DeviceHandle::INVALID;
        Ok(())
    }

    fn get_params(&self, handle: DeviceHandle) -> DriverResult<RawParams> {
        self.with_handle(handle, Call::GetParams, |p| Ok(p.params))
    }

    fn set_params(&self, handle: DeviceHandle, params: &RawParams) -> DriverResult<()> {
        self.with_handle(handle, Call::SetParams(*params), |p| {
            p.params = *params;
            Ok(())
        })
    }

    fn get_option(&self, handle: DeviceHandle, option: DriverOption) -> DriverResult<u32> {
        self.with_handle(handle, Call::GetOption(option), |p| Ok(p.option(option)))
    }

    fn set_option(
        &self,
        handle: DeviceHandle,
        option: DriverOption,
        value: u32,
    ) -> DriverResult<()> {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::SetOption(option, value));
        if let Some((failing, status)) = state.fail_option {
            if failing == option {
                state.fail_option = None;
                return Err(status);
            }
        }
        let p = state.by_handle(handle)?;
        match option {
            DriverOption::RxCount | DriverOption::TxCount => {
                return Err(DriverStatus::ACCESS_DENIED)
            }
            DriverOption::DpllReset => {}
            _ => p.options[option.id() as usize] = value,
        }
        Ok(())
    }

    fn get_port_config(&self, port_id: u32) -> DriverResult<PortConfigEx> {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::GetPortConfig(port_id));
        Ok(state.by_id(port_id)?.config)
    }

    fn set_port_config(&self, port_id: u32, config: &PortConfigEx) -> DriverResult<()> {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::SetPortConfig(port_id, *config));
        state.by_id(port_id)?.config = *config;
        Ok(())
    }

    fn get_signals(&self, handle: DeviceHandle) -> DriverResult<Signals> {
        self.with_handle(handle, Call::GetSignals, |p| Ok(p.signals))
    }

    fn set_signals(&self, handle: DeviceHandle, signals: Signals) -> DriverResult<()> {
        self.with_handle(handle, Call::SetSignals(signals), |p| {
            p.signals = (p.signals - Signals::WRITABLE) | (signals & Signals::WRITABLE);
            Ok(())
        })
    }

    fn create_completion(&self) -> DriverResult<SimCompletion> {
        if self.shared.state.lock().fail_completion {
            return Err(DriverStatus::GEN_FAILURE);
        }
        self.shared.live_completions.fetch_add(1, Ordering::SeqCst);
        Ok(SimCompletion {
            slot: Arc::new(Slot::default()),
            live: Arc::clone(&self.shared.live_completions),
        })
    }

    fn wait_event(
        &self,
        handle: DeviceHandle,
        mask: Events,
        completion: &SimCompletion,
    ) -> WaitStart {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::WaitEvent(mask));
        if let Some(status) = state.fail_next_wait.take() {
            return WaitStart::Failed(status);
        }
        let port = match state.by_handle(handle) {
            Ok(port) => port,
            Err(status) => return WaitStart::Failed(status),
        };
        if port.event_wait.is_some() {
            return WaitStart::Failed(DriverStatus::BUSY);
        }
        let hit = port.latched_events & mask;
        if !hit.is_empty() {
            port.latched_events -= hit;
            completion.slot.fill(hit, GpioDesc::default());
            return WaitStart::Ready;
        }
        port.event_wait = Some((mask, Arc::clone(&completion.slot)));
        WaitStart::Pending
    }

    fn cancel_wait_event(&self, handle: DeviceHandle) -> DriverResult<()> {
        self.with_handle(handle, Call::CancelWaitEvent, |p| {
            if let Some((_, slot)) = p.event_wait.take() {
                slot.complete(Events::empty(), GpioDesc::default());
            }
            Ok(())
        })
    }

    fn get_gpio(&self, handle: DeviceHandle) -> DriverResult<GpioDesc> {
        self.with_handle(handle, Call::GetGpio, |p| Ok(p.gpio))
    }

    fn set_gpio(&self, handle: DeviceHandle, gpio: &GpioDesc) -> DriverResult<()> {
        self.with_handle(handle, Call::SetGpio(*gpio), |p| {
            p.gpio.dir = (p.gpio.dir & !gpio.dmask) | (gpio.dir & gpio.dmask);
            // only outputs follow the written state
            let writable = gpio.smask & p.gpio.dir;
            p.gpio.state = (p.gpio.state & !writable) | (gpio.state & writable);
            Ok(())
        })
    }

    fn wait_gpio(
        &self,
        handle: DeviceHandle,
        desired: &GpioDesc,
        completion: &SimCompletion,
    ) -> WaitStart {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::WaitGpio(*desired));
        if let Some(status) = state.fail_next_wait.take() {
            return WaitStart::Failed(status);
        }
        let port = match state.by_handle(handle) {
            Ok(port) => port,
            Err(status) => return WaitStart::Failed(status),
        };
        if port.gpio_wait.is_some() {
            return WaitStart::Failed(DriverStatus::BUSY);
        }
        if port.gpio_matches(desired) {
            completion.slot.fill(Events::empty(), port.gpio);
            return WaitStart::Ready;
        }
        port.gpio_wait = Some((*desired, Arc::clone(&completion.slot)));
        WaitStart::Pending
    }

    fn cancel_wait_gpio(&self, handle: DeviceHandle) -> DriverResult<()> {
        self.with_handle(handle, Call::CancelWaitGpio, |p| {
            if let Some((_, slot)) = p.gpio_wait.take() {
                slot.complete(Events::empty(), p.gpio);
            }
            Ok(())
        })
    }

    fn cancel_transmit(&self, handle: DeviceHandle) -> DriverResult<()> {
        self.with_handle(handle, Call::CancelTransmit, |p| {
            p.tx_cancel_gen += 1;
            Ok(())
        })?;
        self.shared.tx_ready.notify_all();
        Ok(())
    }

    fn cancel_receive(&self, handle: DeviceHandle) -> DriverResult<()> {
        self.with_handle(handle, Call::CancelReceive, |p| {
            p.rx_cancel_gen += 1;
            Ok(())
        })?;
        self.shared.rx_ready.notify_all();
        Ok(())
    }

    fn enable_transmitter(&self, handle: DeviceHandle, enable: bool) -> DriverResult<()> {
        self.with_handle(handle, Call::EnableTransmitter(enable), |p| {
            p.tx_enabled = enable;
            Ok(())
        })
    }

    fn enable_receiver(&self, handle: DeviceHandle, mode: ReceiverMode) -> DriverResult<()> {
        self.with_handle(handle, Call::EnableReceiver(mode), |p| {
            p.rx_mode = mode;
            Ok(())
        })
    }

    fn set_idle_mode(&self, handle: DeviceHandle, mode: u32) -> DriverResult<()> {
        self.with_handle(handle, Call::SetIdleMode(mode), |p| {
            p.idle_mode = mode;
            Ok(())
        })
    }

    fn write(&self, handle: DeviceHandle, data: &[u8]) -> DriverResult<usize> {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::Write(data.len()));
        let generation = state.by_handle(handle)?.tx_cancel_gen;
        loop {
            let port = state.by_handle(handle)?;
            if !port.tx_stalled {
                let accepted = port.accept_tx(data);
                drop(state);
                self.shared.rx_ready.notify_all();
                return Ok(accepted);
            }
            if port.polled_tx() || port.tx_cancel_gen != generation {
                return Ok(0);
            }
            self.shared.tx_ready.wait(&mut state);
        }
    }

    fn wait_all_sent(&self, handle: DeviceHandle) -> DriverResult<()> {
        self.with_handle(handle, Call::WaitAllSent, |_| Ok(()))
    }

    fn read(&self, handle: DeviceHandle, buf: &mut [u8]) -> DriverResult<usize> {
        self.blocking_read(handle, buf, Call::Read(buf.len()))
            .map(|(n, _)| n)
    }

    fn read_with_status(
        &self,
        handle: DeviceHandle,
        buf: &mut [u8],
    ) -> DriverResult<(usize, RxStatus)> {
        let len = buf.len();
        self.blocking_read(handle, buf, Call::ReadWithStatus(len))
    }

    fn get_assigned_resources(&self, handle: DeviceHandle) -> DriverResult<AssignedResources> {
        self.with_handle(handle, Call::GetAssignedResources, |p| Ok(p.resources.clone()))
    }

    fn enumerate_ports(&self) -> DriverResult<Vec<PortInfo>> {
        let mut state = self.shared.state.lock();
        state.calls.push(Call::EnumeratePorts);
        Ok(state
            .ports
            .iter()
            .take(MAX_PORTS)
            .map(|p| PortInfo {
                port_id: p.port_id,
                device_id: p.config.device_id,
                name: p.name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn open(dev: &SimulatedDevice, name: &str) -> DeviceHandle {
        dev.open_by_name(name).unwrap()
    }

    #[test]
    fn test_open_errors() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        dev.add_absent_port("MGHDLC2");

        assert_eq!(dev.open_by_name("MGHDLC9"), Err(DriverStatus::BAD_DEVICE));
        assert_eq!(dev.open_by_name("MGHDLC2"), Err(DriverStatus::BAD_DEVICE));

        let _h = open(&dev, "mghdlc1");
        assert_eq!(dev.open_by_name("MGHDLC1"), Err(DriverStatus::DEVICE_IN_USE));
        assert_eq!(dev.open(1), Err(DriverStatus::DEVICE_IN_USE));
    }

    #[test]
    fn test_close_invalidates_handle() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let mut h = open(&dev, "MGHDLC1");

        dev.close(&mut h).unwrap();
        assert_eq!(h, DeviceHandle::INVALID);
        assert!(!dev.is_open("MGHDLC1"));
        assert_eq!(dev.get_params(h), Err(DriverStatus::INVALID_HANDLE));
    }

    #[test]
    fn test_hdlc_reads_whole_frames() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        dev.enqueue_frame("MGHDLC1", b"first");
        dev.enqueue_frame_with_status("MGHDLC1", b"bad", RxStatus::CrcError);
        dev.enqueue_frame("MGHDLC1", b"toolong");

        let mut buf = [0u8; 16];
        assert_eq!(dev.read_with_status(h, &mut buf).unwrap(), (5, RxStatus::Ok));
        assert_eq!(dev.read_with_status(h, &mut buf).unwrap(), (3, RxStatus::CrcError));

        let mut small = [0u8; 4];
        assert_eq!(
            dev.read_with_status(h, &mut small).unwrap(),
            (4, RxStatus::BufferTooSmall)
        );
        assert_eq!(dev.pending_rx("MGHDLC1"), 0);
    }

    #[test]
    fn test_byte_mode_splits_data() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        dev.set_params(
            h,
            &RawParams {
                mode: MODE_ASYNC,
                ..Default::default()
            },
        )
        .unwrap();
        dev.enqueue_frame("MGHDLC1", b"abc");

        let mut one = [0u8; 1];
        assert_eq!(dev.read(h, &mut one).unwrap(), 1);
        assert_eq!(&one, b"a");
        let mut rest = [0u8; 8];
        assert_eq!(dev.read(h, &mut rest).unwrap(), 2);
        assert_eq!(&rest[..2], b"bc");
    }

    #[test]
    fn test_polled_read_returns_immediately() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        dev.set_option(h, DriverOption::RxPoll, 1).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(dev.read(h, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_cancel_receive_wakes_reader() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");

        let canceller = dev.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            canceller.cancel_receive(h).unwrap();
        });
        let mut buf = [0u8; 8];
        assert_eq!(dev.read_with_status(h, &mut buf).unwrap(), (0, RxStatus::Cancel));
        t.join().unwrap();
    }

    #[test]
    fn test_write_limit_and_loopback() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        dev.set_option(h, DriverOption::EnableLocalLoopback, 1).unwrap();

        assert_eq!(dev.write(h, b"frame").unwrap(), 5);
        dev.set_write_limit("MGHDLC1", Some(2));
        assert_eq!(dev.write(h, b"xyz").unwrap(), 2);

        assert_eq!(dev.written("MGHDLC1"), vec![b"frame".to_vec(), b"xy".to_vec()]);
        assert_eq!(dev.pending_rx("MGHDLC1"), 2);
    }

    #[test]
    fn test_stalled_write_blocks_until_cancelled() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        dev.stall_transmit("MGHDLC1", true);

        let canceller = dev.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            canceller.cancel_transmit(h).unwrap();
        });
        assert_eq!(dev.write(h, b"held").unwrap(), 0);
        t.join().unwrap();
        assert!(dev.written("MGHDLC1").is_empty());

        dev.set_option(h, DriverOption::TxPoll, 1).unwrap();
        assert_eq!(dev.write(h, b"held").unwrap(), 0);

        dev.stall_transmit("MGHDLC1", false);
        assert_eq!(dev.write(h, b"sent").unwrap(), 4);
        assert_eq!(dev.written("MGHDLC1"), vec![b"sent".to_vec()]);
    }

    #[test]
    fn test_injected_failures_fire_once() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        dev.enqueue_frame("MGHDLC1", b"kept");

        dev.fail_next_read(DriverStatus::GEN_FAILURE);
        let mut buf = [0u8; 8];
        assert_eq!(dev.read(h, &mut buf), Err(DriverStatus::GEN_FAILURE));
        assert_eq!(dev.read(h, &mut buf), Ok(4));

        dev.fail_next_option(DriverOption::TxPoll, DriverStatus::GEN_FAILURE);
        dev.set_option(h, DriverOption::RxPoll, 1).unwrap();
        assert_eq!(
            dev.set_option(h, DriverOption::TxPoll, 1),
            Err(DriverStatus::GEN_FAILURE)
        );
        assert_eq!(dev.option("MGHDLC1", DriverOption::TxPoll), Some(0));
        dev.set_option(h, DriverOption::TxPoll, 1).unwrap();
        assert_eq!(dev.option("MGHDLC1", DriverOption::TxPoll), Some(1));
    }

    #[test]
    fn test_signals_only_outputs_writable() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        dev.set_input_signals("MGHDLC1", Signals::CTS | Signals::DCD);

        dev.set_signals(h, Signals::DTR | Signals::DSR).unwrap();
        assert_eq!(
            dev.get_signals(h).unwrap(),
            Signals::DTR | Signals::CTS | Signals::DCD
        );
    }

    #[test]
    fn test_gpio_direction_gates_state() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");

        dev.set_gpio(h, &GpioDesc { state: 1, smask: 1, ..Default::default() }).unwrap();
        assert_eq!(dev.get_gpio(h).unwrap().state, 0);

        dev.set_gpio(h, &GpioDesc { dir: 1, dmask: 1, ..Default::default() }).unwrap();
        dev.set_gpio(h, &GpioDesc { state: 1, smask: 1, ..Default::default() }).unwrap();
        let gpio = dev.get_gpio(h).unwrap();
        assert_eq!((gpio.state, gpio.dir), (1, 1));
    }

    #[test]
    fn test_enumerate_includes_absent_ports() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        dev.add_absent_port("MGHDLC2");

        let ports = dev.enumerate_ports().unwrap();
        let names: Vec<_> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["MGHDLC1", "MGHDLC2"]);
        assert_eq!(ports[1].port_id, 2);
    }

    #[test]
    fn test_count_options_are_read_only() {
        let dev = SimulatedDevice::new();
        dev.add_port("MGHDLC1");
        let h = open(&dev, "MGHDLC1");
        assert_eq!(
            dev.set_option(h, DriverOption::RxCount, 5),
            Err(DriverStatus::ACCESS_DENIED)
        );
        assert_eq!(dev.get_option(h, DriverOption::ClockBaseFreq).unwrap(), SIM_BASE_CLOCK);
    }
}
