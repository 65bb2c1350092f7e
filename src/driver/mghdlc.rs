//! Windows backend over the vendor `mghdlc.dll`.
//!
//! Each [`DeviceApi`] method is a single call into the DLL. Overlapped waits
//! use a Win32 auto-reset event plus an `OVERLAPPED` block that live in heap
//! storage owned by [`MghdlcCompletion`], so the driver can complete into
//! them after the initiating call returns.

use super::types::*;
use super::{Completion, DeviceApi};
use std::cell::UnsafeCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_uchar, c_uint, c_ulong};
use std::ptr;
use winapi::shared::minwindef::{BOOL, FALSE, TRUE};
use winapi::um::handleapi::CloseHandle;
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::synchapi::{CreateEventA, WaitForSingleObject};
use winapi::um::winbase::{INFINITE, WAIT_OBJECT_0};
use winapi::um::winnt::HANDLE;

#[repr(C)]
#[derive(Default, Clone, Copy)]
struct MgslParams {
    mode: c_ulong,
    loopback: c_uchar,
    flags: u16,
    encoding: c_uchar,
    clock_speed: c_ulong,
    addr: c_uchar,
    crc_type: u16,
    preamble_length: c_uchar,
    preamble_pattern: c_uchar,
    data_rate: c_ulong,
    data_bits: c_uchar,
    stop_bits: c_uchar,
    parity: c_uchar,
}

impl From<&RawParams> for MgslParams {
    fn from(p: &RawParams) -> Self {
        Self {
            mode: p.mode,
            loopback: p.loopback,
            flags: p.flags.bits(),
            encoding: p.encoding,
            clock_speed: p.clock_speed,
            addr: p.addr,
            crc_type: p.crc_type,
            preamble_length: p.preamble_length,
            preamble_pattern: p.preamble_pattern,
            data_rate: p.data_rate,
            data_bits: p.data_bits,
            stop_bits: p.stop_bits,
            parity: p.parity,
        }
    }
}

impl From<MgslParams> for RawParams {
    fn from(p: MgslParams) -> Self {
        Self {
            mode: p.mode,
            loopback: p.loopback,
            flags: HdlcFlags::from_bits_retain(p.flags),
            encoding: p.encoding,
            clock_speed: p.clock_speed,
            addr: p.addr,
            crc_type: p.crc_type,
            preamble_length: p.preamble_length,
            preamble_pattern: p.preamble_pattern,
            data_rate: p.data_rate,
            data_bits: p.data_bits,
            stop_bits: p.stop_bits,
            parity: p.parity,
        }
    }
}

#[repr(C)]
#[derive(Default, Clone, Copy)]
struct MgslPortConfigEx {
    size: c_ulong,
    base_address: c_ulong,
    irq_level: c_ulong,
    dma_channel: c_ulong,
    bus_type: c_ulong,
    bus_number: c_ulong,
    device_id: c_ulong,
    max_frame_size: c_ulong,
    flags: c_ulong,
}

impl MgslPortConfigEx {
    fn sized() -> Self {
        Self {
            size: std::mem::size_of::<Self>() as c_ulong,
            ..Default::default()
        }
    }
}

#[repr(C)]
#[derive(Default, Clone, Copy)]
struct MgslAssignedResources {
    bus_type: c_ulong,
    bus_number: c_ulong,
    device_number: c_ulong,
    irq_level: c_ulong,
    dma_channel: c_ulong,
    io_address: [c_ulong; 3],
    mem_address: [c_ulong; 3],
    device_id: c_ulong,
    subsystem_id: c_ulong,
    serial_number: [c_uchar; MAX_SERIAL_NUMBER],
}

#[repr(C)]
#[derive(Default, Clone, Copy)]
struct RawGpioDesc {
    state: c_ulong,
    smask: c_ulong,
    dir: c_ulong,
    dmask: c_ulong,
}

impl From<&GpioDesc> for RawGpioDesc {
    fn from(g: &GpioDesc) -> Self {
        Self {
            state: g.state,
            smask: g.smask,
            dir: g.dir,
            dmask: g.dmask,
        }
    }
}

impl From<RawGpioDesc> for GpioDesc {
    fn from(g: RawGpioDesc) -> Self {
        Self {
            state: g.state,
            smask: g.smask,
            dir: g.dir,
            dmask: g.dmask,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct MgslPort {
    port_id: c_ulong,
    device_id: c_ulong,
    bus_type: c_ulong,
    device_name: [c_uchar; 25],
}

impl Default for MgslPort {
    fn default() -> Self {
        Self {
            port_id: 0,
            device_id: 0,
            bus_type: 0,
            device_name: [0; 25],
        }
    }
}

fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[link(name = "mghdlc")]
extern "system" {
    fn MgslOpen(port_id: c_ulong, handle: *mut HANDLE) -> c_ulong;
    fn MgslOpenByName(name: *const c_char, handle: *mut HANDLE) -> c_ulong;
    fn MgslClose(handle: HANDLE) -> c_ulong;
    fn MgslSetParams(handle: HANDLE, params: *const MgslParams) -> c_ulong;
    fn MgslGetParams(handle: HANDLE, params: *mut MgslParams) -> c_ulong;
    fn MgslSetOption(handle: HANDLE, option: c_uint, value: c_uint) -> c_ulong;
    fn MgslGetOption(handle: HANDLE, option: c_uint, value: *mut c_uint) -> c_ulong;
    fn MgslGetPortConfigEx(port_id: c_ulong, config: *mut MgslPortConfigEx) -> c_ulong;
    fn MgslSetPortConfigEx(port_id: c_ulong, config: *const MgslPortConfigEx) -> c_ulong;
    fn MgslSetSerialSignals(handle: HANDLE, signals: c_uchar) -> c_ulong;
    fn MgslGetSerialSignals(handle: HANDLE, signals: *mut c_uchar) -> c_ulong;
    fn MgslWaitEvent(
        handle: HANDLE,
        mask: c_ulong,
        events: *mut c_ulong,
        overlapped: *mut OVERLAPPED,
    ) -> c_ulong;
    fn MgslCancelWaitEvent(handle: HANDLE) -> c_ulong;
    fn MgslSetGpio(handle: HANDLE, gpio: *const RawGpioDesc) -> c_ulong;
    fn MgslGetGpio(handle: HANDLE, gpio: *mut RawGpioDesc) -> c_ulong;
    fn MgslWaitGpio(handle: HANDLE, gpio: *mut RawGpioDesc, overlapped: *mut OVERLAPPED)
        -> c_ulong;
    fn MgslCancelWaitGpio(handle: HANDLE) -> c_ulong;
    fn MgslCancelTransmit(handle: HANDLE) -> c_ulong;
    fn MgslEnableTransmitter(handle: HANDLE, enable: BOOL) -> c_ulong;
    fn MgslSetIdleMode(handle: HANDLE, mode: c_ulong) -> c_ulong;
    fn MgslWrite(handle: HANDLE, buf: *const c_uchar, size: c_int) -> c_int;
    fn MgslWaitAllSent(handle: HANDLE) -> c_int;
    fn MgslCancelReceive(handle: HANDLE) -> c_ulong;
    fn MgslEnableReceiver(handle: HANDLE, enable: BOOL) -> c_ulong;
    fn MgslRead(handle: HANDLE, buf: *mut c_uchar, size: c_int) -> c_int;
    fn MgslReadWithStatus(
        handle: HANDLE,
        buf: *mut c_uchar,
        size: c_int,
        status: *mut c_int,
    ) -> c_int;
    fn MgslGetAssignedResources(handle: HANDLE, res: *mut MgslAssignedResources) -> c_ulong;
    fn MgslEnumeratePorts(ports: *mut MgslPort, size: c_ulong, count: *mut c_ulong) -> c_ulong;
}

fn raw(handle: DeviceHandle) -> HANDLE {
    handle.0 as HANDLE
}

fn clamp_len(len: usize) -> c_int {
    len.min(c_int::MAX as usize) as c_int
}

/// Win32 event plus the out-parameters an overlapped wait completes into.
pub struct MghdlcCompletion {
    overlapped: Box<UnsafeCell<OVERLAPPED>>,
    events: Box<UnsafeCell<c_ulong>>,
    gpio: Box<UnsafeCell<RawGpioDesc>>,
}

// The kernel writes into the boxed storage; the host only reads it after the
// event has fired.
unsafe impl Send for MghdlcCompletion {}

impl MghdlcCompletion {
    fn overlapped(&self) -> *mut OVERLAPPED {
        self.overlapped.get()
    }

    fn event(&self) -> HANDLE {
        // SAFETY: hEvent is written once at construction.
        unsafe { (*self.overlapped.get()).hEvent }
    }
}

impl Completion for MghdlcCompletion {
    fn wait(&self, timeout: Timeout) -> bool {
        let ms = match timeout {
            Timeout::Forever => INFINITE,
            Timeout::After(d) => d.as_millis().min(u128::from(INFINITE - 1)) as u32,
        };
        // SAFETY: the event handle is valid until drop.
        unsafe { WaitForSingleObject(self.event(), ms) == WAIT_OBJECT_0 }
    }

    fn events(&self) -> Events {
        // SAFETY: read after completion only.
        Events::from_bits_retain(unsafe { *self.events.get() })
    }

    fn gpio(&self) -> GpioDesc {
        // SAFETY: read after completion only.
        GpioDesc::from(unsafe { *self.gpio.get() })
    }
}

impl Drop for MghdlcCompletion {
    fn drop(&mut self) {
        // SAFETY: the event was created by CreateEventA and is closed once.
        unsafe {
            CloseHandle(self.event());
        }
    }
}

/// [`DeviceApi`] over `mghdlc.dll`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MghdlcDevice;

impl MghdlcDevice {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceApi for MghdlcDevice {
    type Completion = MghdlcCompletion;

    fn open(&self, port_id: u32) -> DriverResult<DeviceHandle> {
        let mut h: HANDLE = ptr::null_mut();
        DriverStatus::check(unsafe { MgslOpen(port_id, &mut h) })?;
        Ok(DeviceHandle(h as isize))
    }

    fn open_by_name(&self, name: &str) -> DriverResult<DeviceHandle> {
        let name = CString::new(name).map_err(|_| DriverStatus::BAD_DEVICE)?;
        let mut h: HANDLE = ptr::null_mut();
        DriverStatus::check(unsafe { MgslOpenByName(name.as_ptr(), &mut h) })?;
        Ok(DeviceHandle(h as isize))
    }

    fn close(&self, handle: &mut DeviceHandle) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslClose(raw(*handle)) })?;
        *handle = DeviceHandle::INVALID;
        Ok(())
    }

    fn get_params(&self, handle: DeviceHandle) -> DriverResult<RawParams> {
        let mut p = MgslParams::default();
        DriverStatus::check(unsafe { MgslGetParams(raw(handle), &mut p) })?;
        Ok(p.into())
    }

    fn set_params(&self, handle: DeviceHandle, params: &RawParams) -> DriverResult<()> {
        let p = MgslParams::from(params);
        DriverStatus::check(unsafe { MgslSetParams(raw(handle), &p) })
    }

    fn get_option(&self, handle: DeviceHandle, option: DriverOption) -> DriverResult<u32> {
        let mut value: c_uint = 0;
        DriverStatus::check(unsafe { MgslGetOption(raw(handle), option.id(), &mut value) })?;
        Ok(value)
    }

    fn set_option(
        &self,
        handle: DeviceHandle,
        option: DriverOption,
        value: u32,
    ) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslSetOption(raw(handle), option.id(), value) })
    }

    fn get_port_config(&self, port_id: u32) -> DriverResult<PortConfigEx> {
        let mut cfg = MgslPortConfigEx::sized();
        DriverStatus::check(unsafe { MgslGetPortConfigEx(port_id, &mut cfg) })?;
        Ok(PortConfigEx {
            bus_type: cfg.bus_type,
            bus_number: cfg.bus_number,
            device_id: cfg.device_id,
            max_frame_size: cfg.max_frame_size,
            flags: cfg.flags,
        })
    }

    fn set_port_config(&self, port_id: u32, config: &PortConfigEx) -> DriverResult<()> {
        let cfg = MgslPortConfigEx {
            bus_type: config.bus_type,
            bus_number: config.bus_number,
            device_id: config.device_id,
            max_frame_size: config.max_frame_size,
            flags: config.flags,
            ..MgslPortConfigEx::sized()
        };
        DriverStatus::check(unsafe { MgslSetPortConfigEx(port_id, &cfg) })
    }

    fn get_signals(&self, handle: DeviceHandle) -> DriverResult<Signals> {
        let mut s: c_uchar = 0;
        DriverStatus::check(unsafe { MgslGetSerialSignals(raw(handle), &mut s) })?;
        Ok(Signals::from_bits_retain(s))
    }

    fn set_signals(&self, handle: DeviceHandle, signals: Signals) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslSetSerialSignals(raw(handle), signals.bits()) })
    }

    fn create_completion(&self) -> DriverResult<MghdlcCompletion> {
        // auto-reset, initially unsignaled
        let event = unsafe { CreateEventA(ptr::null_mut(), FALSE, FALSE, ptr::null()) };
        if event.is_null() {
            return Err(DriverStatus::GEN_FAILURE);
        }
        // SAFETY: OVERLAPPED is a plain C struct; all-zero is its initial state.
        let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
        overlapped.hEvent = event;
        Ok(MghdlcCompletion {
            overlapped: Box::new(UnsafeCell::new(overlapped)),
            events: Box::new(UnsafeCell::new(0)),
            gpio: Box::new(UnsafeCell::new(RawGpioDesc::default())),
        })
    }

    fn wait_event(
        &self,
        handle: DeviceHandle,
        mask: Events,
        completion: &MghdlcCompletion,
    ) -> WaitStart {
        let rc = unsafe {
            MgslWaitEvent(
                raw(handle),
                mask.bits(),
                completion.events.get(),
                completion.overlapped(),
            )
        };
        WaitStart::from_code(rc)
    }

    fn cancel_wait_event(&self, handle: DeviceHandle) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslCancelWaitEvent(raw(handle)) })
    }

    fn get_gpio(&self, handle: DeviceHandle) -> DriverResult<GpioDesc> {
        let mut g = RawGpioDesc::default();
        DriverStatus::check(unsafe { MgslGetGpio(raw(handle), &mut g) })?;
        Ok(g.into())
    }

    fn set_gpio(&self, handle: DeviceHandle, gpio: &GpioDesc) -> DriverResult<()> {
        let g = RawGpioDesc::from(gpio);
        DriverStatus::check(unsafe { MgslSetGpio(raw(handle), &g) })
    }

    fn wait_gpio(
        &self,
        handle: DeviceHandle,
        desired: &GpioDesc,
        completion: &MghdlcCompletion,
    ) -> WaitStart {
        // SAFETY: no wait is outstanding on this completion yet.
        unsafe { *completion.gpio.get() = RawGpioDesc::from(desired) };
        let rc =
            unsafe { MgslWaitGpio(raw(handle), completion.gpio.get(), completion.overlapped()) };
        WaitStart::from_code(rc)
    }

    fn cancel_wait_gpio(&self, handle: DeviceHandle) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslCancelWaitGpio(raw(handle)) })
    }

    fn cancel_transmit(&self, handle: DeviceHandle) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslCancelTransmit(raw(handle)) })
    }

    fn cancel_receive(&self, handle: DeviceHandle) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslCancelReceive(raw(handle)) })
    }

    fn enable_transmitter(&self, handle: DeviceHandle, enable: bool) -> DriverResult<()> {
        let flag = if enable { TRUE } else { FALSE };
        DriverStatus::check(unsafe { MgslEnableTransmitter(raw(handle), flag) })
    }

    fn enable_receiver(&self, handle: DeviceHandle, mode: ReceiverMode) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslEnableReceiver(raw(handle), mode.code() as BOOL) })
    }

    fn set_idle_mode(&self, handle: DeviceHandle, mode: u32) -> DriverResult<()> {
        DriverStatus::check(unsafe { MgslSetIdleMode(raw(handle), mode) })
    }

    fn write(&self, handle: DeviceHandle, data: &[u8]) -> DriverResult<usize> {
        let n = unsafe { MgslWrite(raw(handle), data.as_ptr(), clamp_len(data.len())) };
        usize::try_from(n).map_err(|_| DriverStatus::GEN_FAILURE)
    }

    fn wait_all_sent(&self, handle: DeviceHandle) -> DriverResult<()> {
        let rc = unsafe { MgslWaitAllSent(raw(handle)) };
        DriverStatus::check(rc as u32)
    }

    fn read(&self, handle: DeviceHandle, buf: &mut [u8]) -> DriverResult<usize> {
        let n = unsafe { MgslRead(raw(handle), buf.as_mut_ptr(), clamp_len(buf.len())) };
        usize::try_from(n).map_err(|_| DriverStatus::GEN_FAILURE)
    }

    fn read_with_status(
        &self,
        handle: DeviceHandle,
        buf: &mut [u8],
    ) -> DriverResult<(usize, RxStatus)> {
        let mut status: c_int = -1;
        let n = unsafe {
            MgslReadWithStatus(raw(handle), buf.as_mut_ptr(), clamp_len(buf.len()), &mut status)
        };
        let status = RxStatus::from_code(status).ok_or(DriverStatus::GEN_FAILURE)?;
        let n = usize::try_from(n).map_err(|_| DriverStatus::GEN_FAILURE)?;
        Ok((n, status))
    }

    fn get_assigned_resources(&self, handle: DeviceHandle) -> DriverResult<AssignedResources> {
        let mut r = MgslAssignedResources::default();
        DriverStatus::check(unsafe { MgslGetAssignedResources(raw(handle), &mut r) })?;
        Ok(AssignedResources {
            bus_type: r.bus_type,
            bus_number: r.bus_number,
            device_number: r.device_number,
            irq_level: r.irq_level,
            dma_channel: r.dma_channel,
            io_addresses: r.io_address,
            mem_addresses: r.mem_address,
            device_id: r.device_id,
            subsystem_id: r.subsystem_id,
            serial_number: c_string(&r.serial_number),
        })
    }

    fn enumerate_ports(&self) -> DriverResult<Vec<PortInfo>> {
        let mut ports = vec![MgslPort::default(); MAX_PORTS];
        let mut count: c_ulong = 0;
        let size = (std::mem::size_of::<MgslPort>() * MAX_PORTS) as c_ulong;
        DriverStatus::check(unsafe { MgslEnumeratePorts(ports.as_mut_ptr(), size, &mut count) })?;
        ports.truncate((count as usize).min(MAX_PORTS));
        Ok(ports
            .iter()
            .map(|p| PortInfo {
                port_id: p.port_id,
                device_id: p.device_id,
                name: c_string(&p.device_name),
            })
            .collect())
    }
}
