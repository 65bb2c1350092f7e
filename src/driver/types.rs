//! Driver-facing records, codes and bitmasks.
//!
//! Everything in this module mirrors what the kernel driver expects on the
//! wire. The ergonomic, protocol-oriented view of the same data lives in
//! [`crate::settings`].

use bitflags::bitflags;
use std::fmt;
use std::time::Duration;

// ========== Status codes ==========

/// Raw status code returned by a driver or platform call.
///
/// Zero means success and is never stored in this type; any other value is
/// carried through unchanged so callers can match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverStatus(pub u32);

impl DriverStatus {
    pub const ACCESS_DENIED: Self = Self(5);
    pub const INVALID_HANDLE: Self = Self(6);
    pub const NOT_READY: Self = Self(21);
    pub const GEN_FAILURE: Self = Self(31);
    pub const OPEN_FAILED: Self = Self(110);
    pub const BUSY: Self = Self(170);
    pub const IO_PENDING: Self = Self(997);
    pub const BAD_DEVICE: Self = Self(1200);
    pub const DEVICE_IN_USE: Self = Self(2404);
    pub const WAIT_TIMEOUT: Self = Self(0x102);

    /// Raw numeric code.
    pub fn code(self) -> u32 {
        self.0
    }

    /// Build from a raw return value, mapping 0 to `Ok`.
    pub fn check(code: u32) -> Result<(), Self> {
        if code == 0 {
            Ok(())
        } else {
            Err(Self(code))
        }
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::ACCESS_DENIED => "ERROR_ACCESS_DENIED",
            Self::INVALID_HANDLE => "ERROR_INVALID_HANDLE",
            Self::NOT_READY => "ERROR_NOT_READY",
            Self::GEN_FAILURE => "ERROR_GEN_FAILURE",
            Self::OPEN_FAILED => "ERROR_OPEN_FAILED",
            Self::BUSY => "ERROR_BUSY",
            Self::IO_PENDING => "ERROR_IO_PENDING",
            Self::BAD_DEVICE => "ERROR_BAD_DEVICE",
            Self::DEVICE_IN_USE => "ERROR_DEVICE_IN_USE",
            Self::WAIT_TIMEOUT => "WAIT_TIMEOUT",
            _ => return None,
        })
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "driver status {}", self.0),
        }
    }
}

impl std::error::Error for DriverStatus {}

/// Result type for raw driver calls.
pub type DriverResult<T> = Result<T, DriverStatus>;

// ========== Handles ==========

/// Opaque handle to an open device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub isize);

impl DeviceHandle {
    pub const INVALID: Self = Self(-1);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

// ========== Packed parameters ==========

/// Protocol mode codes (`Mode` field).
pub const MODE_ASYNC: u32 = 1;
pub const MODE_HDLC: u32 = 2;
pub const MODE_MONOSYNC: u32 = 3;
pub const MODE_BISYNC: u32 = 4;
pub const MODE_EXTERNALSYNC: u32 = 6;
pub const MODE_RAW: u32 = MODE_EXTERNALSYNC;
pub const MODE_TDM: u32 = 7;

/// Encoding codes (`Encoding` field).
pub const ENCODING_NRZ: u8 = 0;
pub const ENCODING_NRZB: u8 = 1;
pub const ENCODING_NRZI_MARK: u8 = 2;
pub const ENCODING_NRZI_SPACE: u8 = 3;
pub const ENCODING_BIPHASE_MARK: u8 = 4;
pub const ENCODING_BIPHASE_SPACE: u8 = 5;
pub const ENCODING_BIPHASE_LEVEL: u8 = 6;
pub const ENCODING_DIFF_BIPHASE_LEVEL: u8 = 7;

/// Frame check codes and modifier bits (`CrcType` field).
pub const CRC_NONE: u16 = 0;
pub const CRC_16_CCITT: u16 = 1;
pub const CRC_32_CCITT: u16 = 2;
pub const CRC_MODE_MASK: u16 = 0x00ff;
pub const CRC_RETURN_CRCERR_FRAME: u16 = 0x8000;
pub const CRC_RETURN_CRC: u16 = 0x4000;

/// Preamble length codes.
pub const PREAMBLE_LENGTH_8BITS: u8 = 0;
pub const PREAMBLE_LENGTH_16BITS: u8 = 1;
pub const PREAMBLE_LENGTH_32BITS: u8 = 2;
pub const PREAMBLE_LENGTH_64BITS: u8 = 3;

/// Preamble pattern codes.
pub const PREAMBLE_PATTERN_NONE: u8 = 0;
pub const PREAMBLE_PATTERN_ZEROS: u8 = 1;
pub const PREAMBLE_PATTERN_FLAGS: u8 = 2;
pub const PREAMBLE_PATTERN_10: u8 = 3;
pub const PREAMBLE_PATTERN_01: u8 = 4;
pub const PREAMBLE_PATTERN_ONES: u8 = 5;

/// Async parity codes.
pub const PARITY_NONE: u8 = 0;
pub const PARITY_EVEN: u8 = 1;
pub const PARITY_ODD: u8 = 2;

bitflags! {
    /// Bits of the 16-bit `Flags` field.
    ///
    /// The clock-invert bits share positions with two of the underrun
    /// behaviour bits; which meaning applies depends on the protocol.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HdlcFlags: u16 {
        const UNDERRUN_ABORT15 = 0x0001;
        const UNDERRUN_FLAG = 0x0002;
        const UNDERRUN_CRC = 0x0004;
        const TXC_RXCPIN = 0x0008;
        const SHARE_ZERO = 0x0010;
        const AUTO_CTS = 0x0020;
        const AUTO_DCD = 0x0040;
        const AUTO_RTS = 0x0080;
        const RXC_DPLL = 0x0100;
        const RXC_BRG = 0x0200;
        const TXC_DPLL = 0x0400;
        const TXC_BRG = 0x0800;
        const DPLL_DIV8 = 0x1000;
        const DPLL_DIV16 = 0x2000;
        const HDLC_LOOPMODE = 0x4000;
        const RXC_TXCPIN = 0x8000;
        const RXC_INV = 0x0002;
        const TXC_INV = 0x0004;

        /// All receive clock source bits.
        const RXC_SOURCE = Self::RXC_TXCPIN.bits() | Self::RXC_BRG.bits() | Self::RXC_DPLL.bits();
        /// All transmit clock source bits.
        const TXC_SOURCE = Self::TXC_BRG.bits() | Self::TXC_DPLL.bits() | Self::TXC_RXCPIN.bits();
    }
}

/// Packed protocol parameters exchanged with the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawParams {
    pub mode: u32,
    pub loopback: u8,
    pub flags: HdlcFlags,
    pub encoding: u8,
    pub clock_speed: u32,
    pub addr: u8,
    pub crc_type: u16,
    pub preamble_length: u8,
    pub preamble_pattern: u8,
    pub data_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: u8,
}

impl Default for RawParams {
    fn default() -> Self {
        Self {
            mode: MODE_HDLC,
            loopback: 0,
            flags: HdlcFlags::empty(),
            encoding: ENCODING_NRZ,
            clock_speed: 0,
            addr: 0xff,
            crc_type: CRC_16_CCITT,
            preamble_length: PREAMBLE_LENGTH_8BITS,
            preamble_pattern: PREAMBLE_PATTERN_NONE,
            data_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: PARITY_NONE,
        }
    }
}

// ========== TDM option word ==========

pub const TDM_SYNC_FRAME_ON: u32 = 1 << 20;
pub const TDM_SYNC_DELAY_SHIFT: u32 = 18;
pub const TDM_SYNC_DELAY_MASK: u32 = 3 << TDM_SYNC_DELAY_SHIFT;
pub const TDM_TX_SYNC_WIDTH_BIT: u32 = 1 << 17;
pub const TDM_SYNC_POLARITY_INVERT: u32 = 1 << 16;
pub const TDM_FRAME_COUNT_SHIFT: u32 = 8;
pub const TDM_SLOT_COUNT_SHIFT: u32 = 3;
pub const TDM_SLOT_COUNT_MASK: u32 = 0x1f;
pub const TDM_SLOT_SIZE_MASK: u32 = 0x7;

// ========== Transmit idle ==========

pub const TXIDLE_FLAGS: u32 = 0;
pub const TXIDLE_ALT_ZEROS_ONES: u32 = 1;
pub const TXIDLE_ZEROS: u32 = 2;
pub const TXIDLE_ONES: u32 = 3;
pub const TXIDLE_ALT_MARK_SPACE: u32 = 4;
pub const TXIDLE_SPACE: u32 = 5;
pub const TXIDLE_MARK: u32 = 6;
pub const TXIDLE_CUSTOM_8: u32 = 0x1000_0000;
pub const TXIDLE_CUSTOM_16: u32 = 0x2000_0000;

// ========== Options ==========

/// Named integer options understood by the get/set option calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DriverOption {
    RxDiscardTooLarge = 1,
    UnderrunRetryLimit = 2,
    EnableLocalLoopback = 3,
    EnableRemoteLoopback = 4,
    Jcr = 5,
    Interface = 6,
    RtsDriverControl = 7,
    RxErrorMask = 8,
    ClockSwitch = 9,
    ClockBaseFreq = 10,
    HalfDuplex = 11,
    MsbFirst = 12,
    RxCount = 13,
    TxCount = 14,
    Custom = 15,
    RxPoll = 16,
    TxPoll = 17,
    NoTermination = 18,
    Tdm = 19,
    AuxClkEnable = 20,
    UnderrunCount = 21,
    TxIdleCount = 22,
    DpllReset = 23,
    Rs422Oe = 24,
}

impl DriverOption {
    pub const ALL: [DriverOption; 24] = [
        Self::RxDiscardTooLarge,
        Self::UnderrunRetryLimit,
        Self::EnableLocalLoopback,
        Self::EnableRemoteLoopback,
        Self::Jcr,
        Self::Interface,
        Self::RtsDriverControl,
        Self::RxErrorMask,
        Self::ClockSwitch,
        Self::ClockBaseFreq,
        Self::HalfDuplex,
        Self::MsbFirst,
        Self::RxCount,
        Self::TxCount,
        Self::Custom,
        Self::RxPoll,
        Self::TxPoll,
        Self::NoTermination,
        Self::Tdm,
        Self::AuxClkEnable,
        Self::UnderrunCount,
        Self::TxIdleCount,
        Self::DpllReset,
        Self::Rs422Oe,
    ];

    /// Numeric option identifier (1..=24).
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|opt| opt.id() == id)
    }
}

// ========== Persistent port configuration ==========

pub const INTERFACE_MASK: u32 = 0xf;
pub const RTS_DRIVER_CONTROL: u32 = 0x0010;
pub const NO_TERMINATION: u32 = 0x0020;

/// Driver-load-time options for a port, addressed by numeric port id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfigEx {
    pub bus_type: u32,
    pub bus_number: u32,
    pub device_id: u32,
    pub max_frame_size: u32,
    pub flags: u32,
}

impl Default for PortConfigEx {
    fn default() -> Self {
        Self {
            bus_type: 0,
            bus_number: 0,
            device_id: 0,
            max_frame_size: 4096,
            flags: 0,
        }
    }
}

// ========== GPIO ==========

/// General purpose I/O descriptor.
///
/// `smask`/`dmask` select which bits of `state`/`dir` a set call alters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpioDesc {
    pub state: u32,
    pub smask: u32,
    pub dir: u32,
    pub dmask: u32,
}

// ========== Signals and events ==========

bitflags! {
    /// Serial control and status signals.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Signals: u8 {
        const DCD = 0x01;
        const TXD = 0x02;
        const RI = 0x04;
        const RXD = 0x08;
        const CTS = 0x10;
        const RTS = 0x20;
        const DSR = 0x40;
        const DTR = 0x80;
    }
}

impl Signals {
    /// Signals the host may drive.
    pub const WRITABLE: Signals = Signals::DTR.union(Signals::RTS);
}

impl fmt::Display for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:#04x})", self.bits())?;
        for (name, _) in self.iter_names() {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}

bitflags! {
    /// Line and receiver events for the event wait call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Events: u32 {
        const DSR_ON = 0x0001;
        const DSR_OFF = 0x0002;
        const CTS_ON = 0x0004;
        const CTS_OFF = 0x0008;
        const DCD_ON = 0x0010;
        const DCD_OFF = 0x0020;
        const RI_ON = 0x0040;
        const RI_OFF = 0x0080;
        const RECEIVE_ACTIVE = 0x0100;
        const RECEIVE_IDLE = 0x0200;

        const DSR = Self::DSR_ON.bits() | Self::DSR_OFF.bits();
        const CTS = Self::CTS_ON.bits() | Self::CTS_OFF.bits();
        const DCD = Self::DCD_ON.bits() | Self::DCD_OFF.bits();
        const RI = Self::RI_ON.bits() | Self::RI_OFF.bits();
    }
}

impl fmt::Display for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMED: [(Events, &str); 10] = [
            (Events::DSR_ON, "DSR_ON"),
            (Events::DSR_OFF, "DSR_OFF"),
            (Events::CTS_ON, "CTS_ON"),
            (Events::CTS_OFF, "CTS_OFF"),
            (Events::DCD_ON, "DCD_ON"),
            (Events::DCD_OFF, "DCD_OFF"),
            (Events::RI_ON, "RI_ON"),
            (Events::RI_OFF, "RI_OFF"),
            (Events::RECEIVE_ACTIVE, "RECEIVE_ACTIVE"),
            (Events::RECEIVE_IDLE, "RECEIVE_IDLE"),
        ];
        let mut first = true;
        for (flag, name) in NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ========== Receive ==========

/// Completion status of a read-with-status call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RxStatus {
    Ok,
    CrcError,
    FifoOverrun,
    ShortFrame,
    Abort,
    BufferOverrun,
    Cancel,
    BufferTooSmall,
}

impl RxStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Ok,
            1 => Self::CrcError,
            2 => Self::FifoOverrun,
            3 => Self::ShortFrame,
            4 => Self::Abort,
            5 => Self::BufferOverrun,
            6 => Self::Cancel,
            7 => Self::BufferTooSmall,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::CrcError => 1,
            Self::FifoOverrun => 2,
            Self::ShortFrame => 3,
            Self::Abort => 4,
            Self::BufferOverrun => 5,
            Self::Cancel => 6,
            Self::BufferTooSmall => 7,
        }
    }
}

/// Receiver enable argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverMode {
    Disable,
    Enable,
    /// Force the receiver back to hunt mode.
    ForceIdle,
}

impl ReceiverMode {
    pub fn code(self) -> u32 {
        match self {
            Self::Disable => 0,
            Self::Enable => 1,
            Self::ForceIdle => 2,
        }
    }
}

// ========== Resources and enumeration ==========

/// Device identifiers reported in resources and enumeration records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    SyncLink,
    Scc,
    Sca,
    T1,
    PcCard,
    Msc,
    Gt,
    Gt4,
    Ac,
    Gt2,
    Usb,
    Unknown(u32),
}

impl DeviceKind {
    pub fn from_id(id: u32) -> Self {
        match id {
            0x0010 => Self::SyncLink,
            0x0020 => Self::Scc,
            0x0030 => Self::Sca,
            0x0040 => Self::T1,
            0x0050 => Self::PcCard,
            0x0060 => Self::Msc,
            0x0070 => Self::Gt,
            0x0080 => Self::Gt4,
            0x0090 => Self::Ac,
            0x00A0 => Self::Gt2,
            0x00B0 => Self::Usb,
            other => Self::Unknown(other),
        }
    }
}

/// Maximum serial number length reported by the driver.
pub const MAX_SERIAL_NUMBER: usize = 30;

/// System resources assigned to an open port.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignedResources {
    pub bus_type: u32,
    pub bus_number: u32,
    pub device_number: u32,
    pub irq_level: u32,
    pub dma_channel: u32,
    pub io_addresses: [u32; 3],
    pub mem_addresses: [u32; 3],
    pub device_id: u32,
    pub subsystem_id: u32,
    pub serial_number: String,
}

impl AssignedResources {
    pub fn device_kind(&self) -> DeviceKind {
        DeviceKind::from_id(self.device_id)
    }
}

/// Maximum number of ports returned by enumeration.
pub const MAX_PORTS: usize = 200;

/// One configured port as listed by enumeration.
///
/// Listed ports are configured, not necessarily present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub port_id: u32,
    pub device_id: u32,
    pub name: String,
}

// ========== Waiting ==========

/// How long a blocking wait may last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Forever,
    After(Duration),
}

impl Timeout {
    pub fn from_millis(ms: u64) -> Self {
        Self::After(Duration::from_millis(ms))
    }

    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Forever => None,
            Self::After(d) => Some(d),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::After(d)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Self::Forever, Self::After)
    }
}

/// Immediate outcome of initiating an asynchronous wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStart {
    /// Condition already satisfied; the result is available now.
    Ready,
    /// Wait is in progress; completion will be signalled later.
    Pending,
    /// Request was rejected.
    Failed(DriverStatus),
}

impl WaitStart {
    /// Interpret the return code of an overlapped initiate call.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ready,
            c if c == DriverStatus::IO_PENDING.0 => Self::Pending,
            c => Self::Failed(DriverStatus(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(DriverStatus::BAD_DEVICE.to_string(), "ERROR_BAD_DEVICE (1200)");
        assert_eq!(DriverStatus(77).to_string(), "driver status 77");
        assert!(DriverStatus::check(0).is_ok());
        assert_eq!(DriverStatus::check(5), Err(DriverStatus::ACCESS_DENIED));
    }

    #[test]
    fn test_option_ids() {
        for (i, opt) in DriverOption::ALL.iter().enumerate() {
            assert_eq!(opt.id(), i as u32 + 1);
            assert_eq!(DriverOption::from_id(opt.id()), Some(*opt));
        }
        assert_eq!(DriverOption::from_id(0), None);
        assert_eq!(DriverOption::from_id(25), None);
    }

    #[test]
    fn test_wait_start_codes() {
        assert_eq!(WaitStart::from_code(0), WaitStart::Ready);
        assert_eq!(WaitStart::from_code(997), WaitStart::Pending);
        assert_eq!(
            WaitStart::from_code(31),
            WaitStart::Failed(DriverStatus::GEN_FAILURE)
        );
    }

    #[test]
    fn test_events_display() {
        let events = Events::DSR_ON | Events::CTS_OFF | Events::RECEIVE_IDLE;
        assert_eq!(events.to_string(), "DSR_ON CTS_OFF RECEIVE_IDLE");
        assert_eq!(Events::empty().to_string(), "");
    }

    #[test]
    fn test_signals_display() {
        let s = Signals::DTR | Signals::CTS;
        assert_eq!(s.to_string(), "(0x90) CTS DTR");
        assert!(Signals::WRITABLE.contains(Signals::RTS));
        assert!(!Signals::WRITABLE.contains(Signals::DSR));
    }

    #[test]
    fn test_rx_status_codes() {
        for code in 0..8 {
            let status = RxStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(RxStatus::from_code(-1), None);
    }

    #[test]
    fn test_device_kind() {
        assert_eq!(DeviceKind::from_id(0x00B0), DeviceKind::Usb);
        assert_eq!(DeviceKind::from_id(0x1234), DeviceKind::Unknown(0x1234));
    }

    #[test]
    fn test_timeout_conversions() {
        assert_eq!(Timeout::from(None), Timeout::Forever);
        assert_eq!(
            Timeout::from(Some(Duration::from_millis(5))).as_duration(),
            Some(Duration::from_millis(5))
        );
    }
}
