//! Protocol-oriented port settings and persistent defaults.
//!
//! [`Settings`] is what callers build and hand to
//! [`PortSession::apply_settings`](crate::port::PortSession::apply_settings).
//! The selector enums carry their driver code and an explicit name table, so
//! a settings table in a config file can say `protocol = "bisync"` or
//! `encoding = "fm0"`.

mod translate;

pub use translate::{
    decode_defaults, decode_params, decode_params_lenient, decode_tdm_options, encode_defaults,
    encode_params, encode_tdm_options, IdlePattern,
};

use crate::driver::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from building or decoding settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// A name did not match any variant of the named selector.
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },

    /// The driver reported a code with no matching variant.
    #[error("unknown {kind} code {code}")]
    UnknownCode { kind: &'static str, code: u32 },

    /// A numeric field is outside its documented range.
    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        expected: &'static str,
    },
}

impl SettingsError {
    fn out_of_range(field: &'static str, value: impl Into<u32>, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value: value.into(),
            expected,
        }
    }
}

/// Define a selector enum backed by a driver code, with a case-insensitive
/// name table (first name is canonical).
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $repr:ty, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:expr => [$($alias:literal),+] ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Driver code for this variant.
            pub fn code(self) -> $repr {
                match self {
                    $( $name::$variant => $code ),+
                }
            }

            pub fn from_code(code: $repr) -> Result<Self, SettingsError> {
                $( if code == $code { return Ok($name::$variant); } )+
                Err(SettingsError::UnknownCode { kind: $kind, code: u32::from(code) })
            }

            /// Canonical lower-case name.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => [$($alias),+][0] ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = SettingsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let key = s.trim();
                $(
                    if [$($alias),+].iter().any(|a| a.eq_ignore_ascii_case(key)) {
                        return Ok($name::$variant);
                    }
                )+
                Err(SettingsError::UnknownName { kind: $kind, name: s.to_string() })
            }
        }

        impl TryFrom<String> for $name {
            type Error = SettingsError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.name().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

code_enum! {
    /// Serial protocol.
    Protocol: u32, "protocol" {
        Async = MODE_ASYNC => ["async", "asynchronous"],
        Hdlc = MODE_HDLC => ["hdlc"],
        Monosync = MODE_MONOSYNC => ["monosync"],
        Bisync = MODE_BISYNC => ["bisync"],
        /// External sync, raw bit stream.
        Raw = MODE_RAW => ["raw", "externalsync", "external_sync"],
        Tdm = MODE_TDM => ["tdm"],
    }
}

impl Protocol {
    /// HDLC and TDM return whole frames per read.
    pub fn is_frame_oriented(self) -> bool {
        matches!(self, Protocol::Hdlc | Protocol::Tdm)
    }

    /// Monosync and bisync transmit the sync pattern as idle.
    pub fn uses_sync_pattern(self) -> bool {
        matches!(self, Protocol::Monosync | Protocol::Bisync)
    }
}

code_enum! {
    /// Serial data encoding.
    Encoding: u8, "encoding" {
        Nrz = ENCODING_NRZ => ["nrz"],
        Nrzb = ENCODING_NRZB => ["nrzb"],
        NrziMark = ENCODING_NRZI_MARK => ["nrzi_mark", "nrzi-mark"],
        NrziSpace = ENCODING_NRZI_SPACE => ["nrzi_space", "nrzi-space", "nrzi"],
        BiphaseMark = ENCODING_BIPHASE_MARK => ["biphase_mark", "biphase-mark", "fm1"],
        BiphaseSpace = ENCODING_BIPHASE_SPACE => ["biphase_space", "biphase-space", "fm0"],
        BiphaseLevel = ENCODING_BIPHASE_LEVEL => ["biphase_level", "biphase-level", "manchester"],
        DiffBiphaseLevel = ENCODING_DIFF_BIPHASE_LEVEL => [
            "diff_biphase_level",
            "diff-biphase-level",
            "differential_manchester"
        ],
    }
}

code_enum! {
    /// Where a transmit or receive clock comes from.
    ClockSource: u8, "clock source" {
        /// TxC input pin.
        TxcInput = 1 => ["txc_input", "txc"],
        /// RxC input pin.
        RxcInput = 2 => ["rxc_input", "rxc"],
        /// Baud rate generator.
        Internal = 3 => ["internal", "brg"],
        /// DPLL recovered from receive data.
        Recovered = 4 => ["recovered", "dpll"],
    }
}

code_enum! {
    /// Frame check type.
    Crc: u16, "crc" {
        Off = CRC_NONE => ["off", "none"],
        Crc16 = CRC_16_CCITT => ["crc16", "crc-16"],
        Crc32 = CRC_32_CCITT => ["crc32", "crc-32"],
    }
}

code_enum! {
    /// Async parity.
    Parity: u8, "parity" {
        Off = PARITY_NONE => ["none", "off"],
        Even = PARITY_EVEN => ["even"],
        Odd = PARITY_ODD => ["odd"],
    }
}

code_enum! {
    /// Electrical interface.
    Interface: u32, "interface" {
        Off = 0 => ["off", "disabled"],
        Rs232 = 1 => ["rs232", "rs-232"],
        V35 = 2 => ["v35", "v.35"],
        Rs422 = 3 => ["rs422", "rs-422"],
        Rs530a = 4 => ["rs530a", "rs-530a"],
    }
}

/// TDM frame geometry. Only meaningful with [`Protocol::Tdm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdmSettings {
    /// Sync to data delay in bits (0, 1 or 2).
    pub sync_delay: u8,
    /// Sync frame present.
    pub sync_frame: bool,
    /// Sync pulse is one bit wide.
    pub sync_short: bool,
    /// Sync is active low.
    pub sync_invert: bool,
    /// Frames per receive buffer, 1..=256.
    pub frame_count: u16,
    /// Slots per frame, 2..=32 or 384.
    pub slot_count: u16,
    /// Slot size in bits: 8, 12, 16, 20, 24, 28 or 32.
    pub slot_bits: u8,
}

impl Default for TdmSettings {
    fn default() -> Self {
        Self {
            sync_delay: 0,
            sync_frame: false,
            sync_short: false,
            sync_invert: false,
            frame_count: 1,
            slot_count: 2,
            slot_bits: 8,
        }
    }
}

impl TdmSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.sync_delay > 2 {
            return Err(SettingsError::out_of_range("tdm.sync_delay", self.sync_delay, "0..=2"));
        }
        if !(1..=256).contains(&self.frame_count) {
            return Err(SettingsError::out_of_range(
                "tdm.frame_count",
                self.frame_count,
                "1..=256",
            ));
        }
        if !((2..=32).contains(&self.slot_count) || self.slot_count == 384) {
            return Err(SettingsError::out_of_range(
                "tdm.slot_count",
                self.slot_count,
                "2..=32 or 384",
            ));
        }
        if !matches!(self.slot_bits, 8 | 12 | 16 | 20 | 24 | 28 | 32) {
            return Err(SettingsError::out_of_range(
                "tdm.slot_bits",
                self.slot_bits,
                "8, 12, 16, 20, 24, 28 or 32",
            ));
        }
        Ok(())
    }
}

/// Protocol-agnostic port configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub protocol: Protocol,
    pub encoding: Encoding,
    pub msb_first: bool,
    pub internal_loopback: bool,

    pub crc: Crc,
    pub discard_data_with_error: bool,
    pub discard_received_crc: bool,

    /// HDLC address filter, 0xff receives all.
    pub hdlc_address_filter: u8,

    /// Preamble byte: 0x00, 0xff, 0x55, 0xaa or 0x7e.
    pub transmit_preamble_pattern: u8,
    /// Preamble length in bits, 0 disables the preamble.
    pub transmit_preamble_bits: u8,

    /// BRG/DPLL reference rate in bits per second, 0 when unused.
    pub internal_clock_rate: u32,

    pub transmit_clock: ClockSource,
    pub transmit_clock_invert: bool,
    pub receive_clock: ClockSource,
    pub receive_clock_invert: bool,

    pub auto_cts: bool,
    pub auto_dcd: bool,
    pub auto_rts: bool,

    pub async_data_rate: u32,
    pub async_data_bits: u8,
    pub async_stop_bits: u8,
    pub async_parity: Parity,

    pub tdm: TdmSettings,

    /// Monosync/bisync sync pattern, also used as transmit idle.
    pub sync_pattern: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Hdlc,
            encoding: Encoding::Nrz,
            msb_first: false,
            internal_loopback: false,
            crc: Crc::Crc16,
            discard_data_with_error: true,
            discard_received_crc: true,
            hdlc_address_filter: 0xff,
            transmit_preamble_pattern: 0x7e,
            transmit_preamble_bits: 0,
            internal_clock_rate: 0,
            transmit_clock: ClockSource::TxcInput,
            transmit_clock_invert: false,
            receive_clock: ClockSource::RxcInput,
            receive_clock_invert: false,
            auto_cts: false,
            auto_dcd: false,
            auto_rts: false,
            async_data_rate: 9600,
            async_data_bits: 8,
            async_stop_bits: 1,
            async_parity: Parity::Off,
            tdm: TdmSettings::default(),
            sync_pattern: 0,
        }
    }
}

impl Settings {
    /// Check every field against its documented range.
    ///
    /// Async framing is only checked for [`Protocol::Async`] and TDM geometry
    /// only for [`Protocol::Tdm`].
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !matches!(self.transmit_preamble_bits, 0 | 8 | 16 | 32 | 64) {
            return Err(SettingsError::out_of_range(
                "transmit_preamble_bits",
                self.transmit_preamble_bits,
                "0, 8, 16, 32 or 64",
            ));
        }
        if self.protocol == Protocol::Async {
            if self.async_data_rate == 0 {
                return Err(SettingsError::out_of_range("async_data_rate", 0u32, "> 0"));
            }
            if !(5..=8).contains(&self.async_data_bits) {
                return Err(SettingsError::out_of_range(
                    "async_data_bits",
                    self.async_data_bits,
                    "5..=8",
                ));
            }
            if !(1..=2).contains(&self.async_stop_bits) {
                return Err(SettingsError::out_of_range(
                    "async_stop_bits",
                    self.async_stop_bits,
                    "1..=2",
                ));
            }
        }
        if self.protocol == Protocol::Tdm {
            self.tdm.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.encoding)?;
        match self.protocol {
            Protocol::Async => write!(
                f,
                " {} {}{}{}",
                self.async_data_rate,
                self.async_data_bits,
                match self.async_parity {
                    Parity::Off => 'N',
                    Parity::Even => 'E',
                    Parity::Odd => 'O',
                },
                self.async_stop_bits
            ),
            _ => write!(
                f,
                " crc={} txc={} rxc={} rate={}",
                self.crc, self.transmit_clock, self.receive_clock, self.internal_clock_rate
            ),
        }
    }
}

/// Persistent, driver-load-time options of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Largest frame, and the default frame-mode read size.
    pub max_data_size: u32,
    pub interface: Interface,
    pub rts_output_enable: bool,
    pub termination: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_data_size: 4096,
            interface: Interface::Off,
            rts_output_enable: false,
            termination: true,
        }
    }
}
