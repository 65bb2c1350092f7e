//! Translation between [`Settings`] and the driver's packed records.
//!
//! Encoding never fails: values outside a field's range fall back to the
//! driver's default for that field (preamble disabled, 32-bit TDM slots,
//! slot/frame count bits left clear). Run [`Settings::validate`] first to
//! reject such input instead.

use super::{ClockSource, Crc, Defaults, Encoding, Interface, Parity, Protocol, Settings};
use super::{SettingsError, TdmSettings};
use crate::driver::types::*;

/// Build the packed parameter record for `settings`.
///
/// `base_clock` is the adapter's reference clock in Hz, used to decide
/// whether the DPLL needs the x8 reference instead of x16.
pub fn encode_params(settings: &Settings, base_clock: u32) -> RawParams {
    let mut flags = HdlcFlags::empty();

    flags |= match settings.transmit_clock {
        ClockSource::RxcInput => HdlcFlags::TXC_RXCPIN,
        ClockSource::Internal => HdlcFlags::TXC_BRG,
        ClockSource::Recovered => HdlcFlags::TXC_DPLL,
        ClockSource::TxcInput => HdlcFlags::empty(),
    };
    if settings.transmit_clock_invert {
        flags |= HdlcFlags::TXC_INV;
    }

    flags |= match settings.receive_clock {
        ClockSource::TxcInput => HdlcFlags::RXC_TXCPIN,
        ClockSource::Internal => HdlcFlags::RXC_BRG,
        ClockSource::Recovered => HdlcFlags::RXC_DPLL,
        ClockSource::RxcInput => HdlcFlags::empty(),
    };
    if settings.receive_clock_invert {
        flags |= HdlcFlags::RXC_INV;
    }

    flags.set(HdlcFlags::AUTO_RTS, settings.auto_rts);
    flags.set(HdlcFlags::AUTO_CTS, settings.auto_cts);
    flags.set(HdlcFlags::AUTO_DCD, settings.auto_dcd);

    let rate = u64::from(settings.internal_clock_rate);
    if rate != 0 && u64::from(base_clock) % (rate * 16) != 0 {
        flags |= HdlcFlags::DPLL_DIV8;
    }

    let mut crc_type = settings.crc.code();
    if !settings.discard_data_with_error {
        crc_type |= CRC_RETURN_CRCERR_FRAME;
    }
    if !settings.discard_received_crc {
        crc_type |= CRC_RETURN_CRC;
    }

    let (preamble_length, preamble_pattern) = encode_preamble(
        settings.transmit_preamble_bits,
        settings.transmit_preamble_pattern,
    );

    RawParams {
        mode: settings.protocol.code(),
        loopback: u8::from(settings.internal_loopback),
        flags,
        encoding: settings.encoding.code(),
        clock_speed: settings.internal_clock_rate,
        addr: settings.hdlc_address_filter,
        crc_type,
        preamble_length,
        preamble_pattern,
        data_rate: settings.async_data_rate,
        data_bits: settings.async_data_bits,
        stop_bits: settings.async_stop_bits,
        parity: settings.async_parity.code(),
    }
}

fn encode_preamble(bits: u8, pattern: u8) -> (u8, u8) {
    let length = match bits {
        8 => PREAMBLE_LENGTH_8BITS,
        16 => PREAMBLE_LENGTH_16BITS,
        32 => PREAMBLE_LENGTH_32BITS,
        64 => PREAMBLE_LENGTH_64BITS,
        _ => return (PREAMBLE_LENGTH_8BITS, PREAMBLE_PATTERN_NONE),
    };
    let pattern = match pattern {
        0x00 => PREAMBLE_PATTERN_ZEROS,
        0xff => PREAMBLE_PATTERN_ONES,
        0x55 => PREAMBLE_PATTERN_10,
        0xaa => PREAMBLE_PATTERN_01,
        0x7e => PREAMBLE_PATTERN_FLAGS,
        _ => PREAMBLE_PATTERN_NONE,
    };
    (length, pattern)
}

/// Rebuild settings from a packed parameter record.
///
/// TDM geometry, bit order and the sync pattern are not part of the record;
/// those fields come back at their defaults and the caller fills them from
/// the matching options.
pub fn decode_params(params: &RawParams) -> Result<Settings, SettingsError> {
    let flags = params.flags;

    let rx = flags & HdlcFlags::RXC_SOURCE;
    let receive_clock = if rx.contains(HdlcFlags::RXC_BRG) {
        ClockSource::Internal
    } else if rx.contains(HdlcFlags::RXC_DPLL) {
        ClockSource::Recovered
    } else if rx.contains(HdlcFlags::RXC_TXCPIN) {
        ClockSource::TxcInput
    } else {
        ClockSource::RxcInput
    };

    let tx = flags & HdlcFlags::TXC_SOURCE;
    let transmit_clock = if tx.contains(HdlcFlags::TXC_BRG) {
        ClockSource::Internal
    } else if tx.contains(HdlcFlags::TXC_DPLL) {
        ClockSource::Recovered
    } else if tx.contains(HdlcFlags::TXC_RXCPIN) {
        ClockSource::RxcInput
    } else {
        ClockSource::TxcInput
    };

    let (transmit_preamble_bits, transmit_preamble_pattern) =
        decode_preamble(params.preamble_length, params.preamble_pattern);

    Ok(Settings {
        protocol: Protocol::from_code(params.mode)?,
        encoding: Encoding::from_code(params.encoding)?,
        internal_loopback: params.loopback != 0,
        crc: Crc::from_code(params.crc_type & CRC_MODE_MASK)?,
        discard_data_with_error: params.crc_type & CRC_RETURN_CRCERR_FRAME == 0,
        discard_received_crc: params.crc_type & CRC_RETURN_CRC == 0,
        hdlc_address_filter: params.addr,
        transmit_preamble_pattern,
        transmit_preamble_bits,
        internal_clock_rate: params.clock_speed,
        transmit_clock,
        transmit_clock_invert: flags.contains(HdlcFlags::TXC_INV),
        receive_clock,
        receive_clock_invert: flags.contains(HdlcFlags::RXC_INV),
        auto_cts: flags.contains(HdlcFlags::AUTO_CTS),
        auto_dcd: flags.contains(HdlcFlags::AUTO_DCD),
        auto_rts: flags.contains(HdlcFlags::AUTO_RTS),
        async_data_rate: params.data_rate,
        async_data_bits: params.data_bits,
        async_stop_bits: params.stop_bits,
        async_parity: Parity::from_code(params.parity)?,
        ..Settings::default()
    })
}

/// Like [`decode_params`], but never fails.
///
/// Selector codes with no matching variant decode as the default for that
/// field and are returned alongside so the caller can report them.
pub fn decode_params_lenient(params: &RawParams) -> (Settings, Vec<SettingsError>) {
    let defaults = Settings::default();
    let mut known = *params;
    let mut unknown = Vec::new();

    if let Err(err) = Protocol::from_code(params.mode) {
        unknown.push(err);
        known.mode = defaults.protocol.code();
    }
    if let Err(err) = Encoding::from_code(params.encoding) {
        unknown.push(err);
        known.encoding = defaults.encoding.code();
    }
    if let Err(err) = Crc::from_code(params.crc_type & CRC_MODE_MASK) {
        unknown.push(err);
        known.crc_type = (params.crc_type & !CRC_MODE_MASK) | defaults.crc.code();
    }
    if let Err(err) = Parity::from_code(params.parity) {
        unknown.push(err);
        known.parity = defaults.async_parity.code();
    }

    match decode_params(&known) {
        Ok(settings) => (settings, unknown),
        Err(err) => {
            unknown.push(err);
            (defaults, unknown)
        }
    }
}

fn decode_preamble(length: u8, pattern: u8) -> (u8, u8) {
    let bits = match length {
        PREAMBLE_LENGTH_8BITS => 8,
        PREAMBLE_LENGTH_16BITS => 16,
        PREAMBLE_LENGTH_32BITS => 32,
        PREAMBLE_LENGTH_64BITS => 64,
        _ => 0,
    };
    match pattern {
        PREAMBLE_PATTERN_ZEROS => (bits, 0x00),
        PREAMBLE_PATTERN_ONES => (bits, 0xff),
        PREAMBLE_PATTERN_10 => (bits, 0x55),
        PREAMBLE_PATTERN_01 => (bits, 0xaa),
        PREAMBLE_PATTERN_FLAGS => (bits, 0x7e),
        // no pattern means no preamble
        _ => (0, 0x00),
    }
}

/// Pack TDM geometry into the `Tdm` option word.
pub fn encode_tdm_options(tdm: &TdmSettings) -> u32 {
    let mut word: u32 = match tdm.sync_delay {
        1 => 1 << TDM_SYNC_DELAY_SHIFT,
        2 => 2 << TDM_SYNC_DELAY_SHIFT,
        _ => 0,
    };
    if tdm.sync_frame {
        word |= TDM_SYNC_FRAME_ON;
    }
    if tdm.sync_short {
        word |= TDM_TX_SYNC_WIDTH_BIT;
    }
    if tdm.sync_invert {
        word |= TDM_SYNC_POLARITY_INVERT;
    }
    if (1..=256).contains(&tdm.frame_count) {
        word |= u32::from(tdm.frame_count - 1) << TDM_FRAME_COUNT_SHIFT;
    }
    // field 0 means 384 slots
    if (2..=32).contains(&tdm.slot_count) {
        word |= u32::from(tdm.slot_count - 1) << TDM_SLOT_COUNT_SHIFT;
    }
    word |= match tdm.slot_bits {
        8 => 1,
        12 => 2,
        16 => 3,
        20 => 4,
        24 => 5,
        28 => 6,
        _ => 7,
    };
    word
}

/// Unpack the `Tdm` option word.
pub fn decode_tdm_options(word: u32) -> TdmSettings {
    let sync_delay = match (word & TDM_SYNC_DELAY_MASK) >> TDM_SYNC_DELAY_SHIFT {
        1 => 1,
        2 => 2,
        _ => 0,
    };
    let slots = (word >> TDM_SLOT_COUNT_SHIFT) & TDM_SLOT_COUNT_MASK;
    TdmSettings {
        sync_delay,
        sync_frame: word & TDM_SYNC_FRAME_ON != 0,
        sync_short: word & TDM_TX_SYNC_WIDTH_BIT != 0,
        sync_invert: word & TDM_SYNC_POLARITY_INVERT != 0,
        frame_count: ((word >> TDM_FRAME_COUNT_SHIFT) & 0xff) as u16 + 1,
        slot_count: if slots == 0 { 384 } else { slots as u16 + 1 },
        slot_bits: 4 + (word & TDM_SLOT_SIZE_MASK) as u8 * 4,
    }
}

/// Persistent port configuration with `defaults` applied on top of `current`.
pub fn encode_defaults(defaults: &Defaults, current: &PortConfigEx) -> PortConfigEx {
    let mut flags = defaults.interface.code();
    if defaults.rts_output_enable {
        flags |= RTS_DRIVER_CONTROL;
    }
    if !defaults.termination {
        flags |= NO_TERMINATION;
    }
    PortConfigEx {
        max_frame_size: defaults.max_data_size,
        flags,
        ..*current
    }
}

pub fn decode_defaults(config: &PortConfigEx) -> Result<Defaults, SettingsError> {
    Ok(Defaults {
        max_data_size: config.max_frame_size,
        interface: Interface::from_code(config.flags & INTERFACE_MASK)?,
        rts_output_enable: config.flags & RTS_DRIVER_CONTROL != 0,
        termination: config.flags & NO_TERMINATION == 0,
    })
}

/// Transmit idle pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdlePattern {
    /// HDLC flag bytes (0x7e).
    #[default]
    Flags,
    /// Alternating zeros and ones (0xaa).
    AltZerosOnes,
    Zeros,
    Ones,
    AltMarkSpace,
    Space,
    Mark,
    Custom8(u8),
    Custom16(u16),
}

impl IdlePattern {
    /// Pick the idle mode that transmits `pattern`.
    pub fn from_pattern(pattern: u16) -> Self {
        match pattern {
            0x7e => Self::Flags,
            0xaa => Self::AltZerosOnes,
            0x00 => Self::Zeros,
            0xff => Self::Ones,
            p if p < 0x100 => Self::Custom8(p as u8),
            p => Self::Custom16(p),
        }
    }

    /// Driver idle mode code.
    pub fn code(self) -> u32 {
        match self {
            Self::Flags => TXIDLE_FLAGS,
            Self::AltZerosOnes => TXIDLE_ALT_ZEROS_ONES,
            Self::Zeros => TXIDLE_ZEROS,
            Self::Ones => TXIDLE_ONES,
            Self::AltMarkSpace => TXIDLE_ALT_MARK_SPACE,
            Self::Space => TXIDLE_SPACE,
            Self::Mark => TXIDLE_MARK,
            Self::Custom8(b) => TXIDLE_CUSTOM_8 | u32::from(b),
            Self::Custom16(w) => TXIDLE_CUSTOM_16 | u32::from(w),
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            TXIDLE_FLAGS => Self::Flags,
            TXIDLE_ALT_ZEROS_ONES => Self::AltZerosOnes,
            TXIDLE_ZEROS => Self::Zeros,
            TXIDLE_ONES => Self::Ones,
            TXIDLE_ALT_MARK_SPACE => Self::AltMarkSpace,
            TXIDLE_SPACE => Self::Space,
            TXIDLE_MARK => Self::Mark,
            c if c & 0xf000_0000 == TXIDLE_CUSTOM_8 => Self::Custom8((c & 0xff) as u8),
            c if c & 0xf000_0000 == TXIDLE_CUSTOM_16 => Self::Custom16((c & 0xffff) as u16),
            _ => return None,
        })
    }

    /// The byte or word this mode transmits. Mark/space modes are line
    /// states, not bit patterns.
    pub fn pattern(self) -> Option<u16> {
        match self {
            Self::Flags => Some(0x7e),
            Self::AltZerosOnes => Some(0xaa),
            Self::Zeros => Some(0x00),
            Self::Ones => Some(0xff),
            Self::Custom8(b) => Some(u16::from(b)),
            Self::Custom16(w) => Some(w),
            Self::AltMarkSpace | Self::Space | Self::Mark => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: u32 = 14_745_600;

    #[test]
    fn test_lenient_decode_keeps_known_fields() {
        let settings = Settings {
            protocol: Protocol::Bisync,
            encoding: Encoding::NrziMark,
            internal_clock_rate: 64_000,
            ..Settings::default()
        };
        let mut params = encode_params(&settings, BASE);
        params.mode = 5;
        params.crc_type = (params.crc_type & !CRC_MODE_MASK) | 0x09;

        assert!(decode_params(&params).is_err());
        let (decoded, unknown) = decode_params_lenient(&params);
        assert_eq!(
            unknown,
            vec![
                SettingsError::UnknownCode { kind: "protocol", code: 5 },
                SettingsError::UnknownCode { kind: "crc", code: 9 },
            ]
        );
        assert_eq!(decoded.protocol, Protocol::Hdlc);
        assert_eq!(decoded.crc, Crc::Crc16);
        assert_eq!(decoded.encoding, Encoding::NrziMark);
        assert_eq!(decoded.internal_clock_rate, 64_000);
    }

    #[test]
    fn test_encode_defaults_record() {
        let p = encode_params(&Settings::default(), BASE);
        assert_eq!(p.mode, MODE_HDLC);
        assert_eq!(p.flags, HdlcFlags::empty());
        assert_eq!(p.crc_type, CRC_16_CCITT);
        assert_eq!(p.addr, 0xff);
        // bits = 0 disables the preamble
        assert_eq!(p.preamble_length, PREAMBLE_LENGTH_8BITS);
        assert_eq!(p.preamble_pattern, PREAMBLE_PATTERN_NONE);
    }

    #[test]
    fn test_clock_source_bits() {
        let s = Settings {
            transmit_clock: ClockSource::Internal,
            receive_clock: ClockSource::Recovered,
            receive_clock_invert: true,
            auto_rts: true,
            ..Default::default()
        };
        let p = encode_params(&s, BASE);
        assert_eq!(
            p.flags,
            HdlcFlags::TXC_BRG | HdlcFlags::RXC_DPLL | HdlcFlags::RXC_INV | HdlcFlags::AUTO_RTS
        );

        let s = Settings {
            transmit_clock: ClockSource::RxcInput,
            receive_clock: ClockSource::TxcInput,
            transmit_clock_invert: true,
            ..Default::default()
        };
        let p = encode_params(&s, BASE);
        assert_eq!(
            p.flags,
            HdlcFlags::TXC_RXCPIN | HdlcFlags::RXC_TXCPIN | HdlcFlags::TXC_INV
        );
    }

    #[test]
    fn test_decode_clock_precedence() {
        // BRG wins over DPLL and pin bits on both sides
        let params = RawParams {
            flags: HdlcFlags::RXC_BRG
                | HdlcFlags::RXC_DPLL
                | HdlcFlags::RXC_TXCPIN
                | HdlcFlags::TXC_BRG
                | HdlcFlags::TXC_DPLL,
            ..Default::default()
        };
        let s = decode_params(&params).unwrap();
        assert_eq!(s.receive_clock, ClockSource::Internal);
        assert_eq!(s.transmit_clock, ClockSource::Internal);

        let params = RawParams {
            flags: HdlcFlags::RXC_DPLL | HdlcFlags::RXC_TXCPIN | HdlcFlags::TXC_RXCPIN,
            ..Default::default()
        };
        let s = decode_params(&params).unwrap();
        assert_eq!(s.receive_clock, ClockSource::Recovered);
        assert_eq!(s.transmit_clock, ClockSource::RxcInput);

        let s = decode_params(&RawParams::default()).unwrap();
        assert_eq!(s.receive_clock, ClockSource::RxcInput);
        assert_eq!(s.transmit_clock, ClockSource::TxcInput);
    }

    #[test]
    fn test_crc_flags() {
        let s = Settings {
            crc: Crc::Crc32,
            discard_data_with_error: false,
            discard_received_crc: false,
            ..Default::default()
        };
        let p = encode_params(&s, BASE);
        assert_eq!(p.crc_type, CRC_32_CCITT | CRC_RETURN_CRCERR_FRAME | CRC_RETURN_CRC);

        let back = decode_params(&p).unwrap();
        assert_eq!(back.crc, Crc::Crc32);
        assert!(!back.discard_data_with_error);
        assert!(!back.discard_received_crc);
    }

    #[test]
    fn test_preamble_patterns() {
        for (byte, code) in [
            (0x00, PREAMBLE_PATTERN_ZEROS),
            (0xff, PREAMBLE_PATTERN_ONES),
            (0x55, PREAMBLE_PATTERN_10),
            (0xaa, PREAMBLE_PATTERN_01),
            (0x7e, PREAMBLE_PATTERN_FLAGS),
            (0x33, PREAMBLE_PATTERN_NONE),
        ] {
            assert_eq!(encode_preamble(32, byte), (PREAMBLE_LENGTH_32BITS, code));
        }
        assert_eq!(encode_preamble(12, 0x7e), (PREAMBLE_LENGTH_8BITS, PREAMBLE_PATTERN_NONE));
        assert_eq!(encode_preamble(0, 0x00), (PREAMBLE_LENGTH_8BITS, PREAMBLE_PATTERN_NONE));
    }

    #[test]
    fn test_out_of_range_preamble_collapses_to_disabled() {
        let s = Settings {
            transmit_preamble_bits: 24,
            transmit_preamble_pattern: 0x55,
            ..Default::default()
        };
        let back = decode_params(&encode_params(&s, BASE)).unwrap();
        assert_eq!(back.transmit_preamble_bits, 0);
        assert_eq!(back.transmit_preamble_pattern, 0);
    }

    #[test]
    fn test_dpll_div8_fallback() {
        let mut s = Settings {
            internal_clock_rate: 57_600,
            ..Default::default()
        };
        assert!(encode_params(&s, BASE).flags.contains(HdlcFlags::DPLL_DIV8));

        s.internal_clock_rate = 14_400;
        assert!(!encode_params(&s, BASE).flags.contains(HdlcFlags::DPLL_DIV8));

        s.internal_clock_rate = 0;
        assert!(!encode_params(&s, BASE).flags.contains(HdlcFlags::DPLL_DIV8));

        // rate * 16 overflows u32
        s.internal_clock_rate = u32::MAX;
        assert!(encode_params(&s, BASE).flags.contains(HdlcFlags::DPLL_DIV8));
    }

    #[test]
    fn test_tdm_word_layout() {
        let tdm = TdmSettings {
            sync_delay: 2,
            sync_frame: true,
            sync_short: true,
            sync_invert: true,
            frame_count: 256,
            slot_count: 32,
            slot_bits: 16,
        };
        let word = encode_tdm_options(&tdm);
        assert_eq!(word, (1 << 20) | (2 << 18) | (1 << 17) | (1 << 16) | (255 << 8) | (31 << 3) | 3);
        assert_eq!(decode_tdm_options(word), tdm);
    }

    #[test]
    fn test_tdm_slot_counts() {
        let mut tdm = TdmSettings {
            slot_count: 384,
            ..Default::default()
        };
        let word = encode_tdm_options(&tdm);
        assert_eq!((word >> 3) & 0x1f, 0);
        assert_eq!(decode_tdm_options(word).slot_count, 384);

        tdm.slot_count = 2;
        let word = encode_tdm_options(&tdm);
        assert_eq!((word >> 3) & 0x1f, 1);
        assert_eq!(decode_tdm_options(word).slot_count, 2);

        // out of range leaves the field clear
        tdm.slot_count = 33;
        assert_eq!(decode_tdm_options(encode_tdm_options(&tdm)).slot_count, 384);
        tdm.slot_count = 1;
        assert_eq!(decode_tdm_options(encode_tdm_options(&tdm)).slot_count, 384);
    }

    #[test]
    fn test_tdm_slot_size_ladder() {
        for bits in [8u8, 12, 16, 20, 24, 28, 32] {
            let tdm = TdmSettings {
                slot_bits: bits,
                ..Default::default()
            };
            assert_eq!(decode_tdm_options(encode_tdm_options(&tdm)).slot_bits, bits);
        }
        let odd = TdmSettings {
            slot_bits: 10,
            ..Default::default()
        };
        assert_eq!(encode_tdm_options(&odd) & 7, 7);
        assert_eq!(decode_tdm_options(0).slot_bits, 4);
    }

    #[test]
    fn test_idle_pattern_mapping() {
        let cases = [
            (0x7e, IdlePattern::Flags, TXIDLE_FLAGS),
            (0xaa, IdlePattern::AltZerosOnes, TXIDLE_ALT_ZEROS_ONES),
            (0x00, IdlePattern::Zeros, TXIDLE_ZEROS),
            (0xff, IdlePattern::Ones, TXIDLE_ONES),
            (0x33, IdlePattern::Custom8(0x33), TXIDLE_CUSTOM_8 + 0x33),
            (0x1234, IdlePattern::Custom16(0x1234), TXIDLE_CUSTOM_16 + 0x1234),
        ];
        for (byte, idle, code) in cases {
            assert_eq!(IdlePattern::from_pattern(byte), idle);
            assert_eq!(idle.code(), code);
            assert_eq!(IdlePattern::from_code(code), Some(idle));
            assert_eq!(idle.pattern(), Some(byte));
        }
        assert_eq!(IdlePattern::from_code(TXIDLE_MARK), Some(IdlePattern::Mark));
        assert_eq!(IdlePattern::Mark.pattern(), None);
        assert_eq!(IdlePattern::from_code(99), None);
    }

    #[test]
    fn test_defaults_flags() {
        let d = Defaults {
            max_data_size: 1024,
            interface: Interface::Rs422,
            rts_output_enable: true,
            termination: false,
        };
        let current = PortConfigEx {
            device_id: 0x70,
            flags: 0xff,
            ..Default::default()
        };
        let cfg = encode_defaults(&d, &current);
        assert_eq!(cfg.device_id, 0x70);
        assert_eq!(cfg.max_frame_size, 1024);
        assert_eq!(cfg.flags, 3 | RTS_DRIVER_CONTROL | NO_TERMINATION);
        assert_eq!(decode_defaults(&cfg).unwrap(), d);
    }

    #[test]
    fn test_decode_rejects_unknown_codes() {
        let p = RawParams {
            mode: 5,
            ..Default::default()
        };
        assert!(matches!(
            decode_params(&p),
            Err(SettingsError::UnknownCode { kind: "protocol", code: 5 })
        ));
        let p = RawParams {
            encoding: 9,
            ..Default::default()
        };
        assert!(decode_params(&p).is_err());
    }
}
