//! Property tests for the settings translator.
//!
//! Every in-range `Settings` survives encode then decode. Lossy mappings
//! are asserted on their own below, never folded into the equality.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use proptest::sample::select;
use synclink::driver::{HdlcFlags, PREAMBLE_PATTERN_NONE};
use synclink::settings::{
    decode_params, decode_tdm_options, encode_params, encode_tdm_options, ClockSource, Crc,
    Encoding, Parity, Protocol, Settings, TdmSettings,
};

const BASE_CLOCK: u32 = 14_745_600;

fn protocol() -> impl Strategy<Value = Protocol> {
    select(Protocol::ALL.to_vec())
}

fn encoding() -> impl Strategy<Value = Encoding> {
    select(Encoding::ALL.to_vec())
}

fn clock() -> impl Strategy<Value = ClockSource> {
    select(ClockSource::ALL.to_vec())
}

fn tdm() -> impl Strategy<Value = TdmSettings> {
    (
        0u8..=2,
        any::<(bool, bool, bool)>(),
        1u16..=256,
        prop_oneof![2u16..=32, Just(384u16)],
        select(vec![8u8, 12, 16, 20, 24, 28, 32]),
    )
        .prop_map(|(sync_delay, (sync_frame, sync_short, sync_invert), frame_count, slot_count, slot_bits)| {
            TdmSettings {
                sync_delay,
                sync_frame,
                sync_short,
                sync_invert,
                frame_count,
                slot_count,
                slot_bits,
            }
        })
}

prop_compose! {
    fn settings()(
        (protocol, encoding, internal_loopback) in (protocol(), encoding(), any::<bool>()),
        (crc, discard_data_with_error, discard_received_crc, hdlc_address_filter) in
            (select(Crc::ALL.to_vec()), any::<bool>(), any::<bool>(), any::<u8>()),
        (transmit_preamble_bits, transmit_preamble_pattern) in
            (select(vec![8u8, 16, 32, 64]), select(vec![0x00u8, 0xff, 0x55, 0xaa, 0x7e])),
        internal_clock_rate in any::<u32>(),
        (transmit_clock, transmit_clock_invert, receive_clock, receive_clock_invert) in
            (clock(), any::<bool>(), clock(), any::<bool>()),
        (auto_cts, auto_dcd, auto_rts) in any::<(bool, bool, bool)>(),
        (async_data_rate, async_data_bits, async_stop_bits, async_parity) in
            (1u32..=10_000_000, 5u8..=8, 1u8..=2, select(Parity::ALL.to_vec())),
    ) -> Settings {
        Settings {
            protocol,
            encoding,
            internal_loopback,
            crc,
            discard_data_with_error,
            discard_received_crc,
            hdlc_address_filter,
            transmit_preamble_pattern,
            transmit_preamble_bits,
            internal_clock_rate,
            transmit_clock,
            transmit_clock_invert,
            receive_clock,
            receive_clock_invert,
            auto_cts,
            auto_dcd,
            auto_rts,
            async_data_rate,
            async_data_bits,
            async_stop_bits,
            async_parity,
            ..Settings::default()
        }
    }
}

proptest! {
    #[test]
    fn params_roundtrip(s in settings()) {
        prop_assert!(s.validate().is_ok());
        let decoded = decode_params(&encode_params(&s, BASE_CLOCK)).unwrap();
        prop_assert_eq!(decoded, s);
    }

    #[test]
    fn tdm_roundtrip(t in tdm()) {
        prop_assert!(t.validate().is_ok());
        prop_assert_eq!(decode_tdm_options(encode_tdm_options(&t)), t);
    }

    #[test]
    fn divisor_flag_tracks_divisibility(rate in 1u32..=1_000_000) {
        let s = Settings { internal_clock_rate: rate, ..Settings::default() };
        let div8 = encode_params(&s, BASE_CLOCK).flags.contains(HdlcFlags::DPLL_DIV8);
        prop_assert_eq!(div8, BASE_CLOCK % (rate * 16) != 0);
    }
}

#[test]
fn disabled_preamble_loses_pattern() {
    let s = Settings {
        transmit_preamble_bits: 0,
        transmit_preamble_pattern: 0x55,
        ..Settings::default()
    };
    let params = encode_params(&s, BASE_CLOCK);
    assert_eq!(params.preamble_pattern, PREAMBLE_PATTERN_NONE);

    let decoded = decode_params(&params).unwrap();
    assert_eq!(decoded.transmit_preamble_bits, 0);
    assert_eq!(decoded.transmit_preamble_pattern, 0x00);
}

#[test]
fn out_of_range_preamble_collapses_to_disabled() {
    let s = Settings {
        transmit_preamble_bits: 24,
        transmit_preamble_pattern: 0x7e,
        ..Settings::default()
    };
    assert!(s.validate().is_err());

    let decoded = decode_params(&encode_params(&s, BASE_CLOCK)).unwrap();
    assert_eq!(decoded.transmit_preamble_bits, 0);
}

#[test]
fn unknown_slot_size_collapses_to_32_bits() {
    let t = TdmSettings {
        slot_bits: 10,
        ..TdmSettings::default()
    };
    assert!(t.validate().is_err());
    assert_eq!(decode_tdm_options(encode_tdm_options(&t)).slot_bits, 32);
}

#[test]
fn out_of_range_slot_count_decodes_as_384() {
    let t = TdmSettings {
        slot_count: 64,
        ..TdmSettings::default()
    };
    assert_eq!(decode_tdm_options(encode_tdm_options(&t)).slot_count, 384);
}

#[test]
fn zero_clock_rate_never_sets_divisor() {
    let s = Settings {
        internal_clock_rate: 0,
        ..Settings::default()
    };
    assert!(!encode_params(&s, BASE_CLOCK)
        .flags
        .contains(HdlcFlags::DPLL_DIV8));
}
