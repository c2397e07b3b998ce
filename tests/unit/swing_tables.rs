//! Unit tests for swing index clamping and table lookups

use rtw8723b_rfk::tables::{
    cck_index_for_coefficient, ofdm_index_for_swing, thermal_delta_index, RateFamily,
    CCK_SWING_TABLE_CH1_CH13, CCK_SWING_TABLE_CH14, DEFAULT_CCK_INDEX, DEFAULT_OFDM_INDEX,
    OFDM_SWING_TABLE,
};
use rtw8723b_rfk::SwingIndex;

#[test]
fn test_clamp_examples() {
    let below = SwingIndex::ofdm(-3);
    assert_eq!(below.index, 0);
    assert_eq!(below.remnant, -3);

    let above = SwingIndex::ofdm(50);
    assert_eq!(above.index, 42);
    assert_eq!(above.remnant, 8);
}

#[test]
fn test_clamp_is_lossless() {
    for requested in -60i16..=100 {
        for size in [OFDM_SWING_TABLE.len(), CCK_SWING_TABLE_CH1_CH13.len()] {
            let clamped = SwingIndex::clamp(requested, size);
            assert!(
                usize::from(clamped.index) < size,
                "index {} out of table of {}",
                clamped.index,
                size
            );
            assert_eq!(
                i16::from(clamped.index) + i16::from(clamped.remnant),
                requested,
                "remnant must carry the excess exactly"
            );
        }
    }
}

#[test]
fn test_cck_clamps_to_table_size() {
    let top = SwingIndex::cck(35);
    assert_eq!(top.index, 32);
    assert_eq!(top.remnant, 3);
}

#[test]
fn test_tables_have_expected_shape() {
    assert_eq!(OFDM_SWING_TABLE.len(), 43);
    assert_eq!(CCK_SWING_TABLE_CH1_CH13.len(), 33);
    assert_eq!(CCK_SWING_TABLE_CH14.len(), 33);
    assert_eq!(OFDM_SWING_TABLE[usize::from(DEFAULT_OFDM_INDEX)], 0x4000_0100, "0 dB");
}

#[test]
fn test_delta_tables_monotonic_in_magnitude() {
    for family in [RateFamily::Ofdm, RateFamily::Cck] {
        let mut last_up = 0;
        let mut last_down = 0;
        for delta in 0i16..30 {
            let up = thermal_delta_index(family, delta);
            let down = thermal_delta_index(family, -delta);
            assert!(up >= last_up, "{:?} positive table must not decrease", family);
            assert!(down <= last_down, "{:?} negative table must not increase", family);
            assert!(up >= 0 && down <= 0);
            last_up = up;
            last_down = down;
        }
    }
}

#[test]
fn test_delta_lookup_values() {
    assert_eq!(thermal_delta_index(RateFamily::Ofdm, 8), 5);
    assert_eq!(thermal_delta_index(RateFamily::Ofdm, -10), -5);
    assert_eq!(thermal_delta_index(RateFamily::Cck, -10), -6);
    // Clamped to the table span
    assert_eq!(thermal_delta_index(RateFamily::Ofdm, 29), 15);
    assert_eq!(thermal_delta_index(RateFamily::Ofdm, 200), 15);
    assert_eq!(thermal_delta_index(RateFamily::Cck, -200), -15);
}

#[test]
fn test_default_index_lookup_from_hardware_values() {
    for (i, swing) in OFDM_SWING_TABLE.iter().enumerate() {
        let ele_d = (swing >> 22) as u16;
        assert_eq!(usize::from(ofdm_index_for_swing(ele_d)), i);
    }
    assert_eq!(ofdm_index_for_swing(0x123), DEFAULT_OFDM_INDEX, "no match falls back");

    assert_eq!(cck_index_for_coefficient(0x1b), 20);
    assert_eq!(cck_index_for_coefficient(0x24), 25);
    assert_eq!(cck_index_for_coefficient(0xff), DEFAULT_CCK_INDEX);
}
