//! Swing and thermal delta tables
//!
//! The swing tables map a correction strength index to the register value that
//! produces it, in 0.5 dB steps. The thermal delta tables map the distance from
//! the thermal reference to a swing index offset. All values are the
//! vendor's RTL8723B (SDIO) characterization data.

/// OFDM swing table: TX IQ imbalance register values, -15 dB (index 0) to +6 dB (index 42)
///
/// Bits 31:22 hold element D (the swing), bits 9:0 element A.
pub const OFDM_SWING_TABLE: [u32; 43] = [
    0x0b40_002d, // 0, -15.0dB
    0x0c00_0030,
    0x0cc0_0033,
    0x0d80_0036,
    0x0e40_0039,
    0x0f00_003c,
    0x1000_0040,
    0x1100_0044,
    0x1200_0048,
    0x1300_004c,
    0x1440_0051, // 10, -10.0dB
    0x1580_0056,
    0x16c0_005b,
    0x1800_0060,
    0x1980_0066,
    0x1b00_006c,
    0x1c80_0072,
    0x1e40_0079,
    0x2000_0080,
    0x2200_0088,
    0x2400_0090, // 20, -5.0dB
    0x2600_0098,
    0x2880_00a2,
    0x2ac0_00ab,
    0x2d40_00b5,
    0x3000_00c0,
    0x32c0_00cb,
    0x35c0_00d7,
    0x3900_00e4,
    0x3c80_00f2,
    0x4000_0100, // 30, +0dB
    0x43c0_010f,
    0x47c0_011f,
    0x4c00_0130,
    0x5080_0142,
    0x5540_0155,
    0x5a40_0169,
    0x5fc0_017f,
    0x6540_0195,
    0x6b80_01ae,
    0x71c0_01c7, // 40, +5.0dB
    0x7880_01e2,
    0x7f80_01fe,
];

/// CCK TX filter coefficients for channels 1-13, -16 dB (index 0) to 0 dB (index 32)
pub const CCK_SWING_TABLE_CH1_CH13: [[u8; 8]; 33] = [
    [0x09, 0x08, 0x07, 0x06, 0x04, 0x03, 0x01, 0x01], // 0, -16.0dB
    [0x09, 0x09, 0x08, 0x06, 0x05, 0x03, 0x01, 0x01],
    [0x0a, 0x09, 0x08, 0x07, 0x05, 0x03, 0x02, 0x01],
    [0x0a, 0x0a, 0x09, 0x07, 0x05, 0x03, 0x02, 0x01],
    [0x0b, 0x0a, 0x09, 0x08, 0x06, 0x04, 0x02, 0x01],
    [0x0b, 0x0b, 0x0a, 0x08, 0x06, 0x04, 0x02, 0x01],
    [0x0c, 0x0c, 0x0a, 0x09, 0x06, 0x04, 0x02, 0x01],
    [0x0d, 0x0c, 0x0b, 0x09, 0x07, 0x04, 0x02, 0x01],
    [0x0d, 0x0d, 0x0c, 0x0a, 0x07, 0x05, 0x02, 0x01],
    [0x0e, 0x0e, 0x0c, 0x0a, 0x08, 0x05, 0x02, 0x01],
    [0x0f, 0x0f, 0x0d, 0x0b, 0x08, 0x05, 0x03, 0x01], // 10, -11.0dB
    [0x10, 0x10, 0x0e, 0x0b, 0x08, 0x05, 0x03, 0x01],
    [0x11, 0x11, 0x0f, 0x0c, 0x09, 0x06, 0x03, 0x01],
    [0x12, 0x12, 0x0f, 0x0c, 0x09, 0x06, 0x03, 0x01],
    [0x13, 0x13, 0x10, 0x0d, 0x0a, 0x06, 0x03, 0x01],
    [0x14, 0x14, 0x11, 0x0e, 0x0b, 0x07, 0x03, 0x02],
    [0x16, 0x15, 0x12, 0x0f, 0x0b, 0x07, 0x04, 0x01],
    [0x17, 0x16, 0x13, 0x10, 0x0c, 0x08, 0x04, 0x02],
    [0x18, 0x17, 0x15, 0x11, 0x0c, 0x08, 0x04, 0x02],
    [0x1a, 0x19, 0x16, 0x12, 0x0d, 0x09, 0x04, 0x02],
    [0x1b, 0x1a, 0x17, 0x13, 0x0e, 0x09, 0x04, 0x02], // 20, -6.0dB
    [0x1d, 0x1c, 0x18, 0x14, 0x0f, 0x0a, 0x05, 0x02],
    [0x1f, 0x1e, 0x1a, 0x15, 0x10, 0x0a, 0x05, 0x02],
    [0x20, 0x20, 0x1b, 0x16, 0x11, 0x08, 0x05, 0x02],
    [0x22, 0x21, 0x1d, 0x18, 0x11, 0x0b, 0x06, 0x02],
    [0x24, 0x23, 0x1f, 0x19, 0x13, 0x0c, 0x06, 0x03],
    [0x26, 0x25, 0x21, 0x1b, 0x14, 0x0d, 0x06, 0x03],
    [0x28, 0x28, 0x22, 0x1c, 0x15, 0x0d, 0x07, 0x03],
    [0x2b, 0x2a, 0x25, 0x1e, 0x16, 0x0e, 0x07, 0x03],
    [0x2d, 0x2d, 0x27, 0x1f, 0x18, 0x0f, 0x08, 0x03],
    [0x30, 0x2f, 0x29, 0x21, 0x19, 0x10, 0x08, 0x03], // 30, -1.0dB
    [0x33, 0x32, 0x2b, 0x23, 0x1a, 0x11, 0x08, 0x04],
    [0x36, 0x35, 0x2e, 0x25, 0x1c, 0x12, 0x09, 0x04],
];

/// CCK TX filter coefficients for channel 14
///
/// Never written by power tracking, which always uses
/// [`CCK_SWING_TABLE_CH1_CH13`].
pub const CCK_SWING_TABLE_CH14: [[u8; 8]; 33] = [
    [0x09, 0x08, 0x07, 0x04, 0x00, 0x00, 0x00, 0x00], // 0, -16.0dB
    [0x09, 0x09, 0x08, 0x05, 0x00, 0x00, 0x00, 0x00],
    [0x0a, 0x09, 0x08, 0x05, 0x00, 0x00, 0x00, 0x00],
    [0x0a, 0x0a, 0x09, 0x05, 0x00, 0x00, 0x00, 0x00],
    [0x0b, 0x0a, 0x09, 0x05, 0x00, 0x00, 0x00, 0x00],
    [0x0b, 0x0b, 0x0a, 0x06, 0x00, 0x00, 0x00, 0x00],
    [0x0c, 0x0c, 0x0a, 0x06, 0x00, 0x00, 0x00, 0x00],
    [0x0d, 0x0c, 0x0b, 0x06, 0x00, 0x00, 0x00, 0x00],
    [0x0d, 0x0d, 0x0c, 0x07, 0x00, 0x00, 0x00, 0x00],
    [0x0e, 0x0e, 0x0c, 0x07, 0x00, 0x00, 0x00, 0x00],
    [0x0f, 0x0f, 0x0d, 0x08, 0x00, 0x00, 0x00, 0x00], // 10, -11.0dB
    [0x10, 0x10, 0x0e, 0x08, 0x00, 0x00, 0x00, 0x00],
    [0x11, 0x11, 0x0f, 0x09, 0x00, 0x00, 0x00, 0x00],
    [0x12, 0x12, 0x0f, 0x09, 0x00, 0x00, 0x00, 0x00],
    [0x13, 0x13, 0x10, 0x0a, 0x00, 0x00, 0x00, 0x00],
    [0x14, 0x14, 0x11, 0x0a, 0x00, 0x00, 0x00, 0x00],
    [0x16, 0x15, 0x12, 0x0b, 0x00, 0x00, 0x00, 0x00],
    [0x17, 0x16, 0x13, 0x0b, 0x00, 0x00, 0x00, 0x00],
    [0x18, 0x17, 0x15, 0x0c, 0x00, 0x00, 0x00, 0x00],
    [0x1a, 0x19, 0x16, 0x0d, 0x00, 0x00, 0x00, 0x00],
    [0x1b, 0x1a, 0x17, 0x0e, 0x00, 0x00, 0x00, 0x00], // 20, -6.0dB
    [0x1d, 0x1c, 0x18, 0x0e, 0x00, 0x00, 0x00, 0x00],
    [0x1f, 0x1e, 0x1a, 0x0f, 0x00, 0x00, 0x00, 0x00],
    [0x20, 0x20, 0x1b, 0x10, 0x00, 0x00, 0x00, 0x00],
    [0x22, 0x21, 0x1d, 0x11, 0x00, 0x00, 0x00, 0x00],
    [0x24, 0x23, 0x1f, 0x12, 0x00, 0x00, 0x00, 0x00],
    [0x26, 0x25, 0x21, 0x13, 0x00, 0x00, 0x00, 0x00],
    [0x28, 0x28, 0x24, 0x14, 0x00, 0x00, 0x00, 0x00],
    [0x2b, 0x2a, 0x25, 0x15, 0x00, 0x00, 0x00, 0x00],
    [0x2d, 0x2d, 0x17, 0x17, 0x00, 0x00, 0x00, 0x00],
    [0x30, 0x2f, 0x29, 0x18, 0x00, 0x00, 0x00, 0x00], // 30, -1.0dB
    [0x33, 0x32, 0x2b, 0x19, 0x00, 0x00, 0x00, 0x00],
    [0x36, 0x35, 0x2e, 0x1b, 0x00, 0x00, 0x00, 0x00],
];

/// OFDM swing index used when the register value matches no table entry
pub const DEFAULT_OFDM_INDEX: u8 = 30;

/// CCK swing index used when the register value matches no table entry
pub const DEFAULT_CCK_INDEX: u8 = 20;

/// Number of entries in each thermal delta table
pub const DELTA_TABLE_SIZE: usize = 30;

/// OFDM swing offsets for a rising temperature
pub const DELTA_OFDM_POSITIVE: [u8; DELTA_TABLE_SIZE] = [
    0, 0, 1, 2, 2, 3, 3, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 10, 11, 11, 12, 12, 13, 13, 14,
    15, 15,
];

/// OFDM swing offsets for a falling temperature
pub const DELTA_OFDM_NEGATIVE: [u8; DELTA_TABLE_SIZE] = [
    0, 0, 1, 2, 2, 2, 3, 3, 3, 4, 5, 5, 6, 6, 6, 6, 7, 7, 7, 8, 8, 9, 9, 10, 10, 11, 12, 13, 14,
    15,
];

/// CCK swing offsets for a rising temperature
pub const DELTA_CCK_POSITIVE: [u8; DELTA_TABLE_SIZE] = [
    0, 0, 1, 2, 2, 2, 3, 3, 3, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 9, 10, 10, 11, 11, 12, 12, 13, 14,
    15,
];

/// CCK swing offsets for a falling temperature
pub const DELTA_CCK_NEGATIVE: [u8; DELTA_TABLE_SIZE] = [
    0, 0, 1, 2, 2, 3, 3, 4, 4, 5, 6, 6, 7, 7, 7, 8, 8, 8, 9, 9, 9, 10, 10, 11, 11, 12, 12, 13, 14,
    15,
];

/// Table family a thermal delta is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RateFamily {
    /// OFDM/HT rates
    Ofdm,
    /// CCK rates
    Cck,
}

/// Signed swing index offset for a thermal delta
///
/// `raw_delta` is clamped to the table span before lookup. A positive delta
/// (die got warmer) yields a positive offset.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn thermal_delta_index(family: RateFamily, raw_delta: i16) -> i8 {
    let max = (DELTA_TABLE_SIZE - 1) as i16;
    let delta = raw_delta.clamp(-max, max);
    let magnitude = usize::from(delta.unsigned_abs());

    let (positive, negative) = match family {
        RateFamily::Ofdm => (&DELTA_OFDM_POSITIVE, &DELTA_OFDM_NEGATIVE),
        RateFamily::Cck => (&DELTA_CCK_POSITIVE, &DELTA_CCK_NEGATIVE),
    };

    if delta >= 0 {
        positive[magnitude] as i8
    } else {
        -(negative[magnitude] as i8)
    }
}

/// A requested swing index after clamping into a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwingIndex {
    /// Index into the table, always below the table size
    pub index: u8,
    /// Requested index minus `index`
    pub remnant: i8,
}

impl SwingIndex {
    /// Clamp `requested` into a table of `table_size` entries
    ///
    /// `requested - index` is kept in `remnant`, so nothing is lost.
    #[must_use]
    pub fn clamp(requested: i16, table_size: usize) -> Self {
        let last = i16::try_from(table_size.saturating_sub(1)).unwrap_or(i16::MAX);
        let index = requested.clamp(0, last);
        Self {
            index: u8::try_from(index).unwrap_or(u8::MAX),
            remnant: i8::try_from(requested - index).unwrap_or(if requested < 0 {
                i8::MIN
            } else {
                i8::MAX
            }),
        }
    }

    /// Clamp into the OFDM swing table
    #[must_use]
    pub fn ofdm(requested: i16) -> Self {
        Self::clamp(requested, OFDM_SWING_TABLE.len())
    }

    /// Clamp into the CCK swing tables
    #[must_use]
    pub fn cck(requested: i16) -> Self {
        Self::clamp(requested, CCK_SWING_TABLE_CH1_CH13.len())
    }
}

/// OFDM swing index whose element D equals `ele_d`
///
/// Falls back to [`DEFAULT_OFDM_INDEX`] when no entry matches.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn ofdm_index_for_swing(ele_d: u16) -> u8 {
    OFDM_SWING_TABLE
        .iter()
        .position(|&entry| entry >> 22 == u32::from(ele_d))
        .map_or(DEFAULT_OFDM_INDEX, |i| i as u8)
}

/// CCK swing index whose first filter coefficient equals `coefficient`
///
/// Falls back to [`DEFAULT_CCK_INDEX`] when no entry matches.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn cck_index_for_coefficient(coefficient: u8) -> u8 {
    CCK_SWING_TABLE_CH1_CH13
        .iter()
        .position(|row| row[0] == coefficient)
        .map_or(DEFAULT_CCK_INDEX, |i| i as u8)
}
