//! Register definitions for the RTL8723B baseband
//!
//! Only the registers the calibration core decodes field-by-field are declared
//! here. Registers that are saved, restored or written as opaque words (ADDA,
//! MAC, tone and PI setup, CCK filter bytes) are addressed through the raw
//! accessors in [`crate::device`] using the address constants in [`addr`].
//!
//! ## Address ranges
//! - **0x0000-0x07FF**: MAC / system control
//! - **0x0800-0x0FFF**: baseband (BB), 32-bit little-endian words
//!
//! RF front-end registers are not part of this map; they are reached through
//! [`crate::interface::RfInterface`].

device_driver::create_device!(
    device_name: Rtw8723bBb,
    dsl: {
        config {
            type RegisterAddressType = u16;
            type DefaultByteOrder = LE;
        }

        // ==================== OFDM0 IQ CORRECTION ====================

        /// OFDM0_ECCA_THRESHOLD - carries the sign-extension bits of the TX IQ matrices (0x0C4C)
        register OfdmEccaThreshold {
            const ADDRESS = 0x0C4C;
            const SIZE_BITS = 32;

            reserved_23_0: uint = 0..24,
            /// Path A extension bit used by the power tracking matrix writer
            swing_ext_a: bool = 24,
            /// Path B element C extension bit
            ext_c_path_b: bool = 25,
            reserved_26: uint = 26..27,
            /// Path B element A extension bit
            ext_a_path_b: bool = 27,
            /// Path B extension bit used by the power tracking matrix writer
            swing_ext_b: bool = 28,
            /// Path A element C extension bit
            ext_c_path_a: bool = 29,
            reserved_30: uint = 30..31,
            /// Path A element A extension bit
            ext_a_path_a: bool = 31,
        },

        /// OFDM0_XA_TX_IQ_IMBALANCE - path A TX IQ matrix and swing (0x0C80)
        register TxIqImbalanceA {
            const ADDRESS = 0x0C80;
            const SIZE_BITS = 32;

            /// Matrix element A
            ele_a: uint = 0..10,
            reserved_15_10: uint = 10..16,
            /// Low 6 bits of matrix element C
            ele_c: uint = 16..22,
            /// Matrix element D (the OFDM swing)
            ele_d: uint = 22..32,
        },

        /// OFDM0_XB_TX_IQ_IMBALANCE - path B TX IQ matrix and swing (0x0C88)
        register TxIqImbalanceB {
            const ADDRESS = 0x0C88;
            const SIZE_BITS = 32;

            /// Matrix element A
            ele_a: uint = 0..10,
            reserved_15_10: uint = 10..16,
            /// Low 6 bits of matrix element C
            ele_c: uint = 16..22,
            /// Matrix element D (the OFDM swing)
            ele_d: uint = 22..32,
        },

        /// TXIQK_MATRIXA_LSB2 - high bits of path A element C (0x0C94)
        register TxIqkCHighA {
            const ADDRESS = 0x0C94;
            const SIZE_BITS = 32;

            reserved_27_0: uint = 0..28,
            /// Bits 9:6 of element C
            ele_c_high: uint = 28..32,
        },

        /// TXIQK_MATRIXB_LSB2 - high bits of path B element C (0x0C9C)
        register TxIqkCHighB {
            const ADDRESS = 0x0C9C;
            const SIZE_BITS = 32;

            reserved_27_0: uint = 0..28,
            /// Bits 9:6 of element C
            ele_c_high: uint = 28..32,
        },

        /// A_RXIQI - path A RX IQ correction (0x0C14)
        register RxIqImbalanceA {
            const ADDRESS = 0x0C14;
            const SIZE_BITS = 32;

            /// RX correction X
            rx_x: uint = 0..10,
            /// Low 6 bits of RX correction Y
            rx_y_low: uint = 10..16,
            reserved_31_16: uint = 16..32,
        },

        /// B_RXIQI - path B RX IQ correction (0x0C1C)
        register RxIqImbalanceB {
            const ADDRESS = 0x0C1C;
            const SIZE_BITS = 32;

            /// RX correction X
            rx_x: uint = 0..10,
            /// Low 6 bits of RX correction Y
            rx_y_low: uint = 10..16,
            reserved_31_16: uint = 16..32,
        },

        /// RXIQK_MATRIX_LSB - high bits of path A RX correction Y (0x0CA0)
        register RxIqkYHighA {
            const ADDRESS = 0x0CA0;
            const SIZE_BITS = 32;

            reserved_27_0: uint = 0..28,
            /// Bits 9:6 of RX correction Y
            rx_y_high: uint = 28..32,
        },

        // ==================== IQK ENGINE ====================

        /// FPGA0_IQK - IQK mode control (0x0E28)
        register FpgaIqk {
            const ADDRESS = 0x0E28;
            const SIZE_BITS = 32;

            reserved_7_0: uint = 0..8,
            /// 0x808000 enters IQK mode, 0 leaves it
            iqk_mode: uint = 8..32,
        },

        /// IQK_RES_TX - TX correlator X result (0x0E94)
        register IqkResTx {
            const ADDRESS = 0x0E94;
            const SIZE_BITS = 32;

            reserved_15_0: uint = 0..16,
            /// TX X (10-bit two's complement)
            tx_x: uint = 16..26,
            reserved_31_26: uint = 26..32,
        },

        /// IQK_RES_TY - TX correlator Y result (0x0E9C)
        register IqkResTy {
            const ADDRESS = 0x0E9C;
            const SIZE_BITS = 32;

            reserved_15_0: uint = 0..16,
            /// TX Y (10-bit two's complement)
            tx_y: uint = 16..26,
            reserved_31_26: uint = 26..32,
        },

        /// IQK_RES_RX - RX correlator X result (0x0EA4)
        register IqkResRx {
            const ADDRESS = 0x0EA4;
            const SIZE_BITS = 32;

            reserved_15_0: uint = 0..16,
            /// RX X (10-bit)
            rx_x: uint = 16..26,
            reserved_31_26: uint = 26..32,
        },

        /// IQK_RES_RY - RX correlator Y result and status flags (0x0EAC)
        register IqkResRy {
            const ADDRESS = 0x0EAC;
            const SIZE_BITS = 32;

            reserved_15_0: uint = 0..16,
            /// RX Y (10-bit two's complement)
            rx_y: uint = 16..26,
            /// One-shot result ready
            ready: bool = 26,
            /// RX measurement failed
            rx_fail: bool = 27,
            /// TX measurement failed
            tx_fail: bool = 28,
            reserved_31_29: uint = 29..32,
        },
    }
);

/// Raw register addresses used outside the typed map
pub mod addr {
    /// BTG path control byte (antenna path owner)
    pub const BTG_SEL: u16 = 0x0067;
    /// MAC: EDCA/ BT coexist config word saved during IQK
    pub const MAC_40: u16 = 0x0040;
    /// TX pause
    pub const TXPAUSE: u16 = 0x0522;
    /// Beacon control bytes saved during IQK
    pub const BCN_CTRL: u16 = 0x0550;
    /// Beacon control 1
    pub const BCN_CTRL_1: u16 = 0x0551;
    /// GNT_BT / WLAN arbitration control
    pub const BT_CONTROL: u16 = 0x0764;
    /// Continuous TX type byte
    pub const CTX: u16 = 0x0d03;
    /// Continuous TX type field of [`CTX`]
    pub const CTX_TYPE_MASK: u8 = 0x70;

    /// BB power save 1
    pub const BB_PWR_SAV1: u16 = 0x0874;
    /// Antenna path selector
    pub const BB_SEL_BTG: u16 = 0x0948;
    /// CCK antenna select
    pub const CCK_ANT_SEL: u16 = 0x0a04;
    /// BB RX path
    pub const BB_RX_PATH: u16 = 0x0c04;
    /// TR mux
    pub const TRMUX: u16 = 0x0c08;
    /// TX IQ imbalance (OFDM swing) per path, written whole by power tracking
    pub const TX_IQ_IMBALANCE: [u16; 2] = [0x0c80, 0x0c88];
    /// Path A AGC core 1 (RX initial gain in byte 0)
    pub const OFDM0_XA_AGC1: u16 = 0x0c50;
    /// Path B AGC core 1 (RX initial gain in byte 0)
    pub const OFDM0_XB_AGC1: u16 = 0x0c58;

    /// TX IQK tone, path A
    pub const TXIQK_TONE_A: u16 = 0x0e30;
    /// RX IQK tone, path A
    pub const RXIQK_TONE_A: u16 = 0x0e34;
    /// TX IQK PI, path A
    pub const TXIQK_PI_A: u16 = 0x0e38;
    /// RX IQK PI, path A
    pub const RXIQK_PI_A: u16 = 0x0e3c;
    /// TX IQK word
    pub const TXIQK: u16 = 0x0e40;
    /// RX IQK word
    pub const RXIQK: u16 = 0x0e44;
    /// TX correlator X result
    pub const IQK_RES_TX: u16 = 0x0e94;
    /// TX correlator Y result
    pub const IQK_RES_TY: u16 = 0x0e9c;
    /// RX correlator Y result and status flags
    pub const IQK_RES_RY: u16 = 0x0eac;
    /// IQK AGC points; the one-shot trigger
    pub const IQK_AGC_PTS: u16 = 0x0e48;
    /// IQK AGC response (LO calibration setting)
    pub const IQK_AGC_RSP: u16 = 0x0e4c;
    /// TX IQK tone, path B
    pub const TX_IQK_TONE_B: u16 = 0x0e50;
    /// RX IQK tone, path B
    pub const RX_IQK_TONE_B: u16 = 0x0e54;
    /// TX IQK PI, path B
    pub const TXIQK_PI_B: u16 = 0x0e58;
    /// RX IQK PI, path B
    pub const RXIQK_PI_B: u16 = 0x0e5c;

    /// CCK TX filter coefficient bytes written from the CCK swing table
    pub const CCK_SWING: [u16; 8] = [
        0x0a22, 0x0a23, 0x0a24, 0x0a25, 0x0a26, 0x0a27, 0x0a28, 0x0a29,
    ];

    /// ADDA power registers switched on during IQK
    pub const IQK_ADDA: [u16; 16] = [
        0x085c, 0x0e6c, 0x0e70, 0x0e74, 0x0e78, 0x0e7c, 0x0e80, 0x0e84, 0x0e88, 0x0e8c, 0x0ed0,
        0x0ed4, 0x0ed8, 0x0edc, 0x0ee0, 0x0eec,
    ];
    /// 8-bit MAC registers saved around IQK
    pub const IQK_MAC8: [u16; 3] = [TXPAUSE, BCN_CTRL, BCN_CTRL_1];
    /// 32-bit MAC registers saved around IQK
    pub const IQK_MAC32: [u16; 1] = [MAC_40];
    /// 32-bit BB registers saved around IQK
    pub const IQK_BB: [u16; 9] = [
        0x0c04, 0x0c08, 0x0874, 0x0b68, 0x0b6c, 0x0870, 0x0860, 0x0864, 0x0a04,
    ];
}

/// RF front-end register addresses (20-bit data)
pub mod rf {
    /// Channel configuration; bit 15 starts LC calibration
    pub const CFGCH: u8 = 0x18;
    /// RCK OS (mode table address)
    pub const RCK_OS: u8 = 0x30;
    /// TX PA gain 1
    pub const TXPA_G1: u8 = 0x31;
    /// TX PA gain 2
    pub const TXPA_G2: u8 = 0x32;
    /// Thermal meter
    pub const T_METER: u8 = 0x42;
    /// RX IQK gain
    pub const RXIQK_GAIN: u8 = 0x43;
    /// PA/PAD setting used by RX IQK
    pub const PAD_TXG: u8 = 0x55;
    /// Debug / PA bias select
    pub const DBG_PA: u8 = 0xdf;
    /// LUT write enable (second bank)
    pub const LUTWE2: u8 = 0xed;
    /// LUT write enable
    pub const LUTWE: u8 = 0xef;

    /// Full 20-bit data mask
    pub const MASK: u32 = 0x000f_ffff;
    /// LC calibration start / busy
    pub const LCK_BIT: u32 = 1 << 15;
    /// Thermal code field of [`T_METER`]
    pub const T_METER_VALUE: u32 = 0xfc00;
    /// Sensor trigger field of [`T_METER`]
    pub const T_METER_TRIGGER: u32 = 0x3_0000;
}
