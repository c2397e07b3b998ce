#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod calibration;
pub mod config;
pub mod device;
pub mod interface;
pub mod power_track;
pub mod registers;
pub mod shared;
pub mod tables;

mod iqk;

// Re-export main types
pub use calibration::{
    CalibrationOutcome, CalibrationRound, CalibrationState, Candidate, Correlation, PathReadings,
    Reading,
};
pub use config::RfkConfig;
pub use device::Rtw8723bRfk;
pub use interface::{HciType, Platform, RfInterface};
pub use power_track::{PassReport, PowerTrackState, TickOutcome, TrackPhase, TxAgcRemnant};
pub use shared::SharedRfk;
pub use tables::SwingIndex;

/// Number of RF paths the register map provides correction matrices for
pub const MAX_RF_PATHS: usize = 2;

/// Value of the efuse thermal meter byte when the sensor was never characterized
pub const THERMAL_METER_UNSUPPORTED: u8 = 0xff;

/// RF path identifiers
///
/// The RTL8723B datasheet calls path A "S1" and path B "S0".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RfPath {
    /// Path A (S1), the primary TX/RX chain
    A = 0,
    /// Path B (S0), the secondary chain
    B = 1,
}

impl RfPath {
    /// All paths in calibration order
    pub const ALL: [RfPath; MAX_RF_PATHS] = [RfPath::A, RfPath::B];

    /// Array index of this path
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Driver errors
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error with the device
    Bus(E),
    /// Invalid configuration parameter
    InvalidConfig,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}
