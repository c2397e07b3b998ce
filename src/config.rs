//! Calibration configuration
//!
//! Values that come from efuse or from per-chip characterization. The defaults
//! match an RTL8723B in its 1T1R package with a characterized thermal meter.

use crate::{Error, MAX_RF_PATHS};

/// Default number of TX/RX attempts per IQK measurement
pub const DEFAULT_IQK_RETRY: u8 = 2;

/// Default settle time after an IQK one-shot, in milliseconds
pub const DEFAULT_IQK_SETTLE_MS: u32 = 20;

/// Default thermal drift (average vs. IQK anchor) that triggers a recalibration
pub const DEFAULT_IQK_THRESHOLD: u8 = 8;

/// Default thermal change (raw vs. last applied sample) that triggers compensation
pub const DEFAULT_THERMAL_CHANGE_THRESHOLD: u8 = 2;

/// Configuration of the calibration core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RfkConfig {
    /// Number of RF paths driven by the chip (1 or 2)
    pub rf_path_count: u8,
    /// Efuse thermal meter reference (`0xff` when the sensor is not characterized)
    pub thermal_meter_k: u8,
    /// Efuse power tracking type; only type 0 (thermal meter) is supported
    pub power_track_type: u8,
    /// Averaged thermal drift that triggers LCK + IQK
    pub iqk_threshold: u8,
    /// Raw thermal change that triggers swing compensation
    pub thermal_change_threshold: u8,
    /// Attempts per TX or RX measurement
    pub iqk_retry: u8,
    /// Settle time after each one-shot pulse, in milliseconds
    pub iqk_settle_ms: u32,
}

impl Default for RfkConfig {
    fn default() -> Self {
        Self {
            rf_path_count: 1,
            thermal_meter_k: 0x20,
            power_track_type: 0,
            iqk_threshold: DEFAULT_IQK_THRESHOLD,
            thermal_change_threshold: DEFAULT_THERMAL_CHANGE_THRESHOLD,
            iqk_retry: DEFAULT_IQK_RETRY,
            iqk_settle_ms: DEFAULT_IQK_SETTLE_MS,
        }
    }
}

impl RfkConfig {
    /// Create a configuration with the given efuse thermal reference
    #[must_use]
    pub fn with_thermal_meter(thermal_meter_k: u8) -> Self {
        Self {
            thermal_meter_k,
            ..Self::default()
        }
    }

    /// Check the configuration for values the driver cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the path count is outside `1..=2` or
    /// the retry bound is zero.
    pub fn validate<E>(&self) -> Result<(), Error<E>> {
        if self.rf_path_count == 0 || usize::from(self.rf_path_count) > MAX_RF_PATHS {
            return Err(Error::InvalidConfig);
        }
        if self.iqk_retry == 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}
