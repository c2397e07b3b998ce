//! Thermal power tracking
//!
//! The thermal meter needs a settle period between being triggered and being
//! read, so the controller runs as a two-phase state machine driven by
//! [`Rtw8723bRfk::tick`]: an armed tick starts the sensor, the next tick reads
//! it, compensates the TX swing and, on larger drift, recalibrates.

use device_driver::RegisterInterface;
use embedded_hal::delay::DelayNs;

use crate::calibration::iqk_mult;
use crate::device::{BusError, Rtw8723bRfk};
use crate::interface::{Platform, RfInterface};
use crate::iqk::split_matrix;
use crate::registers::{addr, rf};
use crate::tables::{
    cck_index_for_coefficient, ofdm_index_for_swing, thermal_delta_index, RateFamily,
    SwingIndex, CCK_SWING_TABLE_CH1_CH13, DEFAULT_CCK_INDEX, DEFAULT_OFDM_INDEX,
    OFDM_SWING_TABLE,
};
use crate::{Error, RfPath, MAX_RF_PATHS, THERMAL_METER_UNSUPPORTED};

/// Fixed-point precision of the thermal moving average
const EWMA_PRECISION: u32 = 10;

/// log2 of the moving average weight (new sample counts 1/4)
const EWMA_WEIGHT_SHIFT: u32 = 2;

/// Value written to `RF_T_METER[17:16]` to start a conversion
const T_METER_START: u32 = 0x3;

/// LCK completion poll
const LCK_POLL_INTERVAL_US: u32 = 10_000;
const LCK_POLL_TIMEOUT_US: u32 = 1_000_000;

/// TXPAUSE value that stops every queue
const TXPAUSE_ALL: u8 = 0xff;

/// Phase of the power tracking state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackPhase {
    /// Next tick starts a thermal conversion
    Armed,
    /// A conversion is running; next tick reads it
    Sampled,
    /// The thermal meter is not usable; ticks do nothing
    Disabled,
}

/// Compensation beyond the range of the swing tables, per rate family
///
/// Folded into the TX power index by [`Platform::set_tx_power_level`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxAgcRemnant {
    /// Remnant of the OFDM swing index
    pub ofdm: i8,
    /// Remnant of the CCK swing index
    pub cck: i8,
}

/// Exponentially weighted moving average of thermal codes
///
/// Fixed point with 10 fractional bits; each new sample weighs 1/4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalAverage {
    internal: u32,
}

impl ThermalAverage {
    /// Add a sample
    pub fn add(&mut self, sample: u8) {
        let scaled = u32::from(sample) << EWMA_PRECISION;
        self.internal = if self.internal == 0 {
            scaled
        } else {
            ((self.internal << EWMA_WEIGHT_SHIFT) - self.internal + scaled) >> EWMA_WEIGHT_SHIFT
        };
    }

    /// Current average, truncated to whole thermal codes
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn value(&self) -> u8 {
        (self.internal >> EWMA_PRECISION) as u8
    }

    /// Forget every sample
    pub fn reset(&mut self) {
        self.internal = 0;
    }
}

/// Long-lived power tracking state of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerTrackState {
    /// Baseline OFDM swing index that deltas are applied to
    pub default_ofdm_index: u8,
    /// Baseline CCK swing index that deltas are applied to
    pub default_cck_index: u8,
    /// Per-path thermal moving average
    pub thermal_avg: [ThermalAverage; MAX_RF_PATHS],
    /// Per-path delta index currently applied
    pub delta_power_index: [i8; MAX_RF_PATHS],
    /// Per-path remnant handed to the host
    pub remnant: [TxAgcRemnant; MAX_RF_PATHS],
    /// State machine phase
    pub phase: TrackPhase,
    /// Forces compensation on the first pass after init
    pub init_trigger: bool,
    /// Average at the last recalibration
    pub iqk_anchor: u8,
    /// Thermal code the default indices belong to; deltas are measured from it
    pub thermal_reference: u8,
    /// Raw sample compensation was last computed from
    pub last_thermal: u8,
}

impl PowerTrackState {
    /// Fresh state anchored at the efuse thermal reference
    #[must_use]
    pub fn new(thermal_meter_k: u8) -> Self {
        Self {
            default_ofdm_index: DEFAULT_OFDM_INDEX,
            default_cck_index: DEFAULT_CCK_INDEX,
            thermal_avg: [ThermalAverage::default(); MAX_RF_PATHS],
            delta_power_index: [0; MAX_RF_PATHS],
            remnant: [TxAgcRemnant::default(); MAX_RF_PATHS],
            phase: TrackPhase::Armed,
            init_trigger: true,
            iqk_anchor: thermal_meter_k,
            thermal_reference: thermal_meter_k,
            last_thermal: thermal_meter_k,
        }
    }

    /// Thermal average of `path`
    #[must_use]
    pub const fn average(&self, path: RfPath) -> u8 {
        self.thermal_avg[path.index()].value()
    }
}

/// Summary of a sampling pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PassReport {
    /// Raw thermal code read
    pub thermal: u8,
    /// Moving average after adding `thermal`
    pub average: u8,
    /// Whether the compensation step ran
    pub compensated: bool,
    /// Outcome of the recalibration, `None` if none was needed
    pub iqk_applied: Option<bool>,
}

/// What a call to [`Rtw8723bRfk::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// A thermal conversion was started
    Armed,
    /// The sample was processed
    Sampled(PassReport),
    /// Power tracking is disabled for this device
    Disabled,
}

impl<I, P> Rtw8723bRfk<I, P>
where
    I: RegisterInterface<AddressType = u16> + RfInterface<Error = BusError<I>>,
    P: Platform,
{
    /// Reset power tracking and read the baseline swing indices back from hardware
    ///
    /// Call after the baseband tables have been loaded and after every full
    /// reinitialization of the radio.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn init_power_tracking(&mut self) -> Result<(), Error<BusError<I>>> {
        self.pwr_track = PowerTrackState::new(self.config.thermal_meter_k);
        self.resync_default_indices()?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "[PT] init: ofdm index {} cck index {}",
            self.pwr_track.default_ofdm_index,
            self.pwr_track.default_cck_index
        );
        Ok(())
    }

    /// Advance the power tracking state machine by one step
    ///
    /// Meant to be called from a periodic maintenance timer (about every two
    /// seconds); the period doubles as the thermal meter settle time.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails. The state
    /// machine is re-armed in that case.
    pub fn tick<D>(&mut self, delay: &mut D) -> Result<TickOutcome, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        if self.pwr_track.phase == TrackPhase::Disabled {
            return Ok(TickOutcome::Disabled);
        }
        if self.config.thermal_meter_k == THERMAL_METER_UNSUPPORTED
            || self.config.power_track_type != 0
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("[PT] thermal meter not usable, power tracking disabled");
            self.pwr_track.phase = TrackPhase::Disabled;
            return Ok(TickOutcome::Disabled);
        }

        match self.pwr_track.phase {
            TrackPhase::Armed => {
                self.write_rf(RfPath::A, rf::T_METER, rf::T_METER_TRIGGER, T_METER_START)?;
                self.pwr_track.phase = TrackPhase::Sampled;
                Ok(TickOutcome::Armed)
            }
            TrackPhase::Sampled => {
                self.pwr_track.phase = TrackPhase::Armed;
                Ok(TickOutcome::Sampled(self.pwr_track_pass(delay)?))
            }
            TrackPhase::Disabled => Ok(TickOutcome::Disabled),
        }
    }

    /// Process one thermal sample
    fn pwr_track_pass<D>(&mut self, delay: &mut D) -> Result<PassReport, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        #[allow(clippy::cast_possible_truncation)]
        let thermal = self.read_rf(RfPath::A, rf::T_METER, rf::T_METER_VALUE)? as u8;
        let avg = &mut self.pwr_track.thermal_avg[RfPath::A.index()];
        avg.add(thermal);
        let average = avg.value();

        let init_pass = self.pwr_track.init_trigger;
        let need_iqk = !init_pass
            && average.abs_diff(self.pwr_track.iqk_anchor) >= self.config.iqk_threshold;
        if need_iqk {
            self.pwr_track.iqk_anchor = average;
        }

        let compensate = init_pass
            || thermal.abs_diff(self.pwr_track.last_thermal) > self.config.thermal_change_threshold;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "[PT] thermal {} avg {} last {} need_iqk {}",
            thermal,
            average,
            self.pwr_track.last_thermal,
            need_iqk
        );

        if compensate {
            self.pwr_track.init_trigger = false;
            let raw_delta = i16::from(thermal) - i16::from(self.pwr_track.thermal_reference);
            self.pwr_track.last_thermal = thermal;
            self.pwr_track_compensate(raw_delta, init_pass)?;
        }

        let mut iqk_applied = None;
        if need_iqk {
            self.lc_calibrate(delay)?;
            iqk_applied = Some(self.calibrate(delay)?.applied);
            self.resync_default_indices()?;
            self.rebase_thermal_reference();
        }

        Ok(PassReport {
            thermal,
            average,
            compensated: compensate,
            iqk_applied,
        })
    }

    /// Apply the swing delta for `raw_delta` to every driven path
    fn pwr_track_compensate(
        &mut self,
        raw_delta: i16,
        force: bool,
    ) -> Result<(), Error<BusError<I>>> {
        let family = if self.platform.tx_rate_is_cck() {
            RateFamily::Cck
        } else {
            RateFamily::Ofdm
        };
        let delta = thermal_delta_index(family, raw_delta);
        let channel = self.platform.current_channel();

        for path in self.active_paths() {
            if !force && self.pwr_track.delta_power_index[path.index()] == delta {
                continue;
            }

            let ofdm = SwingIndex::ofdm(i16::from(self.pwr_track.default_ofdm_index) + i16::from(delta));
            let cck = SwingIndex::cck(i16::from(self.pwr_track.default_cck_index) + i16::from(delta));

            #[cfg(feature = "defmt")]
            defmt::debug!(
                "[PT] path {}: delta {} ofdm {} cck {}",
                path,
                delta,
                ofdm,
                cck
            );

            self.set_iqk_matrix(path, ofdm.index)?;
            self.set_cck_swing(cck.index)?;

            let remnant = TxAgcRemnant {
                ofdm: ofdm.remnant,
                cck: cck.remnant,
            };
            self.pwr_track.delta_power_index[path.index()] = delta;
            self.pwr_track.remnant[path.index()] = remnant;
            self.platform.set_tx_power_level(channel, path, remnant);
        }
        Ok(())
    }

    /// Program OFDM swing `index` into the TX imbalance register of `path`
    ///
    /// After a successful calibration the swing is combined with the stored TX
    /// correction; before that the raw table value is written.
    pub(crate) fn set_iqk_matrix(&mut self, path: RfPath, index: u8) -> Result<(), Error<BusError<I>>> {
        let index = usize::from(index).min(OFDM_SWING_TABLE.len() - 1);
        let swing = OFDM_SWING_TABLE[index];

        let (value, c_high, ext) = if self.iqk.done {
            let correction = self.iqk.tx_correction(path);
            #[allow(clippy::cast_possible_wrap)]
            let ele_d = (swing >> 22) as i32;
            let (ele_a, ext) = iqk_mult(i32::from(correction.x), ele_d);
            let (ele_c, _) = iqk_mult(i32::from(correction.y), ele_d);
            let (a, c_low, c_high) = split_matrix(ele_a, ele_c);
            let value = (swing & 0xffc0_0000) | (u32::from(c_low) << 16) | u32::from(a);
            (value, c_high, ext)
        } else {
            (swing, 0, false)
        };

        self.write32(addr::TX_IQ_IMBALANCE[path.index()], value)?;
        match path {
            RfPath::A => {
                self.device
                    .tx_iqk_c_high_a()
                    .modify(|w| w.set_ele_c_high(c_high))?;
                self.device
                    .ofdm_ecca_threshold()
                    .modify(|w| w.set_swing_ext_a(ext))?;
            }
            RfPath::B => {
                self.device
                    .tx_iqk_c_high_b()
                    .modify(|w| w.set_ele_c_high(c_high))?;
                self.device
                    .ofdm_ecca_threshold()
                    .modify(|w| w.set_swing_ext_b(ext))?;
            }
        }
        Ok(())
    }

    /// Program CCK swing `index` into the CCK TX filter
    pub(crate) fn set_cck_swing(&mut self, index: u8) -> Result<(), Error<BusError<I>>> {
        let index = usize::from(index).min(CCK_SWING_TABLE_CH1_CH13.len() - 1);
        for (address, coefficient) in addr::CCK_SWING
            .into_iter()
            .zip(CCK_SWING_TABLE_CH1_CH13[index])
        {
            self.write8(address, coefficient)?;
        }
        Ok(())
    }

    /// Read the swing indices currently in hardware back into the tracking state
    fn resync_default_indices(&mut self) -> Result<(), Error<BusError<I>>> {
        let ele_d = self.device.tx_iq_imbalance_a().read()?.ele_d();
        let coefficient = self.read8(addr::CCK_SWING[0])?;
        self.pwr_track.default_ofdm_index = ofdm_index_for_swing(ele_d);
        self.pwr_track.default_cck_index = cck_index_for_coefficient(coefficient);
        Ok(())
    }

    /// Make the resynchronized defaults the new zero point
    ///
    /// The swing left in hardware was computed from `last_thermal`, so that
    /// sample becomes the reference and every path's applied delta is zero.
    fn rebase_thermal_reference(&mut self) {
        self.pwr_track.thermal_reference = self.pwr_track.last_thermal;
        self.pwr_track.delta_power_index = [0; MAX_RF_PATHS];
    }

    /// Run an LC tank calibration of the synthesizer
    ///
    /// TX is paused for the duration. Returns `false` if the calibration did not
    /// finish within one second.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn lc_calibrate<D>(&mut self, delay: &mut D) -> Result<bool, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        let ctx = self.read8(addr::CTX)?;
        let continuous_tx = ctx & addr::CTX_TYPE_MASK != 0;
        let txpause = self.read8(addr::TXPAUSE)?;
        if continuous_tx {
            self.write8(addr::CTX, ctx & !addr::CTX_TYPE_MASK)?;
        } else {
            self.write8(addr::TXPAUSE, TXPAUSE_ALL)?;
        }

        let cfgch = self.read_rf(RfPath::A, rf::CFGCH, rf::MASK)?;
        self.write_rf(RfPath::A, rf::CFGCH, rf::MASK, cfgch | rf::LCK_BIT)?;
        let done = self.poll_rf(
            RfPath::A,
            rf::CFGCH,
            rf::LCK_BIT,
            0,
            LCK_POLL_INTERVAL_US,
            LCK_POLL_TIMEOUT_US,
            delay,
        )?;
        if !done {
            #[cfg(feature = "defmt")]
            defmt::warn!("[LCK] calibration timed out");
        }
        self.write_rf(RfPath::A, rf::CFGCH, rf::MASK, cfgch)?;

        if continuous_tx {
            self.write8(addr::CTX, ctx)?;
        } else {
            self.write8(addr::TXPAUSE, txpause)?;
        }
        Ok(done)
    }
}
