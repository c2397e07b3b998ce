//! Calibration core driver
//!
//! [`Rtw8723bRfk`] owns the bus interface, the host hooks and the long-lived
//! calibration and power tracking state. IQ calibration lives in `iqk`, power
//! tracking in [`crate::power_track`]; this module provides construction and the
//! raw and masked register helpers both build on.

use device_driver::RegisterInterface;

use crate::calibration::CalibrationState;
use crate::config::RfkConfig;
use crate::interface::{Platform, RfInterface};
use crate::power_track::PowerTrackState;
use crate::registers::{rf, Rtw8723bBb as RegisterDevice};
use crate::{Error, RfPath};

/// Bus error type shared by the control space and the RF register file
pub type BusError<I> = <I as RegisterInterface>::Error;

/// Calibration core for one RTL8723B
///
/// All operations take `&mut self`; wrap the driver in [`crate::SharedRfk`] when
/// several contexts (maintenance timer, channel switch, user request) need it.
pub struct Rtw8723bRfk<I, P> {
    pub(crate) device: RegisterDevice<I>,
    pub(crate) platform: P,
    pub(crate) config: RfkConfig,
    pub(crate) iqk: CalibrationState,
    pub(crate) pwr_track: PowerTrackState,
}

impl<I, P> Rtw8723bRfk<I, P>
where
    I: RegisterInterface<AddressType = u16> + RfInterface<Error = BusError<I>>,
    P: Platform,
{
    /// Create a new calibration core
    ///
    /// No register is touched. Call [`init_power_tracking`](Self::init_power_tracking)
    /// once the baseband tables are loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = RfkConfig::with_thermal_meter(efuse.thermal_meter);
    /// let mut rfk = Rtw8723bRfk::new(bus, host, config)?;
    /// rfk.init_power_tracking()?;
    /// ```
    pub fn new(interface: I, platform: P, config: RfkConfig) -> Result<Self, Error<BusError<I>>> {
        config.validate::<BusError<I>>()?;

        Ok(Self {
            device: RegisterDevice::new(interface),
            platform,
            config,
            iqk: CalibrationState::default(),
            pwr_track: PowerTrackState::new(config.thermal_meter_k),
        })
    }

    /// Active configuration
    pub const fn config(&self) -> &RfkConfig {
        &self.config
    }

    /// IQ calibration state
    pub const fn calibration_state(&self) -> &CalibrationState {
        &self.iqk
    }

    /// Power tracking state
    pub const fn power_track_state(&self) -> &PowerTrackState {
        &self.pwr_track
    }

    /// Host hooks
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Host hooks, mutably
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Consume the driver and return the interface and host hooks
    pub fn release(self) -> (I, P) {
        (self.device.interface, self.platform)
    }

    /// Get a reference to the underlying register device (for advanced usage)
    pub const fn device(&self) -> &RegisterDevice<I> {
        &self.device
    }

    /// RF paths the chip drives, in calibration order
    pub(crate) fn active_paths(&self) -> impl Iterator<Item = RfPath> {
        RfPath::ALL
            .into_iter()
            .take(usize::from(self.config.rf_path_count))
    }

    // ==================== Control space ====================

    pub(crate) fn read8(&mut self, address: u16) -> Result<u8, Error<BusError<I>>> {
        let mut buffer = [0u8; 1];
        self.device.interface.read_register(address, 8, &mut buffer)?;
        Ok(buffer[0])
    }

    pub(crate) fn write8(&mut self, address: u16, value: u8) -> Result<(), Error<BusError<I>>> {
        self.device.interface.write_register(address, 8, &[value])?;
        Ok(())
    }

    pub(crate) fn read32(&mut self, address: u16) -> Result<u32, Error<BusError<I>>> {
        let mut buffer = [0u8; 4];
        self.device
            .interface
            .read_register(address, 32, &mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    pub(crate) fn write32(&mut self, address: u16, value: u32) -> Result<(), Error<BusError<I>>> {
        self.device
            .interface
            .write_register(address, 32, &value.to_le_bytes())?;
        Ok(())
    }

    /// Read `mask` of a 32-bit register, shifted down to bit 0
    pub(crate) fn read32_mask(&mut self, address: u16, mask: u32) -> Result<u32, Error<BusError<I>>> {
        Ok(field_get(mask, self.read32(address)?))
    }

    /// Read-modify-write `mask` of a 32-bit register
    pub(crate) fn write32_mask(
        &mut self,
        address: u16,
        mask: u32,
        value: u32,
    ) -> Result<(), Error<BusError<I>>> {
        if mask == u32::MAX {
            return self.write32(address, value);
        }
        let current = self.read32(address)?;
        self.write32(address, field_set(mask, current, value))
    }

    // ==================== RF register file ====================

    pub(crate) fn read_rf(
        &mut self,
        path: RfPath,
        address: u8,
        mask: u32,
    ) -> Result<u32, Error<BusError<I>>> {
        let value = self.device.interface.read_rf(path, address)?;
        Ok(field_get(mask, value & rf::MASK))
    }

    pub(crate) fn write_rf(
        &mut self,
        path: RfPath,
        address: u8,
        mask: u32,
        value: u32,
    ) -> Result<(), Error<BusError<I>>> {
        let data = if mask == rf::MASK {
            value & rf::MASK
        } else {
            let current = self.device.interface.read_rf(path, address)? & rf::MASK;
            field_set(mask, current, value) & rf::MASK
        };
        self.device.interface.write_rf(path, address, data)?;
        Ok(())
    }

    // ==================== Polling ====================

    /// Poll `mask` of a 32-bit register until it equals `expected`
    ///
    /// Returns `false` on timeout.
    pub(crate) fn poll32<D>(
        &mut self,
        address: u16,
        mask: u32,
        expected: u32,
        interval_us: u32,
        timeout_us: u32,
        delay: &mut D,
    ) -> Result<bool, Error<BusError<I>>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        let mut waited = 0;
        loop {
            if self.read32_mask(address, mask)? == expected {
                return Ok(true);
            }
            if waited >= timeout_us {
                return Ok(false);
            }
            delay.delay_us(interval_us);
            waited += interval_us.max(1);
        }
    }

    /// Poll `mask` of an RF register until it equals `expected`
    ///
    /// Returns `false` on timeout.
    pub(crate) fn poll_rf<D>(
        &mut self,
        path: RfPath,
        address: u8,
        mask: u32,
        expected: u32,
        interval_us: u32,
        timeout_us: u32,
        delay: &mut D,
    ) -> Result<bool, Error<BusError<I>>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        let mut waited = 0;
        loop {
            if self.read_rf(path, address, mask)? == expected {
                return Ok(true);
            }
            if waited >= timeout_us {
                return Ok(false);
            }
            delay.delay_us(interval_us);
            waited += interval_us.max(1);
        }
    }
}

/// Extract `mask` from `value`, shifted down to bit 0
#[must_use]
pub const fn field_get(mask: u32, value: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    (value & mask) >> mask.trailing_zeros()
}

/// Replace `mask` in `current` with `value` shifted up into place
#[must_use]
pub const fn field_set(mask: u32, current: u32, value: u32) -> u32 {
    if mask == 0 {
        return current;
    }
    (current & !mask) | ((value << mask.trailing_zeros()) & mask)
}
