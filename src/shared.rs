//! Per-device calibration lock
//!
//! IQK, power tracking, TX power reapplication and channel switching all touch
//! the antenna selector and the TX imbalance registers. [`SharedRfk`] serializes
//! them: every context that needs the core goes through [`SharedRfk::lock`].

use core::cell::RefCell;

use device_driver::RegisterInterface;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;

use crate::calibration::CalibrationOutcome;
use crate::device::{BusError, Rtw8723bRfk};
use crate::interface::{Platform, RfInterface};
use crate::power_track::TickOutcome;
use crate::Error;

/// Calibration core behind a blocking mutex
///
/// Use `CriticalSectionRawMutex` when the core is shared with interrupt
/// context, `NoopRawMutex` when all users run on one executor.
///
/// # Example
///
/// ```ignore
/// static RFK: StaticCell<SharedRfk<CriticalSectionRawMutex, Bus, Host>> = StaticCell::new();
/// let rfk = RFK.init(SharedRfk::new(Rtw8723bRfk::new(bus, host, config)?));
///
/// // maintenance timer
/// rfk.tick(&mut delay)?;
///
/// // channel switch
/// rfk.lock(|core| core.platform_mut().switch_channel(6));
/// ```
pub struct SharedRfk<M: RawMutex, I, P> {
    inner: Mutex<M, RefCell<Rtw8723bRfk<I, P>>>,
}

impl<M, I, P> SharedRfk<M, I, P>
where
    M: RawMutex,
    I: RegisterInterface<AddressType = u16> + RfInterface<Error = BusError<I>>,
    P: Platform,
{
    /// Wrap a calibration core
    pub fn new(rfk: Rtw8723bRfk<I, P>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(rfk)),
        }
    }

    /// Run `f` with exclusive access to the core
    ///
    /// # Panics
    ///
    /// Panics if called again from inside `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Rtw8723bRfk<I, P>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Run an IQ calibration under the lock
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn calibrate<D>(&self, delay: &mut D) -> Result<CalibrationOutcome, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        self.lock(|rfk| rfk.calibrate(delay))
    }

    /// Advance power tracking under the lock
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn tick<D>(&self, delay: &mut D) -> Result<TickOutcome, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        self.lock(|rfk| rfk.tick(delay))
    }

    /// Unwrap the calibration core
    pub fn into_inner(self) -> Rtw8723bRfk<I, P> {
        self.inner.into_inner().into_inner()
    }
}
