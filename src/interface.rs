//! Bus and host interfaces consumed by the calibration core
//!
//! The control space (MAC and baseband registers) is reached through
//! [`device_driver::RegisterInterface`] with 16-bit addresses. This module adds
//! the two things `device-driver` has no notion of: the indirect RF register
//! file behind each RF path, and the host hooks the power tracking loop has to
//! call back into.

use crate::power_track::TxAgcRemnant;
use crate::RfPath;

/// Host controller interface the chip is attached through
///
/// A few values written during IQK depend on the bus kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HciType {
    /// USB attached (RTL8723BU)
    Usb,
    /// SDIO attached (RTL8723BS)
    Sdio,
    /// PCIe attached (RTL8723BE)
    Pcie,
}

/// Access to the RF front-end register file
///
/// RF registers hold 20-bit values and are addressed per path through a serial
/// sub-protocol of the host bus. Implementations only move whole values; the
/// driver builds masked access on top.
///
/// # Example
/// ```ignore
/// impl RfInterface for SdioBus {
///     type Error = SdioError;
///
///     fn read_rf(&mut self, path: RfPath, address: u8) -> Result<u32, Self::Error> {
///         self.lssi_read(path.index(), address)
///     }
///
///     fn write_rf(&mut self, path: RfPath, address: u8, data: u32) -> Result<(), Self::Error> {
///         self.lssi_write(path.index(), address, data)
///     }
/// }
/// ```
pub trait RfInterface {
    /// Bus error type; must match the control space error type
    type Error;

    /// Read the full 20-bit value of RF register `address` on `path`
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transfer fails.
    fn read_rf(&mut self, path: RfPath, address: u8) -> Result<u32, Self::Error>;

    /// Write the full 20-bit value of RF register `address` on `path`
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transfer fails.
    fn write_rf(&mut self, path: RfPath, address: u8, data: u32) -> Result<(), Self::Error>;
}

/// Hooks into the surrounding Wi-Fi driver
///
/// Power tracking only adjusts the baseband swing; the remnant that does not fit
/// into the swing tables has to be folded into the TX power index by the host.
pub trait Platform {
    /// Bus kind the chip is attached through
    fn hci_type(&self) -> HciType;

    /// Channel the radio is currently tuned to
    fn current_channel(&self) -> u8;

    /// Reapply the TX power table for `channel`, taking `remnant` into account
    ///
    /// Called after power tracking changed the swing of `path`.
    fn set_tx_power_level(&mut self, channel: u8, path: RfPath, remnant: TxAgcRemnant);

    /// Whether the current TX rate is a CCK rate
    ///
    /// Selects the CCK thermal delta tables instead of the OFDM ones.
    fn tx_rate_is_cck(&self) -> bool {
        false
    }
}
