//! IQ imbalance calibration sequence
//!
//! Measures the TX and RX correlators of every driven path in up to three
//! rounds, restores the baseline between rounds, votes on the rounds and
//! programs the correction matrices of the winner.

use device_driver::RegisterInterface;
use embedded_hal::delay::DelayNs;

use crate::calibration::{
    canonicalize, iqk_mult, retry_measurement, CalibrationOutcome, CalibrationRound,
    CandidateSelector, Correlation, PathReadings, Reading, IQK_ROUNDS,
};
use crate::device::{BusError, Rtw8723bRfk};
use crate::interface::{HciType, Platform, RfInterface};
use crate::registers::{addr, rf};
use crate::{Error, RfPath, MAX_RF_PATHS};

/// Value written to every ADDA register while calibrating
const ADDA_ON: u32 = 0x01c0_0014;

/// FPGA0_IQK mode field value that enables the IQK engine
const IQK_MODE_ENTER: u32 = 0x80_8000;

/// One-shot trigger sequence for `IQK_AGC_PTS`
const ONE_SHOT_START: u32 = 0xf900_0000;
const ONE_SHOT_END: u32 = 0xf800_0000;

/// GNT_BT values: WLAN owns the antenna during a shot, BT afterwards
const GNT_BT_LOW: u32 = 0x0000_0800;
const GNT_BT_HIGH: u32 = 0x0000_1800;

/// Idle value of the TX/RX IQK tone registers
const IQC_TONE_DEFAULT: u32 = 0x0100_8c00;

/// RX initial gain written before restoring the saved value
const IGI_BASELINE: u8 = 0x50;

/// BTG_SEL bit that hands the shared antenna path to WLAN
const BTG_SEL_WLAN: u8 = 1 << 5;

// Hardware error patterns and RX plausibility window
const TX_X_ERR: u16 = 0x142;
const TX_Y_ERR: u16 = 0x042;
const RX_X_ERR: u16 = 0x132;
const RX_Y_ERR: u16 = 0x036;
const RX_X_LOWER: u16 = 0x0e6;
const RX_X_UPPER: u16 = 0x11a;
const RX_Y_LIMIT: u16 = 0x01a;

/// Completion poll after the settle delay
const RESULT_POLL_INTERVAL_US: u32 = 100;
const RESULT_POLL_TIMEOUT_US: u32 = 1_000;

/// Result-ready flag of `IQK_RES_RY`
const RESULT_READY: u32 = 1 << 26;

/// Registers saved before calibrating and restored afterwards
struct IqkBackup {
    adda: [u32; addr::IQK_ADDA.len()],
    mac8: [u8; addr::IQK_MAC8.len()],
    mac32: [u32; addr::IQK_MAC32.len()],
    bb: [u32; addr::IQK_BB.len()],
    igi: [u8; MAX_RF_PATHS],
    bb_sel_btg: u32,
    btg_sel: u8,
    bt_control: u32,
}

impl<I, P> Rtw8723bRfk<I, P>
where
    I: RegisterInterface<AddressType = u16> + RfInterface<Error = BusError<I>>,
    P: Platform,
{
    /// Run a full IQ imbalance calibration
    ///
    /// Takes tens of milliseconds per round: every one-shot is followed by the
    /// configured settle delay. A calibration where no two rounds agree and the
    /// hybrid round is empty leaves the previous correction in place and is
    /// reported through [`CalibrationOutcome::applied`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails. The register
    /// state is not restored in that case.
    pub fn calibrate<D>(&mut self, delay: &mut D) -> Result<CalibrationOutcome, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        #[cfg(feature = "defmt")]
        defmt::debug!("[IQK] start");

        let backup = self.iqk_backup()?;
        let mut selector = CandidateSelector::new();

        for _round in 0..IQK_ROUNDS {
            self.iqk_config_path_ctrl(&backup)?;
            let result = self.iqk_one_round(&backup, delay)?;
            self.iqk_restore_round(&backup)?;

            if let Some(_candidate) = selector.push(result) {
                #[cfg(feature = "defmt")]
                defmt::debug!("[IQK] round {} agrees, final candidate {}", _round, _candidate);
                break;
            }
        }

        let (final_candidate, rounds, hybrid) = selector.finish();
        let mut outcome = CalibrationOutcome {
            applied: false,
            final_candidate,
            rounds,
            hybrid,
        };

        if let Some(selected) = outcome.selected().copied() {
            for path in self.active_paths() {
                self.iqk_fill_matrix(path, selected.path(path))?;
            }
            for path in RfPath::ALL {
                // A candidate without TX leaves the TX matrix as it was
                if let Some(tx) = selected.path(path).tx.filter(|r| r.is_valid()) {
                    self.iqk.tx[path.index()] = tx;
                }
            }
            self.iqk.done = true;
            outcome.applied = true;
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("[IQK] calibration failed, keeping previous correction");
        }

        self.write32(addr::BB_SEL_BTG, backup.bb_sel_btg)?;
        self.write32(addr::BT_CONTROL, backup.bt_control)?;
        self.iqk_restore_rx_mode()?;

        #[cfg(feature = "defmt")]
        defmt::debug!("[IQK] finished, final candidate {}", outcome.final_candidate);

        Ok(outcome)
    }

    fn iqk_backup(&mut self) -> Result<IqkBackup, Error<BusError<I>>> {
        let mut backup = IqkBackup {
            adda: [0; addr::IQK_ADDA.len()],
            mac8: [0; addr::IQK_MAC8.len()],
            mac32: [0; addr::IQK_MAC32.len()],
            bb: [0; addr::IQK_BB.len()],
            igi: [0; MAX_RF_PATHS],
            bb_sel_btg: 0,
            btg_sel: 0,
            bt_control: 0,
        };

        for (value, &reg) in backup.adda.iter_mut().zip(addr::IQK_ADDA.iter()) {
            *value = self.read32(reg)?;
        }
        for (value, &reg) in backup.mac8.iter_mut().zip(addr::IQK_MAC8.iter()) {
            *value = self.read8(reg)?;
        }
        for (value, &reg) in backup.mac32.iter_mut().zip(addr::IQK_MAC32.iter()) {
            *value = self.read32(reg)?;
        }
        for (value, &reg) in backup.bb.iter_mut().zip(addr::IQK_BB.iter()) {
            *value = self.read32(reg)?;
        }

        backup.igi[RfPath::A.index()] = self.read8(addr::OFDM0_XA_AGC1)?;
        backup.igi[RfPath::B.index()] = self.read8(addr::OFDM0_XB_AGC1)?;
        backup.bb_sel_btg = self.read32(addr::BB_SEL_BTG)?;
        backup.btg_sel = self.read8(addr::BTG_SEL)?;
        backup.bt_control = self.read32(addr::BT_CONTROL)?;

        Ok(backup)
    }

    fn iqk_config_path_ctrl(&mut self, backup: &IqkBackup) -> Result<(), Error<BusError<I>>> {
        self.write8(addr::BTG_SEL, backup.btg_sel | BTG_SEL_WLAN)
    }

    fn iqk_config_mac(&mut self, backup: &IqkBackup) -> Result<(), Error<BusError<I>>> {
        self.write8(addr::IQK_MAC8[0], 0x3f)?;
        for (&reg, &value) in addr::IQK_MAC8.iter().zip(backup.mac8.iter()).skip(1) {
            self.write8(reg, value & !(1 << 3))?;
        }
        // Only the low byte of the 32-bit MAC register is touched
        let [low, ..] = backup.mac32[0].to_le_bytes();
        self.write8(addr::IQK_MAC32[0], low & !(1 << 5))
    }

    /// Put back everything a round perturbed
    fn iqk_restore_round(&mut self, backup: &IqkBackup) -> Result<(), Error<BusError<I>>> {
        for (&reg, &value) in addr::IQK_ADDA.iter().zip(backup.adda.iter()) {
            self.write32(reg, value)?;
        }
        for (&reg, &value) in addr::IQK_MAC8.iter().zip(backup.mac8.iter()) {
            self.write8(reg, value)?;
        }
        for (&reg, &value) in addr::IQK_MAC32.iter().zip(backup.mac32.iter()) {
            self.write32(reg, value)?;
        }
        for (&reg, &value) in addr::IQK_BB.iter().zip(backup.bb.iter()) {
            self.write32(reg, value)?;
        }

        for path in self.active_paths() {
            let reg = match path {
                RfPath::A => addr::OFDM0_XA_AGC1,
                RfPath::B => addr::OFDM0_XB_AGC1,
            };
            self.write32_mask(reg, 0xff, u32::from(IGI_BASELINE))?;
            self.write32_mask(reg, 0xff, u32::from(backup.igi[path.index()]))?;
        }

        self.write32(addr::TXIQK_TONE_A, IQC_TONE_DEFAULT)?;
        self.write32(addr::RXIQK_TONE_A, IQC_TONE_DEFAULT)?;

        self.write8(addr::BTG_SEL, backup.btg_sel)
    }

    /// Restore the RX mode table parameters of the RF front end
    fn iqk_restore_rx_mode(&mut self) -> Result<(), Error<BusError<I>>> {
        for path in self.active_paths() {
            self.write_rf(path, rf::LUTWE, 0x80000, 0x1)?;
            self.write_rf(path, rf::RCK_OS, rf::MASK, 0x18000)?;
            self.write_rf(path, rf::TXPA_G1, rf::MASK, 0x0001f)?;
            self.write_rf(path, rf::TXPA_G2, rf::MASK, 0xe6177)?;
            self.write_rf(path, rf::LUTWE2, 0x20, 0x1)?;
            self.write_rf(path, rf::RXIQK_GAIN, rf::MASK, 0x300bd)?;
        }
        Ok(())
    }

    fn iqk_one_round<D>(
        &mut self,
        backup: &IqkBackup,
        delay: &mut D,
    ) -> Result<CalibrationRound, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        for reg in addr::IQK_ADDA {
            self.write32(reg, ADDA_ON)?;
        }
        self.iqk_config_mac(backup)?;

        self.write32_mask(addr::CCK_ANT_SEL, 0x0f00_0000, 0xf)?;
        self.write32(addr::BB_RX_PATH, 0x03a0_5600)?;
        self.write32(addr::TRMUX, 0x0008_00e4)?;
        self.write32(addr::BB_PWR_SAV1, 0x2220_4000)?;

        let retries = self.config.iqk_retry;
        let mut round = CalibrationRound::default();

        for path in self.active_paths() {
            // RX IQ calibration setting for the D-cut large current issue when leaving IPS
            self.iqk_leave()?;
            self.write_rf(path, rf::LUTWE, 0x80000, 0x1)?;
            self.write_rf(path, rf::RCK_OS, rf::MASK, 0x30000)?;
            self.write_rf(path, rf::TXPA_G1, rf::MASK, 0x0001f)?;
            self.write_rf(path, rf::TXPA_G2, rf::MASK, 0xf7fb7)?;
            self.write_rf(path, rf::LUTWE2, 0x20, 0x1)?;
            self.write_rf(path, rf::RXIQK_GAIN, rf::MASK, 0x60fbd)?;

            let tx = retry_measurement(retries, |_| self.iqk_tx_attempt(path, delay))?;

            let rx = if tx.is_valid() {
                self.iqk_leave()?;
                retry_measurement(retries, |_| self.iqk_rx_attempt(path, delay))?
            } else {
                #[cfg(feature = "defmt")]
                defmt::debug!("[IQK] path {} TX failed, RX skipped", path);
                Reading::Failed
            };

            round.paths[path.index()] = PathReadings::measured(tx, rx);
        }

        self.iqk_leave()?;
        Ok(round)
    }

    fn iqk_enter(&mut self) -> Result<(), Error<BusError<I>>> {
        self.device.fpga_iqk().modify(|w| w.set_iqk_mode(IQK_MODE_ENTER))?;
        Ok(())
    }

    fn iqk_leave(&mut self) -> Result<(), Error<BusError<I>>> {
        self.device.fpga_iqk().modify(|w| w.set_iqk_mode(0))?;
        Ok(())
    }

    /// Tone, PI and LO settings of one measurement
    fn iqk_load_program(
        &mut self,
        tones: [u32; 4],
        pi: [u32; 4],
        agc_rsp: u32,
    ) -> Result<(), Error<BusError<I>>> {
        let tone_regs = [
            addr::TXIQK_TONE_A,
            addr::RXIQK_TONE_A,
            addr::TX_IQK_TONE_B,
            addr::RX_IQK_TONE_B,
        ];
        let pi_regs = [
            addr::TXIQK_PI_A,
            addr::RXIQK_PI_A,
            addr::TXIQK_PI_B,
            addr::RXIQK_PI_B,
        ];

        for (reg, value) in tone_regs.into_iter().zip(tones) {
            self.write32(reg, value)?;
        }
        for (reg, value) in pi_regs.into_iter().zip(pi) {
            self.write32(reg, value)?;
        }
        self.write32(addr::IQK_AGC_RSP, agc_rsp)
    }

    /// Fire the IQK engine once and wait for the result
    ///
    /// Returns `false` if the result-ready flag never asserted.
    fn iqk_one_shot<D>(&mut self, path_sel: u32, delay: &mut D) -> Result<bool, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        self.iqk_enter()?;

        let ant_sel = match self.platform.hci_type() {
            HciType::Usb => 0x280,
            HciType::Sdio | HciType::Pcie => 0x0,
        };
        self.write32(addr::BB_SEL_BTG, ant_sel)?;
        self.write32(addr::BT_CONTROL, GNT_BT_LOW)?;

        self.write32(addr::IQK_AGC_PTS, ONE_SHOT_START)?;
        self.write32(addr::IQK_AGC_PTS, ONE_SHOT_END)?;

        delay.delay_ms(self.config.iqk_settle_ms);
        let ready = self.poll32(
            addr::IQK_RES_RY,
            RESULT_READY,
            1,
            RESULT_POLL_INTERVAL_US,
            RESULT_POLL_TIMEOUT_US,
            delay,
        )?;

        self.write32(addr::BB_SEL_BTG, path_sel)?;
        self.write32(addr::BT_CONTROL, GNT_BT_HIGH)?;
        self.iqk_leave()?;

        if !ready {
            #[cfg(feature = "defmt")]
            defmt::warn!("[IQK] one-shot result not ready");
        }
        Ok(ready)
    }

    fn iqk_tx_attempt<D>(&mut self, path: RfPath, delay: &mut D) -> Result<Reading, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        let path_sel = self.read32(addr::BB_SEL_BTG)?;
        self.iqk_leave()?;

        // Enable the PA in TX IQK mode
        self.write_rf(path, rf::LUTWE, 0x80000, 0x1)?;
        self.write_rf(path, rf::RCK_OS, rf::MASK, 0x20000)?;
        self.write_rf(path, rf::TXPA_G1, rf::MASK, 0x0003f)?;
        self.write_rf(path, rf::TXPA_G2, rf::MASK, 0xc7f87)?;

        self.write32(addr::TXIQK, 0x0100_7c00)?;
        self.write32(addr::RXIQK, 0x0100_4800)?;
        self.iqk_load_program(
            [0x1800_8c1c, 0x3800_8c1c, 0x3800_8c1c, 0x3800_8c1c],
            [0x8214_03ea, 0x2811_0000, 0x8211_0000, 0x2811_0000],
            0x0046_2911,
        )?;

        if !self.iqk_one_shot(path_sel, delay)? {
            return Ok(Reading::Failed);
        }
        self.iqk_check_tx()
    }

    fn iqk_rx_attempt<D>(&mut self, path: RfPath, delay: &mut D) -> Result<Reading, Error<BusError<I>>>
    where
        D: DelayNs,
    {
        let path_sel = self.read32(addr::BB_SEL_BTG)?;
        self.iqk_leave()?;

        // Step 1: TX measurement under RX configuration
        self.write_rf(path, rf::LUTWE, 0x80000, 0x1)?;
        self.write_rf(path, rf::RCK_OS, rf::MASK, 0x30000)?;
        self.write_rf(path, rf::TXPA_G1, rf::MASK, 0x0001f)?;
        self.write_rf(path, rf::TXPA_G2, rf::MASK, 0xf7fb7)?;

        self.write32(addr::TXIQK, 0x0100_7c00)?;
        self.write32(addr::RXIQK, 0x0100_4800)?;
        self.iqk_load_program(
            [0x1800_8c1c, 0x3800_8c1c, 0x3800_8c1c, 0x3800_8c1c],
            [0x8216_0ff0, 0x2811_0000, 0x8211_0000, 0x2811_0000],
            0x0046_a911,
        )?;

        if !self.iqk_one_shot(path_sel, delay)? || !self.iqk_check_tx()?.is_valid() {
            return Ok(Reading::Failed);
        }

        let res_tx = self.read32(addr::IQK_RES_TX)?;
        let res_ty = self.read32(addr::IQK_RES_TY)?;
        let txiqk = 0x8000_7c00 | (res_tx & 0x03ff_0000) | ((res_ty & 0x03ff_0000) >> 16);
        self.write32(addr::TXIQK, txiqk)?;

        // Step 2: RX measurement
        self.iqk_leave()?;
        self.write_rf(path, rf::LUTWE, 0x80000, 0x1)?;
        self.write_rf(path, rf::RCK_OS, rf::MASK, 0x30000)?;
        self.write_rf(path, rf::TXPA_G1, rf::MASK, 0x0001f)?;
        self.write_rf(path, rf::TXPA_G2, rf::MASK, 0xf7d77)?;
        self.write_rf(path, rf::DBG_PA, rf::MASK, 0xf80)?;
        self.write_rf(path, rf::PAD_TXG, rf::MASK, 0x4021f)?;

        self.write32(addr::RXIQK, 0x0100_4800)?;
        self.iqk_load_program(
            [0x3800_8c1c, 0x1800_8c1c, 0x3800_8c1c, 0x3800_8c1c],
            [0x8211_0000, 0x2816_001f, 0x8211_0000, 0x2811_0000],
            0x0046_a8d1,
        )?;

        let completed = self.iqk_one_shot(path_sel, delay)?;
        self.write_rf(path, rf::DBG_PA, rf::MASK, 0x780)?;

        if !completed {
            return Ok(Reading::Failed);
        }
        self.iqk_check_rx()
    }

    fn iqk_check_tx(&mut self) -> Result<Reading, Error<BusError<I>>> {
        let status = self.device.iqk_res_ry().read()?;
        let x = self.device.iqk_res_tx().read()?.tx_x();
        let y = self.device.iqk_res_ty().read()?.tx_y();

        if !status.tx_fail() && x != TX_X_ERR && y != TX_Y_ERR {
            return Ok(Reading::Valid(Correlation::from_raw(x, y)));
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("[IQK] TX check failed: x={=u16:#x} y={=u16:#x}", x, y);
        Ok(Reading::Failed)
    }

    fn iqk_check_rx(&mut self) -> Result<Reading, Error<BusError<I>>> {
        let status = self.device.iqk_res_ry().read()?;
        let x = self.device.iqk_res_rx().read()?.rx_x();
        let y = status.rx_y();
        let y_abs = canonicalize(y).unsigned_abs();

        if !status.rx_fail()
            && x != RX_X_ERR
            && y_abs != RX_Y_ERR
            && x > RX_X_LOWER
            && x < RX_X_UPPER
            && y_abs < RX_Y_LIMIT
        {
            return Ok(Reading::Valid(Correlation::from_raw(x, y)));
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("[IQK] RX check failed: x={=u16:#x} y={=u16:#x}", x, y);
        Ok(Reading::Failed)
    }

    /// Program the correction matrices of `path` from a selected round
    ///
    /// TX and RX are written independently; a hybrid round may carry only one.
    fn iqk_fill_matrix(
        &mut self,
        path: RfPath,
        readings: &PathReadings,
    ) -> Result<(), Error<BusError<I>>> {
        if let Some(tx) = readings.tx_correlation() {
            self.iqk_fill_tx_matrix(path, tx)?;
        }
        if let Some(rx) = readings.rx_correlation() {
            self.iqk_fill_rx_matrix(path, rx)?;
        }
        Ok(())
    }

    fn iqk_fill_tx_matrix(&mut self, path: RfPath, tx: Correlation) -> Result<(), Error<BusError<I>>> {
        let ele_d = match path {
            RfPath::A => self.device.tx_iq_imbalance_a().read()?.ele_d(),
            RfPath::B => self.device.tx_iq_imbalance_b().read()?.ele_d(),
        };
        let (ele_a, ext_a) = iqk_mult(i32::from(tx.x), i32::from(ele_d));
        let (ele_c, ext_c) = iqk_mult(i32::from(tx.y), i32::from(ele_d));
        let (a, c_low, c_high) = split_matrix(ele_a, ele_c);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "[IQK] path {}: X={} A={:#x} Y={} C={:#x} D={:#x}",
            path,
            tx.x,
            ele_a,
            tx.y,
            ele_c,
            ele_d
        );

        match path {
            RfPath::A => {
                self.device.tx_iq_imbalance_a().modify(|w| {
                    w.set_ele_a(a);
                    w.set_ele_c(c_low);
                })?;
                self.device
                    .tx_iqk_c_high_a()
                    .modify(|w| w.set_ele_c_high(c_high))?;
                self.device.ofdm_ecca_threshold().modify(|w| {
                    w.set_ext_a_path_a(ext_a);
                    w.set_ext_c_path_a(ext_c);
                })?;
            }
            RfPath::B => {
                self.device.tx_iq_imbalance_b().modify(|w| {
                    w.set_ele_a(a);
                    w.set_ele_c(c_low);
                })?;
                self.device
                    .tx_iqk_c_high_b()
                    .modify(|w| w.set_ele_c_high(c_high))?;
                self.device.ofdm_ecca_threshold().modify(|w| {
                    w.set_ext_a_path_b(ext_a);
                    w.set_ext_c_path_b(ext_c);
                })?;
            }
        }
        Ok(())
    }

    fn iqk_fill_rx_matrix(&mut self, path: RfPath, rx: Correlation) -> Result<(), Error<BusError<I>>> {
        let (rx_x, rx_y) = rx.raw();
        #[allow(clippy::cast_possible_truncation)]
        let (y_low, y_high) = ((rx_y & 0x3f) as u8, ((rx_y >> 6) & 0xf) as u8);

        match path {
            RfPath::A => {
                self.device.rx_iq_imbalance_a().modify(|w| {
                    w.set_rx_x(rx_x);
                    w.set_rx_y_low(y_low);
                })?;
                self.device
                    .rx_iqk_y_high_a()
                    .modify(|w| w.set_rx_y_high(y_high))?;
            }
            RfPath::B => {
                self.device.rx_iq_imbalance_b().modify(|w| {
                    w.set_rx_x(rx_x);
                    w.set_rx_y_low(y_low);
                })?;
            }
        }

        Ok(())
    }
}

/// Split matrix elements A and C into their register fields
///
/// Returns A (10 bits), the low 6 bits of C and the high 4 bits of C.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) const fn split_matrix(ele_a: i32, ele_c: i32) -> (u16, u8, u8) {
    (
        (ele_a & 0x3ff) as u16,
        (ele_c & 0x3f) as u8,
        ((ele_c & 0x3c0) >> 6) as u8,
    )
}
