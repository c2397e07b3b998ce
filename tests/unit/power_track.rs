//! Unit tests for the power tracking state machine

use crate::common::{create_mock_driver_with, two_path_config, MockDelay};
use rtw8723b_rfk::tables::{CCK_SWING_TABLE_CH1_CH13, CCK_SWING_TABLE_CH14, OFDM_SWING_TABLE};
use rtw8723b_rfk::{RfPath, RfkConfig, TickOutcome, TrackPhase, TxAgcRemnant};

const TX_IQ_IMBALANCE_A: u16 = 0x0c80;
const TX_C_HIGH_A: u16 = 0x0c94;
const OFDM_ECCA: u16 = 0x0c4c;
const CCK_SWING_FIRST: u16 = 0x0a22;
const RF_T_METER: u8 = 0x42;

fn cck_row(interface: &crate::common::MockInterface) -> [u8; 8] {
    core::array::from_fn(|i| interface.get_register8(CCK_SWING_FIRST + i as u16))
}

#[test]
fn test_armed_tick_starts_sensor() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);

    let outcome = driver.tick(&mut MockDelay).unwrap();

    assert_eq!(outcome, TickOutcome::Armed);
    assert_eq!(driver.power_track_state().phase, TrackPhase::Sampled);
    let t_meter = interface.get_rf(RfPath::A, RF_T_METER);
    assert_eq!((t_meter >> 16) & 0x3, 0x3, "Trigger bits set");
    assert_eq!((t_meter >> 10) & 0x3f, 30, "Thermal field preserved");
}

#[test]
fn test_phases_alternate() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);

    for _ in 0..3 {
        assert_eq!(driver.tick(&mut MockDelay).unwrap(), TickOutcome::Armed);
        assert!(matches!(
            driver.tick(&mut MockDelay).unwrap(),
            TickOutcome::Sampled(_)
        ));
        assert_eq!(driver.power_track_state().phase, TrackPhase::Armed);
    }
}

#[test]
fn test_init_pass_compensates_unconditionally() {
    let (mut driver, interface, platform) =
        create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);

    driver.tick(&mut MockDelay).unwrap();
    let TickOutcome::Sampled(report) = driver.tick(&mut MockDelay).unwrap() else {
        panic!("Second tick should sample");
    };

    assert!(report.compensated, "Init pass always compensates");
    assert_eq!(report.iqk_applied, None, "No recalibration on the init pass");
    assert!(!driver.power_track_state().init_trigger);
    assert_eq!(interface.get_register32(TX_IQ_IMBALANCE_A), OFDM_SWING_TABLE[30]);
    assert_eq!(platform.power_updates(), vec![(6, RfPath::A, TxAgcRemnant::default())]);
}

#[test]
fn test_second_pass_is_idempotent() {
    let (mut driver, interface, platform) =
        create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);

    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();
    interface.clear_operations();
    platform.clear_power_updates();

    let TickOutcome::Sampled(report) = driver.tick(&mut MockDelay).unwrap() else {
        panic!("Fourth tick should sample");
    };

    assert!(!report.compensated);
    assert_eq!(interface.write_count(), 0, "Unchanged sample must not write anything");
    assert!(platform.power_updates().is_empty());
}

#[test]
fn test_unchanged_delta_skips_path() {
    // No recalibration gets in the way of the writes being counted
    let config = RfkConfig {
        iqk_threshold: 0xff,
        ..RfkConfig::with_thermal_meter(0)
    };
    let (mut driver, interface, platform) = create_mock_driver_with(config);
    driver.init_power_tracking().unwrap();

    // 40 above the reference clamps to the last table entry
    interface.set_thermal(40);
    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();
    assert_eq!(driver.power_track_state().delta_power_index[0], 15);

    // 44 clamps to the same entry
    interface.set_thermal(44);
    driver.tick(&mut MockDelay).unwrap();
    interface.clear_operations();
    platform.clear_power_updates();

    let TickOutcome::Sampled(report) = driver.tick(&mut MockDelay).unwrap() else {
        panic!("Expected a sample");
    };

    assert!(report.compensated, "Change above threshold runs compensation");
    assert_eq!(interface.write_count(), 0, "Same delta index writes nothing");
    assert!(platform.power_updates().is_empty());
    assert_eq!(driver.power_track_state().last_thermal, 44);
}

#[test]
fn test_steady_warm_up_keeps_compensating() {
    let (mut driver, interface, platform) =
        create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.init_power_tracking().unwrap();

    // Deltas are measured from the efuse reference, not from the previous sample
    for (thermal, delta, ofdm_index, cck_index) in [(34, 2, 32, 22), (38, 5, 35, 25), (42, 7, 37, 27)] {
        interface.set_thermal(thermal);
        driver.tick(&mut MockDelay).unwrap();
        let TickOutcome::Sampled(report) = driver.tick(&mut MockDelay).unwrap() else {
            panic!("Expected a sample");
        };

        assert!(report.compensated, "Thermal {thermal} compensates");
        assert_eq!(report.iqk_applied, None, "Average stays below the recalibration threshold");
        assert_eq!(driver.power_track_state().delta_power_index[0], delta);
        assert_eq!(
            interface.get_register32(TX_IQ_IMBALANCE_A),
            OFDM_SWING_TABLE[ofdm_index],
            "OFDM swing at thermal {thermal}"
        );
        assert_eq!(cck_row(&interface), CCK_SWING_TABLE_CH1_CH13[cck_index]);
    }

    assert_eq!(driver.power_track_state().thermal_reference, 30);
    assert_eq!(platform.power_updates().len(), 3);
}

#[test]
fn test_channel_14_uses_ch1_ch13_cck_table() {
    let (mut driver, interface, platform) =
        create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    platform.set_channel(14);
    driver.init_power_tracking().unwrap();

    // +8 -> delta 5, CCK index 25
    interface.set_thermal(38);
    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();

    assert_eq!(cck_row(&interface), CCK_SWING_TABLE_CH1_CH13[25]);
    assert_ne!(cck_row(&interface), CCK_SWING_TABLE_CH14[25]);
    assert_eq!(platform.power_updates(), vec![(14, RfPath::A, TxAgcRemnant::default())]);
}

#[test]
fn test_small_change_below_threshold_skips() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);
    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();

    interface.set_thermal(32);
    driver.tick(&mut MockDelay).unwrap();
    let TickOutcome::Sampled(report) = driver.tick(&mut MockDelay).unwrap() else {
        panic!("Expected a sample");
    };

    assert!(!report.compensated, "A change of 2 is not above the threshold");
    assert_eq!(driver.power_track_state().last_thermal, 30);
}

#[test]
fn test_cooling_clamps_with_negative_remnant() {
    let (mut driver, interface, platform) =
        create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    // Baseline OFDM swing index 2
    interface.set_register32(TX_IQ_IMBALANCE_A, OFDM_SWING_TABLE[2]);
    driver.init_power_tracking().unwrap();
    assert_eq!(driver.power_track_state().default_ofdm_index, 2);

    // -10 -> OFDM delta -5: 2 - 5 = -3
    interface.set_thermal(20);
    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();

    assert_eq!(interface.get_register32(TX_IQ_IMBALANCE_A), OFDM_SWING_TABLE[0]);
    assert_eq!(cck_row(&interface), CCK_SWING_TABLE_CH1_CH13[15]);
    assert_eq!(
        platform.power_updates(),
        vec![(6, RfPath::A, TxAgcRemnant { ofdm: -3, cck: 0 })]
    );
    assert_eq!(driver.power_track_state().remnant[0].ofdm, -3);
}

#[test]
fn test_cck_rate_selects_cck_delta_table() {
    let (mut driver, interface, platform) =
        create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    platform.set_cck_rate(true);
    driver.init_power_tracking().unwrap();

    // -10 -> CCK delta -6
    interface.set_thermal(20);
    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();

    assert_eq!(driver.power_track_state().delta_power_index[0], -6);
    assert_eq!(interface.get_register32(TX_IQ_IMBALANCE_A), OFDM_SWING_TABLE[24]);
    assert_eq!(cck_row(&interface), CCK_SWING_TABLE_CH1_CH13[14]);
}

#[test]
fn test_matrix_path_after_calibration() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.calibrate(&mut MockDelay).unwrap();
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);

    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();

    // D = 0x100, X = 0xf8, Y = -16
    assert_eq!(interface.get_register32(TX_IQ_IMBALANCE_A), 0x4030_00f8);
    assert_eq!(interface.get_register32(TX_C_HIGH_A) >> 28, 0xf);
    assert_eq!((interface.get_register32(OFDM_ECCA) >> 24) & 1, 0);
}

#[test]
fn test_raw_swing_clears_c_high() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    interface.set_register32(TX_C_HIGH_A, 0xf000_0000);
    interface.set_register32(OFDM_ECCA, 0x0100_0000);
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);

    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();

    assert_eq!(interface.get_register32(TX_C_HIGH_A), 0);
    assert_eq!(interface.get_register32(OFDM_ECCA), 0);
}

#[test]
fn test_every_path_gets_compensated() {
    let (mut driver, interface, platform) = create_mock_driver_with(two_path_config(30));
    driver.init_power_tracking().unwrap();
    interface.set_thermal(38);

    driver.tick(&mut MockDelay).unwrap();
    driver.tick(&mut MockDelay).unwrap();

    let updates = platform.power_updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].1, RfPath::A);
    assert_eq!(updates[1].1, RfPath::B);
    assert_eq!(interface.get_register32(0x0c88), OFDM_SWING_TABLE[35]);
}

#[test]
fn test_unsupported_sensor_disables_tracking() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(0xff));
    interface.clear_operations();

    for _ in 0..4 {
        assert_eq!(driver.tick(&mut MockDelay).unwrap(), TickOutcome::Disabled);
    }
    assert_eq!(driver.power_track_state().phase, TrackPhase::Disabled);
    assert!(interface.operations().is_empty(), "Disabled tracking never touches the bus");
}

#[test]
fn test_unsupported_track_type_disables_tracking() {
    let config = RfkConfig {
        power_track_type: 1,
        ..RfkConfig::with_thermal_meter(30)
    };
    let (mut driver, _, _) = create_mock_driver_with(config);

    assert_eq!(driver.tick(&mut MockDelay).unwrap(), TickOutcome::Disabled);
    assert_eq!(driver.power_track_state().phase, TrackPhase::Disabled);
}

#[test]
fn test_init_reads_defaults_from_hardware() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    interface.set_register32(TX_IQ_IMBALANCE_A, OFDM_SWING_TABLE[26]);
    interface.set_register8(CCK_SWING_FIRST, CCK_SWING_TABLE_CH1_CH13[12][0]);

    driver.init_power_tracking().unwrap();

    let state = driver.power_track_state();
    assert_eq!(state.default_ofdm_index, 26);
    assert_eq!(state.default_cck_index, 12);
    assert_eq!(state.phase, TrackPhase::Armed);
    assert!(state.init_trigger);
}

#[test]
fn test_lck_pauses_and_restores_tx() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    interface.set_register8(0x0522, 0x0f);
    interface.set_rf(RfPath::A, 0x18, 0x0_1c01);

    assert!(driver.lc_calibrate(&mut MockDelay).unwrap());

    assert_eq!(interface.writes_to(0x0522), vec![0xff, 0x0f]);
    assert_eq!(interface.rf_writes_to(RfPath::A, 0x18), vec![0x0_9c01, 0x0_1c01]);
    assert!(interface.writes_to(0x0d03).is_empty());
}

#[test]
fn test_lck_with_continuous_tx() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    interface.set_register8(0x0d03, 0x75);

    assert!(driver.lc_calibrate(&mut MockDelay).unwrap());

    assert_eq!(interface.writes_to(0x0d03), vec![0x05, 0x75]);
    assert!(interface.writes_to(0x0522).is_empty());
}

#[test]
fn test_lck_timeout_reported() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    interface.set_lck_stuck(true);
    interface.set_rf(RfPath::A, 0x18, 0x0_1c01);

    assert!(!driver.lc_calibrate(&mut MockDelay).unwrap(), "Timeout is not an error");
    assert_eq!(interface.get_rf(RfPath::A, 0x18), 0x0_1c01, "Channel config restored");
}
