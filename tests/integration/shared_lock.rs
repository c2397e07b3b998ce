//! Integration tests for the per-device calibration lock

use crate::common::{create_mock_driver, create_mock_driver_with, MockDelay};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use rtw8723b_rfk::{Candidate, RfkConfig, SharedRfk, TickOutcome};

#[test]
fn test_calibrate_through_lock() {
    let (driver, interface, _) = create_mock_driver();
    let shared: SharedRfk<NoopRawMutex, _, _> = SharedRfk::new(driver);

    let outcome = shared.calibrate(&mut MockDelay).unwrap();

    assert_eq!(outcome.final_candidate, Some(Candidate::Round(0)));
    assert_eq!(interface.one_shot_count(), 6);
    assert!(shared.lock(|rfk| rfk.calibration_state().done));
}

#[test]
fn test_tick_through_lock() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.init_power_tracking().unwrap();
    interface.set_thermal(30);
    let shared: SharedRfk<NoopRawMutex, _, _> = SharedRfk::new(driver);

    assert_eq!(shared.tick(&mut MockDelay).unwrap(), TickOutcome::Armed);
    assert!(matches!(
        shared.tick(&mut MockDelay).unwrap(),
        TickOutcome::Sampled(_)
    ));
}

#[test]
fn test_channel_switch_under_lock() {
    let (driver, _, platform) = create_mock_driver();
    let shared: SharedRfk<NoopRawMutex, _, _> = SharedRfk::new(driver);

    // Host code switching channels holds the same lock as calibration
    shared.lock(|rfk| rfk.platform_mut().set_channel(11));

    let driver = shared.into_inner();
    assert_eq!(rtw8723b_rfk::Platform::current_channel(driver.platform()), 11);
    assert_eq!(rtw8723b_rfk::Platform::current_channel(&platform), 11);
}
