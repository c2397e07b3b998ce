//! Unit tests for error handling and recovery

use crate::common::mock_interface::MockError;
use crate::common::{create_mock_driver, create_mock_driver_with, MockDelay, MockInterface, MockPlatform};
use rtw8723b_rfk::{Error, RfkConfig, Rtw8723bRfk, TickOutcome, TrackPhase};

#[test]
fn test_invalid_path_count_rejected() {
    let config = RfkConfig {
        rf_path_count: 3,
        ..RfkConfig::default()
    };
    let result = Rtw8723bRfk::new(MockInterface::new(), MockPlatform::new(), config);
    assert!(
        matches!(result, Err(Error::InvalidConfig)),
        "Three paths should be rejected"
    );
}

#[test]
fn test_zero_retry_rejected() {
    let config = RfkConfig {
        iqk_retry: 0,
        ..RfkConfig::default()
    };
    let result = Rtw8723bRfk::new(MockInterface::new(), MockPlatform::new(), config);
    assert!(matches!(result, Err(Error::InvalidConfig)));
}

#[test]
fn test_construction_touches_no_register() {
    let (_driver, interface, _) = create_mock_driver();
    assert!(interface.operations().is_empty(), "new() must not access the bus");
}

#[test]
fn test_calibrate_propagates_read_failure() {
    let (mut driver, interface, _) = create_mock_driver();
    interface.fail_next_read();

    let result = driver.calibrate(&mut MockDelay);
    assert!(
        matches!(result, Err(Error::Bus(MockError::Communication))),
        "Bus error should abort calibration"
    );
    assert!(!driver.calibration_state().done);
}

#[test]
fn test_calibrate_recovers_after_failure() {
    let (mut driver, interface, _) = create_mock_driver();
    interface.fail_next_write();
    assert!(driver.calibrate(&mut MockDelay).is_err());

    let outcome = driver.calibrate(&mut MockDelay).unwrap();
    assert!(outcome.applied, "Next calibration should succeed");
}

#[test]
fn test_arming_failure_keeps_phase() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    interface.fail_next_write();

    assert!(driver.tick(&mut MockDelay).is_err());
    assert_eq!(driver.power_track_state().phase, TrackPhase::Armed);
    assert_eq!(driver.tick(&mut MockDelay).unwrap(), TickOutcome::Armed);
}

#[test]
fn test_sampling_failure_rearms() {
    let (mut driver, interface, _) = create_mock_driver_with(RfkConfig::with_thermal_meter(30));
    driver.tick(&mut MockDelay).unwrap();
    interface.fail_next_read();

    let result = driver.tick(&mut MockDelay);
    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    assert_eq!(
        driver.power_track_state().phase,
        TrackPhase::Armed,
        "A failed pass starts over with a fresh conversion"
    );
    assert!(driver.power_track_state().init_trigger, "Init pass not consumed");
}

#[test]
fn test_init_power_tracking_propagates_failure() {
    let (mut driver, interface, _) = create_mock_driver();
    interface.fail_next_read();
    assert!(driver.init_power_tracking().is_err());
}

#[test]
fn test_release_returns_parts() {
    let (driver, interface, _) = create_mock_driver();
    let (released, _platform) = driver.release();
    released.set_register8(0x0067, 0x5a);
    assert_eq!(interface.get_register8(0x0067), 0x5a, "Released interface shares state");
}
