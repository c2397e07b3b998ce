//! Test utilities and helper functions

use crate::common::mock_interface::{MockInterface, MockPlatform};
use rtw8723b_rfk::{RfkConfig, Rtw8723bRfk};

/// Driver type used throughout the tests
pub type MockRfk = Rtw8723bRfk<MockInterface, MockPlatform>;

/// Mock delay implementation for testing
///
/// This is a no-op delay that implements the embedded-hal DelayNs trait
/// for use in tests where actual delays are not needed.
#[derive(Debug, Clone, Copy)]
pub struct MockDelay;

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {
        // No-op for testing
    }

    fn delay_us(&mut self, _us: u32) {
        // No-op for testing
    }

    fn delay_ms(&mut self, _ms: u32) {
        // No-op for testing
    }
}

/// Create a mock driver with the default configuration
/// Returns (driver, interface, platform); the clones share state with the driver
pub fn create_mock_driver() -> (MockRfk, MockInterface, MockPlatform) {
    create_mock_driver_with(RfkConfig::default())
}

/// Create a mock driver with the given configuration
pub fn create_mock_driver_with(config: RfkConfig) -> (MockRfk, MockInterface, MockPlatform) {
    let interface = MockInterface::new();
    let platform = MockPlatform::new();
    let driver = Rtw8723bRfk::new(interface.clone(), platform.clone(), config)
        .expect("Failed to create mock driver");
    (driver, interface, platform)
}

/// Two-path configuration anchored at `thermal_meter_k`
#[allow(dead_code)]
pub fn two_path_config(thermal_meter_k: u8) -> RfkConfig {
    RfkConfig {
        rf_path_count: 2,
        ..RfkConfig::with_thermal_meter(thermal_meter_k)
    }
}
