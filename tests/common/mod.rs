//! Common test utilities and mock implementations

pub mod test_utils;

#[allow(unused_imports)]
pub use mock_interface::{IqkShot, MockInterface, MockPlatform, Operation};
#[allow(unused_imports)]
pub use test_utils::{create_mock_driver, create_mock_driver_with, two_path_config, MockDelay};
