//! Physical constants and protocol parameters

use crate::core::types::Coordinate;

/// Speed of light in air (m/s), as used for UWB time-of-flight conversion
pub const SPEED_OF_LIGHT: f64 = 299_702_547.0;

/// Duration of one radio timestamp unit in seconds (1 / (128 * 499.2 MHz))
pub const DWT_TIME_UNITS: f64 = 1.0 / 499_200_000.0 / 128.0;

/// One UWB microsecond expressed in radio timestamp units
pub const UUS_TO_DWT_TIME: u64 = 65_536;

/// Delay between poll reception and response transmission, in UWB
/// microseconds. A protocol constant: both sides of a ranging exchange
/// must agree on it at compile time.
pub const POLL_RX_TO_RESP_TX_DLY_UUS: u64 = 650;

/// Short address of the coordinator anchor, the destination of every
/// position announcement
pub const COORDINATOR_ADDRESS: u16 = 0x0001;

/// Nominal anchor positions used as ground truth for comparison and
/// calibration, meters
pub const PREDEFINED_ANCHORS: [Coordinate; 4] = [
    Coordinate::new(0.0, 0.0, 0.0),
    Coordinate::new(4.0, 0.0, 0.0),
    Coordinate::new(2.0, 4.0, 0.0),
    Coordinate::new(2.0, 2.0, 2.0),
];
