pub mod constants;
pub mod types;

pub use constants::{
    COORDINATOR_ADDRESS, DWT_TIME_UNITS, POLL_RX_TO_RESP_TX_DLY_UUS, PREDEFINED_ANCHORS,
    SPEED_OF_LIGHT, UUS_TO_DWT_TIME,
};
pub use types::{Coordinate, DeviceIdentity, DeviceRole};
