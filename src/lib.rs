//! UWB Positioning Engine
//!
//! Estimates the 3D position of a mobile tag within a field of fixed
//! anchors from two-way time-of-flight radio ranging, with closed-form
//! trilateration for partially-known geometries and a four-reference
//! multilateration solver (linear least squares refined by Gauss-Newton).
//! The radio itself sits behind the [`hardware::RadioTransport`] trait.

pub mod config;
pub mod core;
pub mod hardware;
pub mod protocol;
pub mod solver;

// Re-export commonly used types
pub use crate::core::{Coordinate, DeviceIdentity, DeviceRole, PREDEFINED_ANCHORS, SPEED_OF_LIGHT};
pub use config::{PositioningConfig, RepetitionConfig};
pub use hardware::{
    IdentityProvider, MockTransport, RadioError, RadioResult, RadioTransport, ReceivedFrame,
    StaticIdentityTable, TxMode,
};
pub use protocol::{Command, NodeState, PositioningNode, RangingError, RangingMessage};
pub use solver::{gauss_newton, linear_least_squares, SolveError};
