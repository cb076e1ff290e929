//! The positioning protocol: wire message, two-way ranging session, and the
//! command/position state machine driving each node

pub mod message;
pub mod node;
pub mod ranging;

pub use message::{Command, DecodeError, RangingMessage, MESSAGE_LEN};
pub use node::{AnnouncementObserver, LogObserver, NodeState, PositioningNode};
pub use ranging::{range_with, respond_to_poll, time_of_flight, RangingError};
