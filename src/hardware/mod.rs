//! Hardware abstraction layer for the UWB radio
//!
//! The engine talks to the radio through the [`RadioTransport`] trait; the
//! shipped implementations are test doubles (a scripted mock and a
//! channel-linked pair for multi-node simulation).

pub mod error;
pub mod identity;
pub mod mock;
pub mod transport;

pub use error::{RadioError, RadioResult};
pub use identity::{IdentityProvider, StaticIdentityTable};
pub use mock::{linked_pair, LinkedTransport, MockTransport};
pub use transport::RadioTransport;

/// One inbound frame, already validated and stripped to its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Short address of the sender
    pub sender: u16,
    pub payload: Vec<u8>,
}

/// When the transmission starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStart {
    Immediate,
    /// Start at the given radio timestamp (upper 32 bits of the 40-bit
    /// system time, as the radio's delayed-send register expects)
    Delayed(u64),
}

/// Transmission mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxMode {
    pub start: TxStart,
    /// Whether the transport should re-enable the receiver after this
    /// transmission in anticipation of a reply
    pub response_expected: bool,
}

impl TxMode {
    pub const fn immediate() -> Self {
        Self { start: TxStart::Immediate, response_expected: false }
    }

    pub const fn immediate_with_response() -> Self {
        Self { start: TxStart::Immediate, response_expected: true }
    }

    pub const fn delayed(at: u64) -> Self {
        Self { start: TxStart::Delayed(at), response_expected: false }
    }
}
