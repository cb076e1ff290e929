//! Radio transport trait

use crate::hardware::{RadioResult, ReceivedFrame, TxMode};

/// Hardware abstraction for the UWB radio.
///
/// Framing, addressing, checksums and antenna-delay compensation on receive
/// all live behind this trait; the positioning engine only sees payloads and
/// raw timestamps. Send and receive are synchronous and blocking, receive
/// with a bounded timeout owned by the transport.
pub trait RadioTransport {
    /// Transmit one frame to the given short address
    fn send(&mut self, target: u16, payload: &[u8], mode: TxMode) -> RadioResult<()>;

    /// Block for one inbound frame addressed to this node (or broadcast).
    /// Misaddressed frames are rejected inside the transport and surface as
    /// `RadioError::WrongAddress`.
    fn receive(&mut self) -> RadioResult<ReceivedFrame>;

    /// Local timestamp of the most recent transmission, radio time units
    fn read_tx_timestamp(&mut self) -> u64;

    /// Local timestamp of the most recent reception, radio time units
    fn read_rx_timestamp(&mut self) -> u64;

    /// Ratio between the local and the remote oscillator, measured from the
    /// carrier integrator of the last reception
    fn clock_offset_ratio(&mut self) -> f64;
}
