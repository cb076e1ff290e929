//! Two-way ranging session
//!
//! Asymmetric double-sided ranging with a single request/response pair: the
//! responder echoes its poll-RX and response-TX timestamps inside the reply,
//! and the initiator corrects the round-trip delta with the measured clock
//! offset ratio. This removes first-order oscillator error without a third
//! message.

use crate::core::{
    Coordinate, DeviceIdentity, DWT_TIME_UNITS, POLL_RX_TO_RESP_TX_DLY_UUS, SPEED_OF_LIGHT,
    UUS_TO_DWT_TIME,
};
use crate::hardware::{RadioResult, RadioTransport, TxMode};
use crate::protocol::message::{Command, DecodeError, RangingMessage};
use std::fmt;

/// Failure modes of one ranging attempt. All of them mean "no measurement
/// this round"; the caller decides whether to retry.
#[derive(Debug, Clone, PartialEq)]
pub enum RangingError {
    Radio(crate::hardware::RadioError),
    /// Reply payload was not a protocol message
    Decode(DecodeError),
    /// Reply decoded but carried the wrong command
    UnexpectedCommand { got: Command },
}

impl fmt::Display for RangingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangingError::Radio(e) => write!(f, "radio error: {}", e),
            RangingError::Decode(e) => write!(f, "undecodable reply: {}", e),
            RangingError::UnexpectedCommand { got } => {
                write!(f, "expected ranging response, got {}", got)
            }
        }
    }
}

impl std::error::Error for RangingError {}

impl From<crate::hardware::RadioError> for RangingError {
    fn from(e: crate::hardware::RadioError) -> Self {
        RangingError::Radio(e)
    }
}

impl From<DecodeError> for RangingError {
    fn from(e: DecodeError) -> Self {
        RangingError::Decode(e)
    }
}

/// Time of flight in seconds from the four exchange timestamps.
///
/// Timestamps are 32-bit radio-clock values; the subtractions wrap, which is
/// correct by construction for deltas shorter than the counter period.
pub fn time_of_flight(
    poll_tx_ts: u32,
    resp_rx_ts: u32,
    poll_rx_ts: u32,
    resp_tx_ts: u32,
    clock_offset_ratio: f64,
) -> f64 {
    let rtd_init = resp_rx_ts.wrapping_sub(poll_tx_ts) as i32;
    let rtd_resp = resp_tx_ts.wrapping_sub(poll_rx_ts) as i32;
    ((rtd_init as f64 - rtd_resp as f64 * (1.0 - clock_offset_ratio)) / 2.0) * DWT_TIME_UNITS
}

/// Execute one request/response exchange with a single peer and return the
/// measured distance together with the peer's advertised coordinate.
pub fn range_with<T: RadioTransport>(
    transport: &mut T,
    own_coordinate: Coordinate,
    peer_address: u16,
) -> Result<(f64, Coordinate), RangingError> {
    let request = RangingMessage::with_coordinate(Command::RangingRequest, own_coordinate);
    transport.send(peer_address, &request.encode(), TxMode::immediate_with_response())?;

    let frame = transport.receive()?;
    let reply = RangingMessage::decode(&frame.payload)?;
    if reply.command != Command::RangingResponse {
        return Err(RangingError::UnexpectedCommand { got: reply.command });
    }

    let poll_tx_ts = transport.read_tx_timestamp() as u32;
    let resp_rx_ts = transport.read_rx_timestamp() as u32;
    let ratio = transport.clock_offset_ratio();

    let tof = time_of_flight(
        poll_tx_ts,
        resp_rx_ts,
        reply.rx_ts as u32,
        reply.tx_ts as u32,
        ratio,
    );
    Ok((tof * SPEED_OF_LIGHT, reply.coordinate))
}

/// Responder half: answer a just-received ranging request.
///
/// The response is scheduled at a fixed offset from the poll reception, and
/// carries both the measured poll-RX timestamp and the response-TX timestamp
/// (scheduled time plus this node's calibrated transmit antenna delay),
/// together with this node's current coordinate.
pub fn respond_to_poll<T: RadioTransport>(
    transport: &mut T,
    identity: &DeviceIdentity,
    requester_address: u16,
) -> RadioResult<()> {
    let poll_rx_ts = transport.read_rx_timestamp();
    let resp_tx_time = poll_rx_ts + POLL_RX_TO_RESP_TX_DLY_UUS * UUS_TO_DWT_TIME;
    let resp_tx_ts = resp_tx_time + identity.tx_antenna_delay as u64;

    let response = RangingMessage {
        command: Command::RangingResponse,
        rx_ts: poll_rx_ts,
        tx_ts: resp_tx_ts,
        coordinate: identity.coordinate,
        status: 0,
    };
    transport.send(requester_address, &response.encode(), TxMode::delayed(resp_tx_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeviceRole;
    use crate::hardware::{linked_pair, MockTransport, RadioError, TxStart};

    fn identity_at(address: u16, coordinate: Coordinate) -> DeviceIdentity {
        DeviceIdentity {
            device_hash: 0,
            pan_id: 0xABCD,
            address,
            ordinal: 1,
            role: DeviceRole::Anchor,
            tx_antenna_delay: 0,
            rx_antenna_delay: 0,
            coordinate,
        }
    }

    #[test]
    fn test_time_of_flight_reference_values() {
        // rtd_init = 5000 - 1000 = 4000, rtd_resp = 4000 - 2000 = 2000
        let tof = time_of_flight(1000, 5000, 2000, 4000, 0.0);
        assert!((tof - 1000.0 * DWT_TIME_UNITS).abs() < 1e-18);

        let distance = tof * SPEED_OF_LIGHT;
        let expected = 1000.0 * DWT_TIME_UNITS * SPEED_OF_LIGHT;
        assert!((distance - expected).abs() < 1e-9);
    }

    #[test]
    fn test_time_of_flight_clock_offset_correction() {
        let uncorrected = time_of_flight(1000, 5000, 2000, 4000, 0.0);
        // A positive offset ratio shrinks the responder's apparent
        // turnaround, so the corrected TOF is larger
        let corrected = time_of_flight(1000, 5000, 2000, 4000, 1e-5);
        assert!(corrected > uncorrected);
    }

    #[test]
    fn test_time_of_flight_wraparound() {
        // Poll sent just before the 32-bit counter wraps
        let poll_tx = u32::MAX - 1000;
        let resp_rx = 3000u32;
        let tof = time_of_flight(poll_tx, resp_rx, 2000, 4000, 0.0);
        // rtd_init wraps to 4001, rtd_resp = 2000
        assert!((tof - (4001.0 - 2000.0) / 2.0 * DWT_TIME_UNITS).abs() < 1e-18);
    }

    #[test]
    fn test_range_with_happy_path() {
        let mut transport = MockTransport::new();
        transport.set_timestamps(1000, 5000);
        let reply = RangingMessage {
            command: Command::RangingResponse,
            rx_ts: 2000,
            tx_ts: 4000,
            coordinate: Coordinate::new(4.0, 0.0, 0.0),
            status: 0,
        };
        transport.script_frame(0x0002, reply.encode().to_vec());

        let (distance, coord) =
            range_with(&mut transport, Coordinate::ORIGIN, 0x0002).unwrap();
        assert_eq!(coord, Coordinate::new(4.0, 0.0, 0.0));
        let expected = 1000.0 * DWT_TIME_UNITS * SPEED_OF_LIGHT;
        assert!((distance - expected).abs() < 1e-9);

        // The request itself went out with the right shape
        let sent = &transport.sent_frames()[0];
        assert_eq!(sent.target, 0x0002);
        assert!(sent.mode.response_expected);
        let request = RangingMessage::decode(&sent.payload).unwrap();
        assert_eq!(request.command, Command::RangingRequest);
    }

    #[test]
    fn test_range_with_timeout_is_no_measurement() {
        let mut transport = MockTransport::new();
        transport.script_receive(Err(RadioError::Timeout));
        let err = range_with(&mut transport, Coordinate::ORIGIN, 0x0002).unwrap_err();
        assert_eq!(err, RangingError::Radio(RadioError::Timeout));
    }

    #[test]
    fn test_range_with_short_reply_rejected() {
        let mut transport = MockTransport::new();
        transport.script_frame(0x0002, vec![0u8; 10]);
        let err = range_with(&mut transport, Coordinate::ORIGIN, 0x0002).unwrap_err();
        assert!(matches!(err, RangingError::Decode(DecodeError::WrongSize { got: 10 })));
    }

    #[test]
    fn test_range_with_wrong_command_rejected() {
        let mut transport = MockTransport::new();
        let stray =
            RangingMessage::with_coordinate(Command::PositionYourself, Coordinate::ORIGIN);
        transport.script_frame(0x0002, stray.encode().to_vec());
        let err = range_with(&mut transport, Coordinate::ORIGIN, 0x0002).unwrap_err();
        assert_eq!(err, RangingError::UnexpectedCommand { got: Command::PositionYourself });
    }

    #[test]
    fn test_respond_to_poll_schedule_and_payload() {
        let mut transport = MockTransport::new();
        transport.set_timestamps(0, 1_000_000);
        let mut identity = identity_at(0x0001, Coordinate::new(0.0, 0.0, 0.0));
        identity.tx_antenna_delay = 16385;

        respond_to_poll(&mut transport, &identity, 0x0005).unwrap();

        let sent = &transport.sent_frames()[0];
        assert_eq!(sent.target, 0x0005);
        let scheduled = 1_000_000 + POLL_RX_TO_RESP_TX_DLY_UUS * UUS_TO_DWT_TIME;
        assert_eq!(sent.mode.start, TxStart::Delayed(scheduled));

        let response = RangingMessage::decode(&sent.payload).unwrap();
        assert_eq!(response.command, Command::RangingResponse);
        assert_eq!(response.rx_ts, 1_000_000);
        assert_eq!(response.tx_ts, scheduled + 16385);
    }

    #[test]
    fn test_full_exchange_over_linked_pair() {
        let (mut initiator, mut responder) = linked_pair(0x0005, 0x0001, 25.0);

        let handle = std::thread::spawn(move || {
            let frame = responder.receive().unwrap();
            let msg = RangingMessage::decode(&frame.payload).unwrap();
            assert_eq!(msg.command, Command::RangingRequest);
            let identity = identity_at(0x0001, Coordinate::ORIGIN);
            respond_to_poll(&mut responder, &identity, frame.sender).unwrap();
        });

        let (distance, coord) =
            range_with(&mut initiator, Coordinate::new(25.0, 0.0, 0.0), 0x0001).unwrap();
        handle.join().unwrap();

        assert_eq!(coord, Coordinate::ORIGIN);
        // Synthetic flight times quantize to whole radio units
        assert!((distance - 25.0).abs() < 0.01, "distance = {}", distance);
    }
}
