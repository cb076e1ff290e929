//! Wire format of the ranging message
//!
//! Every node in a deployment exchanges one fixed-size, little-endian
//! message: command discriminator, two raw radio timestamps, a coordinate
//! payload, and a status code. The size is a compile-time constant; a
//! received payload of any other length does not belong to this protocol
//! and is skipped.

use crate::core::Coordinate;
use std::fmt;

/// Encoded size of a [`RangingMessage`] in bytes
pub const MESSAGE_LEN: usize = 4 + 8 + 8 + 3 * 8 + 4;

/// Protocol command discriminators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    /// Start of a two-way ranging exchange, carries the requester's position
    RangingRequest = 0,
    /// Reply carrying the responder's poll-RX and response-TX timestamps
    RangingResponse = 1,
    /// Order the addressed node to run its positioning strategy
    PositionYourself = 2,
    /// Result of the linear solver against measured anchor positions
    PositionAnnouncement = 3,
    /// Result of the Gauss-Newton solver against measured anchor positions
    PositionAnnouncementGn = 4,
    /// Result of the linear solver against the predefined nominal anchors
    PositionAnnouncementPredef = 5,
    /// Result of the Gauss-Newton solver against the predefined nominal anchors
    PositionAnnouncementPredefGn = 6,
}

impl Command {
    pub fn from_raw(raw: u32) -> Option<Command> {
        match raw {
            0 => Some(Command::RangingRequest),
            1 => Some(Command::RangingResponse),
            2 => Some(Command::PositionYourself),
            3 => Some(Command::PositionAnnouncement),
            4 => Some(Command::PositionAnnouncementGn),
            5 => Some(Command::PositionAnnouncementPredef),
            6 => Some(Command::PositionAnnouncementPredefGn),
            _ => None,
        }
    }

    /// All four announcement sub-variants share one message shape; the
    /// discriminator only records which solving method produced the result.
    pub fn is_announcement(&self) -> bool {
        matches!(
            self,
            Command::PositionAnnouncement
                | Command::PositionAnnouncementGn
                | Command::PositionAnnouncementPredef
                | Command::PositionAnnouncementPredefGn
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::RangingRequest => "ranging request",
            Command::RangingResponse => "ranging response",
            Command::PositionYourself => "position yourself",
            Command::PositionAnnouncement => "announcement (linear, measured)",
            Command::PositionAnnouncementGn => "announcement (GN, measured)",
            Command::PositionAnnouncementPredef => "announcement (linear, predefined)",
            Command::PositionAnnouncementPredefGn => "announcement (GN, predefined)",
        };
        f.write_str(name)
    }
}

/// Decoding failures for inbound payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload length differs from [`MESSAGE_LEN`]; not this protocol
    WrongSize { got: usize },
    /// Discriminator outside the closed command set
    UnknownCommand { raw: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::WrongSize { got } => {
                write!(f, "payload size {} does not match message size {}", got, MESSAGE_LEN)
            }
            DecodeError::UnknownCommand { raw } => write!(f, "unknown command {}", raw),
        }
    }
}

impl std::error::Error for DecodeError {}

/// The single message shape of the positioning protocol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangingMessage {
    pub command: Command,
    /// Responder's poll-reception timestamp; meaningful only in a
    /// [`Command::RangingResponse`]
    pub rx_ts: u64,
    /// Responder's scheduled response-transmission timestamp, antenna delay
    /// included; meaningful only in a [`Command::RangingResponse`]
    pub tx_ts: u64,
    pub coordinate: Coordinate,
    pub status: u32,
}

impl RangingMessage {
    /// A message carrying only a command and the sender's position
    pub fn with_coordinate(command: Command, coordinate: Coordinate) -> Self {
        Self { command, rx_ts: 0, tx_ts: 0, coordinate, status: 0 }
    }

    pub fn encode(&self) -> [u8; MESSAGE_LEN] {
        let mut buf = [0u8; MESSAGE_LEN];
        buf[0..4].copy_from_slice(&(self.command as u32).to_le_bytes());
        buf[4..12].copy_from_slice(&self.rx_ts.to_le_bytes());
        buf[12..20].copy_from_slice(&self.tx_ts.to_le_bytes());
        buf[20..28].copy_from_slice(&self.coordinate.x.to_le_bytes());
        buf[28..36].copy_from_slice(&self.coordinate.y.to_le_bytes());
        buf[36..44].copy_from_slice(&self.coordinate.z.to_le_bytes());
        buf[44..48].copy_from_slice(&self.status.to_le_bytes());
        buf
    }

    pub fn decode(payload: &[u8]) -> Result<RangingMessage, DecodeError> {
        if payload.len() != MESSAGE_LEN {
            return Err(DecodeError::WrongSize { got: payload.len() });
        }
        let u32_at = |i: usize| u32::from_le_bytes(payload[i..i + 4].try_into().unwrap());
        let u64_at = |i: usize| u64::from_le_bytes(payload[i..i + 8].try_into().unwrap());
        let f64_at = |i: usize| f64::from_le_bytes(payload[i..i + 8].try_into().unwrap());

        let raw = u32_at(0);
        let command = Command::from_raw(raw).ok_or(DecodeError::UnknownCommand { raw })?;
        Ok(RangingMessage {
            command,
            rx_ts: u64_at(4),
            tx_ts: u64_at(12),
            coordinate: Coordinate::new(f64_at(20), f64_at(28), f64_at(36)),
            status: u32_at(44),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let msg = RangingMessage {
            command: Command::RangingResponse,
            rx_ts: 0x0123_4567_89AB_CDEF,
            tx_ts: 0xFEDC_BA98_7654_3210,
            coordinate: Coordinate::new(1.5, -2.25, 3.75),
            status: 2,
        };
        let bytes = msg.encode();
        assert_eq!(bytes.len(), MESSAGE_LEN);
        assert_eq!(RangingMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_wrong_size_rejected() {
        let msg = RangingMessage::with_coordinate(Command::RangingRequest, Coordinate::ORIGIN);
        let bytes = msg.encode();
        assert_eq!(
            RangingMessage::decode(&bytes[..MESSAGE_LEN - 1]),
            Err(DecodeError::WrongSize { got: MESSAGE_LEN - 1 })
        );
        assert_eq!(
            RangingMessage::decode(&[]),
            Err(DecodeError::WrongSize { got: 0 })
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut bytes = RangingMessage::with_coordinate(Command::RangingRequest, Coordinate::ORIGIN)
            .encode();
        bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
        assert_eq!(
            RangingMessage::decode(&bytes),
            Err(DecodeError::UnknownCommand { raw: 99 })
        );
    }

    #[test]
    fn test_announcement_classification() {
        assert!(Command::PositionAnnouncement.is_announcement());
        assert!(Command::PositionAnnouncementPredefGn.is_announcement());
        assert!(!Command::RangingRequest.is_announcement());
        assert!(!Command::PositionYourself.is_announcement());
    }

    #[test]
    fn test_discriminators_stable() {
        // Wire compatibility: discriminators are deployment-wide constants
        for (raw, cmd) in [
            (0, Command::RangingRequest),
            (1, Command::RangingResponse),
            (2, Command::PositionYourself),
            (3, Command::PositionAnnouncement),
            (4, Command::PositionAnnouncementGn),
            (5, Command::PositionAnnouncementPredef),
            (6, Command::PositionAnnouncementPredefGn),
        ] {
            assert_eq!(Command::from_raw(raw), Some(cmd));
            assert_eq!(cmd as u32, raw);
        }
        assert_eq!(Command::from_raw(7), None);
    }
}
