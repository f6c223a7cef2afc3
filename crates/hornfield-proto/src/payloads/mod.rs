//! CBOR-encoded protocol messages.
//!
//! Frame headers are raw binary, payloads are CBOR. The `Payload` enum covers
//! every message: client intents (join, move, ping, leave) and server events
//! (seat assignment, snapshots, rejections, results, errors).
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one opcode (enforced by match
//! exhaustiveness). Round-trip encoding must produce identical values.

pub mod game;
pub mod room;

use bytes::BufMut;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads
///
/// The payload type is determined by the `Opcode` in the frame header, so
/// only the inner struct is serialized (no variant tag in CBOR). A frame
/// whose opcode and payload disagree fails to decode instead of being
/// reinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    // Client intents
    /// Join or create a room
    JoinRoom(room::JoinRoom),
    /// Move a piece
    RequestMove(game::RequestMove),
    /// Keepalive
    Ping,
    /// Graceful disconnect
    Leave,

    // Server events
    /// Seat assigned to the requester
    SeatAssigned(room::SeatAssigned),
    /// Room already full
    RoomFull(room::RoomFull),
    /// Both seats filled
    MatchStarted(game::BoardSnapshot),
    /// Board after an applied move
    BoardUpdated(game::BoardSnapshot),
    /// Move refused
    MoveRejected(game::MoveRejected),
    /// Match over
    MatchEnded(game::MatchEnded),
    /// Keepalive response
    Pong,
    /// Request could not be processed
    Error(ErrorPayload),
}

/// Error payload for error frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code identifying the type of error.
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorPayload {
    /// Payload could not be decoded or failed validation.
    pub const INVALID_PAYLOAD: u16 = 0x0001;
    /// Opcode unknown or not accepted from clients.
    pub const UNSUPPORTED_OPCODE: u16 = 0x0002;
    /// Session is already seated in another room.
    pub const ALREADY_SEATED: u16 = 0x0003;

    /// Create an invalid payload error.
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self { code: Self::INVALID_PAYLOAD, message: msg.into() }
    }

    /// Create an unsupported opcode error.
    pub fn unsupported_opcode(opcode: u16) -> Self {
        Self { code: Self::UNSUPPORTED_OPCODE, message: format!("unsupported opcode: {opcode:#06x}") }
    }

    /// Create an already-seated error.
    pub fn already_seated(room_id: &str) -> Self {
        Self { code: Self::ALREADY_SEATED, message: format!("already seated in room {room_id:?}") }
    }
}

fn to_cbor<T: Serialize>(value: &T, dst: &mut impl BufMut) -> Result<()> {
    ciborium::ser::into_writer(value, dst.writer())
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::JoinRoom(_) => Opcode::JoinRoom,
            Self::RequestMove(_) => Opcode::RequestMove,
            Self::Ping => Opcode::Ping,
            Self::Leave => Opcode::Leave,
            Self::SeatAssigned(_) => Opcode::SeatAssigned,
            Self::RoomFull(_) => Opcode::RoomFull,
            Self::MatchStarted(_) => Opcode::MatchStarted,
            Self::BoardUpdated(_) => Opcode::BoardUpdated,
            Self::MoveRejected(_) => Opcode::MoveRejected,
            Self::MatchEnded(_) => Opcode::MatchEnded,
            Self::Pong => Opcode::Pong,
            Self::Error(_) => Opcode::Error,
        }
    }

    /// Encode payload to buffer.
    ///
    /// Serializes only the inner struct, NOT the variant tag. Size limits
    /// are enforced later by [`Frame::encode`].
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::JoinRoom(inner) => to_cbor(inner, dst),
            Self::RequestMove(inner) => to_cbor(inner, dst),
            Self::Ping | Self::Leave | Self::Pong => Ok(()), // Zero-byte payloads
            Self::SeatAssigned(inner) => to_cbor(inner, dst),
            Self::RoomFull(inner) => to_cbor(inner, dst),
            Self::MatchStarted(inner) | Self::BoardUpdated(inner) => to_cbor(inner, dst),
            Self::MoveRejected(inner) => to_cbor(inner, dst),
            Self::MatchEnded(inner) => to_cbor(inner, dst),
            Self::Error(inner) => to_cbor(inner, dst),
        }
    }

    /// Decode payload from bytes based on opcode.
    ///
    /// The size check happens before CBOR parsing so the parser never sees
    /// oversized input.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if bytes exceed `MAX_PAYLOAD_SIZE`
    /// - `ProtocolError::CborDecode` if CBOR deserialization fails, including
    ///   out-of-range squares, unknown piece codes and bad seat numbers
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match opcode {
            Opcode::JoinRoom => Self::JoinRoom(from_cbor(bytes)?),
            Opcode::RequestMove => Self::RequestMove(from_cbor(bytes)?),
            Opcode::Ping => Self::Ping,
            Opcode::Leave => Self::Leave,
            Opcode::SeatAssigned => Self::SeatAssigned(from_cbor(bytes)?),
            Opcode::RoomFull => Self::RoomFull(from_cbor(bytes)?),
            Opcode::MatchStarted => Self::MatchStarted(from_cbor(bytes)?),
            Opcode::BoardUpdated => Self::BoardUpdated(from_cbor(bytes)?),
            Opcode::MoveRejected => Self::MoveRejected(from_cbor(bytes)?),
            Opcode::MatchEnded => Self::MatchEnded(from_cbor(bytes)?),
            Opcode::Pong => Self::Pong,
            Opcode::Error => Self::Error(from_cbor(bytes)?),
        };

        Ok(payload)
    }

    /// Convert payload into a transport frame.
    ///
    /// Encodes the payload, sets the opcode in the header and lets
    /// [`Frame::new`] fill in the payload size.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self, mut header: FrameHeader) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        header.opcode = self.opcode().to_u16().to_be_bytes();
        Ok(Frame::new(header, buf))
    }

    /// Frame with a fresh header and no request id.
    pub fn to_frame(self) -> Result<Frame> {
        let opcode = self.opcode();
        self.into_frame(FrameHeader::new(opcode))
    }

    /// Parse payload from a raw transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the header opcode is not recognized
    /// - `ProtocolError::CborDecode` if CBOR deserialization fails
    /// - `ProtocolError::PayloadTooLarge` if payload exceeds maximum size
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or_else(|| ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }
}
