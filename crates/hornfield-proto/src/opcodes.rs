//! Operation codes.
//!
//! Client intents live in `0x00xx`, server events in `0x01xx`. The split lets
//! the server refuse server-only opcodes without decoding their payloads.

/// Frame operation code (header bytes 6-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Join (or create) a room
    JoinRoom = 0x0001,
    /// Move a piece
    RequestMove = 0x0002,
    /// Keepalive request
    Ping = 0x0003,
    /// Graceful disconnect
    Leave = 0x0004,

    /// Seat assigned to the requester
    SeatAssigned = 0x0101,
    /// Room already has two seats
    RoomFull = 0x0102,
    /// Second seat filled, play begins
    MatchStarted = 0x0103,
    /// Board after an applied move
    BoardUpdated = 0x0104,
    /// Move refused for the mover
    MoveRejected = 0x0105,
    /// Match is over
    MatchEnded = 0x0106,
    /// Keepalive response
    Pong = 0x0107,
    /// Request could not be processed
    Error = 0x01FF,
}

impl Opcode {
    /// Raw wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a raw wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::JoinRoom),
            0x0002 => Some(Self::RequestMove),
            0x0003 => Some(Self::Ping),
            0x0004 => Some(Self::Leave),
            0x0101 => Some(Self::SeatAssigned),
            0x0102 => Some(Self::RoomFull),
            0x0103 => Some(Self::MatchStarted),
            0x0104 => Some(Self::BoardUpdated),
            0x0105 => Some(Self::MoveRejected),
            0x0106 => Some(Self::MatchEnded),
            0x0107 => Some(Self::Pong),
            0x01FF => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether clients are allowed to send this opcode.
    #[must_use]
    pub const fn is_client_intent(self) -> bool {
        self.to_u16() < 0x0100
    }
}
