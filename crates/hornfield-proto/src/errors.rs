//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or building wire data.
///
/// None of these are fatal to the server. A malformed frame is the sender's
/// problem and only affects that connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than a frame header
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes available
        actual: usize,
    },

    /// Payload is shorter than the header claims
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload size from the header
        expected: usize,
        /// Payload bytes actually present
        actual: usize,
    },

    /// Header magic number does not match
    #[error("invalid magic number")]
    InvalidMagic,

    /// Header carries a protocol version we do not speak
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Payload exceeds the protocol limit
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Offending size
        size: usize,
        /// Protocol limit
        max: usize,
    },

    /// Opcode is not part of the protocol
    #[error("unknown opcode: {0:#06x}")]
    UnknownOpcode(u16),

    /// CBOR serialization failed
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode error: {0}")]
    CborDecode(String),

    /// Cell code is neither empty nor a known piece
    #[error("invalid piece code: {0:?}")]
    InvalidPieceCode(String),

    /// Square lies outside the 5x5 board
    #[error("square out of bounds: ({row}, {col})")]
    SquareOutOfBounds {
        /// Requested row
        row: u8,
        /// Requested column
        col: u8,
    },

    /// Board rows or columns have the wrong length
    #[error("invalid board shape: expected 5x5")]
    InvalidBoardShape,

    /// Seat number other than 1 or 2
    #[error("invalid seat number: {0}")]
    InvalidSeat(u8),

    /// Room identifier is empty or too long
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),
}
