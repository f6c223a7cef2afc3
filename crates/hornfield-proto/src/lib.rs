//! Hornfield wire protocol.
//!
//! Everything that crosses the network between the match server and its
//! clients lives here: the board data model (pieces, squares, seats), the
//! fixed binary frame header, and the CBOR payloads carried behind it.
//!
//! # Layout
//!
//! A frame is `[FrameHeader: 16 bytes, Big Endian] + [payload: CBOR]`. The
//! header opcode selects the payload type, so payloads are encoded without a
//! variant tag. See [`Payload`] for the message catalogue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod board;
pub mod errors;
pub mod frame;
pub mod header;
pub mod opcodes;
pub mod payloads;

pub use board::{BOARD_SIZE, Board, PawnLane, Piece, PieceKind, Seat, Square};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcodes::Opcode;
pub use payloads::{ErrorPayload, Payload};

/// ALPN protocol identifier negotiated during the QUIC handshake.
pub const ALPN_PROTOCOL: &[u8] = b"hornfield";
