//! Gameplay payloads: move intents and board snapshots.

use serde::{Deserialize, Serialize};

use crate::{Board, Seat, Square};

/// Move the piece on `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMove {
    /// Room the move is for
    pub room_id: String,
    /// Source square
    pub from: Square,
    /// Destination square
    pub to: Square,
}

/// Full authoritative state of a match.
///
/// Sent as `MatchStarted` when the second seat fills and as `BoardUpdated`
/// after every applied move. `version` increases by one per applied move, so
/// a client can drop a snapshot older than one it already rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Room the snapshot belongs to
    pub room_id: String,
    /// Board after the last applied move
    pub board: Board,
    /// Seat allowed to move next
    pub turn: Seat,
    /// Number of moves applied so far
    pub version: u64,
}

/// A move by the active seat was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRejected {
    /// Room the move was for
    pub room_id: String,
    /// Human-readable reason
    pub reason: String,
}

/// The match is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEnded {
    /// Room that ended
    pub room_id: String,
    /// Human-readable result, e.g. `"Player 1 wins!"`
    pub message: String,
    /// Winning seat. `None` when the room was abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Seat>,
    /// Final board
    pub board: Board,
}
