//! Move legality.
//!
//! Two policies decide how much the server checks:
//!
//! - [`MovePolicy::Geometry`]: every piece kind has a fixed set of steps.
//!   Directions are absolute board directions and pieces jump, so nothing in
//!   between matters.
//! - [`MovePolicy::Occupancy`]: any source/destination pair is a legal shape
//!   and only the occupancy rule applies. Clients are trusted to validate
//!   shape themselves.
//!
//! Both policies refuse a destination that holds one of the mover's own
//! pieces.

use std::{fmt, str::FromStr};

use hornfield_proto::{Board, Piece, PieceKind, Square};

use crate::RuleViolation;

/// How much move validation the server performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovePolicy {
    /// Piece shape and occupancy are checked
    #[default]
    Geometry,
    /// Only occupancy is checked
    Occupancy,
}

impl fmt::Display for MovePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geometry => f.write_str("geometry"),
            Self::Occupancy => f.write_str("occupancy"),
        }
    }
}

impl FromStr for MovePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geometry" => Ok(Self::Geometry),
            "occupancy" => Ok(Self::Occupancy),
            other => Err(format!("unknown move policy {other:?} (expected geometry or occupancy)")),
        }
    }
}

const ORTHOGONAL_ONE: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const ORTHOGONAL_TWO: [(i8, i8); 4] = [(-2, 0), (2, 0), (0, -2), (0, 2)];
const DIAGONAL_TWO: [(i8, i8); 4] = [(-2, -2), (-2, 2), (2, -2), (2, 2)];

/// `(row, col)` steps a piece kind may take.
#[must_use]
pub const fn offsets(kind: PieceKind) -> &'static [(i8, i8)] {
    match kind {
        PieceKind::Pawn(_) => &ORTHOGONAL_ONE,
        PieceKind::HornA => &ORTHOGONAL_TWO,
        PieceKind::HornB => &DIAGONAL_TWO,
    }
}

/// Whether `kind` may step from `from` to `to`.
#[must_use]
pub fn is_legal_shape(kind: PieceKind, from: Square, to: Square) -> bool {
    let delta = from.delta_to(to);
    offsets(kind).contains(&delta)
}

impl MovePolicy {
    /// Validate `piece` moving from `from` to `to` on `board`.
    ///
    /// The caller has already established that `piece` sits on `from` and
    /// belongs to the seat whose turn it is.
    ///
    /// # Errors
    ///
    /// - `RuleViolation::IllegalShape` under [`MovePolicy::Geometry`] when the
    ///   step is not one of the piece's offsets
    /// - `RuleViolation::OwnPieceAtDestination` when `to` holds a piece of the
    ///   same owner
    pub fn check(self, board: &Board, piece: Piece, from: Square, to: Square) -> Result<(), RuleViolation> {
        if self == Self::Geometry && !is_legal_shape(piece.kind, from, to) {
            return Err(RuleViolation::IllegalShape { kind: piece.kind, from, to });
        }

        match board.get(to) {
            Some(target) if target.owner == piece.owner => {
                Err(RuleViolation::OwnPieceAtDestination { to })
            },
            _ => Ok(()),
        }
    }
}
