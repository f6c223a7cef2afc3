//! Rule violations reported back to the moving participant.

use hornfield_proto::{PieceKind, Square};
use thiserror::Error;

/// Why a move by the active seat was refused.
///
/// Every variant renders as `"Invalid move"`, the message clients show. The
/// variant itself is kept for logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleViolation {
    /// Destination holds one of the mover's own pieces
    #[error("Invalid move")]
    OwnPieceAtDestination {
        /// Blocked destination
        to: Square,
    },

    /// Piece kind cannot make this step
    #[error("Invalid move")]
    IllegalShape {
        /// Kind of the moving piece
        kind: PieceKind,
        /// Source square
        from: Square,
        /// Destination square
        to: Square,
    },
}

impl RuleViolation {
    /// Diagnostic description for logs.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::OwnPieceAtDestination { to } => format!("own piece at destination {to}"),
            Self::IllegalShape { kind, from, to } => {
                format!("{kind:?} cannot move from {from} to {to}")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violations_share_client_message() {
        let to = Square::new(0, 1).unwrap();
        let from = Square::new(0, 0).unwrap();

        assert_eq!(RuleViolation::OwnPieceAtDestination { to }.to_string(), "Invalid move");
        assert_eq!(
            RuleViolation::IllegalShape { kind: PieceKind::HornB, from, to }.to_string(),
            "Invalid move"
        );
        assert_eq!(
            RuleViolation::OwnPieceAtDestination { to }.detail(),
            "own piece at destination (0, 1)"
        );
    }
}
