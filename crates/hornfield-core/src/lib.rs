//! Hornfield match engine.
//!
//! Pure game logic with no I/O: seat assignment, the authoritative board,
//! the turn pointer, move validation, capture and termination. The server
//! crate owns one [`Match`] per room behind a mutex and turns the returned
//! outcomes into network actions.
//!
//! # Match lifecycle
//!
//! ```text
//! Waiting --(2nd join)--> InProgress --(last opponent piece captured)--> Ended
//!                              \--(seated participant leaves)--------> Ended
//! ```
//!
//! `Ended` is terminal. Moves against a match that is not `InProgress` are
//! ignored.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod game;
pub mod rules;

pub use error::RuleViolation;
pub use game::{DisconnectOutcome, IgnoreReason, Match, MoveOutcome, ParticipantId, Phase, SeatResult};
pub use rules::MovePolicy;
