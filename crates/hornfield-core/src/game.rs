//! A single match: two seats, one board, one turn pointer.
//!
//! `Match` is plain data plus transitions. It performs no locking and no I/O;
//! the server keeps each match behind its own mutex so that the whole
//! validate-then-apply sequence of a move runs atomically.
//!
//! # Invariants
//!
//! - At most two participants are ever seated. Seat numbers follow join order.
//! - `Waiting` holds at most one participant. The second join starts the match.
//! - Only `InProgress` accepts moves. `Ended` is terminal.
//! - `version` counts applied moves and never decreases.

use hornfield_proto::{
    Board, Seat, Square,
    payloads::game::{BoardSnapshot, MatchEnded},
};

use crate::{MovePolicy, RuleViolation};

/// Identity of a connected participant (the gateway's session id).
pub type ParticipantId = u64;

/// Lifecycle phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fewer than two seats filled
    Waiting,
    /// Both seats filled, moves accepted
    InProgress,
    /// Match over. `winner` is `None` when the room was abandoned.
    Ended {
        /// Winning seat
        winner: Option<Seat>,
    },
}

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatResult {
    /// Participant holds `seat`
    AssignedSeat {
        /// Seat held by the participant
        seat: Seat,
        /// This join filled the second seat and started the match
        match_started: bool,
    },
    /// Both seats are taken by other participants
    RoomFull,
}

/// Why a move had no effect at all.
///
/// Ignored moves produce no network traffic; the reason only feeds logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Match is waiting for players or already over
    NotInProgress,
    /// Participant holds no seat in this match
    NotSeated,
    /// Participant's seat is not the turn owner
    NotYourTurn,
    /// Source square is empty or holds an opponent piece
    SourceNotOwned,
}

/// Result of a move request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Move applied, turn passed to the opponent
    Applied(BoardSnapshot),
    /// Move captured the opponent's last piece
    GameEnded(MatchEnded),
    /// Active seat attempted an illegal move; board and turn unchanged
    Rejected(RuleViolation),
    /// Nothing happened
    Ignored(IgnoreReason),
}

/// Result of a participant leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Seat freed while waiting; the room can be joined again
    Vacated(Seat),
    /// Leaver forfeited a running match
    Forfeited {
        /// Seat that left
        leaver: Seat,
        /// Result for the remaining seat
        ended: MatchEnded,
    },
    /// Match was already over; nothing changes
    AlreadyEnded,
    /// Participant holds no seat here
    NotSeated,
}

/// Authoritative state of one room.
///
/// Generic over the clock's instant type so tests can drive retention with a
/// virtual clock.
#[derive(Debug, Clone)]
pub struct Match<I> {
    room_id: String,
    seats: Vec<ParticipantId>,
    board: Board,
    turn: Seat,
    phase: Phase,
    version: u64,
    last_activity: I,
    ended_at: Option<I>,
}

impl<I: Copy> Match<I> {
    /// Fresh match in `Waiting` with the starting layout and Player 1 to move.
    pub fn new(room_id: impl Into<String>, now: I) -> Self {
        Self {
            room_id: room_id.into(),
            seats: Vec::with_capacity(2),
            board: Board::starting(),
            turn: Seat::Player1,
            phase: Phase::Waiting,
            version: 0,
            last_activity: now,
            ended_at: None,
        }
    }

    /// Match resumed from an arbitrary position, already `InProgress`.
    ///
    /// Both participants are seated in order and `turn` moves next.
    pub fn resume(
        room_id: impl Into<String>,
        players: [ParticipantId; 2],
        board: Board,
        turn: Seat,
        now: I,
    ) -> Self {
        Self {
            seats: players.to_vec(),
            board,
            turn,
            phase: Phase::InProgress,
            ..Self::new(room_id, now)
        }
    }

    /// Room identifier.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Seated participants in seat order.
    pub fn seats(&self) -> &[ParticipantId] {
        &self.seats
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Seat allowed to move next.
    pub fn turn(&self) -> Seat {
        self.turn
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of applied moves.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Last join or applied move.
    pub fn last_activity(&self) -> I {
        self.last_activity
    }

    /// When the match ended, if it has.
    pub fn ended_at(&self) -> Option<I> {
        self.ended_at
    }

    /// Seat held by `participant`, if any.
    pub fn seat_of(&self, participant: ParticipantId) -> Option<Seat> {
        let index = self.seats.iter().position(|p| *p == participant)?;
        u8::try_from(index + 1).ok().and_then(Seat::from_number)
    }

    /// Participant sitting in `seat`, if filled.
    pub fn participant(&self, seat: Seat) -> Option<ParticipantId> {
        self.seats.get(usize::from(seat.number()) - 1).copied()
    }

    /// Full state as sent in `MatchStarted` and `BoardUpdated`.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            room_id: self.room_id.clone(),
            board: self.board.clone(),
            turn: self.turn,
            version: self.version,
        }
    }

    /// Seat a participant.
    ///
    /// A participant already seated here gets the same seat back. A full
    /// room is never mutated.
    pub fn join(&mut self, participant: ParticipantId, now: I) -> SeatResult {
        if let Some(seat) = self.seat_of(participant) {
            return SeatResult::AssignedSeat { seat, match_started: false };
        }

        if self.phase != Phase::Waiting {
            return SeatResult::RoomFull;
        }

        self.seats.push(participant);
        self.last_activity = now;

        let seat = if self.seats.len() == 2 { Seat::Player2 } else { Seat::Player1 };
        let match_started = seat == Seat::Player2;
        if match_started {
            self.phase = Phase::InProgress;
            tracing::debug!(room_id = %self.room_id, "match started");
        }

        SeatResult::AssignedSeat { seat, match_started }
    }

    /// Validate and apply a move.
    ///
    /// Checks run in a fixed order and stop at the first failure: phase,
    /// seat, turn, source ownership, then `policy`. On success the piece is
    /// relocated, any opponent piece on `to` is captured, and the match
    /// either ends or passes the turn.
    pub fn apply_move(
        &mut self,
        participant: ParticipantId,
        from: Square,
        to: Square,
        policy: MovePolicy,
        now: I,
    ) -> MoveOutcome {
        if self.phase != Phase::InProgress {
            return MoveOutcome::Ignored(IgnoreReason::NotInProgress);
        }

        let Some(seat) = self.seat_of(participant) else {
            return MoveOutcome::Ignored(IgnoreReason::NotSeated);
        };

        if seat != self.turn {
            return MoveOutcome::Ignored(IgnoreReason::NotYourTurn);
        }

        let Some(piece) = self.board.get(from).filter(|p| p.owner == seat) else {
            return MoveOutcome::Ignored(IgnoreReason::SourceNotOwned);
        };

        if let Err(violation) = policy.check(&self.board, piece, from, to) {
            return MoveOutcome::Rejected(violation);
        }

        let captured = self.board.relocate(from, to);
        self.version += 1;
        self.last_activity = now;

        if captured.is_some() {
            tracing::trace!(room_id = %self.room_id, %to, "capture");
        }

        if self.board.count(seat.opponent()) == 0 {
            return MoveOutcome::GameEnded(self.finish(Some(seat), now));
        }

        self.turn = seat.opponent();
        MoveOutcome::Applied(self.snapshot())
    }

    /// Remove a participant.
    ///
    /// Leaving while waiting frees the seat. Leaving a running match forfeits
    /// it to the other seat.
    pub fn disconnect(&mut self, participant: ParticipantId, now: I) -> DisconnectOutcome {
        let Some(seat) = self.seat_of(participant) else {
            return DisconnectOutcome::NotSeated;
        };

        match self.phase {
            Phase::Waiting => {
                self.seats.retain(|p| *p != participant);
                self.last_activity = now;
                DisconnectOutcome::Vacated(seat)
            },
            Phase::InProgress => {
                let ended = self.finish(Some(seat.opponent()), now);
                DisconnectOutcome::Forfeited { leaver: seat, ended }
            },
            Phase::Ended { .. } => DisconnectOutcome::AlreadyEnded,
        }
    }

    /// End a running match without a winner.
    ///
    /// Returns `None` if the match had not started or is already over.
    pub fn abandon(&mut self, now: I) -> Option<MatchEnded> {
        match self.phase {
            Phase::InProgress => Some(self.finish(None, now)),
            Phase::Waiting | Phase::Ended { .. } => None,
        }
    }

    fn finish(&mut self, winner: Option<Seat>, now: I) -> MatchEnded {
        self.phase = Phase::Ended { winner };
        self.ended_at = Some(now);

        let message = match winner {
            Some(seat) => format!("{seat} wins!"),
            None => "Match abandoned".to_string(),
        };
        tracing::debug!(room_id = %self.room_id, %message, "match ended");

        MatchEnded { room_id: self.room_id.clone(), message, winner, board: self.board.clone() }
    }
}
