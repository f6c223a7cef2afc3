//! Fuzz target for the match engine
//!
//! Drives a single `Match` with arbitrary joins, moves and disconnects from a
//! small pool of participants.
//!
//! # Invariants
//!
//! - At most two seats, filled in join order
//! - Board version increases by exactly one per applied move
//! - Ignored and rejected moves leave the board untouched
//! - Piece counts never grow
//! - An ended match never changes again

#![no_main]

use arbitrary::Arbitrary;
use hornfield_core::{DisconnectOutcome, Match, MoveOutcome, MovePolicy, Phase};
use hornfield_proto::{BOARD_SIZE, Seat, Square};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    occupancy_only: bool,
    ops: Vec<Op>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Join { participant: u8 },
    Move { participant: u8, from: (u8, u8), to: (u8, u8) },
    Disconnect { participant: u8 },
    Abandon,
}

fn square((row, col): (u8, u8)) -> Square {
    let size = BOARD_SIZE as u8;
    Square::new(row % size, col % size).expect("reduced coordinates are on the board")
}

fuzz_target!(|scenario: Scenario| {
    let policy = if scenario.occupancy_only { MovePolicy::Occupancy } else { MovePolicy::Geometry };
    let mut game = Match::new("fuzz", 0u64);

    for (tick, op) in (1u64..).zip(scenario.ops.into_iter().take(512)) {
        let before = game.clone();
        let ended_before = matches!(before.phase(), Phase::Ended { .. });

        match op {
            Op::Join { participant } => {
                game.join(u64::from(participant % 4), tick);
            },
            Op::Move { participant, from, to } => {
                let outcome =
                    game.apply_move(u64::from(participant % 4), square(from), square(to), policy, tick);
                match outcome {
                    MoveOutcome::Applied(snapshot) => {
                        assert_eq!(snapshot.version, before.version() + 1);
                        assert_ne!(snapshot.turn, before.turn());
                    },
                    MoveOutcome::GameEnded(ended) => {
                        assert_eq!(game.version(), before.version() + 1);
                        let winner = ended.winner.expect("capture win names a seat");
                        assert_eq!(ended.board.count(winner.opponent()), 0);
                    },
                    MoveOutcome::Rejected(_) | MoveOutcome::Ignored(_) => {
                        assert_eq!(game.board(), before.board());
                        assert_eq!(game.version(), before.version());
                        assert_eq!(game.phase(), before.phase());
                    },
                }
            },
            Op::Disconnect { participant } => {
                if let DisconnectOutcome::Forfeited { leaver, ended } =
                    game.disconnect(u64::from(participant % 4), tick)
                {
                    assert_eq!(ended.winner, Some(leaver.opponent()));
                }
            },
            Op::Abandon => {
                if let Some(ended) = game.abandon(tick) {
                    assert_eq!(ended.winner, None);
                }
            },
        }

        assert!(game.seats().len() <= 2);
        for seat in [Seat::Player1, Seat::Player2] {
            assert!(game.board().count(seat) <= before.board().count(seat));
        }
        if ended_before {
            assert_eq!(game.phase(), before.phase());
            assert_eq!(game.board(), before.board());
        }
    }
});
