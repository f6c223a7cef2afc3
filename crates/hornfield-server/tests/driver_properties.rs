//! Property-based tests for the server driver.
//!
//! Applies arbitrary sequences of joins, moves and disconnects and checks
//! the invariants that must hold after every step.

mod common;

use std::collections::HashMap;

use common::{close, connect, driver, inbox, join, request_move};
use hornfield_core::{MovePolicy, Phase};
use hornfield_proto::{Opcode, Payload};
use hornfield_server::{ServerAction, ServerDriver};
use proptest::prelude::*;

const SESSIONS: u64 = 5;
const ROOMS: [&str; 2] = ["a", "b"];

#[derive(Debug, Clone)]
enum Op {
    Join { session: u64, room: usize },
    Move { session: u64, room: usize, from: (u8, u8), to: (u8, u8) },
    Close { session: u64 },
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    let session = 1..=SESSIONS;
    let room = 0..ROOMS.len();
    let square = (0u8..5, 0u8..5);

    prop_oneof![
        3 => (session.clone(), room.clone()).prop_map(|(session, room)| Op::Join { session, room }),
        6 => (session.clone(), room, square.clone(), square)
            .prop_map(|(session, room, from, to)| Op::Move { session, room, from, to }),
        1 => session.prop_map(|session| Op::Close { session }),
    ]
}

fn check_bindings(driver: &ServerDriver<common::TestEnv>, open: &[u64]) -> Result<(), TestCaseError> {
    for session in open {
        let Some(room_id) = driver.room_of(*session) else { continue };
        let room = driver.rooms().lookup(&room_id);
        prop_assert!(room.is_some(), "session {} bound to missing room {}", session, room_id);

        let room = room.unwrap();
        let game = room.lock().unwrap();
        prop_assert!(game.seats().contains(session));
        prop_assert!(!matches!(game.phase(), Phase::Ended { .. }), "session {} bound to ended room {}", session, room_id);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn driver_invariants_hold(ops in prop::collection::vec(arbitrary_op(), 1..120), occupancy in any::<bool>()) {
        let policy = if occupancy { MovePolicy::Occupancy } else { MovePolicy::Geometry };
        let driver = driver(policy);
        let mut open: Vec<u64> = (1..=SESSIONS).collect();
        for session in &open {
            connect(&driver, *session);
        }
        let mut started: HashMap<String, usize> = HashMap::new();

        for op in ops {
            let actions = match op {
                Op::Join { session, room } if open.contains(&session) => {
                    let actions = join(&driver, session, ROOMS[room]);
                    let replies = inbox(&actions, session);
                    let direct = replies
                        .iter()
                        .filter(|p| matches!(p, Payload::SeatAssigned(_) | Payload::RoomFull(_) | Payload::Error(_)))
                        .count();
                    prop_assert_eq!(direct, 1, "join must get exactly one direct reply");
                    actions
                },
                Op::Move { session, room, from, to } if open.contains(&session) => {
                    request_move(&driver, session, ROOMS[room], from, to)
                },
                Op::Close { session } if open.contains(&session) => {
                    open.retain(|s| *s != session);
                    close(&driver, session)
                },
                _ => continue,
            };

            for action in &actions {
                if let ServerAction::BroadcastToRoom { room_id, sessions, frame } = action {
                    prop_assert!(sessions.len() <= 2);
                    if frame.header.opcode_enum() == Some(Opcode::MatchStarted) {
                        *started.entry(room_id.clone()).or_default() += 1;
                    }
                }
            }

            for room_id in ROOMS {
                prop_assert!(started.get(room_id).copied().unwrap_or(0) <= 1);
                if let Some(room) = driver.rooms().lookup(room_id) {
                    prop_assert!(room.lock().unwrap().seats().len() <= 2);
                }
            }
            check_bindings(&driver, &open)?;
        }
    }
}
