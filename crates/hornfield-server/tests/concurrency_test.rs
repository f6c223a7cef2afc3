//! Concurrency tests
//!
//! Many threads drive one `ServerDriver` at once. Seat assignment must stay
//! capped at two with a single `MatchStarted`, racing moves must apply
//! exactly once, and a session that closes while joining is never left
//! holding a seat.

mod common;

use std::{
    sync::{Arc, Barrier},
    thread,
};

use common::{close, connect, driver, inbox, join, request_move, started_match};
use hornfield_core::MovePolicy;
use hornfield_proto::{Opcode, Payload, payloads::room::JoinRoom};
use hornfield_server::{ServerAction, ServerEvent};

const THREADS: u64 = 16;

fn run_concurrently<F>(count: u64, f: F) -> Vec<common::Actions>
where
    F: Fn(u64) -> common::Actions + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(count as usize));
    let f = Arc::new(f);

    let handles: Vec<_> = (1..=count)
        .map(|id| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            thread::spawn(move || {
                barrier.wait();
                f(id)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn broadcasts_of(actions: &[common::Actions], opcode: Opcode) -> Vec<Vec<u64>> {
    actions
        .iter()
        .flatten()
        .filter_map(|action| match action {
            ServerAction::BroadcastToRoom { sessions, frame, .. } if frame.header.opcode_enum() == Some(opcode) => {
                Some(sessions.clone())
            },
            _ => None,
        })
        .collect()
}

#[test]
fn concurrent_joins_seat_exactly_two() {
    let driver = Arc::new(driver(MovePolicy::Geometry));
    for id in 1..=THREADS {
        connect(&driver, id);
    }

    let shared = Arc::clone(&driver);
    let results = run_concurrently(THREADS, move |id| join(&shared, id, "arena"));

    let mut seated = Vec::new();
    let mut full = 0;
    for (index, actions) in results.iter().enumerate() {
        let id = index as u64 + 1;
        match inbox(actions, id).first() {
            Some(Payload::SeatAssigned(assigned)) => seated.push((assigned.seat.number(), id)),
            Some(Payload::RoomFull(_)) => full += 1,
            other => panic!("unexpected reply for {id}: {other:?}"),
        }
    }

    seated.sort_unstable();
    assert_eq!(seated.iter().map(|(seat, _)| *seat).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(full, THREADS as usize - 2);

    let started = broadcasts_of(&results, Opcode::MatchStarted);
    assert_eq!(started.len(), 1, "MatchStarted must be sent exactly once");
    assert_eq!(started[0], seated.iter().map(|(_, id)| *id).collect::<Vec<_>>());

    let room = driver.rooms().lookup("arena").unwrap();
    assert_eq!(room.lock().unwrap().seats().len(), 2);
}

#[test]
fn racing_moves_apply_once() {
    let driver = Arc::new(driver(MovePolicy::Geometry));
    started_match(&driver, "arena", 1, 2);

    // Every thread submits Player 1's opening move
    let shared = Arc::clone(&driver);
    let results = run_concurrently(8, move |_| request_move(&shared, 1, "arena", (0, 2), (2, 2)));

    assert_eq!(broadcasts_of(&results, Opcode::BoardUpdated).len(), 1);

    let room = driver.rooms().lookup("arena").unwrap();
    assert_eq!(room.lock().unwrap().version(), 1);
}

#[test]
fn rooms_progress_independently() {
    let driver = Arc::new(driver(MovePolicy::Geometry));
    for room in 0..THREADS {
        started_match(&driver, &format!("room-{room}"), room * 2 + 100, room * 2 + 101);
    }

    let shared = Arc::clone(&driver);
    let results = run_concurrently(THREADS, move |id| {
        let room = id - 1;
        let room_id = format!("room-{room}");
        let (p1, p2) = (room * 2 + 100, room * 2 + 101);

        let mut actions = request_move(&shared, p1, &room_id, (0, 2), (2, 2));
        actions.extend(request_move(&shared, p2, &room_id, (4, 0), (3, 0)));
        actions.extend(request_move(&shared, p1, &room_id, (0, 0), (1, 0)));
        actions
    });

    assert_eq!(broadcasts_of(&results, Opcode::BoardUpdated).len(), THREADS as usize * 3);
    for room in 0..THREADS {
        let handle = driver.rooms().lookup(&format!("room-{room}")).unwrap();
        assert_eq!(handle.lock().unwrap().version(), 3);
    }
}

#[test]
fn join_racing_close_leaves_no_seat_behind() {
    let driver = Arc::new(driver(MovePolicy::Geometry));

    for round in 0..5_000u64 {
        let session_id = round + 1;
        let room_id = format!("race-{round}");
        connect(&driver, session_id);

        let shared = Arc::clone(&driver);
        let joining_room = room_id.clone();
        run_concurrently(2, move |id| {
            if id == 1 {
                let frame = Payload::JoinRoom(JoinRoom { room_id: joining_room.clone() }).to_frame().unwrap();
                // The close may win, in which case the session is already unknown
                shared.process_event(ServerEvent::FrameReceived { session_id, frame }).unwrap_or_default()
            } else {
                close(&shared, session_id)
            }
        });

        assert_eq!(driver.connection_count(), 0);
        assert_eq!(driver.room_of(session_id), None);
        if let Some(room) = driver.rooms().lookup(&room_id) {
            let game = room.lock().unwrap();
            assert!(!game.seats().contains(&session_id), "closed session {session_id} still seated in {room_id}");
        }
    }

    // A later player opens a room instead of facing a departed one
    connect(&driver, 1_000_000);
    let actions = join(&driver, 1_000_000, "race-0");
    assert!(matches!(inbox(&actions, 1_000_000).first(), Some(Payload::SeatAssigned(a)) if a.seat.number() == 1));
}
