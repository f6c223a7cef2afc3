//! Fuzz target for the server driver
//!
//! Mixes well-formed joins and moves with raw frames carrying arbitrary
//! opcodes and payload bytes, across a handful of sessions and rooms.
//!
//! # Invariants
//!
//! - Frames from a registered session never make `process_event` fail
//! - Broadcasts target at most the two seated sessions
//! - No room ever holds more than two seats
//! - A session bound to a room is seated in it and the room has not ended

#![no_main]

use arbitrary::Arbitrary;
use hornfield_core::Phase;
use hornfield_proto::{
    Frame, FrameHeader, Opcode, Payload, Square,
    payloads::{game::RequestMove, room::JoinRoom},
};
use hornfield_server::{DriverConfig, RetentionPolicy, ServerAction, ServerDriver, ServerEvent, SystemEnv};
use libfuzzer_sys::fuzz_target;

const SESSIONS: u64 = 4;
const ROOMS: [&str; 3] = ["north", "south", ""];

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Join { session: u8, room: u8 },
    Move { session: u8, room: u8, from: (u8, u8), to: (u8, u8) },
    Raw { session: u8, opcode: u16, request_id: u32, payload: Vec<u8> },
    Close { session: u8 },
    Reconnect { session: u8 },
    Tick,
}

fn square((row, col): (u8, u8)) -> Square {
    Square::new(row % 5, col % 5).expect("reduced coordinates are on the board")
}

fn frame_for(payload: Payload) -> Frame {
    payload.to_frame().expect("client payloads encode")
}

fuzz_target!(|ops: Vec<Op>| {
    let config = DriverConfig { retention: RetentionPolicy::disabled(), ..DriverConfig::default() };
    let driver = ServerDriver::new(SystemEnv::new(), config);
    let mut open = [false; SESSIONS as usize];

    for op in ops.into_iter().take(256) {
        let event = match op {
            Op::Join { session, room } => {
                let session_id = u64::from(session) % SESSIONS;
                let room_id = ROOMS[room as usize % ROOMS.len()].to_string();
                let frame = frame_for(Payload::JoinRoom(JoinRoom { room_id }));
                ServerEvent::FrameReceived { session_id, frame }
            },
            Op::Move { session, room, from, to } => {
                let session_id = u64::from(session) % SESSIONS;
                let room_id = ROOMS[room as usize % ROOMS.len()].to_string();
                let frame = frame_for(Payload::RequestMove(RequestMove {
                    room_id,
                    from: square(from),
                    to: square(to),
                }));
                ServerEvent::FrameReceived { session_id, frame }
            },
            Op::Raw { session, opcode, request_id, payload } => {
                let session_id = u64::from(session) % SESSIONS;
                let mut header = FrameHeader::new(Opcode::Ping);
                header.set_request_id(request_id);
                let mut bytes = header.to_bytes();
                bytes[6..8].copy_from_slice(&opcode.to_be_bytes());
                let header = *FrameHeader::from_bytes(&bytes).expect("only the opcode changed");
                let payload = payload.into_iter().take(FrameHeader::MAX_PAYLOAD_SIZE as usize);
                let frame = Frame::new(header, payload.collect::<Vec<u8>>());
                ServerEvent::FrameReceived { session_id, frame }
            },
            Op::Close { session } => {
                let session_id = u64::from(session) % SESSIONS;
                ServerEvent::ConnectionClosed { session_id, reason: "fuzz".to_string() }
            },
            Op::Reconnect { session } => {
                let session_id = u64::from(session) % SESSIONS;
                ServerEvent::ConnectionAccepted { session_id }
            },
            Op::Tick => ServerEvent::Tick,
        };

        let from_open_session = match &event {
            ServerEvent::FrameReceived { session_id, .. } => open[*session_id as usize],
            _ => false,
        };

        let result = driver.process_event(event.clone());
        match &event {
            ServerEvent::ConnectionAccepted { session_id } => {
                assert_eq!(result.is_ok(), !open[*session_id as usize]);
                open[*session_id as usize] = true;
            },
            ServerEvent::ConnectionClosed { session_id, .. } => {
                open[*session_id as usize] = false;
            },
            _ => {},
        }

        if from_open_session {
            assert!(result.is_ok(), "frame from open session failed: {:?}", result.err());
        }

        if let Ok(actions) = result {
            for action in actions {
                if let ServerAction::BroadcastToRoom { sessions, .. } = action {
                    assert!(sessions.len() <= 2);
                }
            }
        }

        for room_id in ROOMS {
            if let Some(room) = driver.rooms().lookup(room_id) {
                assert!(room.lock().unwrap().seats().len() <= 2);
            }
        }

        for session_id in 0..SESSIONS {
            let Some(room_id) = driver.room_of(session_id) else { continue };
            assert!(open[session_id as usize], "closed session {session_id} still bound");
            let room = driver.rooms().lookup(&room_id).expect("bound room exists");
            let game = room.lock().unwrap();
            assert!(game.seats().contains(&session_id));
            assert!(!matches!(game.phase(), Phase::Ended { .. }));
        }
    }
});
