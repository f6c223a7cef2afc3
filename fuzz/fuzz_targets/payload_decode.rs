//! Fuzz target for Payload::from_frame
//!
//! Tests payload deserialization (CBOR decoding) with:
//! - Malformed CBOR data
//! - Type confusion (wrong payload type for opcode)
//! - Boards with bad dimensions or unknown piece codes
//! - Out-of-range squares and seat numbers
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error,
//! and anything that decodes must survive a re-encode unchanged.

#![no_main]

use bytes::Bytes;
use hornfield_proto::{Frame, FrameHeader, Opcode, Payload};
use libfuzzer_sys::fuzz_target;

const OPCODES: [Opcode; 12] = [
    Opcode::JoinRoom,
    Opcode::RequestMove,
    Opcode::Ping,
    Opcode::Leave,
    Opcode::SeatAssigned,
    Opcode::RoomFull,
    Opcode::MatchStarted,
    Opcode::BoardUpdated,
    Opcode::MoveRejected,
    Opcode::MatchEnded,
    Opcode::Pong,
    Opcode::Error,
];

fuzz_target!(|data: &[u8]| {
    for opcode in OPCODES {
        let frame = Frame::new(FrameHeader::new(opcode), Bytes::copy_from_slice(data));

        let Ok(payload) = Payload::from_frame(&frame) else {
            continue;
        };
        assert_eq!(payload.opcode(), opcode);

        let reencoded = payload.clone().to_frame().expect("decoded payload must encode");
        let decoded = Payload::from_frame(&reencoded).expect("re-encoded payload must decode");
        assert_eq!(decoded, payload);
    }
});
