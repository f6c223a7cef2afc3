//! Fuzz target for frame header boundary conditions
//!
//! Prevent DoS via malformed frame headers read off the wire
//!
//! # Strategy
//!
//! - Magic bytes: Valid, off-by-one, all-zeros, all-ones, random
//! - Payload size: Zero, small, at-max, just-over-max, u32::MAX
//! - Version: Valid (0x01), zero, max, random
//! - Request id: Boundary values (0, 1, MAX)
//!
//! # Invariants
//!
//! - `payload_size > MAX_PAYLOAD_SIZE` MUST return
//!   `ProtocolError::PayloadTooLarge`
//! - Invalid magic bytes MUST return `ProtocolError::InvalidMagic`
//! - All decode errors MUST be structured (never panic)
//! - Encoded size MUST equal 16 + payload_size
//! - Request id MUST survive an encode/decode cycle

#![no_main]

use arbitrary::Arbitrary;
use hornfield_proto::{Frame, FrameHeader, Opcode, ProtocolError};
use libfuzzer_sys::fuzz_target;

const HORN_MAGIC: [u8; 4] = FrameHeader::MAGIC.to_be_bytes();
const MAX_PAYLOAD_SIZE: u32 = FrameHeader::MAX_PAYLOAD_SIZE;

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryFrame {
    magic: MagicBytes,
    version: VersionBytes,
    opcode: u16,
    payload_size: PayloadSize,
    request_id: RequestId,
}

#[derive(Debug, Clone, Arbitrary)]
enum MagicBytes {
    Valid,
    OffByOne(u8),
    AllZeros,
    AllOnes,
    Random([u8; 4]),
}

#[derive(Debug, Clone, Arbitrary)]
enum VersionBytes {
    Valid,
    Zero,
    Max,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadSize {
    Zero,
    Small(u8),
    AtMaxBoundary,
    JustOverMax,
    MaxU32,
    Random(u32),
}

#[derive(Debug, Clone, Arbitrary)]
enum RequestId {
    Zero,
    One,
    MaxU32,
    Random(u32),
}

fuzz_target!(|boundary: BoundaryFrame| {
    let payload_size_value = match boundary.payload_size {
        PayloadSize::Zero => 0,
        PayloadSize::Small(s) => u32::from(s),
        PayloadSize::AtMaxBoundary => MAX_PAYLOAD_SIZE,
        PayloadSize::JustOverMax => MAX_PAYLOAD_SIZE.saturating_add(1),
        PayloadSize::MaxU32 => u32::MAX,
        PayloadSize::Random(r) => r,
    };

    let actual_payload_size = payload_size_value.min(MAX_PAYLOAD_SIZE + 16) as usize;
    let mut buffer = vec![0u8; FrameHeader::SIZE + actual_payload_size];

    match boundary.magic {
        MagicBytes::Valid => buffer[0..4].copy_from_slice(&HORN_MAGIC),
        MagicBytes::OffByOne(offset) => {
            buffer[0..4].copy_from_slice(&HORN_MAGIC);
            let idx = (offset % 4) as usize;
            buffer[idx] = buffer[idx].wrapping_add(1);
        },
        MagicBytes::AllZeros => buffer[0..4].fill(0),
        MagicBytes::AllOnes => buffer[0..4].fill(0xFF),
        MagicBytes::Random(bytes) => buffer[0..4].copy_from_slice(&bytes),
    }

    let version_value: u8 = match boundary.version {
        VersionBytes::Valid => FrameHeader::VERSION,
        VersionBytes::Zero => 0,
        VersionBytes::Max => u8::MAX,
        VersionBytes::Random(v) => v,
    };
    buffer[4] = version_value;
    buffer[6..8].copy_from_slice(&boundary.opcode.to_be_bytes());
    buffer[8..12].copy_from_slice(&payload_size_value.to_be_bytes());

    let request_id_value = match boundary.request_id {
        RequestId::Zero => 0,
        RequestId::One => 1,
        RequestId::MaxU32 => u32::MAX,
        RequestId::Random(r) => r,
    };
    buffer[12..16].copy_from_slice(&request_id_value.to_be_bytes());

    match Frame::decode(&buffer) {
        Ok(frame) => {
            assert_eq!(buffer[0..4], HORN_MAGIC);
            assert_eq!(version_value, FrameHeader::VERSION);
            assert!(payload_size_value <= MAX_PAYLOAD_SIZE);
            assert_eq!(frame.header.request_id(), request_id_value);
            assert_eq!(frame.header.opcode(), boundary.opcode);
        },
        Err(ProtocolError::InvalidMagic) => assert_ne!(buffer[0..4], HORN_MAGIC),
        Err(ProtocolError::PayloadTooLarge { .. }) => {
            assert!(payload_size_value > MAX_PAYLOAD_SIZE);
        },
        Err(_) => {},
    }

    if let Some(opcode) = Opcode::from_u16(boundary.opcode) {
        let mut header = FrameHeader::new(opcode);
        header.set_request_id(request_id_value);

        let small_payload = vec![0xAA; actual_payload_size.min(1000)];
        let frame = Frame::new(header, small_payload);

        let mut encoded = Vec::new();
        if frame.encode(&mut encoded).is_err() {
            return;
        }

        assert_eq!(encoded.len(), FrameHeader::SIZE + frame.payload.len());

        let decoded = Frame::decode(&encoded).expect("encoded frame must decode");
        assert_eq!(decoded.header.request_id(), request_id_value);
        assert_eq!(decoded.header.opcode_enum(), Some(opcode));
        assert_eq!(decoded.payload, frame.payload);
    }
});
