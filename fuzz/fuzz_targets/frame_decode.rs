//! Fuzz target for Frame::decode
//!
//! Feeds arbitrary byte sequences to the frame parser looking for:
//! - Panics on short or truncated buffers
//! - Size arithmetic that overflows or over-reads
//! - Headers that pass validation with a bad magic or version
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use hornfield_proto::{Frame, FrameHeader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        assert_eq!(frame.header.magic(), FrameHeader::MAGIC);
        assert_eq!(frame.header.version(), FrameHeader::VERSION);
        assert_eq!(frame.payload.len(), frame.header.payload_size() as usize);
        assert!(FrameHeader::SIZE + frame.payload.len() <= data.len());
    }
});
