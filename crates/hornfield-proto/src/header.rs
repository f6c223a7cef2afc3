//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 16-byte structure serialized as raw binary
//! (Big Endian). The gateway reads exactly this many bytes, learns the opcode
//! and payload size, then reads the payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 16-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so every 16-byte pattern is a valid
/// value and the struct can be cast straight from untrusted network bytes.
/// Validity (magic, version, size limit) is checked by [`FrameHeader::from_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],                   // 0x484F524E ("HORN")
    version: u8,                      // 0x01
    reserved: u8,                     // always 0
    pub(crate) opcode: [u8; 2],       // u16 operation code
    pub(crate) payload_size: [u8; 4], // u32 payload length
    request_id: [u8; 4],              // u32 client nonce
}

impl FrameHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 16;

    /// Magic number: "HORN" in ASCII
    pub const MAGIC: u32 = 0x484F_524E;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (64 KiB). A full board snapshot is a few hundred
    /// bytes.
    pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024;

    /// Header for `opcode` with an empty payload and request id 0.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            reserved: 0,
            opcode: opcode.to_u16().to_be_bytes(),
            payload_size: [0; 4],
            request_id: [0; 4],
        }
    }

    /// Borrow a validated header from the front of `bytes`.
    ///
    /// Trailing bytes after the header are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is shorter than 16 bytes
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if protocol version is unsupported
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Wire bytes of the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Raw opcode, including values this build does not know.
    #[must_use]
    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes(self.opcode)
    }

    /// Known opcode, if any.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode())
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Client-assigned nonce, echoed on direct replies.
    #[must_use]
    pub fn request_id(&self) -> u32 {
        u32::from_be_bytes(self.request_id)
    }

    /// Set the request nonce.
    pub fn set_request_id(&mut self, request_id: u32) {
        self.request_id = request_id.to_be_bytes();
    }
}

// Packed fields cannot be borrowed, so Debug and PartialEq go through the
// accessors and the wire bytes.
impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opcode = self.opcode_enum().map_or_else(|| format!("{:#06x}", self.opcode()), |op| format!("{op:?}"));
        f.debug_struct("FrameHeader")
            .field("opcode", &opcode)
            .field("payload_size", &self.payload_size())
            .field("request_id", &self.request_id())
            .finish_non_exhaustive()
    }
}

impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn raw(magic: u32, version: u8, payload_size: u32) -> [u8; FrameHeader::SIZE] {
        let mut buf = [0u8; FrameHeader::SIZE];
        buf[0..4].copy_from_slice(&magic.to_be_bytes());
        buf[4] = version;
        buf[6..8].copy_from_slice(&Opcode::JoinRoom.to_u16().to_be_bytes());
        buf[8..12].copy_from_slice(&payload_size.to_be_bytes());
        buf
    }

    #[test]
    fn layout_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
        assert_eq!(&FrameHeader::new(Opcode::Ping).to_bytes()[0..4], b"HORN");
    }

    proptest! {
        #[test]
        fn parses_what_it_writes(
            opcode in any::<u16>(),
            payload_size in 0u32..=FrameHeader::MAX_PAYLOAD_SIZE,
            request_id in any::<u32>(),
        ) {
            let mut bytes = raw(FrameHeader::MAGIC, FrameHeader::VERSION, payload_size);
            bytes[6..8].copy_from_slice(&opcode.to_be_bytes());
            bytes[12..16].copy_from_slice(&request_id.to_be_bytes());

            let header = FrameHeader::from_bytes(&bytes).expect("valid header");
            prop_assert_eq!(header.opcode(), opcode);
            prop_assert_eq!(header.payload_size(), payload_size);
            prop_assert_eq!(header.request_id(), request_id);
            prop_assert_eq!(header.to_bytes(), bytes);
        }
    }

    #[test]
    fn new_sets_opcode() {
        let mut header = FrameHeader::new(Opcode::RequestMove);
        header.set_request_id(7);

        assert_eq!(header.opcode_enum(), Some(Opcode::RequestMove));
        assert_eq!(header.payload_size(), 0);
        assert_eq!(header.request_id(), 7);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut buf = raw(FrameHeader::MAGIC, FrameHeader::VERSION, 3).to_vec();
        buf.extend_from_slice(b"abc");

        let header = FrameHeader::from_bytes(&buf).expect("valid header");
        assert_eq!(header.opcode_enum(), Some(Opcode::JoinRoom));
        assert_eq!(header.payload_size(), 3);
    }

    #[test]
    fn rejects_malformed_headers() {
        let too_big = FrameHeader::MAX_PAYLOAD_SIZE + 1;

        assert_eq!(
            FrameHeader::from_bytes(&[0u8; 10]),
            Err(ProtocolError::FrameTooShort { expected: 16, actual: 10 })
        );
        assert_eq!(
            FrameHeader::from_bytes(&raw(0x4C4F_4652, FrameHeader::VERSION, 0)),
            Err(ProtocolError::InvalidMagic)
        );
        assert_eq!(
            FrameHeader::from_bytes(&raw(FrameHeader::MAGIC, 2, 0)),
            Err(ProtocolError::UnsupportedVersion(2))
        );
        assert!(matches!(
            FrameHeader::from_bytes(&raw(FrameHeader::MAGIC, FrameHeader::VERSION, too_big)),
            Err(ProtocolError::PayloadTooLarge { size, .. }) if size == too_big as usize
        ));
    }
}
