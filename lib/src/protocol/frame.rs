//! The 16-byte wire frame header (C7/§4.7, §6.1).

use std::io;

use crate::byte_cursor::ByteReader;
use crate::byte_cursor::ByteWriter;

/// `"MGIT"` read as a little-endian `u32`.
pub const MAGIC: u32 = 0x4D47_4954;
pub const VERSION: u32 = 1;
pub const HEADER_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame magic mismatch: expected {MAGIC:#010x}, got {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported frame version: {0}")]
    BadVersion(u32),
    #[error("frame header I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Fixed 16-byte header preceding every frame's payload. All fields are
/// little-endian regardless of host byte order, so two peers on different
/// architectures agree on the wire bytes without negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub msg_type: u8,
    pub flags: u8,
    pub payload_size: u32,
}

impl FrameHeader {
    pub fn new(msg_type: u8, payload_size: u32) -> Self {
        Self {
            msg_type,
            flags: 0,
            payload_size,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut w = ByteWriter::new();
        w.write_u32(MAGIC);
        w.write_u32(VERSION);
        w.write_u8(self.msg_type);
        w.write_u8(self.flags);
        w.write_u16(0); // reserved
        w.write_u32(self.payload_size);
        let bytes = w.into_bytes();
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&bytes);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let mut r = ByteReader::new(bytes);
        let magic = r.read_u32()?;
        if magic != MAGIC {
            return Err(FrameError::BadMagic(magic));
        }
        let version = r.read_u32()?;
        if version != VERSION {
            return Err(FrameError::BadVersion(version));
        }
        let msg_type = r.read_u8()?;
        let flags = r.read_u8()?;
        let _reserved = r.read_u16()?;
        let payload_size = r.read_u32()?;
        Ok(Self {
            msg_type,
            flags,
            payload_size,
        })
    }
}
