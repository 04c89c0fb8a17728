//! Content hashing (C1).
//!
//! All object identity in this crate flows through this module. Every other
//! component treats an [`ObjectId`] as an opaque, comparable, orderable
//! string; nothing outside here knows or cares which digest produced it.

use std::fmt;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use sha1::Digest;
use sha1::Sha1;

/// Chunk size used when streaming a file through the digest.
const STREAM_CHUNK: usize = 64 * 1024;

/// A content hash: 40 lowercase hex characters.
///
/// Stored and compared as text because the on-disk format (index lines,
/// `HEAD`, wire messages) represents ids as hex text directly; there is no
/// binary encoding anywhere to round-trip.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    /// Builds an id from an already-hex-encoded string, without re-hashing.
    ///
    /// Used when parsing ids back out of the index, `HEAD`, or wire
    /// messages, where the bytes already are the digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An empty id, used to represent an absent `HEAD` or `parent`.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// First `len` hex characters, used for short display forms in `log`.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hashes a byte sequence, returning its [`ObjectId`].
pub fn hash_bytes(bytes: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    ObjectId(hex::encode(hasher.finalize()))
}

/// Hashes a UTF-8 string, returning its [`ObjectId`].
pub fn hash_str(s: &str) -> ObjectId {
    hash_bytes(s.as_bytes())
}

/// Hashes a file's contents, streaming it in fixed-size chunks so the whole
/// file is never held in memory at once.
pub fn hash_file(path: &Path) -> io::Result<ObjectId> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; STREAM_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ObjectId(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn hash_bytes_is_deterministic() {
        assert_eq!(hash_bytes(b"hello\n"), hash_bytes(b"hello\n"));
        assert_ne!(hash_bytes(b"hello\n"), hash_bytes(b"hello"));
    }

    #[test]
    fn hash_str_matches_hash_bytes() {
        assert_eq!(hash_str("hello\n"), hash_bytes(b"hello\n"));
    }

    #[test]
    fn hash_is_forty_hex_chars() {
        let id = hash_bytes(b"anything");
        assert_eq!(id.as_str().len(), 40);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_file_matches_hash_bytes_for_large_input() {
        let mut file = NamedTempFile::new().unwrap();
        let chunk = vec![b'x'; STREAM_CHUNK + 17];
        file.write_all(&chunk).unwrap();
        file.flush().unwrap();

        assert_eq!(hash_file(file.path()).unwrap(), hash_bytes(&chunk));
    }

    #[test]
    fn short_truncates_without_panicking_past_len() {
        let id = hash_bytes(b"abc");
        assert_eq!(id.short(12).len(), 12);
        assert_eq!(id.short(1000), id.as_str());
    }
}
