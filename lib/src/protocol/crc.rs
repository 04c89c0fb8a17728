//! CRC32 integrity checks for object/file payloads (C7/§4.7, §8.6).

use crc32fast::Hasher;

/// CRC32 of `bytes`, computed over the plaintext payload (before any
/// encryption envelope).
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Returns whether `bytes` matches the claimed checksum. Receivers of
/// object/file frames MUST reject on mismatch (§4.7).
pub fn verify(bytes: &[u8], expected: u32) -> bool {
    crc32(bytes) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_value() {
        // crc32("123456789") is the standard CRC32 check value.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn single_byte_flip_is_detected() {
        let original = b"push object payload".to_vec();
        let checksum = crc32(&original);
        assert!(verify(&original, checksum));

        let mut flipped = original.clone();
        flipped[0] ^= 0x01;
        assert!(!verify(&flipped, checksum));
    }
}
