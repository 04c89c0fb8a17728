//! The AES-256-CBC encryption envelope (C7/§4.7).
//!
//! Key derivation is PBKDF2-HMAC-SHA256 over a **deterministic** salt —
//! the first 16 bytes of `sha1(password ‖ "salt")` — so both peers derive
//! the same key without exchanging one, fixing the source's inconsistent
//! random-vs-deterministic salt derivation (spec §9). The IV is prepended
//! to the ciphertext; padding is PKCS#7.

use aes::Aes256;
use cbc::cipher::BlockDecryptMut;
use cbc::cipher::BlockEncryptMut;
use cbc::cipher::KeyIvInit;
use cbc::cipher::block_padding::Pkcs7;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rng;
use sha1::Digest;
use sha1::Sha1;
use sha2::Sha256;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const PBKDF2_ITERATIONS: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("ciphertext shorter than one IV")]
    Truncated,
    #[error("padding or block-alignment error during decryption")]
    InvalidPadding,
}

/// A derived 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Derives the key both peers compute from the shared secret: PBKDF2-
    /// HMAC-SHA256 over a deterministic salt, so no salt exchange is
    /// needed pre-authentication.
    pub fn derive(password: &str) -> Self {
        let salt = deterministic_salt(password);
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut key);
        Self(key)
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// `salt = first 16 bytes of sha1(password ‖ "salt")` — spec §9's required
/// fix for the source's inconsistent salt derivation.
fn deterministic_salt(password: &str) -> [u8; 16] {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(b"salt");
    let digest = hasher.finalize();
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&digest[..16]);
    salt
}

/// Encrypts `plaintext` under `key`, returning `IV ‖ ciphertext`. A fresh
/// random IV is generated per call, even though the key is deterministic,
/// so repeated encryptions of identical plaintext do not produce
/// identical ciphertext.
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    rng().fill_bytes(&mut iv);
    let ciphertext = Aes256CbcEnc::new(&key.0.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Recovers the plaintext from `IV ‖ ciphertext`, unpadding PKCS#7.
pub fn decrypt(key: &SessionKey, envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < IV_LEN {
        return Err(CryptoError::Truncated);
    }
    let (iv, ciphertext) = envelope.split_at(IV_LEN);
    Aes256CbcDec::new(&key.0.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidPadding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s8_same_password_and_salt_derive_identical_keys() {
        let k1 = SessionKey::derive("pw");
        let k2 = SessionKey::derive("pw");
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_passwords_derive_different_keys() {
        assert_ne!(SessionKey::derive("pw1"), SessionKey::derive("pw2"));
    }

    #[test]
    fn encrypt_decrypt_round_trips() {
        let key = SessionKey::derive("pw");
        let plaintext = b"hello, minigit";
        let ciphertext = encrypt(&key, plaintext);
        assert_ne!(ciphertext[IV_LEN..], plaintext[..]);
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn round_trips_at_exact_block_size_boundaries() {
        let key = SessionKey::derive("pw");
        for len in [0, 1, 15, 16, 17, 32, 33] {
            let plaintext = vec![b'x'; len];
            let ciphertext = encrypt(&key, &plaintext);
            assert_eq!(decrypt(&key, &ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let key = SessionKey::derive("pw");
        assert_matches::assert_matches!(decrypt(&key, &[0u8; 4]), Err(CryptoError::Truncated));
    }
}
