//! At-rest encryption of stored changeset payloads.
//!
//! When a key is supplied, the opaque changeset payloads written to the
//! server history are sealed with XChaCha20-Poly1305 under a random
//! 192-bit nonce stored next to each row. SQLite block encryption is out
//! of reach without SQLCipher; the payloads are the only secret-bearing
//! column.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

use crate::error::{StateError, StateResult};

/// Size of a key file in bytes.
pub const KEY_FILE_SIZE: usize = 64;

/// Size of the XChaCha20-Poly1305 nonce in bytes (192 bits).
pub const NONCE_SIZE: usize = 24;

/// A state-file encryption key, loaded from a 64-byte key file.
///
/// The first 32 bytes key the payload cipher; the remaining 32 bytes are
/// reserved.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_FILE_SIZE],
}

impl EncryptionKey {
    /// Build a key from the raw contents of a key file.
    ///
    /// Anything but exactly 64 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> StateResult<Self> {
        let bytes: [u8; KEY_FILE_SIZE] =
            bytes
                .try_into()
                .map_err(|_| StateError::BadEncryptionKey {
                    expected: KEY_FILE_SIZE,
                    got: bytes.len(),
                })?;
        Ok(Self { bytes })
    }

    fn cipher_key(&self) -> &[u8] {
        &self.bytes[..32]
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey").finish_non_exhaustive()
    }
}

/// Payload cipher bound to a loaded key.
pub(crate) struct PayloadCipher {
    cipher: XChaCha20Poly1305,
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher").finish_non_exhaustive()
    }
}

impl PayloadCipher {
    pub fn new(key: &EncryptionKey) -> StateResult<Self> {
        let cipher = XChaCha20Poly1305::new_from_slice(key.cipher_key())
            .map_err(|e| StateError::Encrypt(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt a payload; returns the ciphertext and the nonce it was
    /// sealed under.
    pub fn seal(&self, plaintext: &[u8]) -> StateResult<(Vec<u8>, [u8; NONCE_SIZE])> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce).map_err(|e| StateError::Encrypt(e.to_string()))?;

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|e| StateError::Encrypt(e.to_string()))?;
        Ok((ciphertext, nonce))
    }

    /// Decrypt a payload sealed by [`PayloadCipher::seal`].
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> StateResult<Vec<u8>> {
        if nonce.len() != NONCE_SIZE {
            return Err(StateError::Decrypt);
        }
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| StateError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey::from_bytes(&[0x42u8; KEY_FILE_SIZE]).unwrap()
    }

    #[test]
    fn key_requires_exactly_64_bytes() {
        assert!(matches!(
            EncryptionKey::from_bytes(&[0u8; 32]),
            Err(StateError::BadEncryptionKey {
                expected: 64,
                got: 32
            })
        ));
        assert!(EncryptionKey::from_bytes(&[0u8; 64]).is_ok());
        assert!(EncryptionKey::from_bytes(&[0u8; 65]).is_err());
    }

    #[test]
    fn seal_open_roundtrip() {
        let cipher = PayloadCipher::new(&test_key()).unwrap();
        let plaintext = b"changeset payload bytes";

        let (ciphertext, nonce) = cipher.seal(plaintext).unwrap();
        assert_ne!(&ciphertext[..], &plaintext[..]);

        let opened = cipher.open(&nonce, &ciphertext).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn open_with_wrong_nonce_fails() {
        let cipher = PayloadCipher::new(&test_key()).unwrap();
        let (ciphertext, _nonce) = cipher.seal(b"payload").unwrap();

        let result = cipher.open(&[0xFF; NONCE_SIZE], &ciphertext);
        assert!(matches!(result, Err(StateError::Decrypt)));
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let cipher = PayloadCipher::new(&test_key()).unwrap();
        let (ciphertext, nonce) = cipher.seal(b"payload").unwrap();

        let other = PayloadCipher::new(&EncryptionKey::from_bytes(&[0x43u8; 64]).unwrap()).unwrap();
        assert!(matches!(other.open(&nonce, &ciphertext), Err(StateError::Decrypt)));
    }

    #[test]
    fn debug_does_not_leak_key_bytes() {
        let key = test_key();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("66")); // 0x42 = 66
    }
}
