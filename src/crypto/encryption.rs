//! AES-256-GCM encryption of whole chunk payloads.
//!
//! Wire format: 12-byte random nonce || ciphertext || 16-byte auth tag.
//! A fresh nonce is drawn from the OS RNG on every call, so encrypting
//! the same plaintext twice never produces the same payload.

use crate::common::VaultError;
use crate::crypto::EncryptionKey;
use aes_gcm::aead::{Aead, OsRng};
use rand::RngCore;
use sha2::digest::generic_array::GenericArray;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key`, binding a fresh random nonce.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = key
        .cipher()
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| VaultError::Internal(anyhow::anyhow!("AES-GCM encryption failed")))?;

    let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&ciphertext);
    Ok(payload)
}

/// Decrypt a `nonce || ciphertext || tag` payload.
///
/// Fails with [`VaultError::Authentication`] on any corruption, truncation,
/// or key mismatch; never returns partial plaintext.
pub fn decrypt(key: &EncryptionKey, payload: &[u8]) -> Result<Vec<u8>, VaultError> {
    if payload.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::Authentication);
    }
    let (nonce, ciphertext) = payload.split_at(NONCE_LEN);

    key.cipher()
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey::from_utf8("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn round_trip() {
        let key = test_key();
        let plaintext = b"the quick brown fox";
        let payload = encrypt(&key, plaintext).unwrap();
        assert_eq!(decrypt(&key, &payload).unwrap(), plaintext);
    }

    #[test]
    fn round_trip_empty_plaintext() {
        let key = test_key();
        let payload = encrypt(&key, b"").unwrap();
        assert_eq!(decrypt(&key, &payload).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn nonce_is_unique_per_call() {
        let key = test_key();
        let a = encrypt(&key, b"same input").unwrap();
        let b = encrypt(&key, b"same input").unwrap();
        assert_ne!(a, b, "two encryptions of the same plaintext must differ");
        assert_ne!(&a[..12], &b[..12], "nonces must differ");
    }

    #[test]
    fn bit_flip_is_detected() {
        let key = test_key();
        let mut payload = encrypt(&key, b"integrity matters").unwrap();
        // Flip one bit in every position and expect rejection each time
        for i in 0..payload.len() {
            payload[i] ^= 0x01;
            assert!(matches!(
                decrypt(&key, &payload),
                Err(VaultError::Authentication)
            ));
            payload[i] ^= 0x01;
        }
    }

    #[test]
    fn truncation_is_detected() {
        let key = test_key();
        let payload = encrypt(&key, b"hello world").unwrap();
        assert!(matches!(
            decrypt(&key, &payload[..payload.len() - 1]),
            Err(VaultError::Authentication)
        ));
        assert!(matches!(
            decrypt(&key, &payload[..10]),
            Err(VaultError::Authentication)
        ));
        assert!(matches!(decrypt(&key, b""), Err(VaultError::Authentication)));
    }

    #[test]
    fn wrong_key_is_detected() {
        let key = test_key();
        let other = EncryptionKey::from_utf8("ffffffffffffffffffffffffffffffff").unwrap();
        let payload = encrypt(&key, b"secret").unwrap();
        assert!(matches!(
            decrypt(&other, &payload),
            Err(VaultError::Authentication)
        ));
    }
}
