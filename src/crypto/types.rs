use crate::common::VaultError;
use aes_gcm::{Aes256Gcm, KeyInit};
use sha2::digest::generic_array::GenericArray;

/// 256-bit AES key, validated once at configuration time.
#[derive(Clone)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Build a key from a UTF-8 secret that must be exactly 32 bytes.
    pub fn from_utf8(secret: &str) -> Result<Self, VaultError> {
        Self::from_slice(secret.as_bytes())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, VaultError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            VaultError::Config(format!(
                "ENCRYPTION_KEY must be exactly 32 bytes (got {})",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Instantiate the AES-256-GCM cipher for this key.
    pub fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(&self.0))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.write_str("EncryptionKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_key() {
        assert!(matches!(
            EncryptionKey::from_utf8("too-short"),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn accepts_32_byte_key() {
        let key = EncryptionKey::from_utf8("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(key.as_bytes().len(), 32);
    }
}
