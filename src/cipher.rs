//! AES-256-GCM sealing of store documents.
//!
//! A sealed document is `base64(nonce || ciphertext)` where the nonce is a
//! fresh 96-bit random value per write and the document name is bound in as
//! associated data, so a file copied over another store's file fails to open.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::prelude::*;

use crate::error::StoreError;
use crate::storage::Storage;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// 256-bit key protecting a store's document.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LEN]);

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl MasterKey {
    /// Draws a new key from the OS random number generator.
    pub fn generate() -> Result<Self, StoreError> {
        let mut bytes = [0u8; KEY_LEN];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| StoreError::InvalidKey(format!("random source unavailable: {}", e)))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            StoreError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, StoreError> {
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    /// Returns the key stored under `alias`, creating and persisting one on first use.
    pub fn load_or_create(storage: &dyn Storage, alias: &str) -> Result<Self, StoreError> {
        if let Some(encoded) = storage.read(alias)? {
            return Self::from_base64(&encoded);
        }

        let key = Self::generate()?;
        storage.write(alias, &key.to_base64())?;
        tracing::debug!(alias, path = %storage.get_path(alias), "created master key");
        Ok(key)
    }
}

/// Seals and opens documents for one named store.
pub struct DocumentCipher {
    cipher: Aes256Gcm,
    name: String,
}

impl std::fmt::Debug for DocumentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCipher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl DocumentCipher {
    pub fn new(key: &MasterKey, name: &str) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(&key.0);
        Self {
            cipher: Aes256Gcm::new(key),
            name: name.to_string(),
        }
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, StoreError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|_| StoreError::Encrypt(self.name.clone()))?;

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: self.name.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Encrypt(self.name.clone()))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        Ok(BASE64_STANDARD.encode(framed))
    }

    pub fn open(&self, sealed: &str) -> Result<String, StoreError> {
        let framed = BASE64_STANDARD
            .decode(sealed.trim())
            .map_err(|e| StoreError::Corrupt(self.name.clone(), e.to_string()))?;
        if framed.len() < NONCE_LEN {
            return Err(StoreError::Corrupt(
                self.name.clone(),
                format!("sealed document is only {} bytes", framed.len()),
            ));
        }

        let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: self.name.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Decrypt(self.name.clone()))?;

        String::from_utf8(plaintext)
            .map_err(|e| StoreError::Corrupt(self.name.clone(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn sealed_text_is_not_plaintext_and_opens_back() {
        let cipher = DocumentCipher::new(&MasterKey::generate().unwrap(), "prefs");
        let sealed = cipher.seal("userName = \"alice\"").unwrap();
        assert!(!sealed.contains("alice"));
        assert_eq!(cipher.open(&sealed).unwrap(), "userName = \"alice\"");
    }

    #[test]
    fn nonce_differs_between_seals() {
        let cipher = DocumentCipher::new(&MasterKey::generate().unwrap(), "prefs");
        assert_ne!(cipher.seal("same").unwrap(), cipher.seal("same").unwrap());
    }

    #[test]
    fn wrong_key_or_name_fails_to_decrypt() {
        let key = MasterKey::generate().unwrap();
        let sealed = DocumentCipher::new(&key, "prefs").seal("x").unwrap();

        let other_key = DocumentCipher::new(&MasterKey::generate().unwrap(), "prefs");
        assert!(matches!(other_key.open(&sealed), Err(StoreError::Decrypt(_))));

        let other_name = DocumentCipher::new(&key, "other");
        assert!(matches!(other_name.open(&sealed), Err(StoreError::Decrypt(_))));
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let cipher = DocumentCipher::new(&MasterKey::generate().unwrap(), "prefs");
        assert!(matches!(cipher.open("not base64!"), Err(StoreError::Corrupt(..))));
        assert!(matches!(cipher.open("AAAA"), Err(StoreError::Corrupt(..))));
    }

    #[test]
    fn master_key_is_created_once() {
        let storage = MemoryStorage::new();
        let first = MasterKey::load_or_create(&storage, "prefs.key").unwrap();
        let second = MasterKey::load_or_create(&storage, "prefs.key").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(matches!(MasterKey::from_bytes(&[1, 2, 3]), Err(StoreError::InvalidKey(_))));
    }
}
