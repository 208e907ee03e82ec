//! Field-level encryption for sensitive strings.
//!
//! Key: URL-safe base64 of 32 random bytes.
//! Cipher: AES-256-GCM with a random 12-byte nonce per message.
//! Token: URL-safe base64 of `nonce (12 bytes) || ciphertext (includes GCM tag)`.

use crate::config::Config;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("decryption failed: token is invalid, tampered with, or was made with another key")]
    Decryption,
    #[error("encryption failed")]
    Encryption,
    #[error("decrypted data is not valid UTF-8")]
    Utf8,
}

pub struct DataEncryption {
    cipher: Aes256Gcm,
    ephemeral: bool,
}

impl std::fmt::Debug for DataEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataEncryption").field("ephemeral", &self.ephemeral).finish_non_exhaustive()
    }
}

/// A fresh key in the format `ENCRYPTION_KEY` expects.
pub fn generate_key() -> String {
    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    URL_SAFE.encode(key)
}

impl DataEncryption {
    /// Uses `key` when given, otherwise generates one. A generated key only lives as long
    /// as the process, so anything encrypted with it is lost on restart.
    pub fn new(key: Option<&str>) -> Result<Self, EncryptionError> {
        match key {
            Some(key) => Self::from_key(key, false),
            None => {
                log::warn!("No ENCRYPTION_KEY configured; using an ephemeral key. Encrypted data will not survive a restart.");
                Self::from_key(&generate_key(), true)
            }
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, EncryptionError> {
        Self::new(config.encryption_key.as_deref())
    }

    fn from_key(key: &str, ephemeral: bool) -> Result<Self, EncryptionError> {
        let bytes = URL_SAFE
            .decode(key.trim())
            .map_err(|e| EncryptionError::InvalidKey(format!("not URL-safe base64 ({})", e)))?;
        if bytes.len() != KEY_LEN {
            return Err(EncryptionError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes).map_err(|e| EncryptionError::InvalidKey(e.to_string()))?;
        Ok(DataEncryption { cipher, ephemeral })
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| EncryptionError::Encryption)?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(token))
    }

    pub fn decrypt(&self, token: &str) -> Result<String, EncryptionError> {
        let raw = URL_SAFE.decode(token.trim()).map_err(|_| EncryptionError::Decryption)?;
        if raw.len() < NONCE_LEN {
            return Err(EncryptionError::Decryption);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| EncryptionError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| EncryptionError::Utf8)
    }

    /// `None` passes through untouched.
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, EncryptionError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    pub fn decrypt_opt(&self, token: Option<&str>) -> Result<Option<String>, EncryptionError> {
        token.map(|t| self.decrypt(t)).transpose()
    }
}
