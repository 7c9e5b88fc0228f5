//! ChaCha20-Poly1305 backend.
//!
//! Ciphertext format: `c1.<base64(nonce || ciphertext+tag)>`. Useful on hosts
//! without AES hardware acceleration.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use common::CipherError;

use super::Cipher;
use crate::key::{KeyBytes, KeyFile, LazyKey};

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Prefix that appears at the start of every ciphertext from this backend.
pub const VERSION_PREFIX: &str = "c1";

/// [`Cipher`] backed by ChaCha20-Poly1305 with a lazily loaded key.
#[derive(Debug)]
pub struct ChaChaCipher {
    key: LazyKey,
}

impl ChaChaCipher {
    /// Algorithm name recorded in key files.
    pub const ALGORITHM: &'static str = "chacha20-poly1305";

    /// Cipher whose key is read from, or bootstrapped into, `key_file` on first use.
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key: LazyKey::from_file(KeyFile::new(key_file), Self::ALGORITHM),
        }
    }

    /// Cipher using key bytes supplied by the host.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if `key` is not 32 bytes.
    pub fn with_key(key: &[u8]) -> Result<Self, CipherError> {
        Ok(Self {
            key: LazyKey::preloaded(KeyBytes::from_slice(key)?, Self::ALGORITHM),
        })
    }

    fn aead(&self) -> Result<ChaCha20Poly1305, CipherError> {
        let key = self.key.get()?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())))
    }
}

impl Cipher for ChaChaCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let aead = self.aead()?;
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = aead
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::AeadFailure)?;

        let mut bytes = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&ciphertext);
        Ok(format!("{VERSION_PREFIX}.{}", STANDARD.encode(&bytes)))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let encoded = ciphertext
            .strip_prefix(VERSION_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or(CipherError::InvalidFormat)?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| CipherError::InvalidFormat)?;
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::InvalidFormat);
        }

        let (nonce, sealed) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .aead()?
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::AeadFailure)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}
