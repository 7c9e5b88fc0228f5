//! AES-256-GCM-SIV encryption and decryption of individual string fields.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant:
//! an accidental nonce repeat leaks only whether two plaintexts were equal,
//! rather than breaking confidentiality and authentication outright.
//!
//! **Do NOT substitute plain AES-256-GCM with a fixed nonce.** GCM nonce reuse
//! is catastrophic.

use std::{path::PathBuf, str::FromStr};

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::CipherError;

use super::Cipher;
use crate::key::{KeyBytes, KeyFile, LazyKey, KEY_LEN};

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Prefix that appears at the start of every ciphertext from this backend.
pub const VERSION_PREFIX: &str = "v1";

/// A parsed, encrypted field value.
///
/// The string representation is `v1.<base64url(nonce)>.<base64url(ciphertext+tag)>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl EncryptedField {
    /// Encode this value to its canonical string representation.
    pub fn to_string_repr(&self) -> String {
        format!(
            "{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        )
    }
}

impl FromStr for EncryptedField {
    type Err = CipherError;

    /// Parse an encrypted field string back into an [`EncryptedField`].
    ///
    /// Returns [`CipherError::InvalidFormat`] if the string does not match the
    /// expected `v1.<nonce>.<ciphertext>` structure.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, '.').collect();
        if parts.len() != 3 || parts[0] != VERSION_PREFIX {
            return Err(CipherError::InvalidFormat);
        }
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| CipherError::InvalidFormat)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CipherError::InvalidFormat);
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&nonce_bytes);

        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CipherError::InvalidFormat)?;

        Ok(Self { nonce, ciphertext })
    }
}

/// Encrypt plaintext bytes with a fresh random 96-bit nonce.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] on an internal AEAD error.
pub fn encrypt_field(plaintext: &[u8], key: &[u8]) -> Result<EncryptedField, CipherError> {
    let cipher = build_cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::AeadFailure)?;

    Ok(EncryptedField {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt an [`EncryptedField`] back to plaintext bytes.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key or tampered data).
pub fn decrypt_field(field: &EncryptedField, key: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(&field.nonce);
    cipher
        .decrypt(nonce, field.ciphertext.as_ref())
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: key.len(),
    })
}

/// [`Cipher`] backed by AES-256-GCM-SIV with a lazily loaded key.
#[derive(Debug)]
pub struct AesGcmSivCipher {
    key: LazyKey,
}

impl AesGcmSivCipher {
    /// Algorithm name recorded in key files.
    pub const ALGORITHM: &'static str = "aes-256-gcm-siv";

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
    /// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
    pub fn with_key(key: &[u8]) -> Result<Self, CipherError> {
        Ok(Self {
            key: LazyKey::preloaded(KeyBytes::from_slice(key)?, Self::ALGORITHM),
        })
    }
}

impl Cipher for AesGcmSivCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let key = self.key.get()?;
        Ok(encrypt_field(plaintext.as_bytes(), key.as_bytes())?.to_string_repr())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let field: EncryptedField = ciphertext.parse()?;
        let key = self.key.get()?;
        let plaintext = decrypt_field(&field, key.as_bytes())?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}
