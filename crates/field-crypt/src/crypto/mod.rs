//! The [`Cipher`] capability and its AEAD backends.
//!
//! This module is intentionally free of schema and lifecycle concerns. It
//! provides the string-in, string-out operations the walker calls per field;
//! the walker owns the [`common::ENCRYPTION_MARKER`], backends never see it.
//!
//! # Ciphertext formats
//!
//! ```text
//! aes-gcm-siv        v1.<base64url-no-pad(nonce)>.<base64url-no-pad(ciphertext+tag)>
//! chacha20-poly1305  c1.<base64(nonce || ciphertext+tag)>
//! ```

pub mod aes_gcm_siv;
pub mod chacha;

pub use aes_gcm_siv::AesGcmSivCipher;
pub use chacha::ChaChaCipher;

use std::{fmt, path::Path, sync::Arc};

use common::CipherError;
use serde::Deserialize;

/// Authenticated string encryption, swappable at runtime.
///
/// Implementations load key material lazily and cache it for their own
/// lifetime. Decryption must fail, never return garbage, for malformed,
/// truncated or tampered input.
#[cfg_attr(test, mockall::automock)]
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext`, returning the backend's text encoding of the ciphertext.
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    /// Decrypt a value previously produced by [`Cipher::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}

/// A cipher shared between the subscriber and its host.
pub type SharedCipher = Arc<dyn Cipher>;

/// Which backend a host selects through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CipherKind {
    /// [`AesGcmSivCipher`].
    #[serde(rename = "aes-gcm-siv")]
    AesGcmSiv,
    /// [`ChaChaCipher`].
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
    /// Encryption disabled; values pass through unchanged.
    #[serde(rename = "none")]
    None,
}

impl CipherKind {
    /// Configuration name of this backend.
    pub fn as_str(self) -> &'static str {
        match self {
            CipherKind::AesGcmSiv => "aes-gcm-siv",
            CipherKind::ChaCha20Poly1305 => "chacha20-poly1305",
            CipherKind::None => "none",
        }
    }

    /// Construct the backend with its key stored at `key_file`.
    ///
    /// Returns `None` for [`CipherKind::None`]. The key file is not touched
    /// until the first encrypt or decrypt.
    pub fn build(self, key_file: &Path) -> Option<SharedCipher> {
        match self {
            CipherKind::AesGcmSiv => Some(Arc::new(AesGcmSivCipher::new(key_file))),
            CipherKind::ChaCha20Poly1305 => Some(Arc::new(ChaChaCipher::new(key_file))),
            CipherKind::None => None,
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
