//! Error taxonomy shared across crates.

use thiserror::Error;

/// Failure raised by a cipher backend or while loading its key material.
///
/// The walker and the lifecycle subscriber propagate these unmodified; a failed
/// pre-write transformation must abort the host's flush.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Key material could not be loaded from, or persisted to, the key source.
    #[error("key source {path}: {reason}")]
    KeySource {
        /// Location of the key file.
        path: String,
        /// What went wrong. Never contains key material.
        reason: String,
    },

    /// The key is the wrong length for the backend.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Length required by the backend.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// AEAD encryption failed, or decryption failed authentication
    /// (wrong key or tampered ciphertext).
    #[error("aead operation failed")]
    AeadFailure,

    /// The ciphertext does not match the backend's encoding
    /// (wrong version prefix, bad base64, truncated).
    #[error("invalid ciphertext format")]
    InvalidFormat,

    /// Authenticated decryption succeeded but the plaintext is not UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Host policy violations around cipher configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Encryption is required by policy but no cipher is active.
    #[error("encryption is required but no cipher is configured")]
    CipherRequired,
}

/// Error returned from the lifecycle hooks.
///
/// Cipher failures pass through transparently so the host sees exactly what
/// the backend signalled.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A cipher operation failed; traversal stopped at the failing field.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// The configured policy rejected the operation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
