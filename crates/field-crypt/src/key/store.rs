//! [`LazyKey`]: write-once holder for a cipher's key material.

use std::sync::{Mutex, OnceLock, PoisonError};

use common::CipherError;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{KeyFile, KEY_LEN};

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// The bytes are wiped with [`zeroize`] when the buffer is dropped. Not
/// `Clone`: each key lives in exactly one place.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyBytes {
    bytes: [u8; KEY_LEN],
}

impl KeyBytes {
    /// Copy `bytes` into a new key buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if `bytes` is not [`KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let bytes = <[u8; KEY_LEN]>::try_from(bytes).map_err(|_| CipherError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("KeyBytes([REDACTED])")
    }
}

/// Key material loaded on first use and cached for the owner's lifetime.
///
/// Initialisation runs under a mutex with a re-check, so concurrent first
/// callers load the key file once. A failed load leaves the holder empty and
/// the next call tries again.
#[derive(Debug)]
pub struct LazyKey {
    source: Option<KeyFile>,
    algorithm: &'static str,
    key: OnceLock<KeyBytes>,
    init: Mutex<()>,
}

impl LazyKey {
    /// Key loaded from `source` on first use, generated there if absent.
    pub fn from_file(source: KeyFile, algorithm: &'static str) -> Self {
        Self {
            source: Some(source),
            algorithm,
            key: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Key supplied directly by the host; never touches the filesystem.
    pub fn preloaded(key: KeyBytes, algorithm: &'static str) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(key);
        Self {
            source: None,
            algorithm,
            key: cell,
            init: Mutex::new(()),
        }
    }

    /// Returns `true` once key material is cached.
    pub fn is_loaded(&self) -> bool {
        self.key.get().is_some()
    }

    /// Borrow the key, loading or generating it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::KeySource`] if the key file cannot be read,
    /// parsed, or created.
    pub fn get(&self) -> Result<&KeyBytes, CipherError> {
        if let Some(key) = self.key.get() {
            return Ok(key);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(key) = self.key.get() {
            return Ok(key);
        }

        let source = self.source.as_ref().ok_or_else(|| CipherError::KeySource {
            path: "<preloaded>".into(),
            reason: "no key source configured".into(),
        })?;
        let loaded = source.load_or_generate(self.algorithm)?;
        debug!(algorithm = self.algorithm, path = %source.path().display(), "key material cached");
        Ok(self.key.get_or_init(|| loaded))
    }
}
