//! Key-file loading and first-run key bootstrap.
//!
//! # Lifecycle
//!
//! 1. A cipher is constructed with a [`KeyFile`] path; nothing is read yet.
//! 2. On the first encrypt or decrypt, [`store::LazyKey`] calls
//!    [`KeyFile::load_or_generate`].
//! 3. If the file exists it is parsed and verified. Otherwise 32 random bytes
//!    are generated, staged in a temporary file next to the target and moved
//!    into place without clobbering a file another process created meanwhile.
//! 4. The key stays cached for the cipher's lifetime.
//!
//! # File format
//!
//! ```json
//! {"version":1,"algorithm":"aes-256-gcm-siv","key":"<base64>","checksum":"<base64 sha256(key)>"}
//! ```
//!
//! # Security invariants
//!
//! - Key material is **never** logged or included in error messages.
//! - New key files are created with owner-only permissions on Unix.
//! - Decoded and encoded key buffers are wiped with `zeroize` once used.

pub mod store;

pub use store::{KeyBytes, LazyKey};

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::CipherError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Byte length of every backend key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Current key-file format version.
pub const KEY_FILE_VERSION: u32 = 1;

/// Problems reading or writing a key file. Surfaced as [`CipherError::KeySource`].
#[derive(Debug, Error)]
enum KeyFileError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed key file: {0}")]
    Malformed(String),

    #[error("unsupported key file version {0}")]
    UnsupportedVersion(u32),

    #[error("key file holds a {found} key, expected {expected}")]
    AlgorithmMismatch { expected: String, found: String },

    #[error("key checksum mismatch")]
    ChecksumMismatch,

    #[error("key has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// On-disk representation. Wiped on drop because `key` holds encoded material.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyFileContents {
    version: u32,
    algorithm: String,
    key: String,
    checksum: String,
}

/// A named file holding one cipher key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    /// Key file at `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the key file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the key stored for `algorithm`, generating and persisting a new one
    /// if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::KeySource`] if the file is unreadable, malformed,
    /// belongs to another algorithm, fails its checksum, or cannot be created.
    pub fn load_or_generate(&self, algorithm: &str) -> Result<KeyBytes, CipherError> {
        self.try_load_or_generate(algorithm)
            .map_err(|e| CipherError::KeySource {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn try_load_or_generate(&self, algorithm: &str) -> Result<KeyBytes, KeyFileError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => parse(&Zeroizing::new(text), algorithm),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.generate(algorithm),
            Err(e) => Err(e.into()),
        }
    }

    fn generate(&self, algorithm: &str) -> Result<KeyBytes, KeyFileError> {
        let mut raw = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(raw.as_mut_slice());
        let key = KeyBytes::from_slice(raw.as_slice())
            .map_err(|_| KeyFileError::InvalidLength(raw.len()))?;

        let contents = KeyFileContents {
            version: KEY_FILE_VERSION,
            algorithm: algorithm.to_owned(),
            key: STANDARD.encode(key.as_bytes()),
            checksum: checksum(key.as_bytes()),
        };
        let json = serde_json::to_string(&contents)
            .map(Zeroizing::new)
            .map_err(|e| KeyFileError::Malformed(e.to_string()))?;

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        // Staged in the same directory and moved into place only once complete,
        // so a failed write never leaves a truncated key file behind.
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(json.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;

        match staged.persist_noclobber(&self.path) {
            Ok(_) => {
                info!(path = %self.path.display(), algorithm, "generated new key file");
                Ok(key)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                // Another process bootstrapped the file first; use its key.
                warn!(path = %self.path.display(), "key file appeared during bootstrap; reloading");
                parse(&Zeroizing::new(fs::read_to_string(&self.path)?), algorithm)
            }
            Err(e) => Err(e.error.into()),
        }
    }
}

fn parse(text: &str, algorithm: &str) -> Result<KeyBytes, KeyFileError> {
    let contents: KeyFileContents =
        serde_json::from_str(text.trim()).map_err(|e| KeyFileError::Malformed(e.to_string()))?;

    if contents.version != KEY_FILE_VERSION {
        return Err(KeyFileError::UnsupportedVersion(contents.version));
    }
    if contents.algorithm != algorithm {
        return Err(KeyFileError::AlgorithmMismatch {
            expected: algorithm.to_owned(),
            found: contents.algorithm.clone(),
        });
    }

    let raw = Zeroizing::new(
        STANDARD
            .decode(contents.key.as_bytes())
            .map_err(|_| KeyFileError::Malformed("key is not valid base64".into()))?,
    );
    if raw.len() != KEY_LEN {
        return Err(KeyFileError::InvalidLength(raw.len()));
    }
    if checksum(&raw) != contents.checksum {
        return Err(KeyFileError::ChecksumMismatch);
    }
    KeyBytes::from_slice(&raw).map_err(|_| KeyFileError::InvalidLength(raw.len()))
}

fn checksum(key: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(key))
}
