//! Per-instance record of decrypted fields.
//!
//! Every decryption stores the marked ciphertext that was read, keyed by field
//! path, together with a SHA-256 digest of the plaintext it produced. On the
//! next encryption of the same instance, a field whose value still hashes to
//! the recorded digest gets the recorded ciphertext back instead of a fresh
//! encryption. The host's dirty-checking then sees an unchanged value and
//! issues no update for an entity that was only read.
//!
//! Plaintext itself is never retained.

use std::collections::HashMap;

use sha2::{digest::Output, Digest, Sha256};

#[derive(Clone)]
struct Recorded {
    digest: Output<Sha256>,
    sealed: String,
}

/// Field path → last decrypted value for one managed instance.
#[derive(Clone, Default)]
pub struct FieldMemo {
    fields: HashMap<String, Recorded>,
}

impl FieldMemo {
    /// An empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields with a recorded decryption.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remember that `sealed` (marker included) at `path` decrypted to `plaintext`.
    pub fn record(&mut self, path: &str, plaintext: &str, sealed: String) {
        let recorded = Recorded {
            digest: Sha256::digest(plaintext.as_bytes()),
            sealed,
        };
        self.fields.insert(path.to_owned(), recorded);
    }

    /// The stored ciphertext for `path` if `plaintext` is the value it decrypted to.
    pub fn reuse(&self, path: &str, plaintext: &str) -> Option<&str> {
        self.fields
            .get(path)
            .filter(|r| r.digest == Sha256::digest(plaintext.as_bytes()))
            .map(|r| r.sealed.as_str())
    }
}

impl std::fmt::Debug for FieldMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMemo")
            .field("fields", &self.fields.len())
            .finish()
    }
}
