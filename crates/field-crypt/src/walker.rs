//! Graph Walker: applies a cipher to every marked field of an object graph.
//!
//! Fields are visited in classification order. Encrypted string fields are
//! transformed in place; embedded value objects are recursed into with the
//! same direction. Embedded values are owned by their container, so the graph
//! is a tree and the walk always terminates.
//!
//! With a [`FieldMemo`], decryption records what each field held and
//! encryption hands back the stored ciphertext for fields that were not
//! changed in between. Fields are addressed by dotted path (`user.name`).

use common::{marker, CipherError};
use tracing::trace;

use crate::crypto::Cipher;
use crate::memo::FieldMemo;
use crate::schema::{ClassificationCache, Encryptable, FieldSlot};

/// Which way the walker transforms field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Plaintext → marked ciphertext (before write).
    Encrypt,
    /// Marked ciphertext → plaintext (after write or load).
    Decrypt,
}

/// One traversal configuration: a classification cache and an optional cipher.
///
/// With no cipher every call is a no-op ("encryption disabled" mode).
#[derive(Clone, Copy)]
pub struct GraphWalker<'a> {
    cache: &'a ClassificationCache,
    cipher: Option<&'a dyn Cipher>,
}

impl<'a> GraphWalker<'a> {
    /// Walker classifying through `cache` and transforming with `cipher`.
    pub fn new(cache: &'a ClassificationCache, cipher: Option<&'a dyn Cipher>) -> Self {
        Self { cache, cipher }
    }

    /// Transform every marked field reachable from `entity` in place.
    ///
    /// Returns the number of field values actually changed.
    ///
    /// # Errors
    ///
    /// Returns the first [`CipherError`] raised by the cipher. Traversal stops
    /// there; fields already transformed keep their new values.
    pub fn process(
        &self,
        entity: &mut dyn Encryptable,
        direction: Direction,
    ) -> Result<usize, CipherError> {
        self.run(entity, direction, None)
    }

    /// Like [`GraphWalker::process`], tracking decryptions of one instance in `memo`.
    ///
    /// # Errors
    ///
    /// Same as [`GraphWalker::process`]. Decryptions that succeeded before the
    /// failure stay recorded.
    pub fn process_tracked(
        &self,
        entity: &mut dyn Encryptable,
        direction: Direction,
        memo: &mut FieldMemo,
    ) -> Result<usize, CipherError> {
        self.run(entity, direction, Some(memo))
    }

    fn run(
        &self,
        entity: &mut dyn Encryptable,
        direction: Direction,
        memo: Option<&mut FieldMemo>,
    ) -> Result<usize, CipherError> {
        match self.cipher {
            Some(cipher) => {
                let mut step = Step {
                    direction,
                    cipher,
                    memo,
                };
                self.walk(entity, "", &mut step)
            }
            None => Ok(0),
        }
    }

    fn walk(
        &self,
        entity: &mut dyn Encryptable,
        prefix: &str,
        step: &mut Step<'_>,
    ) -> Result<usize, CipherError> {
        let descriptor = self.cache.descriptor_for(entity);
        let mut changed = 0;

        for field in &descriptor.fields {
            let Some(slot) = entity.field_mut(field.name) else {
                trace!(
                    type_name = descriptor.type_name,
                    field = field.name,
                    "marked field not resolvable; skipped"
                );
                continue;
            };
            let path = if prefix.is_empty() {
                field.name.to_owned()
            } else {
                format!("{prefix}.{}", field.name)
            };

            match slot {
                FieldSlot::Embedded(Some(nested)) if field.is_embedded => {
                    changed += self.walk(nested, &path, step)?;
                }
                FieldSlot::Text(value) if field.is_encrypted => {
                    changed += usize::from(step.transform(&path, value)?);
                }
                FieldSlot::NullableText(Some(value)) if field.is_encrypted => {
                    changed += usize::from(step.transform(&path, value)?);
                }
                // Absent embedded values and null strings round-trip untouched.
                _ => {}
            }
        }

        if changed > 0 {
            trace!(
                type_name = descriptor.type_name,
                direction = ?step.direction,
                changed,
                "processed fields"
            );
        }
        Ok(changed)
    }
}

/// Per-walk state shared by every field of one instance.
struct Step<'m> {
    direction: Direction,
    cipher: &'m dyn Cipher,
    memo: Option<&'m mut FieldMemo>,
}

impl Step<'_> {
    /// Transform one string value. Returns `true` if it was rewritten.
    fn transform(&mut self, path: &str, value: &mut String) -> Result<bool, CipherError> {
        match self.direction {
            Direction::Encrypt => {
                if marker::is_marked(value) {
                    return Ok(false);
                }
                if let Some(sealed) = self.memo.as_deref().and_then(|m| m.reuse(path, value)) {
                    *value = sealed.to_owned();
                    return Ok(true);
                }
                *value = marker::seal(self.cipher.encrypt(value)?);
                Ok(true)
            }
            Direction::Decrypt => {
                let Some(ciphertext) = marker::unseal(value) else {
                    return Ok(false);
                };
                let plaintext = self.cipher.decrypt(ciphertext)?;
                let sealed = std::mem::replace(value, plaintext);
                if let Some(memo) = self.memo.as_deref_mut() {
                    memo.record(path, value, sealed);
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_cipher {
    use super::*;

    /// Reversible stand-in cipher: prefixes on encrypt, strips on decrypt.
    pub struct PrefixCipher;

    impl Cipher for PrefixCipher {
        fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
            Ok(format!("encrypted-{plaintext}"))
        }

        fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
            ciphertext
                .strip_prefix("encrypted-")
                .map(str::to_owned)
                .ok_or(CipherError::InvalidFormat)
        }
    }
}
