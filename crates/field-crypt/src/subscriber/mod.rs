//! Lifecycle Subscriber: drives the walker from the host's flush and load hooks.
//!
//! # Lifecycle
//!
//! 1. **Pre-write** ([`LifecycleListener::on_pre_write`]): every scheduled
//!    insertion, then every scheduled update, is encrypted in place and its
//!    change set recomputed once, so dirty-checking sees the ciphertext that is
//!    about to be written instead of a spurious plaintext/ciphertext diff. A
//!    handle scheduled more than once is processed once.
//! 2. **Post-write** ([`LifecycleListener::on_post_write_or_load`]): every
//!    instance in the identity map is decrypted, so callers keep observing
//!    plaintext once the ciphertext is durably stored.
//! 3. **Post-load** ([`LifecycleListener::on_post_load`]): a freshly hydrated
//!    instance is decrypted.
//!
//! Decryptions are remembered per managed instance (see [`crate::memo`]). A
//! field still holding the plaintext it was decrypted to is written back with
//! its stored ciphertext, so reading an entity never causes an update.
//! [`LifecycleListener::on_detach`] drops what was remembered for an instance.
//!
//! # Cipher hot swap
//!
//! The active cipher can be replaced or disabled at runtime and restored to the
//! one supplied at construction. There is a single saved slot, not a stack.

pub mod port;

pub use port::{IdentityMap, InstanceKey, LifecycleListener, ManagedEntities, UnitOfWork};

use std::{
    any::{Any, TypeId},
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use arc_swap::ArcSwapOption;
use common::{CipherError, ConfigurationError, LifecycleError};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crypto::{Cipher, SharedCipher};
use crate::memo::FieldMemo;
use crate::schema::{ClassificationCache, Encryptable};
use crate::walker::{Direction, GraphWalker};

/// Memos of every host key type, each a `HashMap<K, FieldMemo>` keyed by its `TypeId`.
type MemoTable = HashMap<TypeId, Box<dyn Any + Send>>;

/// Encrypts marked fields before they are written and decrypts them after.
///
/// All methods take `&self`: the host keeps the subscriber registered as a
/// shared listener while callers swap ciphers on it.
pub struct EncryptSubscriber {
    cache: ClassificationCache,
    // `ArcSwapOption` needs a sized pointee, hence the extra `Arc` around the
    // trait object. Only `set_encryptor` and `restore_encryptor` allocate it.
    active: ArcSwapOption<SharedCipher>,
    original: Option<SharedCipher>,
    require_cipher: bool,
    memos: Mutex<MemoTable>,
}

impl EncryptSubscriber {
    /// Subscriber using `cipher`; `None` runs in pass-through mode.
    pub fn new(cipher: Option<SharedCipher>) -> Self {
        Self {
            cache: ClassificationCache::new(),
            active: ArcSwapOption::new(cipher.clone().map(Arc::new)),
            original: cipher,
            require_cipher: false,
            memos: Mutex::new(HashMap::new()),
        }
    }

    /// Subscriber built from host configuration.
    pub fn from_config(cfg: &Config) -> Self {
        let subscriber = Self::new(cfg.build_cipher()).require_cipher(cfg.require_encryption);
        info!(
            cipher = %cfg.cipher,
            require_encryption = cfg.require_encryption,
            "encrypt subscriber configured"
        );
        subscriber
    }

    /// Share `cache` with other subscribers instead of a private one.
    pub fn with_cache(mut self, cache: ClassificationCache) -> Self {
        self.cache = cache;
        self
    }

    /// When `required`, lifecycle events fail instead of passing values
    /// through while no cipher is active.
    pub fn require_cipher(mut self, required: bool) -> Self {
        self.require_cipher = required;
        self
    }

    /// The classification cache used by this subscriber.
    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    /// The currently active cipher.
    pub fn encryptor(&self) -> Option<SharedCipher> {
        (*self.active.load())
            .as_ref()
            .map(|slot| Arc::clone(&**slot))
    }

    /// Replace the active cipher; `None` disables encryption.
    pub fn set_encryptor(&self, cipher: Option<SharedCipher>) {
        info!(enabled = cipher.is_some(), "active cipher replaced");
        self.active.store(cipher.map(Arc::new));
    }

    /// Reinstate the cipher supplied at construction.
    pub fn restore_encryptor(&self) {
        info!(enabled = self.original.is_some(), "active cipher restored");
        self.active.store(self.original.clone().map(Arc::new));
    }

    /// Run the walker over a single unmanaged instance with the active cipher.
    ///
    /// Nothing is remembered about the instance. Returns the number of field
    /// values changed.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigurationError::CipherRequired`] under the
    /// require-cipher policy, or with the first cipher failure.
    pub fn process_fields(
        &self,
        entity: &mut dyn Encryptable,
        direction: Direction,
    ) -> Result<usize, LifecycleError> {
        let cipher = self.active_cipher()?;
        Ok(self.walker(cipher.as_deref()).process(entity, direction)?)
    }

    fn walker<'a>(&'a self, cipher: Option<&'a dyn Cipher>) -> GraphWalker<'a> {
        GraphWalker::new(&self.cache, cipher)
    }

    /// Snapshot of the active cipher, held for one whole event so a concurrent
    /// swap never splits a flush across two ciphers.
    fn active_cipher(&self) -> Result<Option<SharedCipher>, ConfigurationError> {
        let cipher = self.encryptor();
        if cipher.is_none() && self.require_cipher {
            return Err(ConfigurationError::CipherRequired);
        }
        Ok(cipher)
    }

    /// Walk one managed instance with its memo. The memo is held outside the
    /// lock while the cipher runs.
    fn process_managed<K: InstanceKey>(
        &self,
        walker: &GraphWalker<'_>,
        key: K,
        entity: &mut dyn Encryptable,
        direction: Direction,
    ) -> Result<usize, CipherError> {
        let mut memo = self
            .with_memos::<K, _, _>(|memos| memos.remove(&key))
            .unwrap_or_default();
        let result = walker.process_tracked(entity, direction, &mut memo);
        if !memo.is_empty() {
            self.with_memos::<K, _, _>(|memos| memos.insert(key, memo));
        }
        result
    }

    fn with_memos<K, R, F>(&self, f: F) -> R
    where
        K: InstanceKey,
        F: FnOnce(&mut HashMap<K, FieldMemo>) -> R,
    {
        // A poisoned lock still holds complete memos; each entry is replaced whole.
        let mut table = self.memos.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = table
            .entry(TypeId::of::<K>())
            .or_insert_with(|| Box::new(HashMap::<K, FieldMemo>::new()));
        match (**slot).downcast_mut::<HashMap<K, FieldMemo>>() {
            Some(memos) => f(memos),
            None => f(&mut HashMap::new()),
        }
    }
}

impl std::fmt::Debug for EncryptSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptSubscriber")
            .field("enabled", &self.active.load().is_some())
            .field("require_cipher", &self.require_cipher)
            .field("classified_types", &self.cache.len())
            .finish()
    }
}

impl<K: InstanceKey> LifecycleListener<K> for EncryptSubscriber {
    fn on_pre_write(&self, uow: &mut dyn UnitOfWork<Key = K>) -> Result<(), LifecycleError> {
        let cipher = self.active_cipher()?;
        let walker = self.walker(cipher.as_deref());

        let mut seen = HashSet::new();
        let keys: Vec<K> = uow
            .scheduled_insertions()
            .into_iter()
            .chain(uow.scheduled_updates())
            .filter(|key| seen.insert(*key))
            .collect();

        let mut fields = 0;
        for &key in &keys {
            let Some(entity) = uow.entity_mut(key) else {
                warn!(?key, "scheduled entity is no longer managed; skipped");
                continue;
            };
            let type_name = entity.schema().type_name;
            fields += self.process_managed(&walker, key, entity, Direction::Encrypt)?;
            uow.recompute_change_set(key, type_name);
        }

        debug!(entities = keys.len(), fields, "pre-write encryption complete");
        Ok(())
    }

    fn on_post_write_or_load(
        &self,
        identity_map: &mut dyn IdentityMap<Key = K>,
    ) -> Result<(), LifecycleError> {
        let cipher = self.active_cipher()?;
        let walker = self.walker(cipher.as_deref());

        let keys = identity_map.managed_keys();
        let mut fields = 0;
        for &key in &keys {
            if let Some(entity) = identity_map.entity_mut(key) {
                fields += self.process_managed(&walker, key, entity, Direction::Decrypt)?;
            }
        }

        debug!(entities = keys.len(), fields, "post-write decryption complete");
        Ok(())
    }

    fn on_post_load(&self, key: K, entity: &mut dyn Encryptable) -> Result<(), LifecycleError> {
        let cipher = self.active_cipher()?;
        let walker = self.walker(cipher.as_deref());
        self.process_managed(&walker, key, entity, Direction::Decrypt)?;
        Ok(())
    }

    fn on_detach(&self, key: K) {
        self.with_memos::<K, _, _>(|memos| memos.remove(&key));
    }
}
