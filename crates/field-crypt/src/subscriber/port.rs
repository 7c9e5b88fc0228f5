//! Narrow port between the subscriber and a host persistence framework.
//!
//! The host adapts its richer event objects to these traits; the core never
//! sees the framework itself. Every trait here is object-safe, so a host can
//! keep listeners as `Box<dyn LifecycleListener<K>>` and pass its unit of work
//! as `&mut dyn UnitOfWork<Key = K>`.

use std::{fmt::Debug, hash::Hash};

use common::LifecycleError;

use crate::schema::Encryptable;

/// Handle identifying one managed instance for as long as the host manages it.
///
/// Implemented for every type with the listed bounds (ids, slot indices,
/// generational keys).
pub trait InstanceKey: Copy + Debug + Eq + Hash + Send + 'static {}

impl<K> InstanceKey for K where K: Copy + Debug + Eq + Hash + Send + 'static {}

/// Access to instances owned by the host, addressed by a host-chosen handle.
pub trait ManagedEntities {
    /// Handle identifying one managed instance.
    type Key: InstanceKey;

    /// Mutable access to the instance behind `key`, if it is still managed.
    fn entity_mut(&mut self, key: Self::Key) -> Option<&mut dyn Encryptable>;
}

/// The host's batch of pending writes for one flush.
pub trait UnitOfWork: ManagedEntities {
    /// Instances scheduled for insert in this flush.
    fn scheduled_insertions(&self) -> Vec<Self::Key>;

    /// Instances scheduled for update in this flush.
    fn scheduled_updates(&self) -> Vec<Self::Key>;

    /// Re-snapshot the instance's change set after its fields were rewritten,
    /// so dirty-checking compares against the ciphertext actually written.
    fn recompute_change_set(&mut self, key: Self::Key, type_name: &'static str);
}

/// The host's cache of every currently loaded instance.
pub trait IdentityMap: ManagedEntities {
    /// Handles of all managed instances.
    fn managed_keys(&self) -> Vec<Self::Key>;
}

/// The lifecycle hooks a host invokes around each flush and load.
pub trait LifecycleListener<K: InstanceKey> {
    /// Before SQL is generated for a flush: encrypt scheduled writes.
    fn on_pre_write(&self, uow: &mut dyn UnitOfWork<Key = K>) -> Result<(), LifecycleError>;

    /// After a flush completes: decrypt every managed instance.
    fn on_post_write_or_load(
        &self,
        identity_map: &mut dyn IdentityMap<Key = K>,
    ) -> Result<(), LifecycleError>;

    /// After the instance behind `key` is hydrated from storage: decrypt it.
    fn on_post_load(&self, key: K, entity: &mut dyn Encryptable) -> Result<(), LifecycleError>;

    /// The host stopped managing `key` (detach, delete, clear): drop any state
    /// kept for it.
    fn on_detach(&self, key: K);
}
