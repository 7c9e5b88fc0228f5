//! Process-wide cache of type classifications, keyed by runtime type.
//!
//! Each type is classified on first encounter and never again. The cache uses
//! `arc-swap` for lock-free reads on the hot path; misses are derived under a
//! mutex so concurrent first encounters of one type derive it only once.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use arc_swap::ArcSwap;
use tracing::debug;

use super::{resolver::classify, Encryptable, TypeDescriptor};

/// Shared, lock-free-read cache of [`TypeDescriptor`]s keyed by [`TypeId`].
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone, Debug)]
pub struct ClassificationCache {
    inner: Arc<ArcSwap<HashMap<TypeId, Arc<TypeDescriptor>>>>,
    write: Arc<Mutex<()>>,
}

impl ClassificationCache {
    /// Create a new, empty [`ClassificationCache`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(HashMap::new()))),
            write: Arc::new(Mutex::new(())),
        }
    }

    /// Return the number of types classified so far.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// Return `true` if no type has been classified yet.
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Return `true` if the runtime type `id` has been classified.
    pub fn contains(&self, id: TypeId) -> bool {
        self.inner.load().contains_key(&id)
    }

    /// Classification of `entity`'s runtime type, deriving it on first use.
    pub fn descriptor_for(&self, entity: &dyn Encryptable) -> Arc<TypeDescriptor> {
        let id = Any::type_id(entity);
        if let Some(found) = self.inner.load().get(&id) {
            return Arc::clone(found);
        }

        // A poisoned lock only guards `()`; the map itself is never left
        // half-written.
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = self.inner.load().get(&id) {
            return Arc::clone(found);
        }

        let schema = entity.schema();
        let descriptor = Arc::new(classify(schema));
        let mut next = HashMap::clone(&self.inner.load());
        next.insert(id, Arc::clone(&descriptor));
        self.inner.store(Arc::new(next));

        debug!(
            type_name = schema.type_name,
            marked_fields = descriptor.fields.len(),
            "classified type"
        );
        descriptor
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn initially_empty() {
        let cache = ClassificationCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn derives_once_per_type() {
        let cache = ClassificationCache::new();
        let a = User::new("a", None);
        let b = User::new("b", Some("x"));

        let first = cache.descriptor_for(&a);
        let second = cache.descriptor_for(&b);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(TypeId::of::<User>()));
    }

    #[test]
    fn keys_on_runtime_type_not_declared_type() {
        let cache = ClassificationCache::new();
        let user = User::new("a", None);
        let extended = ExtendedUser::new("a", None, None);
        let as_dyn: [&dyn Encryptable; 2] = [&user, &extended];

        let names: Vec<_> = as_dyn
            .iter()
            .map(|e| cache.descriptor_for(*e).type_name)
            .collect();

        assert_eq!(names, ["User", "ExtendedUser"]);
        assert!(cache.contains(TypeId::of::<ExtendedUser>()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clones_share_entries() {
        let cache = ClassificationCache::new();
        let clone = cache.clone();
        cache.descriptor_for(&User::new("a", None));
        assert_eq!(clone.len(), 1);
    }

    #[test]
    fn concurrent_first_encounters_agree() {
        let cache = ClassificationCache::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.descriptor_for(&User::new("a", None)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }
}
