//! LRU cache over parsed objects, shared by the unified store's read path.

use std::num::NonZeroUsize;

use grit_hash::ObjectId;
use lru::LruCache;

use crate::Object;

/// Bounded cache of parsed objects keyed by id.
///
/// Objects are immutable, so a cached value never goes stale; eviction is
/// purely a memory bound.
pub struct ObjectCache {
    inner: LruCache<ObjectId, Object>,
}

impl ObjectCache {
    /// A zero capacity is clamped to one entry.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, id: &ObjectId) -> Option<&Object> {
        self.inner.get(id)
    }

    pub fn put(&mut self, id: ObjectId, object: Object) {
        self.inner.put(id, object);
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.inner.contains(id)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
