//! Bounded LRU tile cache with an eviction callback.
//!
//! [`TileCache`] maps keys (tile coordinates in practice) to values (shared
//! tile images) and hands every value it lets go of to an eviction callback.
//! The renderer uses the callback to return GPU textures to the fetcher that
//! created them, so the cache never destroys anything itself.
//!
//! Inserting a key that is already present evicts the old value through the
//! callback, overwrites the slot and refreshes its recency. Inserting a new
//! key at capacity evicts the least-recently-used entry first.
//!
//! # Threading
//!
//! The cache is not synchronised. It is owned by the renderer's execution
//! thread and only ever touched from there.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Callback invoked with every value the cache evicts.
pub type EvictionCallback<V> = Box<dyn FnMut(V) + Send>;

/// Generic bounded LRU cache.
pub struct TileCache<K, V>
where
    K: Hash + Eq,
{
    entries: LruCache<K, V>,
    evict: EvictionCallback<V>,
}

impl<K, V> TileCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, evict: impl FnMut(V) + Send + 'static) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            evict: Box::new(evict),
        }
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    pub fn query(&mut self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Insert `value` under `key` as the most-recently-used entry.
    ///
    /// Evicts either the previous value for `key` or, when the cache is full,
    /// the least-recently-used entry.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some((_, old)) = self.entries.push(key, value) {
            (self.evict)(old);
        }
    }

    /// Current number of entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Returns true if `key` is present, without touching its recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Evict every entry, least-recently-used first.
    pub fn drain(&mut self) {
        while let Some((_, value)) = self.entries.pop_lru() {
            (self.evict)(value);
        }
    }
}
