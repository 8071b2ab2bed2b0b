//! Cache Module
//!
//! Provides the shared-cache contract, a bounded/expiring implementation,
//! value holders carrying installation identity, and operation statistics.

use std::hash::Hash;

mod entry;
mod holder;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use holder::ValueHolder;
pub use stats::{CacheStatistics, OpStats, OpType, StatsSnapshot};
pub use store::BoundedCache;

// == Shared Cache Contract ==
/// Capability set of the process-wide shared cache.
///
/// All methods take `&self`: implementations use interior mutability and must
/// support safe concurrent single-key operations.
pub trait SharedCache<K, V>: Send + Sync
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Retrieves a value by key, or None if absent or expired.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores a key-value pair, overwriting any previous value.
    fn put(&self, key: K, value: V);

    /// Removes an entry by key. A no-op if the key is absent.
    fn remove(&self, key: &K);

    /// Removes all entries.
    fn clear(&self);

    /// Checks whether a live (non-expired) entry exists for the key.
    fn contains(&self, key: &K) -> bool;

    /// Returns all live keys.
    fn keys(&self) -> Vec<K>;

    /// Returns the current number of entries, including not-yet-purged
    /// expired ones.
    fn len(&self) -> usize;

    /// Returns true if the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
