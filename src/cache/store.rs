//! Cache Store Module
//!
//! The bounded/expiring shared-cache implementation: a HashMap store with
//! insertion-order eviction and TTL/TTI expiry.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{CacheEntry, SharedCache};
use crate::config::CacheProperties;
use crate::error::{CacheError, Result};

// == Inner State ==
#[derive(Debug)]
struct Inner<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// Keys in insertion order; front = oldest inserted
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    /// Drops a key from both the store and the insertion queue.
    fn evict(&mut self, key: &K) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

// == Bounded Cache ==
/// Shared cache bounding item count and supporting TTL/TTI expiry.
///
/// Exceeding the item bound evicts the oldest-inserted entry first; an
/// overwrite counts as a fresh insertion. Expired entries are treated as
/// absent and purged lazily on access or via [`BoundedCache::purge_expired`].
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    /// Cache name, used for configuration and logging
    name: String,
    inner: RwLock<Inner<K, V>>,
    /// Maximum number of entries, 0 = effectively unbounded
    max_items: usize,
    /// Seconds since insertion before an entry expires
    ttl_seconds: Option<u64>,
    /// Seconds since last access before an entry expires
    tti_seconds: Option<u64>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    // == Constructor ==
    /// Creates a new BoundedCache.
    ///
    /// # Arguments
    /// * `name` - Cache name for configuration and logging
    /// * `max_items` - Item bound; 0 means effectively unbounded
    /// * `ttl_seconds` - Optional expiry measured from insertion
    /// * `tti_seconds` - Optional expiry measured from last access
    ///
    /// A negative `max_items` is a construction-time error.
    pub fn new(
        name: &str,
        max_items: i64,
        ttl_seconds: Option<u64>,
        tti_seconds: Option<u64>,
    ) -> Result<Self> {
        if max_items < 0 {
            return Err(CacheError::NegativeCapacity {
                name: name.to_string(),
                capacity: max_items,
            });
        }
        Ok(Self {
            name: name.to_string(),
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_items: max_items as usize,
            ttl_seconds,
            tti_seconds,
        })
    }

    // == From Properties ==
    /// Creates a BoundedCache from named-cache properties:
    /// `<name>.maxItems`, `<name>.timeToLiveSeconds`,
    /// `<name>.timeToIdleSeconds`.
    pub fn from_properties(name: &str, properties: &CacheProperties) -> Result<Self> {
        let max_items = properties.i64_or(name, "maxItems", 0)?;
        let ttl_seconds = properties.seconds_or_none(name, "timeToLiveSeconds")?;
        let tti_seconds = properties.seconds_or_none(name, "timeToIdleSeconds")?;
        Self::new(name, max_items, ttl_seconds, tti_seconds)
    }

    // == Name ==
    /// Returns the cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write();
        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.evict(key);
        }
        expired.len()
    }
}

impl<K, V> SharedCache<K, V> for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    // == Get ==
    /// Retrieves a value, refreshing the idle clock. Expired entries are
    /// purged and reported absent.
    fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.write();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                if !entry.is_expired() {
                    entry.touch();
                    return Some(entry.value.clone());
                }
            }
            None => return None,
        }
        inner.evict(key);
        None
    }

    // == Put ==
    /// Stores a key-value pair, overwriting any previous value. An overwrite
    /// re-inserts: the key moves to the back of the insertion queue and its
    /// expiry clocks reset.
    fn put(&self, key: K, value: V) {
        let mut inner = self.inner.write();
        let entry = CacheEntry::new(value, self.ttl_seconds, self.tti_seconds);
        if inner.entries.insert(key.clone(), entry).is_some() {
            inner.order.retain(|k| k != &key);
        }
        inner.order.push_back(key);

        // Oldest-insertion-first eviction
        if self.max_items > 0 {
            while inner.entries.len() > self.max_items {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                    debug!(cache = %self.name, "evicted oldest-inserted entry over item bound");
                } else {
                    break;
                }
            }
        }
    }

    // == Remove ==
    fn remove(&self, key: &K) {
        let mut inner = self.inner.write();
        inner.evict(key);
    }

    // == Clear ==
    fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
        debug!(cache = %self.name, "cleared");
    }

    // == Contains ==
    /// Checks for a live entry without refreshing the idle clock.
    fn contains(&self, key: &K) -> bool {
        let inner = self.inner.read();
        inner
            .entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Keys ==
    fn keys(&self) -> Vec<K> {
        let inner = self.inner.read();
        inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Length ==
    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn unbounded() -> BoundedCache<String, String> {
        BoundedCache::new("test", 0, None, None).unwrap()
    }

    #[test]
    fn test_negative_capacity_fails() {
        let result = BoundedCache::<String, String>::new("bad", -1, None, None);
        assert!(matches!(
            result,
            Err(CacheError::NegativeCapacity { capacity: -1, .. })
        ));
    }

    #[test]
    fn test_put_and_get() {
        let cache = unbounded();
        cache.put("k1".to_string(), "v1".to_string());
        assert_eq!(cache.get(&"k1".to_string()), Some("v1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_absent() {
        let cache = unbounded();
        assert_eq!(cache.get(&"missing".to_string()), None);
    }

    #[test]
    fn test_overwrite() {
        let cache = unbounded();
        cache.put("k1".to_string(), "v1".to_string());
        cache.put("k1".to_string(), "v2".to_string());
        assert_eq!(cache.get(&"k1".to_string()), Some("v2".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = unbounded();
        cache.put("k1".to_string(), "v1".to_string());
        cache.put("k2".to_string(), "v2".to_string());
        cache.remove(&"k1".to_string());
        assert!(!cache.contains(&"k1".to_string()));
        assert!(cache.contains(&"k2".to_string()));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let cache = unbounded();
        cache.remove(&"missing".to_string());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insertion_order_eviction() {
        let cache = BoundedCache::new("small", 3, None, None).unwrap();
        for i in 1..=5 {
            cache.put(i.to_string(), format!("v{}", i));
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"1".to_string()), None);
        assert_eq!(cache.get(&"2".to_string()), None);
        assert_eq!(cache.get(&"3".to_string()), Some("v3".to_string()));
        assert_eq!(cache.get(&"4".to_string()), Some("v4".to_string()));
        assert_eq!(cache.get(&"5".to_string()), Some("v5".to_string()));
    }

    #[test]
    fn test_eviction_ignores_access_order() {
        let cache = BoundedCache::new("small", 3, None, None).unwrap();
        cache.put("a".to_string(), "1".to_string());
        cache.put("b".to_string(), "2".to_string());
        cache.put("c".to_string(), "3".to_string());
        // Reading "a" must not protect it: eviction is insertion order
        cache.get(&"a".to_string());
        cache.put("d".to_string(), "4".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
        assert!(cache.contains(&"b".to_string()));
    }

    #[test]
    fn test_overwrite_reinserts_at_back() {
        let cache = BoundedCache::new("small", 3, None, None).unwrap();
        cache.put("a".to_string(), "1".to_string());
        cache.put("b".to_string(), "2".to_string());
        cache.put("c".to_string(), "3".to_string());
        // Rewriting "a" makes "b" the oldest insertion
        cache.put("a".to_string(), "1x".to_string());
        cache.put("d".to_string(), "4".to_string());
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"a".to_string()), Some("1x".to_string()));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = BoundedCache::new("ttl", 0, Some(1), None).unwrap();
        cache.put("k".to_string(), "v".to_string());
        assert!(cache.get(&"k".to_string()).is_some());
        sleep(Duration::from_millis(1100));
        assert_eq!(cache.get(&"k".to_string()), None);
        assert!(!cache.contains(&"k".to_string()));
    }

    #[test]
    fn test_tti_reset_on_read() {
        let cache = BoundedCache::new("tti", 0, None, Some(1)).unwrap();
        cache.put("k".to_string(), "v".to_string());
        sleep(Duration::from_millis(600));
        // The read resets the idle clock
        assert!(cache.get(&"k".to_string()).is_some());
        sleep(Duration::from_millis(600));
        assert!(cache.get(&"k".to_string()).is_some());
        sleep(Duration::from_millis(1100));
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[test]
    fn test_purge_expired() {
        let cache = BoundedCache::new("ttl", 0, Some(1), None).unwrap();
        cache.put("k1".to_string(), "v1".to_string());
        sleep(Duration::from_millis(1100));
        cache.put("k2".to_string(), "v2".to_string());
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"k2".to_string()));
    }

    #[test]
    fn test_keys_excludes_expired() {
        let cache = BoundedCache::new("ttl", 0, Some(1), None).unwrap();
        cache.put("k1".to_string(), "v1".to_string());
        sleep(Duration::from_millis(1100));
        cache.put("k2".to_string(), "v2".to_string());
        let keys = cache.keys();
        assert_eq!(keys, vec!["k2".to_string()]);
    }

    #[test]
    fn test_from_properties() {
        let props = CacheProperties::from([
            ("sized.maxItems", "2"),
            ("sized.timeToLiveSeconds", "0"),
        ]);
        let cache: BoundedCache<String, String> =
            BoundedCache::from_properties("sized", &props).unwrap();
        cache.put("a".to_string(), "1".to_string());
        cache.put("b".to_string(), "2".to_string());
        cache.put("c".to_string(), "3".to_string());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn test_from_properties_negative_bound_fails() {
        let props = CacheProperties::from([("bad.maxItems", "-3")]);
        let result = BoundedCache::<String, String>::from_properties("bad", &props);
        assert!(matches!(result, Err(CacheError::NegativeCapacity { .. })));
    }
}
