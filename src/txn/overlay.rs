//! Transactional Cache Overlay
//!
//! A per-transaction mutable view layered over the shared cache. Reads and
//! writes are buffered per transaction and reconciled into the shared cache
//! on the pre-commit path; rollback discards the overlay with zero
//! shared-cache effect.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::cache::{CacheStatistics, OpType, SharedCache, ValueHolder};
use crate::config::CacheProperties;
use crate::error::Result;
use crate::txn::{Transaction, TransactionListener};

// == Baseline ==
/// The shared-cache snapshot a transaction believed current when it last
/// touched a key. Captured at most once per key per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Baseline {
    /// No prior installation observed: a pure add
    Absent,
    /// The installation token that was observed
    Installed(u64),
}

// == Per-Key State ==
#[derive(Debug, Clone)]
enum KeyState<V> {
    /// Observed from the shared cache; nothing to reconcile at commit.
    /// `None` records an observed miss.
    Read(Option<V>),
    /// Buffered write, applied at commit via the conflict decision table
    Written(V),
    /// Buffered removal, always evicted at commit
    Removed,
}

#[derive(Debug, Clone)]
struct KeyEntry<V> {
    state: KeyState<V>,
    baseline: Baseline,
    /// Frozen: later writes/removes in this transaction are no-ops
    locked: bool,
}

// == Transaction Overlay ==
/// The full per-key state map for one active transaction. Exclusively owned
/// by that transaction; never shared across transactions or threads.
#[derive(Debug)]
struct TxnOverlay<K, V> {
    entries: HashMap<K, KeyEntry<V>>,
    /// Overlay keys in first-touch order; front = oldest
    order: VecDeque<K>,
    /// Maximum overlay entries, 0 = unbounded. Overrun drops the oldest
    /// overlay entry outright, which then behaves as untouched.
    max_items: usize,
    /// Set by an in-transaction clear: untouched keys read as locally absent
    cleared: bool,
    /// Number of clear() calls, counted once each at commit
    clear_count: u64,
    /// When set, the shared cache is never consulted for reads and every
    /// baseline is captured as absent
    shared_reads_disabled: bool,
}

impl<K: Eq + Hash + Clone, V> TxnOverlay<K, V> {
    fn new(max_items: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_items,
            cleared: false,
            clear_count: 0,
            shared_reads_disabled: false,
        }
    }

    /// True when reads must not fall through to the shared cache.
    fn local_only(&self) -> bool {
        self.cleared || self.shared_reads_disabled
    }

    /// Inserts a fresh overlay entry, dropping the oldest entries when the
    /// overlay outgrows its bound.
    fn insert(&mut self, key: K, entry: KeyEntry<V>) {
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
            if self.max_items > 0 {
                while self.entries.len() > self.max_items {
                    match self.order.pop_front() {
                        Some(oldest) => {
                            self.entries.remove(&oldest);
                        }
                        None => break,
                    }
                }
            }
        }
    }
}

// == Cache Options ==
/// Construction-time configuration for a [`TransactionalCache`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Whether cached values may change between installations. An immutable
    /// cache trusts whatever is already present at commit time.
    pub mutable: bool,
    /// Opt-in value-equality fallback when the installation check fails
    pub allow_equals_checks: bool,
    /// Whether operations feed the statistics registry
    pub stats_enabled: bool,
    /// Overlay entry bound per transaction, 0 = unbounded
    pub max_overlay_items: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            mutable: true,
            allow_equals_checks: false,
            stats_enabled: true,
            max_overlay_items: 0,
        }
    }
}

// == Transactional Cache ==
/// A named cache presenting buffered reads/writes per transaction, reconciled
/// against the shared cache at commit.
///
/// Every call takes an explicit [`Transaction`] handle. The overlay for a
/// transaction is created on first access, at which point the cache registers
/// itself for that transaction's lifecycle callbacks. The handle is cheap to
/// clone; clones share one cache.
pub struct TransactionalCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    core: Arc<CacheCore<K, V>>,
}

impl<K, V> Clone for TransactionalCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

/// The shared state behind every clone of a [`TransactionalCache`], and the
/// listener bound into each transaction that touches the cache.
struct CacheCore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Cache name, used for statistics and logging
    name: String,
    /// The process-wide shared cache holding installed values
    shared: Arc<dyn SharedCache<K, ValueHolder<V>>>,
    /// Statistics registry shared across named caches
    stats: Arc<CacheStatistics>,
    options: CacheOptions,
    /// One overlay per active transaction, keyed by transaction id
    overlays: Mutex<HashMap<u64, TxnOverlay<K, V>>>,
}

impl<K, V> TransactionalCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a TransactionalCache with default options (mutable, no equals
    /// checking, statistics enabled).
    pub fn new(
        name: &str,
        shared: Arc<dyn SharedCache<K, ValueHolder<V>>>,
        stats: Arc<CacheStatistics>,
    ) -> Self {
        Self::with_options(name, shared, stats, CacheOptions::default())
    }

    /// Creates a TransactionalCache with explicit options.
    pub fn with_options(
        name: &str,
        shared: Arc<dyn SharedCache<K, ValueHolder<V>>>,
        stats: Arc<CacheStatistics>,
        options: CacheOptions,
    ) -> Self {
        if options.stats_enabled {
            stats.register(name);
        }
        Self {
            core: Arc::new(CacheCore {
                name: name.to_string(),
                shared,
                stats,
                options,
                overlays: Mutex::new(HashMap::new()),
            }),
        }
    }

    // == From Properties ==
    /// Creates a TransactionalCache from named-cache properties: `mutable`,
    /// `allowEqualsChecks`, `statsEnabled`, `maxOverlayItems`.
    pub fn from_properties(
        name: &str,
        shared: Arc<dyn SharedCache<K, ValueHolder<V>>>,
        stats: Arc<CacheStatistics>,
        properties: &CacheProperties,
    ) -> Result<Self> {
        let max_overlay_items = properties.i64_or(name, "maxOverlayItems", 0)?;
        let options = CacheOptions {
            mutable: properties.bool_or(name, "mutable", true)?,
            allow_equals_checks: properties.bool_or(name, "allowEqualsChecks", false)?,
            stats_enabled: properties.bool_or(name, "statsEnabled", true)?,
            max_overlay_items: max_overlay_items.max(0) as usize,
        };
        Ok(Self::with_options(name, shared, stats, options))
    }

    // == Name ==
    /// Returns the cache name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    // == Get ==
    /// Retrieves a value through the transaction's overlay.
    ///
    /// A key already touched this transaction is served from the overlay
    /// without touching the shared cache. An untouched key consults the
    /// shared cache (unless shared reads are disabled or the overlay was
    /// cleared), records exactly one hit or miss, and captures the holder's
    /// token as the key's baseline.
    pub fn get(&self, txn: &Transaction, key: &K) -> Option<V> {
        self.with_overlay(txn, |core, overlay| {
            if let Some(entry) = overlay.entries.get(key) {
                return match &entry.state {
                    KeyState::Read(value) => value.clone(),
                    KeyState::Written(value) => Some(value.clone()),
                    KeyState::Removed => None,
                };
            }
            if overlay.local_only() {
                return None;
            }
            let start = Instant::now();
            let holder = core.shared.get(key);
            let end = Instant::now();
            match holder {
                Some(holder) => {
                    core.record(OpType::GetHit, start, end);
                    let token = holder.token();
                    let value = holder.value;
                    overlay.insert(
                        key.clone(),
                        KeyEntry {
                            state: KeyState::Read(Some(value.clone())),
                            baseline: Baseline::Installed(token),
                            locked: false,
                        },
                    );
                    Some(value)
                }
                None => {
                    core.record(OpType::GetMiss, start, end);
                    overlay.insert(
                        key.clone(),
                        KeyEntry {
                            state: KeyState::Read(None),
                            baseline: Baseline::Absent,
                            locked: false,
                        },
                    );
                    None
                }
            }
        })
    }

    // == Put ==
    /// Buffers a write. A baseline is captured if none exists for the key:
    /// the shared cache's current token if present, else "absent". No-op on a
    /// locked key.
    pub fn put(&self, txn: &Transaction, key: K, value: V) {
        self.with_overlay(txn, |core, overlay| {
            let local_only = overlay.local_only();
            match overlay.entries.get_mut(&key) {
                Some(entry) => {
                    if entry.locked {
                        trace!(cache = %core.name, txn = txn.id(), "put ignored on locked key");
                        return;
                    }
                    // A removal discarded any baseline; recapture
                    if matches!(entry.state, KeyState::Removed) {
                        entry.baseline = core.capture_baseline(&key, local_only);
                    }
                    entry.state = KeyState::Written(value);
                }
                None => {
                    let baseline = core.capture_baseline(&key, local_only);
                    overlay.insert(
                        key,
                        KeyEntry {
                            state: KeyState::Written(value),
                            baseline,
                            locked: false,
                        },
                    );
                }
            }
        })
    }

    // == Remove ==
    /// Buffers a removal; the key is evicted from the shared cache at commit.
    /// No-op on a locked key.
    pub fn remove(&self, txn: &Transaction, key: &K) {
        self.with_overlay(txn, |core, overlay| {
            match overlay.entries.get_mut(key) {
                Some(entry) => {
                    if entry.locked {
                        trace!(cache = %core.name, txn = txn.id(), "remove ignored on locked key");
                        return;
                    }
                    entry.state = KeyState::Removed;
                }
                None => {
                    overlay.insert(
                        key.clone(),
                        KeyEntry {
                            state: KeyState::Removed,
                            baseline: Baseline::Absent,
                            locked: false,
                        },
                    );
                }
            }
        })
    }

    // == Clear ==
    /// Resets every key's overlay state to locally-absent. Untouched keys
    /// then read as misses for the rest of the transaction. Counted once per
    /// call at commit; never becomes a shared-cache removal.
    pub fn clear(&self, txn: &Transaction) {
        self.with_overlay(txn, |core, overlay| {
            overlay.entries.clear();
            overlay.order.clear();
            overlay.cleared = true;
            overlay.clear_count += 1;
            debug!(cache = %core.name, txn = txn.id(), "transactional clear");
        })
    }

    // == Lock Value ==
    /// Freezes the key's current overlay state for the rest of the
    /// transaction; the frozen state still reconciles at commit. An untouched
    /// key freezes as locally-absent. Locking never touches the shared cache.
    pub fn lock_value(&self, txn: &Transaction, key: &K) {
        self.with_overlay(txn, |_, overlay| match overlay.entries.get_mut(key) {
            Some(entry) => entry.locked = true,
            None => {
                overlay.insert(
                    key.clone(),
                    KeyEntry {
                        state: KeyState::Read(None),
                        baseline: Baseline::Absent,
                        locked: true,
                    },
                );
            }
        })
    }

    // == Is Value Locked ==
    /// Checks whether the key is locked in this transaction.
    pub fn is_value_locked(&self, txn: &Transaction, key: &K) -> bool {
        let overlays = self.core.overlays.lock();
        overlays
            .get(&txn.id())
            .and_then(|overlay| overlay.entries.get(key))
            .map(|entry| entry.locked)
            .unwrap_or(false)
    }

    // == Disable Shared Reads ==
    /// Disables shared-cache reads for this transaction: every key behaves as
    /// if its baseline were "absent" and reads never consult the shared
    /// cache.
    pub fn disable_shared_reads(&self, txn: &Transaction) {
        self.with_overlay(txn, |core, overlay| {
            overlay.shared_reads_disabled = true;
            debug!(cache = %core.name, txn = txn.id(), "shared-cache reads disabled");
        })
    }

    // == Contains ==
    /// Overlay-aware membership check. Does not record statistics or capture
    /// a baseline.
    pub fn contains(&self, txn: &Transaction, key: &K) -> bool {
        {
            let overlays = self.core.overlays.lock();
            if let Some(overlay) = overlays.get(&txn.id()) {
                if let Some(entry) = overlay.entries.get(key) {
                    return match &entry.state {
                        KeyState::Read(value) => value.is_some(),
                        KeyState::Written(_) => true,
                        KeyState::Removed => false,
                    };
                }
                if overlay.local_only() {
                    return false;
                }
            }
        }
        self.core.shared.contains(key)
    }

    // == Keys ==
    /// Overlay-aware key listing: written keys included, removed keys
    /// excluded, shared keys merged in unless reads are local-only.
    pub fn keys(&self, txn: &Transaction) -> Vec<K> {
        let overlays = self.core.overlays.lock();
        let Some(overlay) = overlays.get(&txn.id()) else {
            return self.core.shared.keys();
        };
        let mut keys: HashSet<K> = if overlay.local_only() {
            HashSet::new()
        } else {
            self.core.shared.keys().into_iter().collect()
        };
        for (key, entry) in &overlay.entries {
            match &entry.state {
                KeyState::Written(_) | KeyState::Read(Some(_)) => {
                    keys.insert(key.clone());
                }
                KeyState::Removed | KeyState::Read(None) => {
                    keys.remove(key);
                }
            }
        }
        keys.into_iter().collect()
    }

    // == Shared Pass-Through ==
    /// Installs a value directly in the shared cache, bypassing any overlay.
    /// Records no statistics.
    pub fn put_shared(&self, key: K, value: V) {
        self.core.shared.put(key, ValueHolder::new(value));
    }

    /// Reads a value directly from the shared cache, bypassing any overlay.
    pub fn get_shared(&self, key: &K) -> Option<V> {
        self.core.shared.get(key).map(|holder| holder.value)
    }

    /// Removes a key directly from the shared cache, bypassing any overlay.
    pub fn remove_shared(&self, key: &K) {
        self.core.shared.remove(key);
    }

    /// Checks the shared cache directly, bypassing any overlay.
    pub fn contains_shared(&self, key: &K) -> bool {
        self.core.shared.contains(key)
    }

    // == Overlay Access ==
    /// Runs `f` against the transaction's overlay, creating it (and binding
    /// this cache's lifecycle listener) on first access.
    fn with_overlay<R>(
        &self,
        txn: &Transaction,
        f: impl FnOnce(&CacheCore<K, V>, &mut TxnOverlay<K, V>) -> R,
    ) -> R {
        let mut overlays = self.core.overlays.lock();
        let overlay = match overlays.entry(txn.id()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                txn.bind_listener(Arc::clone(&self.core) as Arc<dyn TransactionListener>);
                trace!(cache = %self.core.name, txn = txn.id(), "overlay created");
                entry.insert(TxnOverlay::new(self.core.options.max_overlay_items))
            }
        };
        f(&self.core, overlay)
    }

    #[cfg(test)]
    fn overlay_count(&self) -> usize {
        self.core.overlays.lock().len()
    }
}

impl<K, V> CacheCore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Captures the key's baseline from the shared cache's current state.
    fn capture_baseline(&self, key: &K, local_only: bool) -> Baseline {
        if local_only {
            return Baseline::Absent;
        }
        match self.shared.get(key) {
            Some(holder) => Baseline::Installed(holder.token()),
            None => Baseline::Absent,
        }
    }

    fn record(&self, op: OpType, start: Instant, end: Instant) {
        if self.options.stats_enabled {
            self.stats.record(&self.name, op, start, end);
        }
    }

    // == Commit Reconciliation ==
    /// Resolves one transaction's buffered state against the shared cache.
    /// Conflicts are never errors: the worst outcome is an evicted entry.
    fn reconcile(&self, overlay: TxnOverlay<K, V>) {
        for _ in 0..overlay.clear_count {
            let now = Instant::now();
            self.record(OpType::Clear, now, now);
        }
        for (key, entry) in overlay.entries {
            match entry.state {
                KeyState::Read(_) => {}
                KeyState::Removed => {
                    // Always safe: absence is consistent with any concurrent
                    // state
                    self.evict(&key);
                }
                KeyState::Written(value) => {
                    self.reconcile_write(key, value, entry.baseline);
                }
            }
        }
    }

    /// The conflict decision table for a single written key.
    fn reconcile_write(&self, key: K, value: V, baseline: Baseline) {
        let current = self.shared.get(&key);
        match baseline {
            // Pure add: no snapshot was ever observed
            Baseline::Absent => match current {
                None => self.install(key, value),
                Some(holder) => {
                    if !self.options.mutable {
                        trace!(cache = %self.name, "concurrent add, trusting existing value");
                    } else if self.options.allow_equals_checks && holder.value == value {
                        trace!(cache = %self.name, "concurrent add of equal value, leaving as is");
                    } else {
                        warn!(cache = %self.name, "concurrent add conflict, pessimistic eviction");
                        self.evict(&key);
                    }
                }
            },
            // Update: a prior installation was observed
            Baseline::Installed(token) => match current {
                Some(holder) if holder.is_installation(token) => {
                    // Nothing touched the slot since the baseline
                    self.install(key, value);
                }
                Some(holder) => {
                    if !self.options.mutable {
                        trace!(cache = %self.name, "stale update, trusting existing value");
                    } else if self.options.allow_equals_checks && holder.value == value {
                        trace!(cache = %self.name, "stale update of equal value, leaving as is");
                    } else {
                        warn!(cache = %self.name, "update conflict, pessimistic eviction");
                        self.evict(&key);
                    }
                }
                None => {
                    if !self.options.mutable {
                        // Nothing to protect
                        self.install(key, value);
                    } else {
                        warn!(cache = %self.name, "baseline vanished, pessimistic eviction");
                        self.evict(&key);
                    }
                }
            },
        }
    }

    fn install(&self, key: K, value: V) {
        let start = Instant::now();
        self.shared.put(key, ValueHolder::new(value));
        self.record(OpType::Put, start, Instant::now());
    }

    fn evict(&self, key: &K) {
        let start = Instant::now();
        self.shared.remove(key);
        self.record(OpType::Remove, start, Instant::now());
    }
}

// == Lifecycle Listener ==
impl<K, V> TransactionListener for CacheCore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn before_commit(&self, txn_id: u64) -> Result<()> {
        let overlay = self.overlays.lock().remove(&txn_id);
        if let Some(overlay) = overlay {
            debug!(
                cache = %self.name,
                txn = txn_id,
                keys = overlay.entries.len(),
                "reconciling overlay"
            );
            self.reconcile(overlay);
        }
        Ok(())
    }

    fn after_commit(&self, txn_id: u64) {
        trace!(cache = %self.name, txn = txn_id, "commit durable");
    }

    fn after_rollback(&self, txn_id: u64) {
        // Discard only: zero shared-cache mutation
        if self.overlays.lock().remove(&txn_id).is_some() {
            debug!(cache = %self.name, txn = txn_id, "overlay discarded on rollback");
        }
    }
}
