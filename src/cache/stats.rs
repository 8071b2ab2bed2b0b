//! Cache Statistics Module
//!
//! Per-named-cache counters and timing accumulators for the five operation
//! kinds that reach the shared cache.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{CacheError, Result};

// == Operation Type ==
/// The operation kinds tracked per named cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpType {
    /// A read served by the shared cache
    GetHit,
    /// A read the shared cache could not serve
    GetMiss,
    /// A value installed in the shared cache
    Put,
    /// A key evicted from the shared cache
    Remove,
    /// A transactional clear
    Clear,
}

impl OpType {
    /// All tracked operation kinds.
    pub const ALL: [OpType; 5] = [
        OpType::GetHit,
        OpType::GetMiss,
        OpType::Put,
        OpType::Remove,
        OpType::Clear,
    ];
}

// == Per-Operation Stats ==
/// Count and duration accumulator for one operation kind.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OpStats {
    /// Number of times the operation reached the shared cache
    pub count: u64,
    /// Accumulated wall-clock time in nanoseconds
    pub total_time_ns: u64,
}

impl OpStats {
    /// Mean operation time in nanoseconds, or 0.0 if the operation never
    /// happened.
    pub fn mean_time_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_time_ns as f64 / self.count as f64
        }
    }
}

// == Stats Snapshot ==
/// A serializable point-in-time view of one cache's counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub cache_name: String,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub removes: u64,
    pub clears: u64,
    pub hit_rate: f64,
}

// == Cache Statistics Registry ==
/// Registry of operation statistics keyed by cache name.
///
/// Caches that collect statistics are registered up front, so a zero count
/// means "never happened". Querying an unregistered cache fails with
/// [`CacheError::NoStatsForCache`], so callers can distinguish "never
/// happened" from "not tracked".
#[derive(Debug, Default)]
pub struct CacheStatistics {
    registry: RwLock<HashMap<String, HashMap<OpType, OpStats>>>,
}

impl CacheStatistics {
    // == Constructor ==
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Registers a cache with zeroed counters. Idempotent.
    pub fn register(&self, cache_name: &str) {
        self.registry
            .write()
            .entry(cache_name.to_string())
            .or_default();
    }

    // == Record ==
    /// Records one operation against a registered cache, timed by a
    /// (start, end) instant pair. Ignored for unregistered caches.
    pub fn record(&self, cache_name: &str, op: OpType, start: Instant, end: Instant) {
        let mut registry = self.registry.write();
        if let Some(ops) = registry.get_mut(cache_name) {
            let entry = ops.entry(op).or_default();
            entry.count += 1;
            entry.total_time_ns += end.duration_since(start).as_nanos() as u64;
        }
    }

    // == Count ==
    /// Returns the count for one operation kind.
    pub fn count(&self, cache_name: &str, op: OpType) -> Result<u64> {
        self.op_stats(cache_name, op).map(|stats| stats.count)
    }

    // == Mean Time ==
    /// Returns the mean operation time in nanoseconds.
    pub fn mean_time_ns(&self, cache_name: &str, op: OpType) -> Result<f64> {
        self.op_stats(cache_name, op)
            .map(|stats| stats.mean_time_ns())
    }

    // == Snapshot ==
    /// Returns a serializable view of all counters for one cache.
    pub fn snapshot(&self, cache_name: &str) -> Result<StatsSnapshot> {
        let registry = self.registry.read();
        let ops = registry
            .get(cache_name)
            .ok_or_else(|| CacheError::NoStatsForCache(cache_name.to_string()))?;
        let count = |op: OpType| ops.get(&op).map(|s| s.count).unwrap_or(0);
        let hits = count(OpType::GetHit);
        let misses = count(OpType::GetMiss);
        let reads = hits + misses;
        Ok(StatsSnapshot {
            cache_name: cache_name.to_string(),
            hits,
            misses,
            puts: count(OpType::Put),
            removes: count(OpType::Remove),
            clears: count(OpType::Clear),
            hit_rate: if reads == 0 {
                0.0
            } else {
                hits as f64 / reads as f64
            },
        })
    }

    fn op_stats(&self, cache_name: &str, op: OpType) -> Result<OpStats> {
        let registry = self.registry.read();
        let ops = registry
            .get(cache_name)
            .ok_or_else(|| CacheError::NoStatsForCache(cache_name.to_string()))?;
        Ok(ops.get(&op).copied().unwrap_or_default())
    }
}
