//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and TTI
//! expiry support.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A single cache entry with expiry metadata.
///
/// TTL is measured from insertion; TTI from the last access, refreshed on
/// every read.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion timestamp (Unix milliseconds)
    pub inserted_at: u64,
    /// Last-access timestamp (Unix milliseconds)
    pub last_accessed: u64,
    /// Time-to-live in milliseconds, None = no insertion expiry
    ttl_ms: Option<u64>,
    /// Time-to-idle in milliseconds, None = no idle expiry
    tti_ms: Option<u64>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL and TTI in seconds.
    pub fn new(value: V, ttl_seconds: Option<u64>, tti_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            inserted_at: now,
            last_accessed: now,
            ttl_ms: ttl_seconds.map(|s| s * 1000),
            tti_ms: tti_seconds.map(|s| s * 1000),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once its TTL has fully elapsed since insertion, or
    /// its TTI has fully elapsed since the last access. The boundary instant
    /// itself counts as expired.
    pub fn is_expired(&self) -> bool {
        let now = current_timestamp_ms();
        if let Some(ttl) = self.ttl_ms {
            if now >= self.inserted_at + ttl {
                return true;
            }
        }
        if let Some(tti) = self.tti_ms {
            if now >= self.last_accessed + tti {
                return true;
            }
        }
        false
    }

    // == Touch ==
    /// Marks the entry as accessed now, resetting the idle clock.
    pub fn touch(&mut self) {
        self.last_accessed = current_timestamp_ms();
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
