//! Error types for the cache overlay
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the crate.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A cache was configured with a negative item bound
    #[error("Cache '{name}' configured with negative capacity: {capacity}")]
    NegativeCapacity { name: String, capacity: i64 },

    /// A named-cache property could not be parsed
    #[error("Invalid value for property '{property}': {value}")]
    InvalidProperty { property: String, value: String },

    /// Statistics were queried for a cache that does not collect them
    #[error("No statistics for cache: {0}")]
    NoStatsForCache(String),

    /// The transaction was already committed or rolled back
    #[error("Transaction {0} is no longer active")]
    TransactionFinished(u64),
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
