//! txcache - A transaction-scoped cache overlay
//!
//! Layers a per-transaction mutable view on top of a shared, process-wide
//! cache. Reads and writes are buffered in the overlay and reconciled against
//! the shared cache at commit time; rollback discards the overlay with zero
//! shared-cache effect.

pub mod cache;
pub mod config;
pub mod error;
pub mod txn;

pub use cache::{BoundedCache, CacheStatistics, OpType, SharedCache, ValueHolder};
pub use config::CacheProperties;
pub use error::{CacheError, Result};
pub use txn::{
    CacheOptions, Transaction, TransactionCoordinator, TransactionListener, TransactionalCache,
};
