//! Transaction Module
//!
//! Explicit transaction handles, the lifecycle-listener contract, and the
//! transactional cache overlay.

mod coordinator;
mod overlay;

// Re-export public types
pub use coordinator::{Transaction, TransactionCoordinator, TransactionListener};
pub use overlay::{CacheOptions, TransactionalCache};
