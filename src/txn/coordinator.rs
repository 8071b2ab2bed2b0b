//! Transaction Coordinator Module
//!
//! A minimal transaction scope: explicit handles instead of ambient
//! thread-local state, and an observer interface fired in order at commit
//! (pre-commit, then post-commit once durable) or rollback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;

/// Process-wide transaction id mint.
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

// == Transaction Listener ==
/// Lifecycle callbacks for one transaction scope.
///
/// Listeners are registered once per transaction and fired in registration
/// order: `before_commit` on the commit path (a failure aborts the
/// transaction), `after_commit` only once the transaction is durable, and
/// `after_rollback` on any abandonment.
pub trait TransactionListener: Send + Sync {
    /// Pre-commit hook. Reconciliation work happens here; returning an error
    /// forces the enclosing transaction to abort.
    fn before_commit(&self, txn_id: u64) -> Result<()>;

    /// Post-commit hook, fired only after the transaction is durable.
    fn after_commit(&self, txn_id: u64);

    /// Rollback hook: discard only, no write-through of any kind.
    fn after_rollback(&self, txn_id: u64);
}

// == Coordinator ==
/// Hands out transaction handles and tracks each active transaction's
/// listeners.
#[derive(Default)]
pub struct TransactionCoordinator {
    inner: Arc<CoordinatorInner>,
}

#[derive(Default)]
struct CoordinatorInner {
    listeners: Mutex<HashMap<u64, Vec<Arc<dyn TransactionListener>>>>,
}

impl CoordinatorInner {
    fn take_listeners(&self, txn_id: u64) -> Vec<Arc<dyn TransactionListener>> {
        self.listeners.lock().remove(&txn_id).unwrap_or_default()
    }
}

impl TransactionCoordinator {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Begin ==
    /// Opens a new transaction scope and returns its handle.
    pub fn begin(&self) -> Transaction {
        let id = NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, Vec::new());
        trace!(txn = id, "transaction started");
        Transaction {
            id,
            inner: Arc::clone(&self.inner),
        }
    }
}

// == Transaction Handle ==
/// Handle identifying one active transaction.
///
/// Passed explicitly into every cache call. Consumed by [`Transaction::commit`]
/// or [`Transaction::rollback`]; a handle dropped without either rolls the
/// transaction back.
pub struct Transaction {
    id: u64,
    inner: Arc<CoordinatorInner>,
}

impl Transaction {
    // == Id ==
    /// Returns the transaction id.
    pub fn id(&self) -> u64 {
        self.id
    }

    // == Bind Listener ==
    /// Registers a lifecycle listener for this transaction scope.
    pub fn bind_listener(&self, listener: Arc<dyn TransactionListener>) {
        let mut listeners = self.inner.listeners.lock();
        listeners.entry(self.id).or_default().push(listener);
    }

    // == Commit ==
    /// Commits the transaction: fires `before_commit` on every listener in
    /// order, then `after_commit` once durable.
    ///
    /// A `before_commit` failure aborts the whole transaction: remaining
    /// listeners see `after_rollback` instead and the error is returned.
    pub fn commit(self) -> Result<()> {
        let listeners = self.inner.take_listeners(self.id);
        for listener in &listeners {
            if let Err(e) = listener.before_commit(self.id) {
                debug!(txn = self.id, error = %e, "pre-commit failed, rolling back");
                for listener in &listeners {
                    listener.after_rollback(self.id);
                }
                return Err(e);
            }
        }
        // The transaction is durable from here on
        for listener in &listeners {
            listener.after_commit(self.id);
        }
        trace!(txn = self.id, "transaction committed");
        Ok(())
    }

    // == Rollback ==
    /// Rolls the transaction back: fires `after_rollback` on every listener.
    pub fn rollback(self) {
        debug!(txn = self.id, "transaction rolled back");
        // Drop fires the listeners
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // Commit and rollback both drain the listener map first, so this
        // fires only for a handle abandoned mid-transaction.
        let listeners = self.inner.take_listeners(self.id);
        for listener in &listeners {
            listener.after_rollback(self.id);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use parking_lot::Mutex as PlMutex;

    /// Records the order callbacks fire in.
    struct Recorder {
        events: PlMutex<Vec<String>>,
        fail_before_commit: bool,
        name: &'static str,
    }

    impl Recorder {
        fn new(name: &'static str, fail_before_commit: bool) -> Arc<Self> {
            Arc::new(Self {
                events: PlMutex::new(Vec::new()),
                fail_before_commit,
                name,
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl TransactionListener for Recorder {
        fn before_commit(&self, _txn_id: u64) -> Result<()> {
            self.events.lock().push(format!("{}:before", self.name));
            if self.fail_before_commit {
                Err(CacheError::TransactionFinished(0))
            } else {
                Ok(())
            }
        }

        fn after_commit(&self, _txn_id: u64) {
            self.events.lock().push(format!("{}:after", self.name));
        }

        fn after_rollback(&self, _txn_id: u64) {
            self.events.lock().push(format!("{}:rollback", self.name));
        }
    }

    #[test]
    fn test_commit_fires_in_order() {
        let coordinator = TransactionCoordinator::new();
        let recorder = Recorder::new("a", false);

        let txn = coordinator.begin();
        txn.bind_listener(recorder.clone());
        txn.commit().unwrap();

        assert_eq!(recorder.events(), vec!["a:before", "a:after"]);
    }

    #[test]
    fn test_rollback_fires_only_rollback() {
        let coordinator = TransactionCoordinator::new();
        let recorder = Recorder::new("a", false);

        let txn = coordinator.begin();
        txn.bind_listener(recorder.clone());
        txn.rollback();

        assert_eq!(recorder.events(), vec!["a:rollback"]);
    }

    #[test]
    fn test_drop_rolls_back() {
        let coordinator = TransactionCoordinator::new();
        let recorder = Recorder::new("a", false);
        {
            let txn = coordinator.begin();
            txn.bind_listener(recorder.clone());
        }
        assert_eq!(recorder.events(), vec!["a:rollback"]);
    }

    #[test]
    fn test_pre_commit_failure_aborts() {
        let coordinator = TransactionCoordinator::new();
        let ok = Recorder::new("ok", false);
        let bad = Recorder::new("bad", true);

        let txn = coordinator.begin();
        txn.bind_listener(ok.clone());
        txn.bind_listener(bad.clone());
        assert!(txn.commit().is_err());

        // No listener reaches after_commit; all see the rollback
        assert_eq!(ok.events(), vec!["ok:before", "ok:rollback"]);
        assert_eq!(bad.events(), vec!["bad:before", "bad:rollback"]);
    }

    #[test]
    fn test_ids_are_unique() {
        let coordinator = TransactionCoordinator::new();
        let a = coordinator.begin();
        let b = coordinator.begin();
        assert_ne!(a.id(), b.id());
    }
}
