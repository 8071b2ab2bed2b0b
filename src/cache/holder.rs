//! Value Holder Module
//!
//! Wraps a stored value together with an opaque installation-identity token,
//! letting callers detect in O(1) whether a slot has been rewritten since
//! they last saw it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide token mint. Every shared-cache write gets a fresh token.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

// == Value Holder ==
/// A stored value plus the identity of its installation.
///
/// Two holders represent the same installation iff their tokens match,
/// independent of value equality. Token equality is the cheap optimistic
/// concurrency check; value equality is a costlier, opt-in fallback.
#[derive(Debug, Clone)]
pub struct ValueHolder<V> {
    /// The stored value
    pub value: V,
    /// Opaque installation identity
    token: u64,
}

impl<V> ValueHolder<V> {
    // == Constructor ==
    /// Wraps a value with a freshly minted token.
    pub fn new(value: V) -> Self {
        Self {
            value,
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
        }
    }

    // == Token ==
    /// Returns the installation token.
    pub fn token(&self) -> u64 {
        self.token
    }

    // == Same Installation ==
    /// Checks whether this holder is the same installation as an observed
    /// token.
    pub fn is_installation(&self, token: u64) -> bool {
        self.token == token
    }
}
