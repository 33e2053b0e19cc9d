//! Per-key busy flags for in-flight discount operations.
//!
//! A key is either a coupon code (apply) or `remove:<code>` (remove). Any
//! busy key blocks every other apply/remove, since all of them mutate the
//! same host discount list.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::debug;

const REMOVE_KEY_PREFIX: &str = "remove:";

/// Operation key used while removing `code`.
pub fn remove_key(code: &str) -> String {
    format!("{REMOVE_KEY_PREFIX}{code}")
}

#[derive(Debug, Clone, Default)]
pub struct OperationStateTracker {
    states: Arc<Mutex<BTreeMap<String, bool>>>,
}

impl OperationStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` busy. Beginning an already busy key is a no-op.
    pub fn begin(&self, key: &str) {
        self.lock().insert(key.to_string(), true);
    }

    /// Clears `key`. The entry stays in the mapping as not busy.
    pub fn end(&self, key: &str) {
        if let Some(busy) = self.lock().get_mut(key) {
            *busy = false;
        }
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.lock().get(key).copied().unwrap_or(false)
    }

    pub fn is_any_busy(&self) -> bool {
        self.lock().values().any(|busy| *busy)
    }

    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.lock().clone()
    }

    /// Begins `key` and returns a guard that ends it when dropped.
    pub fn guard(&self, key: &str) -> OperationGuard {
        self.begin(key);
        OperationGuard {
            tracker: self.clone(),
            key: key.to_string(),
        }
    }

    /// Checks that nothing is busy and begins `key` under one lock, so two
    /// callers can never both pass the global guard.
    pub fn try_begin_exclusive(&self, key: &str) -> Option<OperationGuard> {
        {
            let mut states = self.lock();
            if let Some((busy_key, _)) = states.iter().find(|(_, busy)| **busy) {
                debug!(key, busy_key = %busy_key, "operations: exclusive begin refused");
                return None;
            }
            states.insert(key.to_string(), true);
        }
        Some(OperationGuard {
            tracker: self.clone(),
            key: key.to_string(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, bool>> {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Ends its operation key on every exit path, including early returns and unwinding.
#[derive(Debug)]
pub struct OperationGuard {
    tracker: OperationStateTracker,
    key: String,
}

impl OperationGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.tracker.end(&self.key);
    }
}

#[cfg(test)]
#[path = "tests/operation_state_tests.rs"]
mod tests;
