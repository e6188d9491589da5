//! Per-key mutual exclusion for multi-step operations.
//!
//! The repositories only promise per-key atomic writes, so any operation that reads a record,
//! checks it, and writes it back runs inside the lock for that key. Locks are always taken in
//! the order person, then application, then project; at most one person lock is held at a
//! time and multiple project locks are taken in name order.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use super::domain::{ApplicationId, Nric, ProjectName};

pub(crate) struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `work` while holding the lock for `key`.
    pub(crate) fn with<R>(&self, key: &K, work: impl FnOnce() -> R) -> R {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let result = {
            let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);
            work()
        };

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Two references left means the map and this call; nobody else is waiting.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        result
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub(crate) struct LockTable {
    pub(crate) people: KeyedLocks<Nric>,
    pub(crate) applications: KeyedLocks<ApplicationId>,
    pub(crate) projects: KeyedLocks<ProjectName>,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self {
            people: KeyedLocks::new(),
            applications: KeyedLocks::new(),
            projects: KeyedLocks::new(),
        }
    }

    /// Locks two projects in name order; `second` may equal `first`.
    pub(crate) fn with_projects<R>(
        &self,
        first: &ProjectName,
        second: Option<&ProjectName>,
        work: impl FnOnce() -> R,
    ) -> R {
        match second {
            Some(other) if other != first => {
                let (low, high) = if first < other {
                    (first, other)
                } else {
                    (other, first)
                };
                self.projects
                    .with(low, || self.projects.with(high, work))
            }
            _ => self.projects.with(first, work),
        }
    }
}
