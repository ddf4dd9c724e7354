//! Per-target exclusive locks for multi-writer deployments.
//!
//! The transfer protocol itself has no coordination primitive. When a
//! single backend process serves concurrent invocations that may hit the
//! same `(path, filename)`, enabling `transfer.serialize_writers` routes
//! each chunk write through [`TargetLocks::with_lock`].

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use super::target::TargetPath;

/// In-memory registry of exclusive locks keyed by target identity.
#[derive(Debug, Default)]
pub struct TargetLocks {
    locks: DashMap<TargetPath, Arc<Mutex<()>>>,
}

impl TargetLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `target`.
    pub fn with_lock<T>(&self, target: &TargetPath, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .entry(target.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let result = {
            // The guarded value is `()`, so a poisoned lock carries no bad state.
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        };

        drop(lock);
        self.locks.remove_if(target, |_, l| Arc::strong_count(l) == 1);
        result
    }

    /// Number of targets currently locked or waited on.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}
