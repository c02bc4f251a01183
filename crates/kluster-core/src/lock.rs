//! Per-cluster mutual exclusion
//!
//! One lifecycle operation per cluster key at a time. A guard is taken by
//! `create`/`destroy` and handed to the background job, so the lock is held
//! until the provisioner capability finishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Table of per-key locks, shared by clones
#[derive(Clone, Default)]
pub struct ClusterLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Proof that the holder owns the cluster key
#[derive(Debug)]
pub struct ClusterGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl ClusterGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ClusterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `key` if nobody holds it.
    ///
    /// Entries are kept after release; the table grows with the number of
    /// distinct cluster keys seen by the process.
    pub fn try_acquire(&self, key: &str) -> Option<ClusterGuard> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.to_string()).or_default().clone()
        };

        lock.try_lock_owned().ok().map(|guard| ClusterGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Whether `key` is currently held
    pub fn is_locked(&self, key: &str) -> bool {
        let locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .get(key)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_per_key() {
        let locks = ClusterLocks::new();

        let guard = locks.try_acquire("aws-demo").expect("first acquire");
        assert_eq!(guard.key(), "aws-demo");
        assert!(locks.is_locked("aws-demo"));
        assert!(locks.try_acquire("aws-demo").is_none());

        // Other keys are independent
        assert!(locks.try_acquire("aws-other").is_some());

        drop(guard);
        assert!(!locks.is_locked("aws-demo"));
        assert!(locks.try_acquire("aws-demo").is_some());
    }

    #[test]
    fn test_clones_share_table() {
        let locks = ClusterLocks::new();
        let clone = locks.clone();

        let _guard = locks.try_acquire("aws-demo").unwrap();
        assert!(clone.try_acquire("aws-demo").is_none());
    }

    #[tokio::test]
    async fn test_guard_moves_across_tasks() {
        let locks = ClusterLocks::new();
        let guard = locks.try_acquire("aws-demo").unwrap();

        tokio::spawn(async move {
            let _held = guard;
        })
        .await
        .unwrap();

        assert!(locks.try_acquire("aws-demo").is_some());
    }
}
