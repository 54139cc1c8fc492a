//! Per-path mutual exclusion for executor mutations.

use log::trace;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of async locks keyed by filesystem path.
///
/// Cloning shares the table. Paths are always locked in sorted order so two
/// callers with overlapping sets cannot deadlock.
#[derive(Clone, Default)]
pub struct PathLocks {
    table: Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>,
}

/// Holds every lock acquired by one [`PathLocks::acquire`] call.
pub struct PathGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &PathBuf) -> Arc<AsyncMutex<()>> {
        // A poisoned table only means another thread panicked while inserting.
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.entry(path.clone()).or_default().clone()
    }

    pub async fn acquire(&self, paths: impl IntoIterator<Item = PathBuf>) -> PathGuard {
        let sorted: BTreeSet<PathBuf> = paths.into_iter().collect();
        let mut guards = Vec::with_capacity(sorted.len());
        for path in &sorted {
            trace!("Locking {:?}", path);
            guards.push(self.lock_for(path).lock_owned().await);
        }
        PathGuard { _guards: guards }
    }
}
