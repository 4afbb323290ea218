//! Per-row mutual exclusion for read-modify-write updates.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per row position.
///
/// Cloning shares the same lock table, so the dispatcher and the tracker
/// must be built from clones of a single `RowLocks`.
#[derive(Clone, Default)]
pub struct RowLocks {
    inner: Arc<Mutex<HashMap<usize, Arc<Mutex<()>>>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `row`. Released when the guard drops.
    pub async fn lock(&self, row: usize) -> OwnedMutexGuard<()> {
        let row_lock = {
            let mut table = self.inner.lock().await;
            Arc::clone(table.entry(row).or_default())
        };
        row_lock.lock_owned().await
    }
}
