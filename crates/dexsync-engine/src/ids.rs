//! Surrogate-id allocation.
//!
//! Ids come from the store's `id_sequence` row in blocks; the allocator hands
//! them out one at a time and refills when the buffer runs dry. Unused ids at
//! the end of a run are simply skipped — the sequence only moves forward.

use std::collections::VecDeque;

use dexsync_core::SyncError;
use dexsync_store_sqlite::SqliteStore;
use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    pool: VecDeque<i64>,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        IdAllocator::default()
    }

    pub(crate) fn next(&mut self, store: &mut SqliteStore) -> Result<i64, SyncError> {
        if self.pool.is_empty() {
            let (start, count) = store.next_id_range()?;
            if count <= 0 {
                return Err(SyncError::Integrity(format!(
                    "id sequence returned a block of {count} ids"
                )));
            }
            self.pool.extend(start..start + count);
            debug!(start, count, "refilled id pool");
        }
        self.pool.pop_front().ok_or_else(|| {
            SyncError::Integrity("id pool empty after refill".to_owned())
        })
    }

    /// Draws `n` ids at once, refilling as often as needed. Bulk loads know
    /// their new-row count up front and allocate the whole block here.
    pub(crate) fn next_ids(
        &mut self,
        store: &mut SqliteStore,
        n: usize,
    ) -> Result<Vec<i64>, SyncError> {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            ids.push(self.next(store)?);
        }
        Ok(ids)
    }
}
