//! TTL-bounded snapshot cache in front of the record store.
//!
//! Evaluations within the freshness window reuse the last read instead of
//! refetching. `invalidate()` is called exactly once, immediately after a
//! sync commits, so the next evaluation sees the just-written flags. It is
//! never called speculatively, and a failed read leaves the slot alone.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{RecordStore, Snapshot, StoreError};

struct CachedSnapshot {
    fetched_at: Instant,
    snapshot: Snapshot,
}

pub struct SnapshotCache {
    ttl: Duration,
    slot: Mutex<Option<CachedSnapshot>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// A fresh-enough snapshot, reading through to the store on miss/expiry.
    pub async fn read_through(&self, store: &dyn RecordStore) -> Result<Snapshot, StoreError> {
        if let Ok(guard) = self.slot.lock() {
            if let Some(cached) = guard.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.snapshot.clone());
                }
            }
        }

        // Guard is dropped across the await: a failed fetch must not poison
        // or clear the slot.
        let snapshot = store.read_all().await?;
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(CachedSnapshot {
                fetched_at: Instant::now(),
                snapshot: snapshot.clone(),
            });
        }
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next read refetches.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
    }
}
