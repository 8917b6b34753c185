//! Sync Reconciler: proposals → one deduplicated, idempotent batch of cell
//! writes.
//!
//! The store call is atomic-or-fails. On failure nothing is assumed durable
//! and the caller retries wholesale with the same proposal set — safe because
//! every write re-asserts TRUE, which is a no-op on a cell that already holds
//! it.

use std::collections::{BTreeMap, BTreeSet};

use crate::collector::Proposal;
use crate::error::EngineError;
use crate::store::{CellWrite, RecordStore};
use crate::types::{OutreachKind, SchemaConfig};

/// The literal token written into a completed flag cell.
pub const TRUTHY_WRITE_VALUE: &str = "TRUE";

/// 1-based store column per flag, resolved from the snapshot's header row.
///
/// Resolved against the same snapshot the proposals were built from, so a
/// header edit between cycles cannot misaddress a write.
#[derive(Debug, Clone)]
pub struct FlagColumns {
    columns: BTreeMap<OutreachKind, u32>,
}

impl FlagColumns {
    pub fn from_headers(headers: &[String], schema: &SchemaConfig) -> Self {
        let columns = OutreachKind::ALL
            .into_iter()
            .filter_map(|kind| {
                headers
                    .iter()
                    .position(|h| h == schema.flag_column(kind))
                    .map(|position| (kind, position as u32 + 1))
            })
            .collect();
        Self { columns }
    }

    pub fn column_for(&self, kind: OutreachKind) -> Option<u32> {
        self.columns.get(&kind).copied()
    }
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Empty proposal set; the store was not called.
    NothingToSync,
    /// The batch committed.
    Committed { writes: usize },
}

/// Collapse proposals into at most one write per (row, flag) cell.
///
/// `BTreeSet` gives both the dedup and a deterministic write order. A flag
/// with no column in the header is a configuration fault, not a skippable
/// cell — dropping it would silently lose an operator's tick.
pub fn plan_writes(
    proposals: &[Proposal],
    columns: &FlagColumns,
) -> Result<Vec<CellWrite>, EngineError> {
    let distinct: BTreeSet<Proposal> = proposals.iter().copied().collect();
    distinct
        .into_iter()
        .map(|proposal| {
            let column = columns.column_for(proposal.kind).ok_or_else(|| {
                EngineError::Config(format!(
                    "no column for {} flag in sheet header",
                    proposal.kind.label()
                ))
            })?;
            Ok(CellWrite {
                row: proposal.row,
                column,
                value: TRUTHY_WRITE_VALUE.to_string(),
            })
        })
        .collect()
}

/// Commit one evaluation cycle's proposals to the store.
pub async fn sync(
    store: &dyn RecordStore,
    proposals: &[Proposal],
    columns: &FlagColumns,
) -> Result<SyncOutcome, EngineError> {
    if proposals.is_empty() {
        log::info!("nothing to sync");
        return Ok(SyncOutcome::NothingToSync);
    }

    let writes = plan_writes(proposals, columns)?;
    store
        .batch_update(&writes)
        .await
        .map_err(|e| EngineError::SyncFailure(e.to_string()))?;

    log::info!("synced {} cell write(s)", writes.len());
    Ok(SyncOutcome::Committed {
        writes: writes.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::store::{Snapshot, StoreError};

    struct RecordingStore {
        batches: Mutex<Vec<Vec<CellWrite>>>,
        fail: bool,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn batch_count(&self) -> usize {
            self.batches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RecordStore for RecordingStore {
        async fn read_all(&self) -> Result<Snapshot, StoreError> {
            Ok(Snapshot::default())
        }

        async fn batch_update(&self, writes: &[CellWrite]) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Api {
                    status: 503,
                    message: "backend unavailable".to_string(),
                });
            }
            self.batches.lock().unwrap().push(writes.to_vec());
            Ok(())
        }
    }

    fn headers() -> Vec<String> {
        [
            "Name",
            "Purchase Date",
            "Birthday",
            "Sales Rep",
            "First Contact Done",
            "Second Contact Done",
            "Anniversary Done",
            "Birthday Done",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    fn columns() -> FlagColumns {
        FlagColumns::from_headers(&headers(), &SchemaConfig::default())
    }

    #[test]
    fn test_flag_columns_are_one_based_header_positions() {
        let columns = columns();
        assert_eq!(columns.column_for(OutreachKind::FirstContact), Some(5));
        assert_eq!(columns.column_for(OutreachKind::Birthday), Some(8));
    }

    #[test]
    fn test_plan_writes_collapses_duplicate_cells() {
        let proposals = vec![
            Proposal { row: 4, kind: OutreachKind::Anniversary },
            Proposal { row: 4, kind: OutreachKind::Anniversary },
            Proposal { row: 4, kind: OutreachKind::Birthday },
        ];
        let writes = plan_writes(&proposals, &columns()).unwrap();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|w| w.value == TRUTHY_WRITE_VALUE));
    }

    #[test]
    fn test_plan_writes_is_deterministic() {
        let forward = vec![
            Proposal { row: 2, kind: OutreachKind::FirstContact },
            Proposal { row: 9, kind: OutreachKind::Birthday },
        ];
        let reversed: Vec<Proposal> = forward.iter().rev().copied().collect();
        assert_eq!(
            plan_writes(&forward, &columns()).unwrap(),
            plan_writes(&reversed, &columns()).unwrap()
        );
    }

    #[test]
    fn test_plan_writes_missing_flag_column_is_config_error() {
        let mut short_headers = headers();
        short_headers.truncate(5); // drops second-contact onward
        let columns = FlagColumns::from_headers(&short_headers, &SchemaConfig::default());
        let proposals = vec![Proposal { row: 2, kind: OutreachKind::Birthday }];
        let err = plan_writes(&proposals, &columns).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[tokio::test]
    async fn test_sync_empty_proposals_never_touches_store() {
        let store = RecordingStore::new();
        let outcome = sync(&store, &[], &columns()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToSync);
        assert_eq!(store.batch_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_commits_one_batch() {
        let store = RecordingStore::new();
        let proposals = vec![
            Proposal { row: 2, kind: OutreachKind::FirstContact },
            Proposal { row: 2, kind: OutreachKind::FirstContact },
            Proposal { row: 3, kind: OutreachKind::Birthday },
        ];
        let outcome = sync(&store, &proposals, &columns()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Committed { writes: 2 });
        assert_eq!(store.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_replay_produces_identical_batch() {
        // Retrying the same proposal set writes the same cells again — the
        // store ends up in the same state, no partial-success accounting.
        let store = RecordingStore::new();
        let proposals = vec![Proposal { row: 2, kind: OutreachKind::FirstContact }];
        sync(&store, &proposals, &columns()).await.unwrap();
        sync(&store, &proposals, &columns()).await.unwrap();
        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], batches[1]);
    }

    #[tokio::test]
    async fn test_sync_failure_is_retryable_and_writes_nothing() {
        let store = RecordingStore::failing();
        let proposals = vec![Proposal { row: 2, kind: OutreachKind::FirstContact }];
        let err = sync(&store, &proposals, &columns()).await.unwrap_err();
        assert!(matches!(err, EngineError::SyncFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(store.batch_count(), 0);
    }
}
