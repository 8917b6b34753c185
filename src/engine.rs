//! Evaluation-cycle orchestration.
//!
//! One cycle: read the roster (through the TTL cache), normalize once, then
//! run the classifier and overdue detector independently over the same
//! snapshot. The commit path validates operator edits against that snapshot,
//! plans a deduplicated batch, writes it, and invalidates the cache exactly
//! once on success. Single-threaded and batch-oriented; nothing here spawns
//! concurrent work.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;

use crate::collector::{collect, FlagEdit};
use crate::error::EngineError;
use crate::normalizer::{normalize, TruthyVocabulary};
use crate::overdue::{detect_overdue, OverdueEntry};
use crate::reconciler::{sync, FlagColumns, SyncOutcome};
use crate::store::cache::SnapshotCache;
use crate::store::{RecordStore, Snapshot};
use crate::types::{Config, CustomerRecord, OutreachKind, SchemaConfig};
use crate::windows::{classify, WindowRule};

/// Everything one evaluation produced. Derived per cycle, never persisted.
#[derive(Debug)]
pub struct EvaluationReport {
    pub today: NaiveDate,
    /// The normalized roster the buckets were computed from. Commits are
    /// validated against this exact set.
    pub records: Vec<CustomerRecord>,
    /// Active-window membership per outreach type, as store rows.
    pub active: BTreeMap<OutreachKind, Vec<u32>>,
    pub overdue: Vec<OverdueEntry>,
    /// Header row of the snapshot, kept so commit resolves flag columns
    /// against the same read the proposals came from.
    headers: Vec<String>,
}

impl EvaluationReport {
    pub fn record(&self, row: u32) -> Option<&CustomerRecord> {
        self.records.iter().find(|r| r.row == row)
    }

    /// Records currently in one outreach type's active window.
    pub fn active_records(&self, kind: OutreachKind) -> Vec<&CustomerRecord> {
        self.active
            .get(&kind)
            .map(|rows| rows.iter().filter_map(|&row| self.record(row)).collect())
            .unwrap_or_default()
    }
}

pub struct Engine {
    store: Box<dyn RecordStore>,
    cache: SnapshotCache,
    schema: SchemaConfig,
    truthy: TruthyVocabulary,
    rules: Vec<WindowRule>,
}

impl Engine {
    pub fn new(store: Box<dyn RecordStore>, config: &Config) -> Self {
        Self {
            store,
            cache: SnapshotCache::new(Duration::from_secs(config.cache_ttl_secs)),
            schema: config.schema.clone(),
            truthy: config.truthy_tokens.clone(),
            rules: config.windows.clone(),
        }
    }

    /// Run one classification pass over the current roster.
    ///
    /// An unreadable store degrades to an empty roster: downstream consumers
    /// see zero buckets this cycle and the next cycle gets a fresh chance.
    pub async fn evaluate(&self, today: NaiveDate) -> EvaluationReport {
        let snapshot = match self.cache.read_through(self.store.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("record store unavailable, evaluating empty roster: {e}");
                Snapshot::default()
            }
        };

        let records = normalize(&snapshot.rows, &self.schema, &self.truthy);

        let mut active: BTreeMap<OutreachKind, Vec<u32>> = OutreachKind::ALL
            .into_iter()
            .map(|kind| (kind, Vec::new()))
            .collect();
        let mut overdue = Vec::new();
        for record in &records {
            for kind in classify(today, record, &self.rules) {
                if let Some(rows) = active.get_mut(&kind) {
                    rows.push(record.row);
                }
            }
            overdue.extend(detect_overdue(today, record, &self.rules));
        }

        log::debug!(
            "evaluated {} record(s): {} active membership(s), {} overdue",
            records.len(),
            active.values().map(Vec::len).sum::<usize>(),
            overdue.len()
        );

        EvaluationReport {
            today,
            records,
            active,
            overdue,
            headers: snapshot.headers,
        }
    }

    /// Reconcile operator edits from one report back into the store.
    ///
    /// On success the snapshot cache is invalidated (once) so the next
    /// evaluation reflects the just-written flags. On failure the caller
    /// still holds the edits and retries the whole commit.
    pub async fn commit(
        &self,
        report: &EvaluationReport,
        edits: &[FlagEdit],
    ) -> Result<SyncOutcome, EngineError> {
        let proposals = collect(&report.records, edits)?;
        let columns = FlagColumns::from_headers(&report.headers, &self.schema);
        let outcome = sync(self.store.as_ref(), &proposals, &columns).await?;
        if matches!(outcome, SyncOutcome::Committed { .. }) {
            self.cache.invalidate();
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::store::{CellWrite, StoreError};

    /// In-memory sheet: a cell grid that applies batch writes like the real
    /// backend would.
    struct FakeSheet {
        grid: Mutex<Vec<Vec<String>>>,
        fail_reads: bool,
    }

    impl FakeSheet {
        fn new(grid: Vec<Vec<String>>) -> Self {
            Self {
                grid: Mutex::new(grid),
                fail_reads: false,
            }
        }

        fn unavailable() -> Self {
            Self {
                grid: Mutex::new(Vec::new()),
                fail_reads: true,
            }
        }
    }

    #[async_trait]
    impl RecordStore for FakeSheet {
        async fn read_all(&self) -> Result<Snapshot, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Api {
                    status: 503,
                    message: "down".to_string(),
                });
            }
            Ok(Snapshot::from_grid(self.grid.lock().unwrap().clone()))
        }

        async fn batch_update(&self, writes: &[CellWrite]) -> Result<(), StoreError> {
            let mut grid = self.grid.lock().unwrap();
            for write in writes {
                let row = &mut grid[(write.row - 1) as usize];
                let col = (write.column - 1) as usize;
                if row.len() <= col {
                    row.resize(col + 1, String::new());
                }
                row[col] = write.value.clone();
            }
            Ok(())
        }
    }

    fn header() -> Vec<String> {
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

    fn data_row(name: &str, purchase: &str, birthday: &str) -> Vec<String> {
        vec![
            name.to_string(),
            purchase.to_string(),
            birthday.to_string(),
            "Li".to_string(),
        ]
    }

    fn engine_over(grid: Vec<Vec<String>>) -> Engine {
        let config: Config = serde_json::from_str(r#"{"spreadsheetId": "test"}"#).unwrap();
        Engine::new(Box::new(FakeSheet::new(grid)), &config)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_store_unavailable_degrades_to_empty_roster() {
        let config: Config = serde_json::from_str(r#"{"spreadsheetId": "test"}"#).unwrap();
        let engine = Engine::new(Box::new(FakeSheet::unavailable()), &config);
        let report = engine.evaluate(date(2026, 6, 10)).await;
        assert!(report.records.is_empty());
        assert!(report.overdue.is_empty());
        assert!(report.active.values().all(Vec::is_empty));
    }

    #[tokio::test]
    async fn test_evaluation_buckets_and_determinism() {
        let today = date(2026, 6, 10);
        let grid = vec![
            header(),
            data_row("Fresh", "2026-06-05", ""),   // row 2: purchased 5d ago
            data_row("Missed", "2026-05-31", ""),  // row 3: purchased 10d ago
            data_row("Bday", "", "1990-06-12"),    // row 4: birthday in 2d
        ];
        let engine = engine_over(grid);

        let report = engine.evaluate(today).await;
        assert_eq!(report.active[&OutreachKind::FirstContact], vec![2]);
        assert_eq!(report.active[&OutreachKind::Birthday], vec![4]);
        assert_eq!(report.overdue.len(), 1);
        assert_eq!(report.overdue[0].row, 3);
        assert_eq!(report.overdue[0].reason, "first-contact overdue");

        // Same today + same snapshot → identical results.
        let again = engine.evaluate(today).await;
        assert_eq!(report.active, again.active);
        assert_eq!(report.overdue.len(), again.overdue.len());
        assert_eq!(report.records, again.records);
    }

    #[tokio::test]
    async fn test_commit_writes_flag_and_next_evaluation_excludes() {
        let today = date(2026, 6, 10);
        let grid = vec![header(), data_row("Bday", "", "1990-06-12")];
        let engine = engine_over(grid);

        let report = engine.evaluate(today).await;
        assert_eq!(report.active[&OutreachKind::Birthday], vec![2]);

        let edits = vec![FlagEdit {
            row: 2,
            kind: OutreachKind::Birthday,
            done: true,
        }];
        let outcome = engine.commit(&report, &edits).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Committed { writes: 1 });

        // Cache was invalidated on commit, so this re-reads the store and
        // sees the TRUE cell.
        let after = engine.evaluate(today).await;
        assert!(after.active[&OutreachKind::Birthday].is_empty());
        assert!(after.record(2).unwrap().birthday_done);
    }

    #[tokio::test]
    async fn test_commit_replay_is_idempotent() {
        let today = date(2026, 6, 10);
        let grid = vec![header(), data_row("Bday", "", "1990-06-12")];
        let engine = engine_over(grid);

        let report = engine.evaluate(today).await;
        let edits = vec![FlagEdit {
            row: 2,
            kind: OutreachKind::Birthday,
            done: true,
        }];
        engine.commit(&report, &edits).await.unwrap();
        // Replaying the same proposal set re-asserts TRUE on a TRUE cell.
        engine.commit(&report, &edits).await.unwrap();

        let after = engine.evaluate(today).await;
        assert!(after.record(2).unwrap().birthday_done);
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_edit_without_writing() {
        let today = date(2026, 6, 10);
        let grid = vec![header(), data_row("Only", "2026-06-05", "")];
        let engine = engine_over(grid);

        let report = engine.evaluate(today).await;
        let edits = vec![FlagEdit {
            row: 99,
            kind: OutreachKind::FirstContact,
            done: true,
        }];
        let err = engine.commit(&report, &edits).await.unwrap_err();
        assert!(matches!(err, EngineError::StaleSnapshotEdit { row: 99 }));

        let after = engine.evaluate(today).await;
        assert!(!after.record(2).unwrap().first_contact_done);
    }

    #[tokio::test]
    async fn test_commit_without_completions_reports_nothing_to_sync() {
        let today = date(2026, 6, 10);
        let grid = vec![header(), data_row("Only", "2026-06-05", "")];
        let engine = engine_over(grid);
        let report = engine.evaluate(today).await;

        let outcome = engine.commit(&report, &[]).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToSync);
    }
}
