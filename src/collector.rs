//! Completion Collector: operator checkbox edits → validated proposals.
//!
//! Edits arrive from whatever surface showed the buckets to an operator. Only
//! true-valued edits become proposals (the engine never proposes clearing a
//! flag), and every edit must address a row that exists in the snapshot the
//! buckets were built from — anything else is a stale edit and the whole
//! collection is rejected so the operator finds out instead of losing ticks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{CustomerRecord, OutreachKind};

/// One operator edit: the flag value shown back from an editable bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEdit {
    pub row: u32,
    pub kind: OutreachKind,
    pub done: bool,
}

/// A pending flag write. The value is implicitly true — that is the only
/// transition the engine ever requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub row: u32,
    pub kind: OutreachKind,
}

/// Validate edits against the snapshot and keep the completions.
///
/// The row carried on each edit is the store row from the normalizer, never a
/// position in a filtered view, so the same record ticked in two buckets
/// (e.g. active and overdue) resolves to the same address.
pub fn collect(
    records: &[CustomerRecord],
    edits: &[FlagEdit],
) -> Result<Vec<Proposal>, EngineError> {
    let known_rows: HashSet<u32> = records.iter().map(|r| r.row).collect();

    for edit in edits {
        if !known_rows.contains(&edit.row) {
            return Err(EngineError::StaleSnapshotEdit { row: edit.row });
        }
    }

    Ok(edits
        .iter()
        .filter(|edit| edit.done)
        .map(|edit| Proposal {
            row: edit.row,
            kind: edit.kind,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(rows: &[u32]) -> Vec<CustomerRecord> {
        rows.iter()
            .map(|&row| CustomerRecord {
                row,
                name: format!("r{row}"),
                sales_rep: String::new(),
                purchase_date: None,
                birth_date: None,
                first_contact_done: false,
                second_contact_done: false,
                anniversary_done: false,
                birthday_done: false,
            })
            .collect()
    }

    #[test]
    fn test_collect_keeps_only_completions() {
        let snapshot = records(&[2, 3, 4]);
        let edits = vec![
            FlagEdit { row: 2, kind: OutreachKind::FirstContact, done: true },
            FlagEdit { row: 3, kind: OutreachKind::FirstContact, done: false },
            FlagEdit { row: 4, kind: OutreachKind::Birthday, done: true },
        ];
        let proposals = collect(&snapshot, &edits).unwrap();
        assert_eq!(
            proposals,
            vec![
                Proposal { row: 2, kind: OutreachKind::FirstContact },
                Proposal { row: 4, kind: OutreachKind::Birthday },
            ]
        );
    }

    #[test]
    fn test_collect_rejects_rows_outside_snapshot() {
        let snapshot = records(&[2, 3]);
        let edits = vec![FlagEdit { row: 9, kind: OutreachKind::Birthday, done: true }];
        let err = collect(&snapshot, &edits).unwrap_err();
        assert!(matches!(err, EngineError::StaleSnapshotEdit { row: 9 }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_collect_rejects_stale_row_even_when_unchecked() {
        // A false-valued edit still proves the operator saw a row the
        // snapshot doesn't have; reject rather than silently drop.
        let snapshot = records(&[2]);
        let edits = vec![FlagEdit { row: 5, kind: OutreachKind::Anniversary, done: false }];
        assert!(collect(&snapshot, &edits).is_err());
    }

    #[test]
    fn test_collect_same_row_in_two_buckets_keeps_one_address() {
        let snapshot = records(&[2]);
        let edits = vec![
            FlagEdit { row: 2, kind: OutreachKind::Anniversary, done: true },
            FlagEdit { row: 2, kind: OutreachKind::Anniversary, done: true },
        ];
        // Duplicates survive collection; the reconciler collapses them.
        let proposals = collect(&snapshot, &edits).unwrap();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0], proposals[1]);
    }

    #[test]
    fn test_collect_empty_edits() {
        assert!(collect(&records(&[2]), &[]).unwrap().is_empty());
    }
}
