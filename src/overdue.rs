//! Overdue Detector: records that missed a window but are still worth chasing.
//!
//! Each outreach type has a grace interval just past its active window. Inside
//! it the task is reported as overdue with a human-readable reason; past it
//! the record silently drops out of reporting for that type — stale misses
//! are no longer chased. Pure function, same contract as the classifier.

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::{CustomerRecord, OutreachKind};
use crate::windows::{basis_day_count, WindowRule};

/// One overdue finding. A record overdue for several types yields one entry
/// per reason — entries are never deduplicated by record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueEntry {
    pub row: u32,
    pub name: String,
    pub kind: OutreachKind,
    pub reason: String,
}

/// Overdue findings for one record: basis date present, day count inside the
/// grace interval, governing flag still false.
pub fn detect_overdue(
    today: NaiveDate,
    record: &CustomerRecord,
    rules: &[WindowRule],
) -> Vec<OverdueEntry> {
    rules
        .iter()
        .filter(|rule| !record.flag(rule.kind))
        .filter(|rule| {
            basis_day_count(today, record, rule.kind)
                .map(|days| rule.is_overdue(days))
                .unwrap_or(false)
        })
        .map(|rule| OverdueEntry {
            row: record.row,
            name: record.name.clone(),
            kind: rule.kind,
            reason: format!("{} overdue", rule.kind.label()),
        })
        .collect()
}
