//! Window Classifier: which outreach obligations are active for a record today.
//!
//! Each outreach type has a closed day-count interval relative to its basis
//! date. Bounding by an interval instead of a single trigger day keeps the
//! roster actionable even when evaluation skips days. Classification is a
//! pure function of (today, record, rules) and mutates nothing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{days_since_purchase, days_to_birthday, CustomerRecord, OutreachKind};

/// Active window plus overdue grace interval for one outreach type.
///
/// All four bounds are inclusive day counts against the type's basis:
/// days since purchase for the purchase-anchored types, signed days to the
/// nearest birthday occurrence for `Birthday`. The boundaries are deployment
/// configuration; observed sheets disagree on the grace edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRule {
    pub kind: OutreachKind,
    pub active_min: i64,
    pub active_max: i64,
    pub overdue_min: i64,
    pub overdue_max: i64,
}

impl WindowRule {
    pub fn is_active(&self, day_count: i64) -> bool {
        (self.active_min..=self.active_max).contains(&day_count)
    }

    pub fn is_overdue(&self, day_count: i64) -> bool {
        (self.overdue_min..=self.overdue_max).contains(&day_count)
    }
}

/// Canonical rule table.
///
/// first-contact active [3,8] / overdue [9,11]; second-contact [15,20] /
/// [21,23]; anniversary [360,365] / [366,368]; birthday active when the
/// birthday is 0..=30 days away, overdue when it passed 1-3 days ago.
pub fn default_rules() -> Vec<WindowRule> {
    vec![
        WindowRule {
            kind: OutreachKind::FirstContact,
            active_min: 3,
            active_max: 8,
            overdue_min: 9,
            overdue_max: 11,
        },
        WindowRule {
            kind: OutreachKind::SecondContact,
            active_min: 15,
            active_max: 20,
            overdue_min: 21,
            overdue_max: 23,
        },
        WindowRule {
            kind: OutreachKind::Anniversary,
            active_min: 360,
            active_max: 365,
            overdue_min: 366,
            overdue_max: 368,
        },
        WindowRule {
            kind: OutreachKind::Birthday,
            active_min: 0,
            active_max: 30,
            overdue_min: -3,
            overdue_max: -1,
        },
    ]
}

/// The day count a rule's intervals are compared against, or None when the
/// record's basis date is missing or unparseable — such records are excluded
/// from membership for that type but stay in the roster.
pub fn basis_day_count(
    today: NaiveDate,
    record: &CustomerRecord,
    kind: OutreachKind,
) -> Option<i64> {
    match kind {
        OutreachKind::FirstContact | OutreachKind::SecondContact | OutreachKind::Anniversary => {
            days_since_purchase(today, record)
        }
        OutreachKind::Birthday => record
            .birth_date
            .and_then(|birth| days_to_birthday(today, birth)),
    }
}

/// Outreach types for which this record is in the active window right now:
/// basis date present, day count inside the closed interval, governing flag
/// still false.
pub fn classify(today: NaiveDate, record: &CustomerRecord, rules: &[WindowRule]) -> Vec<OutreachKind> {
    rules
        .iter()
        .filter(|rule| !record.flag(rule.kind))
        .filter(|rule| {
            basis_day_count(today, record, rule.kind)
                .map(|days| rule.is_active(days))
                .unwrap_or(false)
        })
        .map(|rule| rule.kind)
        .collect()
}
