//! Record Normalizer: raw store rows → typed `CustomerRecord`s.
//!
//! The store is a human-edited sheet, so parsing is deliberately permissive:
//! a date that fails to parse becomes None, a flag cell that isn't a known
//! truthy spelling is false, and a missing flag column defaults the whole
//! column to false. One bad cell must never corrupt the batch.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::RawRow;
use crate::types::{CustomerRecord, OutreachKind, SchemaConfig};

/// The enumerated set of cell spellings accepted as "flag is set".
///
/// Matching is case-insensitive. The default covers the spellings observed in
/// production sheets: checkbox TRUE, Chinese 是, plain 1, CHECKED, and V.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TruthyVocabulary(Vec<String>);

impl Default for TruthyVocabulary {
    fn default() -> Self {
        Self(
            ["TRUE", "是", "1", "CHECKED", "V"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        )
    }
}

impl TruthyVocabulary {
    pub fn new<I: IntoIterator<Item = String>>(tokens: I) -> Self {
        Self(tokens.into_iter().collect())
    }

    pub fn is_truthy(&self, raw: &str) -> bool {
        let cell = raw.trim();
        if cell.is_empty() {
            return false;
        }
        let upper = cell.to_uppercase();
        self.0.iter().any(|tok| tok.to_uppercase() == upper)
    }
}

/// Date spellings accepted across observed sheets. Tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y.%m.%d"];

/// Build one `CustomerRecord` per raw row, in store order.
///
/// Row index is `2 + position`: row 1 is the header and the snapshot's first
/// data row is store row 2.
pub fn normalize(
    rows: &[RawRow],
    schema: &SchemaConfig,
    truthy: &TruthyVocabulary,
) -> Vec<CustomerRecord> {
    rows.iter()
        .enumerate()
        .map(|(position, raw)| {
            let row = position as u32 + 2;
            CustomerRecord {
                row,
                name: text_field(raw, &schema.name_column),
                sales_rep: text_field(raw, &schema.sales_rep_column),
                purchase_date: date_field(raw, &schema.purchase_date_column, row),
                birth_date: date_field(raw, &schema.birth_date_column, row),
                first_contact_done: flag_field(raw, schema, OutreachKind::FirstContact, truthy),
                second_contact_done: flag_field(raw, schema, OutreachKind::SecondContact, truthy),
                anniversary_done: flag_field(raw, schema, OutreachKind::Anniversary, truthy),
                birthday_done: flag_field(raw, schema, OutreachKind::Birthday, truthy),
            }
        })
        .collect()
}

/// Keep only records assigned to one sales rep (exact match on the rep cell).
pub fn filter_by_rep(records: &[CustomerRecord], rep: &str) -> Vec<CustomerRecord> {
    records
        .iter()
        .filter(|r| r.sales_rep == rep)
        .cloned()
        .collect()
}

/// Distinct, sorted rep names across the roster. Empty cells are skipped.
pub fn sales_reps(records: &[CustomerRecord]) -> Vec<String> {
    let mut reps: Vec<String> = records
        .iter()
        .map(|r| r.sales_rep.clone())
        .filter(|rep| !rep.is_empty())
        .collect();
    reps.sort();
    reps.dedup();
    reps
}

fn text_field(raw: &RawRow, column: &str) -> String {
    raw.get(column).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn flag_field(
    raw: &RawRow,
    schema: &SchemaConfig,
    kind: OutreachKind,
    truthy: &TruthyVocabulary,
) -> bool {
    // Missing column → false, not an error.
    raw.get(schema.flag_column(kind))
        .map(|v| truthy.is_truthy(v))
        .unwrap_or(false)
}

fn date_field(raw: &RawRow, column: &str, row: u32) -> Option<NaiveDate> {
    let cell = raw.get(column).map(|v| v.trim()).unwrap_or("");
    if cell.is_empty() {
        return None;
    }
    match parse_date(cell) {
        Some(date) => Some(date),
        None => {
            log::warn!("row {}: unparseable {} cell {:?}, treating as empty", row, column, cell);
            None
        }
    }
}

/// Tolerant date parsing: tries the known formats, and strips a trailing
/// time component ("2026-01-02T00:00:00" or "2026-01-02 00:00:00") first.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let date_part = cell
        .split_once('T')
        .map(|(d, _)| d)
        .or_else(|| cell.split_once(' ').map(|(d, _)| d))
        .unwrap_or(cell);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
