use std::fs;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::normalizer::TruthyVocabulary;
use crate::windows::{default_rules, WindowRule};

/// Configuration stored in ~/.touchbase/config.json
///
/// Everything except the spreadsheet id has a working default, so a minimal
/// config is `{"spreadsheetId": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// Bearer token file for the Sheets API. Defaults to
    /// ~/.touchbase/google/token.json when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_path: Option<String>,
    #[serde(default)]
    pub schema: SchemaConfig,
    /// Accepted truthy spellings for completion-flag cells.
    #[serde(default)]
    pub truthy_tokens: TruthyVocabulary,
    /// Window and grace boundaries per outreach type. The exact day counts
    /// vary between deployments, so they live here rather than in code.
    #[serde(default = "default_rules")]
    pub windows: Vec<WindowRule>,
    /// Snapshot cache freshness window in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_sheet_name() -> String {
    "Sheet1".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    600
}

/// Path to the config file: ~/.touchbase/config.json
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".touchbase")
        .join("config.json")
}

/// Load configuration from disk.
pub fn load_config() -> Result<Config, EngineError> {
    let path = config_path();
    let content = fs::read_to_string(&path)
        .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))
}

/// Column headers in the record store. The store is a human-maintained sheet,
/// so header names are deployment-specific (the reference deployment uses
/// Chinese headers) and must be configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaConfig {
    pub name_column: String,
    pub purchase_date_column: String,
    pub birth_date_column: String,
    pub sales_rep_column: String,
    pub first_contact_column: String,
    pub second_contact_column: String,
    pub anniversary_column: String,
    pub birthday_column: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            name_column: "Name".to_string(),
            purchase_date_column: "Purchase Date".to_string(),
            birth_date_column: "Birthday".to_string(),
            sales_rep_column: "Sales Rep".to_string(),
            first_contact_column: "First Contact Done".to_string(),
            second_contact_column: "Second Contact Done".to_string(),
            anniversary_column: "Anniversary Done".to_string(),
            birthday_column: "Birthday Done".to_string(),
        }
    }
}

impl SchemaConfig {
    /// Header of the completion-flag column governing an outreach type.
    pub fn flag_column(&self, kind: OutreachKind) -> &str {
        match kind {
            OutreachKind::FirstContact => &self.first_contact_column,
            OutreachKind::SecondContact => &self.second_contact_column,
            OutreachKind::Anniversary => &self.anniversary_column,
            OutreachKind::Birthday => &self.birthday_column,
        }
    }
}

/// The four outreach obligations tracked per customer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum OutreachKind {
    FirstContact,
    SecondContact,
    Anniversary,
    Birthday,
}

impl OutreachKind {
    pub const ALL: [OutreachKind; 4] = [
        OutreachKind::FirstContact,
        OutreachKind::SecondContact,
        OutreachKind::Anniversary,
        OutreachKind::Birthday,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OutreachKind::FirstContact => "first-contact",
            OutreachKind::SecondContact => "second-contact",
            OutreachKind::Anniversary => "anniversary",
            OutreachKind::Birthday => "birthday",
        }
    }
}

/// One typed customer row from the record store.
///
/// `row` is the store row index (1-based, row 1 is the header, so the first
/// record is row 2). It is the record's identity for sync addressing and is
/// carried everywhere — never recomputed from a position in a filtered list.
///
/// Records are rebuilt from the snapshot each evaluation and never mutated;
/// a completion is expressed as a proposal, not an in-place flag change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub row: u32,
    pub name: String,
    /// May be empty — not every record is assigned a rep.
    pub sales_rep: String,
    pub purchase_date: Option<NaiveDate>,
    /// Month/day are significant; the year may be a placeholder.
    pub birth_date: Option<NaiveDate>,
    pub first_contact_done: bool,
    pub second_contact_done: bool,
    pub anniversary_done: bool,
    pub birthday_done: bool,
}

impl CustomerRecord {
    /// The governing completion flag for an outreach type.
    pub fn flag(&self, kind: OutreachKind) -> bool {
        match kind {
            OutreachKind::FirstContact => self.first_contact_done,
            OutreachKind::SecondContact => self.second_contact_done,
            OutreachKind::Anniversary => self.anniversary_done,
            OutreachKind::Birthday => self.birthday_done,
        }
    }
}

/// Whole days elapsed since purchase, negative if the purchase date is in the
/// future. None when the record has no parseable purchase date.
pub fn days_since_purchase(today: NaiveDate, record: &CustomerRecord) -> Option<i64> {
    record.purchase_date.map(|d| (today - d).num_days())
}

/// Signed day count to the nearest occurrence of a birthday's month/day,
/// choosing the smaller-magnitude of this year's and next year's occurrence.
/// Negative means the nearest occurrence already passed this year.
pub fn days_to_birthday(today: NaiveDate, birth: NaiveDate) -> Option<i64> {
    let this_year = occurrence_in_year(birth, today.year())?;
    let next_year = occurrence_in_year(birth, today.year() + 1)?;
    let d_this = (this_year - today).num_days();
    let d_next = (next_year - today).num_days();
    Some(if d_this.abs() <= d_next.abs() {
        d_this
    } else {
        d_next
    })
}

/// Project a birthday's month/day into `year`. Feb-29 resolves to Feb-28 in
/// non-leap years; no other month/day taken from a valid date can be invalid.
fn occurrence_in_year(birth: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, birth.month(), birth.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
}
