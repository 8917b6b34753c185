//! Google Sheets record store (Sheets API v4 over reqwest).
//!
//! `read_all` fetches the whole sheet as formatted strings; `batch_update`
//! posts one `values:batchUpdate` with a single-cell A1 range per write, so
//! the store applies the batch in one call. Auth is a pre-provisioned bearer
//! token file — the OAuth consent flow lives outside this crate.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{send_with_retry, CellWrite, RecordStore, RetryPolicy, Snapshot, StoreError};
use crate::types::Config;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Default token file: ~/.touchbase/google/token.json
pub fn token_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".touchbase")
        .join("google")
        .join("token.json")
}

/// Bearer token file. `access_token` is accepted as an alias so token files
/// written by other Google tooling load unchanged.
#[derive(Debug, Clone, Deserialize)]
struct SheetsToken {
    #[serde(alias = "access_token")]
    token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest {
    value_input_option: &'static str,
    data: Vec<WriteRange>,
}

#[derive(Debug, Serialize)]
struct WriteRange {
    range: String,
    values: Vec<Vec<String>>,
}

pub struct SheetsStore {
    client: reqwest::Client,
    spreadsheet_id: String,
    sheet_name: String,
    token_file: PathBuf,
    retry: RetryPolicy,
}

impl SheetsStore {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            token_file: config
                .token_path
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(token_path),
            retry: RetryPolicy::default(),
        }
    }

    fn bearer_token(&self) -> Result<String, StoreError> {
        if !self.token_file.exists() {
            return Err(StoreError::TokenNotFound(self.token_file.clone()));
        }
        let content = fs::read_to_string(&self.token_file)?;
        let token: SheetsToken = serde_json::from_str(&content)
            .map_err(|e| StoreError::InvalidToken(format!("{}: {}", self.token_file.display(), e)))?;
        Ok(token.token)
    }

    fn range_for(&self, cell: &str) -> String {
        // Quoting keeps sheet names with spaces or CJK characters valid.
        format!("'{}'!{}", self.sheet_name, cell)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    async fn read_all(&self) -> Result<Snapshot, StoreError> {
        let token = self.bearer_token()?;
        let url = format!(
            "{}/{}/values/{}?majorDimension=ROWS",
            SHEETS_BASE,
            self.spreadsheet_id,
            self.range_for("A1:ZZ")
        );
        let response =
            send_with_retry(self.client.get(&url).bearer_auth(&token), &self.retry).await?;
        let response = Self::check(response).await?;
        let body: ValueRange = response.json().await?;
        log::debug!("read {} row(s) from sheet", body.values.len());
        Ok(Snapshot::from_grid(body.values))
    }

    async fn batch_update(&self, writes: &[CellWrite]) -> Result<(), StoreError> {
        let token = self.bearer_token()?;
        let request = BatchUpdateRequest {
            value_input_option: "RAW",
            data: writes
                .iter()
                .map(|w| WriteRange {
                    range: self.range_for(&rowcol_to_a1(w.row, w.column)),
                    values: vec![vec![w.value.clone()]],
                })
                .collect(),
        };
        let url = format!(
            "{}/{}/values:batchUpdate",
            SHEETS_BASE, self.spreadsheet_id
        );
        let response = send_with_retry(
            self.client.post(&url).bearer_auth(&token).json(&request),
            &self.retry,
        )
        .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// 1-based (row, column) → A1 notation, e.g. (2, 8) → "H2", (3, 28) → "AB3".
pub fn rowcol_to_a1(row: u32, col: u32) -> String {
    let mut letters = String::new();
    let mut c = col;
    while c > 0 {
        let rem = ((c - 1) % 26) as u8;
        letters.insert(0, (b'A' + rem) as char);
        c = (c - 1) / 26;
    }
    format!("{letters}{row}")
}
