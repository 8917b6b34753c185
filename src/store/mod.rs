//! Record store connector.
//!
//! The engine treats the store as an ordered grid of string cells: row 1 is
//! the header, everything below is data. Two operations exist — read the
//! whole grid, and batch-write individual cells. The concrete backend is
//! Google Sheets (`sheets`), fronted by a TTL snapshot cache (`cache`).

pub mod cache;
pub mod sheets;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

/// Named string fields of one data row, keyed by header.
pub type RawRow = HashMap<String, String>;

/// A full read of the store: the header row plus every data row in store
/// order. Data row `i` corresponds to store row `i + 2`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Snapshot {
    /// Build a snapshot from the raw cell grid. Trailing cells a backend
    /// omits for empty values simply stay absent from the row map.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let headers = grid.remove(0);
        let rows = grid
            .into_iter()
            .map(|cells| {
                headers
                    .iter()
                    .zip(cells)
                    .map(|(h, v)| (h.clone(), v))
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }
}

/// One cell write, addressed by 1-based (row, column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub row: u32,
    pub column: u32,
    pub value: String,
}

/// Transport-level store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Token not found at {0}")]
    TokenNotFound(PathBuf),
    #[error("Invalid token file: {0}")]
    InvalidToken(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The record store seen from the engine: one bulk read, one batch write.
/// Synchronous from the core's perspective; only this boundary blocks on I/O.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_all(&self) -> Result<Snapshot, StoreError>;
    async fn batch_update(&self, writes: &[CellWrite]) -> Result<(), StoreError>;
}

// ============================================================================
// Bounded retry for transient HTTP failures
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn status_is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    // The store's Retry-After wins when present and sane.
    if let Some(secs) = retry_after
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_secs(secs.min(30));
    }

    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0))
        % 150;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Send a request, retrying transient failures (429/408/5xx, connect and
/// timeout errors) with bounded exponential backoff.
pub async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, StoreError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(StoreError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if status_is_transient(status) && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "store retry {}/{} after status {} (sleep {:?})",
                        attempt,
                        attempts,
                        status,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                if (err.is_timeout() || err.is_connect()) && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "store retry {}/{} after transport error: {} (sleep {:?})",
                        attempt,
                        attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(StoreError::Http(err));
            }
        }
    }

    Err(StoreError::Api {
        status: 0,
        message: "request exhausted retries".to_string(),
    })
}
