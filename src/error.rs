//! Error types for the follow-up engine
//!
//! Errors are classified by recoverability:
//! - Retryable: the store could not be read or written this cycle
//! - NonRetryable: stale edits and configuration problems that need operator attention
//!
//! Malformed fields in the record store are deliberately *not* errors: the
//! normalizer substitutes null/false per cell and logs a warning, so one bad
//! cell never aborts a batch.

use thiserror::Error;

/// Error types for evaluation and sync cycles.
#[derive(Debug, Error)]
pub enum EngineError {
    // Retryable errors
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Sync did not complete, retry with the same proposals: {0}")]
    SyncFailure(String),

    // Non-retryable errors
    #[error("Edit references row {row}, which is not in the loaded snapshot")]
    StaleSnapshotEdit { row: u32 },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Returns true if retrying the same cycle with the same inputs can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_) | EngineError::SyncFailure(_)
        )
    }
}
