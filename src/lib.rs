//! Customer follow-up engine.
//!
//! Tracks outreach obligations (first contact, second contact, anniversary,
//! birthday) against a customer roster held in a spreadsheet-shaped record
//! store, classifies which records need action today, flags the ones that
//! missed their window, and reconciles operator-entered completions back into
//! the store as an idempotent batch of cell writes.
//!
//! Pipeline: `store` read → `normalizer` → `windows` classifier + `overdue`
//! detector (both pure over the same snapshot) → `collector` validates
//! operator edits → `reconciler` writes back. `engine` wires a cycle
//! together; `types` carries the config and record model.

pub mod collector;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod overdue;
pub mod reconciler;
pub mod store;
pub mod types;
pub mod windows;

pub use collector::{collect, FlagEdit, Proposal};
pub use engine::{Engine, EvaluationReport};
pub use error::EngineError;
pub use normalizer::{filter_by_rep, normalize, sales_reps, TruthyVocabulary};
pub use overdue::{detect_overdue, OverdueEntry};
pub use reconciler::{plan_writes, sync, FlagColumns, SyncOutcome};
pub use store::sheets::SheetsStore;
pub use types::{load_config, Config, CustomerRecord, OutreachKind, SchemaConfig};
pub use windows::{classify, default_rules, WindowRule};
