#![forbid(unsafe_code)]

//! Core domain model and state sync for the hemodynamics workshop.
//!
//! This crate provides:
//! - Calculator result types and the canonical key vocabulary
//! - The in-memory results ledger and per-screen prefill
//! - Session gating and reset signalling
//! - Debounced autosave of one consolidated row per study
//! - Study storage, history, CSV export and trend classification

pub mod types;
pub mod error;
pub mod keys;
pub mod units;
pub mod validation;
pub mod config;
pub mod logging;
pub mod ledger;
pub mod prefill;
pub mod session;
pub mod consolidate;
pub mod store;
pub mod autosave;
pub mod workshop;
pub mod history;
pub mod export;
pub mod trend;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use keys::CanonicalKey;
pub use config::Config;
pub use ledger::{LedgerSnapshot, ResultsLedger};
pub use prefill::{PrefillAdopter, PrefillField, PrefillReport, ScreenFields};
pub use session::{ResetBus, ResetReason, SessionGate};
pub use store::{JsonStudyStore, MemoryStudyStore, StudyStore};
pub use autosave::{AutosavePhase, AutosavePipeline, AutosaveStatus};
pub use workshop::WorkshopSession;
pub use history::load_patient_history;
pub use export::export_history_csv;
pub use trend::{summarize, ClinicalInsight, TrendDirection, TrendMetric, TrendSummary};
