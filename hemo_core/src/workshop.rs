//! The workshop session service.
//!
//! One `WorkshopSession` owns the results ledger, the session gate and the
//! autosave pipeline for a running workshop. Screens get a handle to it
//! instead of reaching for globals.

use crate::autosave::{AutosavePipeline, AutosaveStatus};
use crate::config::Config;
use crate::ledger::ResultsLedger;
use crate::session::{ResetBus, ResetReason, SessionGate};
use crate::store::StudyStore;
use crate::types::{CalcEntry, CalcType, ConsolidatedSnapshotRow, WorkshopSessionContext};
use crate::Result;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct WorkshopSession {
    ledger: Arc<ResultsLedger>,
    gate: Arc<SessionGate>,
    autosave: AutosavePipeline,
}

impl WorkshopSession {
    /// Start a session in quick mode; must be called inside a tokio runtime
    pub fn new(store: Arc<dyn StudyStore>, config: &Config) -> Self {
        let ledger = Arc::new(ResultsLedger::new());
        let gate = Arc::new(SessionGate::with_required(
            config.workshop.required.iter().copied(),
        ));
        let autosave =
            AutosavePipeline::spawn(&ledger, Arc::clone(&gate), store, &config.autosave);
        Self {
            ledger,
            gate,
            autosave,
        }
    }

    pub fn ledger(&self) -> &ResultsLedger {
        &self.ledger
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn autosave(&self) -> &AutosavePipeline {
        &self.autosave
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosave.status()
    }

    /// Record a calculator result
    pub fn publish(&self, entry: CalcEntry) {
        self.ledger.upsert(entry);
    }

    /// Drop everything from the previous study and start `context`
    pub fn begin_patient_study(&self, context: WorkshopSessionContext) {
        self.reset(ResetReason::NewStudy);
        self.gate.set_context(context);
    }

    pub fn begin_quick(&self) {
        self.reset(ResetReason::NewStudy);
    }

    /// Clear identifiers, cancel pending saves and empty the ledger
    pub fn reset(&self, reason: ResetReason) {
        self.gate.reset(reason);
        self.autosave.reset();
        self.ledger.clear();
    }

    pub fn clear(&self) {
        self.reset(ResetReason::Explicit);
    }

    pub fn is_workshop_complete(&self) -> bool {
        self.gate.is_workshop_complete(&self.ledger.present_types())
    }

    pub fn missing_calculators(&self) -> Vec<CalcType> {
        self.gate.missing(&self.ledger.present_types())
    }

    pub async fn flush_now(&self) -> Result<Option<ConsolidatedSnapshotRow>> {
        self.autosave.flush_now().await
    }

    /// Follow resets emitted on `bus` until the bus closes
    pub fn attach_reset_bus(&self, bus: &ResetBus) -> JoinHandle<()> {
        let mut resets = bus.subscribe();
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                match resets.recv().await {
                    Ok(reason) => session.reset(reason),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Reset bus lagged, resetting anyway");
                        session.reset(ResetReason::Explicit);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn shutdown(&self) {
        self.autosave.shutdown().await;
    }
}
