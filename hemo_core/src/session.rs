//! Workshop session gate and reset signalling.
//!
//! The gate owns the active `WorkshopSessionContext`. Each reset bumps a
//! generation counter; one-shot consumers (prefill) compare generations to
//! know when to re-arm.

use crate::types::{CalcType, WorkshopSessionContext};
use std::collections::BTreeSet;
use tokio::sync::{broadcast, watch};

/// Why a session was reset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReason {
    /// App-wide reset requested by the user
    Explicit,
    /// Current study abandoned without saving further
    DiscardStudy,
    /// A new study is about to start
    NewStudy,
}

/// Published gate state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GateState {
    pub context: WorkshopSessionContext,
    pub generation: u64,
}

/// Tracks workshop mode and identifiers
pub struct SessionGate {
    tx: watch::Sender<GateState>,
    required: BTreeSet<CalcType>,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGate {
    /// Gate requiring all five core calculators for completion
    pub fn new() -> Self {
        Self::with_required(CalcType::ALL)
    }

    pub fn with_required(required: impl IntoIterator<Item = CalcType>) -> Self {
        let (tx, _rx) = watch::channel(GateState::default());
        Self {
            tx,
            required: required.into_iter().collect(),
        }
    }

    pub fn context(&self) -> WorkshopSessionContext {
        self.tx.borrow().context.clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn required(&self) -> &BTreeSet<CalcType> {
        &self.required
    }

    pub fn set_context(&self, context: WorkshopSessionContext) {
        tracing::info!(
            mode = ?context.mode,
            patient_id = ?context.patient_id,
            study_id = ?context.study_id,
            "Workshop context set"
        );
        self.tx.send_modify(|state| state.context = context);
    }

    /// Clear identifiers and return to quick mode
    pub fn reset(&self, reason: ResetReason) {
        self.tx.send_modify(|state| {
            state.context = WorkshopSessionContext::quick();
            state.generation += 1;
        });
        tracing::info!(?reason, generation = self.generation(), "Workshop session reset");
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.tx.subscribe()
    }

    /// Patient-study mode with a non-blank study id
    pub fn is_autosave_enabled(&self) -> bool {
        self.tx.borrow().context.autosave_study_id().is_some()
    }

    /// Whether every required calculator has a result
    pub fn is_workshop_complete(&self, present: &BTreeSet<CalcType>) -> bool {
        self.required.is_subset(present)
    }

    /// Required calculators not yet present
    pub fn missing(&self, present: &BTreeSet<CalcType>) -> Vec<CalcType> {
        self.required.difference(present).copied().collect()
    }
}

/// Broadcast channel carrying reset signals to every attached session
#[derive(Clone)]
pub struct ResetBus {
    tx: broadcast::Sender<ResetReason>,
}

impl Default for ResetBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ResetBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Emit a reset; returns how many listeners received it
    pub fn emit(&self, reason: ResetReason) -> usize {
        self.tx.send(reason).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResetReason> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autosave_enabled_requires_study() {
        let gate = SessionGate::new();
        assert!(!gate.is_autosave_enabled());

        gate.set_context(WorkshopSessionContext::patient_study("p1", "s1"));
        assert!(gate.is_autosave_enabled());

        gate.set_context(WorkshopSessionContext::patient_study("p1", "   "));
        assert!(!gate.is_autosave_enabled());

        let mut quick_with_id = WorkshopSessionContext::patient_study("p1", "s1");
        quick_with_id.mode = crate::types::WorkshopMode::Quick;
        gate.set_context(quick_with_id);
        assert!(!gate.is_autosave_enabled());
    }

    #[test]
    fn test_workshop_completion() {
        let gate = SessionGate::new();
        let partial: BTreeSet<_> = [CalcType::Fick, CalcType::Svr].into_iter().collect();
        assert!(!gate.is_workshop_complete(&partial));
        assert_eq!(
            gate.missing(&partial),
            vec![CalcType::Pvr, CalcType::Cpo, CalcType::Papi]
        );

        let full: BTreeSet<_> = [
            CalcType::Fick,
            CalcType::Svr,
            CalcType::Cpo,
            CalcType::Papi,
            CalcType::Pvr,
        ]
        .into_iter()
        .collect();
        assert!(gate.is_workshop_complete(&full));
    }

    #[test]
    fn test_custom_required_set() {
        let gate = SessionGate::with_required([CalcType::Fick]);
        let present: BTreeSet<_> = [CalcType::Fick].into_iter().collect();
        assert!(gate.is_workshop_complete(&present));
    }

    #[test]
    fn test_reset_clears_identifiers_and_bumps_generation() {
        let gate = SessionGate::new();
        gate.set_context(WorkshopSessionContext::patient_study("p1", "s1"));
        let before = gate.generation();

        gate.reset(ResetReason::DiscardStudy);

        assert_eq!(gate.generation(), before + 1);
        assert_eq!(gate.context(), WorkshopSessionContext::quick());
        assert!(!gate.is_autosave_enabled());
    }

    #[test]
    fn test_reset_bus_without_listeners() {
        let bus = ResetBus::new();
        assert_eq!(bus.emit(ResetReason::Explicit), 0);
        let _rx = bus.subscribe();
        assert_eq!(bus.emit(ResetReason::NewStudy), 1);
    }
}
