//! Consolidation of the ledger into one snapshot row per study.
//!
//! Every save writes a complete row built from the current ledger; only the
//! row identity and its creation/start timestamps carry over from the
//! previously stored row.

use crate::keys::{CanonicalKey, KeyKind};
use crate::ledger::LedgerSnapshot;
use crate::types::{CalcType, ConsolidatedSnapshotRow, WorkshopSessionContext};
use crate::units::{normalize_method_token, normalize_resistance_token, DYN_PER_WOOD};
use std::collections::BTreeSet;

/// Build the row to persist for `study_id`
///
/// `existing` is the stored row for the same study, if any; its `id`,
/// `created_at_millis` and `started_at_millis` are preserved. The returned
/// row's `updated_at_millis` is strictly greater than the existing one.
pub fn consolidate(
    snapshot: &LedgerSnapshot,
    context: &WorkshopSessionContext,
    study_id: &str,
    required: &BTreeSet<CalcType>,
    existing: Option<&ConsolidatedSnapshotRow>,
    now_millis: i64,
) -> ConsolidatedSnapshotRow {
    let mut row = ConsolidatedSnapshotRow::new(study_id, now_millis);

    match existing {
        Some(prev) => {
            row.id = prev.id;
            row.created_at_millis = prev.created_at_millis;
            row.started_at_millis = prev.started_at_millis;
            row.updated_at_millis = now_millis.max(prev.updated_at_millis + 1);
            row.patient_id = context.patient_id.clone().or_else(|| prev.patient_id.clone());
        }
        None => {
            row.started_at_millis = context.started_at_millis.unwrap_or(now_millis);
            row.patient_id = context.patient_id.clone();
        }
    }

    for key in CanonicalKey::ALL {
        if key.kind() == KeyKind::Numeric {
            row.set_numeric(key, snapshot.latest_f64(key));
        }
    }

    apply_derivations(&mut row);

    row.svr_units = resistance_token(snapshot, CanonicalKey::SvrUnits);
    row.pvr_units = resistance_token(snapshot, CanonicalKey::PvrUnits);
    row.co_method = snapshot
        .latest_string(CanonicalKey::CoMethod)
        .and_then(|m| normalize_method_token(&m));

    let present = snapshot.present_types();
    row.workshop_complete = required.is_subset(&present);
    row.calc_types = present.into_iter().collect();

    row
}

/// Fill derived fields whose operands are present and which were not
/// published directly
fn apply_derivations(row: &mut ConsolidatedSnapshotRow) {
    let bsa = row.bsa_m2.filter(|b| *b > 0.0);

    if row.ci_lmin_m2.is_none() {
        row.ci_lmin_m2 = row.co_lmin.zip(bsa).map(|(co, bsa)| co / bsa);
    }
    if row.cpi_w_m2.is_none() {
        row.cpi_w_m2 = row.cpo_w.zip(bsa).map(|(cpo, bsa)| cpo / bsa);
    }

    mirror_resistance(&mut row.svr_wood, &mut row.svr_dyn);
    mirror_resistance(&mut row.pvr_wood, &mut row.pvr_dyn);
}

fn mirror_resistance(wood: &mut Option<f64>, dyn_value: &mut Option<f64>) {
    match (*wood, *dyn_value) {
        (Some(w), None) => *dyn_value = Some(w * DYN_PER_WOOD),
        (None, Some(d)) => *wood = Some(d / DYN_PER_WOOD),
        _ => {}
    }
}

fn resistance_token(snapshot: &LedgerSnapshot, key: CanonicalKey) -> Option<String> {
    let raw = snapshot.latest_string(key)?;
    match normalize_resistance_token(&raw) {
        Some(token) => Some(token.to_string()),
        None => {
            tracing::warn!(key = %key, token = %raw, "Dropping unrecognized unit token");
            None
        }
    }
}
