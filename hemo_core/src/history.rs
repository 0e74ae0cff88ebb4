//! Patient study history.
//!
//! Loads every consolidated row stored for a patient, oldest study first, as
//! input for the trend view and CSV export.

use crate::store::StudyStore;
use crate::{ConsolidatedSnapshotRow, Result};

/// Load a patient's studies ordered by `started_at_millis` ascending
///
/// Ties keep creation order so repeated loads are stable.
pub fn load_patient_history(
    store: &dyn StudyStore,
    patient_id: &str,
) -> Result<Vec<ConsolidatedSnapshotRow>> {
    let mut rows = store.list_by_patient(patient_id)?;
    rows.sort_by(|a, b| {
        a.started_at_millis
            .cmp(&b.started_at_millis)
            .then(a.created_at_millis.cmp(&b.created_at_millis))
            .then_with(|| a.study_id.cmp(&b.study_id))
    });

    tracing::info!("Loaded {} studies for patient {}", rows.len(), patient_id);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonStudyStore, MemoryStudyStore};

    fn create_test_row(study: &str, patient: &str, started: i64) -> ConsolidatedSnapshotRow {
        let mut row = ConsolidatedSnapshotRow::new(study, started);
        row.patient_id = Some(patient.into());
        row
    }

    #[test]
    fn test_history_sorted_oldest_first() {
        let store = MemoryStudyStore::new();
        store.upsert_by_study_id(&create_test_row("late", "p1", 3000)).unwrap();
        store.upsert_by_study_id(&create_test_row("early", "p1", 1000)).unwrap();
        store.upsert_by_study_id(&create_test_row("middle", "p1", 2000)).unwrap();
        store.upsert_by_study_id(&create_test_row("other", "p2", 500)).unwrap();

        let rows = load_patient_history(&store, "p1").unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.study_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_history_from_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonStudyStore::new(temp_dir.path());
        store.upsert_by_study_id(&create_test_row("s2", "p1", 2000)).unwrap();
        store.upsert_by_study_id(&create_test_row("s1", "p1", 1000)).unwrap();

        let rows = load_patient_history(&store, "p1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].study_id, "s1");
    }

    #[test]
    fn test_unknown_patient_is_empty() {
        let store = MemoryStudyStore::new();
        assert!(load_patient_history(&store, "nobody").unwrap().is_empty());
    }
}
