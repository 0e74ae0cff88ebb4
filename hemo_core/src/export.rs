//! CSV export of a patient's study history.

use crate::keys::{CanonicalKey, KeyKind};
use crate::{ConsolidatedSnapshotRow, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::Path;

/// Columns ahead of the per-key values
const LEADING: [&str; 5] = ["study_id", "patient_id", "started_at", "created_at", "updated_at"];

/// Columns after the per-key values
const TRAILING: [&str; 4] = ["calc_types", "workshop_complete", "vocabulary_version", "id"];

fn rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

fn header() -> Vec<&'static str> {
    LEADING
        .into_iter()
        .chain(CanonicalKey::ALL.iter().map(|key| key.as_str()))
        .chain(TRAILING)
        .collect()
}

/// One CSV record; every canonical key gets a column, blank when unset
fn record(row: &ConsolidatedSnapshotRow) -> Vec<String> {
    let mut fields = vec![
        row.study_id.clone(),
        row.patient_id.clone().unwrap_or_default(),
        rfc3339(row.started_at_millis),
        rfc3339(row.created_at_millis),
        rfc3339(row.updated_at_millis),
    ];

    for &key in CanonicalKey::ALL.iter() {
        let value = match key.kind() {
            KeyKind::Numeric => row.numeric(key).map(|v| v.to_string()),
            KeyKind::Token => row.token(key).map(str::to_string),
        };
        fields.push(value.unwrap_or_default());
    }

    fields.push(
        row.calc_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(";"),
    );
    fields.push(row.workshop_complete.to_string());
    fields.push(row.vocabulary_version.to_string());
    fields.push(row.id.to_string());
    fields
}

/// Write `rows` to `path`, replacing any existing file
///
/// Returns the number of rows written.
pub fn export_history_csv(rows: &[ConsolidatedSnapshotRow], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(header())?;
    for row in rows {
        writer.write_record(record(row))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} studies to {:?}", rows.len(), path);
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CalcType;

    fn create_test_row(study: &str, started: i64) -> ConsolidatedSnapshotRow {
        let mut row = ConsolidatedSnapshotRow::new(study, started);
        row.patient_id = Some("p1".into());
        row.co_lmin = Some(5.2);
        row.calc_types = vec![CalcType::Fick, CalcType::Svr];
        row
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out").join("p1.csv");

        let count =
            export_history_csv(&[create_test_row("s1", 0), create_test_row("s2", 1000)], &path)
                .unwrap();
        assert_eq!(count, 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "study_id");
        let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "s1");
        assert!(records[0][2].starts_with("1970-01-01T00:00:00"));
        let calc_types = headers.iter().position(|h| h == "calc_types").unwrap();
        assert_eq!(&records[1][calc_types], "fick;svr");
    }

    #[test]
    fn test_export_includes_every_row_field() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("p1.csv");

        let mut row = create_test_row("s1", 0);
        row.cvp_mmhg = Some(9.0);
        row.svr_units = Some("WOOD".into());
        export_history_csv(&[row], &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        for column in [
            "created_at",
            "height_cm",
            "weight_kg",
            "hr_bpm",
            "hgb_g_dl",
            "sao2_pct",
            "svo2_pct",
            "vo2_ml_min",
            "cvp_mmhg",
            "pasp_mmhg",
            "padp_mmhg",
            "svr_units",
            "pvr_units",
            "vocabulary_version",
        ] {
            assert!(headers.iter().any(|h| h == column), "missing column {}", column);
        }
        assert_eq!(headers.len(), LEADING.len() + CanonicalKey::ALL.len() + TRAILING.len());

        let record = reader.records().next().unwrap().unwrap();
        let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&record[column("cvp_mmhg")], "9");
        assert_eq!(&record[column("svr_units")], "WOOD");
        assert_eq!(&record[column("pasp_mmhg")], "");
    }

    #[test]
    fn test_export_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("p1.csv");

        export_history_csv(&[create_test_row("s1", 0), create_test_row("s2", 1)], &path).unwrap();
        export_history_csv(&[create_test_row("s3", 2)], &path).unwrap();

        let reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.into_records().count(), 1);
    }

    #[test]
    fn test_export_empty_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.csv");
        assert_eq!(export_history_csv(&[], &path).unwrap(), 0);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(&reader.headers().unwrap()[0], "study_id");
        assert_eq!(reader.records().count(), 0);
    }
}
