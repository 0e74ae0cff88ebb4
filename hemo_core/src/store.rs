//! Durable per-study snapshot storage.
//!
//! The autosave pipeline only needs `get_by_study_id` and
//! `upsert_by_study_id`; history views additionally list a patient's rows.

use crate::{ConsolidatedSnapshotRow, Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Storage collaborator for consolidated rows, keyed by study id
pub trait StudyStore: Send + Sync {
    fn get_by_study_id(&self, study_id: &str) -> Result<Option<ConsolidatedSnapshotRow>>;

    /// Insert or replace the row for `row.study_id`
    fn upsert_by_study_id(&self, row: &ConsolidatedSnapshotRow) -> Result<()>;

    /// All rows belonging to a patient, in no particular order
    fn list_by_patient(&self, patient_id: &str) -> Result<Vec<ConsolidatedSnapshotRow>>;
}

/// One JSON file per study under a directory
pub struct JsonStudyStore {
    dir: PathBuf,
}

impl JsonStudyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, study_id: &str) -> Result<PathBuf> {
        let id = study_id.trim();
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(|c| c == '/' || c == '\\')
            && !id.starts_with('.');
        if !valid {
            return Err(Error::Storage(format!("invalid study id: {:?}", study_id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    /// Read a row file under a shared lock
    fn read_row(path: &Path) -> Result<ConsolidatedSnapshotRow> {
        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        Ok(serde_json::from_str(&contents)?)
    }
}

impl StudyStore for JsonStudyStore {
    fn get_by_study_id(&self, study_id: &str) -> Result<Option<ConsolidatedSnapshotRow>> {
        let path = self.path_for(study_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let row = Self::read_row(&path)?;
        tracing::debug!("Loaded study {} from {:?}", study_id, path);
        Ok(Some(row))
    }

    /// Atomically writes the row by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    fn upsert_by_study_id(&self, row: &ConsolidatedSnapshotRow) -> Result<()> {
        let path = self.path_for(&row.study_id)?;
        std::fs::create_dir_all(&self.dir)?;

        let temp = NamedTempFile::new_in(&self.dir)?;

        // Exclusive lock on the temp file serializes concurrent writers
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, row)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved study {} to {:?}", row.study_id, path);
        Ok(())
    }

    fn list_by_patient(&self, patient_id: &str) -> Result<Vec<ConsolidatedSnapshotRow>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_row(&path) {
                Ok(row) if row.patient_id.as_deref() == Some(patient_id) => rows.push(row),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Skipping unreadable study file {:?}: {}", path, e);
                    // Continue reading, don't fail completely
                }
            }
        }

        tracing::debug!("Found {} studies for patient {}", rows.len(), patient_id);
        Ok(rows)
    }
}

/// Process-local store, used for tests and quick sessions
#[derive(Default)]
pub struct MemoryStudyStore {
    rows: Mutex<HashMap<String, ConsolidatedSnapshotRow>>,
}

impl MemoryStudyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<String, ConsolidatedSnapshotRow>>> {
        self.rows
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.rows().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StudyStore for MemoryStudyStore {
    fn get_by_study_id(&self, study_id: &str) -> Result<Option<ConsolidatedSnapshotRow>> {
        Ok(self.rows()?.get(study_id).cloned())
    }

    fn upsert_by_study_id(&self, row: &ConsolidatedSnapshotRow) -> Result<()> {
        self.rows()?.insert(row.study_id.clone(), row.clone());
        Ok(())
    }

    fn list_by_patient(&self, patient_id: &str) -> Result<Vec<ConsolidatedSnapshotRow>> {
        Ok(self
            .rows()?
            .values()
            .filter(|row| row.patient_id.as_deref() == Some(patient_id))
            .cloned()
            .collect())
    }
}
