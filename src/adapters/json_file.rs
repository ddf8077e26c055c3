use crate::domain::model::{PointsLedger, SubjectId};
use crate::domain::ports::{LedgerUpdate, PersistencePort};
use crate::utils::error::{LevelUpError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Keeps every `experiences` row in a single JSON array file.
///
/// Each save rewrites the whole file through a temporary sibling and a rename,
/// so readers never see a half-written file. Calls are serialised by a mutex,
/// and `update_ledger` holds it across the whole read-modify-write. That
/// isolation covers one process only.
#[derive(Debug)]
pub struct JsonFileLedgerStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows; a missing file reads as empty.
    pub fn load_all(&self) -> Result<Vec<PointsLedger>> {
        let _guard = self.guard()?;
        self.read_rows()
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| LevelUpError::LockPoisoned {
            resource: format!("ledger file {}", self.path.display()),
        })
    }

    fn read_rows(&self) -> Result<Vec<PointsLedger>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&self.path)?;
        if data.is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|e| {
            LevelUpError::persistence(format!(
                "failed to parse ledger file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn upsert(&self, rows: &mut Vec<PointsLedger>, ledger: PointsLedger) -> Result<()> {
        match rows.iter_mut().find(|row| row.subject_id == ledger.subject_id) {
            Some(row) => *row = ledger,
            None => rows.push(ledger),
        }

        tracing::debug!(
            "Writing {} experience rows to {}",
            rows.len(),
            self.path.display()
        );
        self.write_rows(rows)
    }

    fn write_rows(&self, rows: &[PointsLedger]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(rows)?;
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl PersistencePort for JsonFileLedgerStore {
    fn load_ledger(&self, subject: &SubjectId) -> Result<Option<PointsLedger>> {
        let _guard = self.guard()?;
        Ok(self
            .read_rows()?
            .into_iter()
            .find(|row| &row.subject_id == subject))
    }

    fn save_ledger(&self, ledger: &PointsLedger) -> Result<()> {
        let _guard = self.guard()?;
        let mut rows = self.read_rows()?;
        self.upsert(&mut rows, ledger.clone())
    }

    fn update_ledger(&self, subject: &SubjectId, apply: &mut LedgerUpdate<'_>) -> Result<()> {
        let _guard = self.guard()?;
        let mut rows = self.read_rows()?;
        let current = rows.iter().find(|row| &row.subject_id == subject).cloned();

        match apply(current)? {
            Some(ledger) => self.upsert(&mut rows, ledger),
            None => Ok(()),
        }
    }
}
