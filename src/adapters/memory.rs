//! In-memory ledger store for tests and embedded use.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::model::{PointsLedger, SubjectId};
use crate::domain::ports::{LedgerUpdate, PersistencePort};
use crate::utils::error::{LevelUpError, Result};

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: RwLock<HashMap<SubjectId, PointsLedger>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ledgers.read().map(|ledgers| ledgers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> LevelUpError {
        LevelUpError::LockPoisoned {
            resource: "in-memory ledger store".to_string(),
        }
    }
}

impl PersistencePort for InMemoryLedgerStore {
    fn load_ledger(&self, subject: &SubjectId) -> Result<Option<PointsLedger>> {
        let ledgers = self.ledgers.read().map_err(|_| Self::poisoned())?;
        Ok(ledgers.get(subject).cloned())
    }

    fn save_ledger(&self, ledger: &PointsLedger) -> Result<()> {
        let mut ledgers = self.ledgers.write().map_err(|_| Self::poisoned())?;
        ledgers.insert(ledger.subject_id.clone(), ledger.clone());
        Ok(())
    }

    fn update_ledger(&self, subject: &SubjectId, apply: &mut LedgerUpdate<'_>) -> Result<()> {
        // write lock held for the whole read-modify-write
        let mut ledgers = self.ledgers.write().map_err(|_| Self::poisoned())?;
        if let Some(ledger) = apply(ledgers.get(subject).cloned())? {
            ledgers.insert(ledger.subject_id.clone(), ledger);
        }
        Ok(())
    }
}
