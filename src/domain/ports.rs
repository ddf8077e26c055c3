use crate::domain::events::DomainEvent;
use crate::domain::model::{PointsLedger, SubjectId};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Closure run inside `update_ledger`: receives the current row (if any) and
/// returns the row to save, or `None` to leave the store untouched.
pub type LedgerUpdate<'a> = dyn FnMut(Option<PointsLedger>) -> Result<Option<PointsLedger>> + 'a;

/// Storage for `experiences` rows.
///
/// The engine routes every mutation through `update_ledger`. Stores that can
/// hold a per-subject lock or transaction across the closure must override it;
/// the default is a plain load then save with no isolation between callers.
pub trait PersistencePort: Send + Sync {
    fn load_ledger(&self, subject: &SubjectId) -> Result<Option<PointsLedger>>;

    fn save_ledger(&self, ledger: &PointsLedger) -> Result<()>;

    fn update_ledger(&self, subject: &SubjectId, apply: &mut LedgerUpdate<'_>) -> Result<()> {
        if let Some(ledger) = apply(self.load_ledger(subject)?)? {
            self.save_ledger(&ledger)?;
        }
        Ok(())
    }
}

/// Receiver of domain events. Errors are logged by the engine and otherwise ignored.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DomainEvent) -> Result<()>;
}

pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Input handed to a multiplier policy when points are granted.
#[derive(Debug, Clone, Copy)]
pub struct MultiplierContext<'a> {
    pub subject: &'a SubjectId,
    pub base_amount: u64,
    pub now: DateTime<Utc>,
}

pub trait MultiplierPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn qualifies(&self, context: &MultiplierContext<'_>) -> bool;

    fn multiplier(&self, context: &MultiplierContext<'_>) -> f64;
}

impl<T: PersistencePort + ?Sized> PersistencePort for Arc<T> {
    fn load_ledger(&self, subject: &SubjectId) -> Result<Option<PointsLedger>> {
        (**self).load_ledger(subject)
    }

    fn save_ledger(&self, ledger: &PointsLedger) -> Result<()> {
        (**self).save_ledger(ledger)
    }

    fn update_ledger(&self, subject: &SubjectId, apply: &mut LedgerUpdate<'_>) -> Result<()> {
        (**self).update_ledger(subject, apply)
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, event: &DomainEvent) -> Result<()> {
        (**self).publish(event)
    }
}

impl<T: ClockSource + ?Sized> ClockSource for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
