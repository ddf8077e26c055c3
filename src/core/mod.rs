pub mod engine;
pub mod level_table;
pub mod multiplier;

pub use crate::domain::events::DomainEvent;
pub use crate::domain::model::{LevelDefinition, PointsLedger, PointsTransition, SubjectId};
pub use crate::domain::ports::{
    ClockSource, EventSink, LedgerUpdate, MultiplierContext, MultiplierPolicy, PersistencePort,
};
pub use crate::utils::error::Result;
