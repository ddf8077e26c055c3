pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{
    EventDispatcher, FixedClock, InMemoryLedgerStore, JsonFileLedgerStore, NullSink,
    RecordingSink, SystemClock, TracingSink,
};
pub use crate::config::{LevelUpConfig, MissingRecordPolicy};
pub use crate::core::{
    engine::LevelingEngine,
    level_table::{LevelTable, ThresholdMode},
    multiplier::{MultiplierRegistry, MultiplierResolver, PolicyKind},
    ClockSource, DomainEvent, EventSink, LevelDefinition, MultiplierContext, MultiplierPolicy,
    PersistencePort, PointsLedger, PointsTransition, SubjectId,
};
pub use crate::utils::error::{LevelUpError, Result};
