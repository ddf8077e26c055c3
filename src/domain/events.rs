use crate::domain::model::SubjectId;
use serde::{Deserialize, Serialize};

/// Notifications emitted by the engine after a ledger change has been saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    PointsIncreased {
        subject: SubjectId,
        delta: u64,
        total: u64,
    },
    PointsDecreased {
        subject: SubjectId,
        delta: u64,
        total: u64,
    },
    LevelledUp {
        subject: SubjectId,
        from: u32,
        to: u32,
    },
    LevelledDown {
        subject: SubjectId,
        from: u32,
        to: u32,
    },
}

impl DomainEvent {
    pub fn subject(&self) -> &SubjectId {
        match self {
            DomainEvent::PointsIncreased { subject, .. }
            | DomainEvent::PointsDecreased { subject, .. }
            | DomainEvent::LevelledUp { subject, .. }
            | DomainEvent::LevelledDown { subject, .. } => subject,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::PointsIncreased { .. } => "points_increased",
            DomainEvent::PointsDecreased { .. } => "points_decreased",
            DomainEvent::LevelledUp { .. } => "levelled_up",
            DomainEvent::LevelledDown { .. } => "levelled_down",
        }
    }
}
