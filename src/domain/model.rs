use crate::utils::error::{LevelUpError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the subject (usually a user) that owns a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for SubjectId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// One row of the `levels` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub level: u32,
    pub next_level_experience: Option<u64>,
}

impl LevelDefinition {
    pub fn new(level: u32, next_level_experience: Option<u64>) -> Self {
        Self {
            level,
            next_level_experience,
        }
    }
}

/// Per-subject experience record, persisted as one `experiences` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsLedger {
    #[serde(rename = "user_id")]
    pub subject_id: SubjectId,
    pub level_id: u32,
    pub experience_points: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PointsLedger {
    pub fn new(subject_id: SubjectId, now: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            level_id: 1,
            experience_points: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn credit(&mut self, delta: u64) -> Result<u64> {
        self.experience_points = self.experience_points.checked_add(delta).ok_or_else(|| {
            LevelUpError::invalid_amount(format!(
                "adding {} to {} overflows the point total",
                delta, self.experience_points
            ))
        })?;
        Ok(self.experience_points)
    }

    /// Removes up to `delta` points, never going below zero.
    /// Returns the number of points actually removed.
    pub fn debit(&mut self, delta: u64) -> u64 {
        let removed = delta.min(self.experience_points);
        self.experience_points -= removed;
        removed
    }

    pub fn set_total(&mut self, value: u64) {
        self.experience_points = value;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Before/after snapshot returned by every mutating engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsTransition {
    pub previous_points: u64,
    pub points: u64,
    pub previous_level: u32,
    pub level: u32,
}

impl PointsTransition {
    pub fn unchanged(points: u64, level: u32) -> Self {
        Self {
            previous_points: points,
            points,
            previous_level: level,
            level,
        }
    }

    pub fn levelled_up(&self) -> bool {
        self.level > self.previous_level
    }

    pub fn levelled_down(&self) -> bool {
        self.level < self.previous_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger() -> PointsLedger {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        PointsLedger::new(SubjectId::from(1u64), now)
    }

    #[test]
    fn test_new_ledger_starts_at_level_one() {
        let ledger = ledger();
        assert_eq!(ledger.experience_points, 0);
        assert_eq!(ledger.level_id, 1);
        assert_eq!(ledger.created_at, ledger.updated_at);
    }

    #[test]
    fn test_debit_clamps_at_zero() {
        let mut ledger = ledger();
        ledger.credit(5).unwrap();
        assert_eq!(ledger.debit(10), 5);
        assert_eq!(ledger.experience_points, 0);
    }

    #[test]
    fn test_credit_overflow_is_invalid_amount() {
        let mut ledger = ledger();
        ledger.set_total(u64::MAX);
        let err = ledger.credit(1).unwrap_err();
        assert!(matches!(err, LevelUpError::InvalidAmount { .. }));
        assert_eq!(ledger.experience_points, u64::MAX);
    }

    #[test]
    fn test_ledger_serializes_with_row_column_names() {
        let json = serde_json::to_value(ledger()).unwrap();
        assert_eq!(json["user_id"], "1");
        assert_eq!(json["level_id"], 1);
        assert_eq!(json["experience_points"], 0);
        assert!(json.get("created_at").is_some());
    }
}
