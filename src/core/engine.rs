use crate::config::toml_config::{LevelCapConfig, LevelUpConfig, MissingRecordPolicy};
use crate::core::level_table::LevelTable;
use crate::core::multiplier::{apply_multiplier, MultiplierRegistry, MultiplierResolver};
use crate::domain::events::DomainEvent;
use crate::domain::model::{PointsLedger, PointsTransition, SubjectId};
use crate::domain::ports::{ClockSource, EventSink, MultiplierContext, PersistencePort};
use crate::utils::error::{LevelUpError, Result};
use crate::utils::validation::Validate;
use chrono::{DateTime, Utc};

/// Turns point deltas into level transitions.
///
/// Every mutation runs as one `update_ledger` call on the store (load,
/// mutate, recompute level, save) and then publishes. Events go out only
/// after the save succeeded, and a failing sink never undoes or fails the
/// mutation.
pub struct LevelingEngine<P: PersistencePort, E: EventSink, C: ClockSource> {
    store: P,
    sink: E,
    clock: C,
    levels: LevelTable,
    multipliers: MultiplierResolver,
    level_cap: Option<LevelCapConfig>,
    missing_record: MissingRecordPolicy,
}

// What a mutation does when the subject has no record yet.
#[derive(Debug, Clone, Copy)]
enum OnMissing {
    Create,
    Skip,
    Fail,
}

impl<P: PersistencePort, E: EventSink, C: ClockSource> LevelingEngine<P, E, C> {
    pub fn new(store: P, sink: E, clock: C) -> Self {
        Self {
            store,
            sink,
            clock,
            levels: LevelTable::default(),
            multipliers: MultiplierResolver::disabled(),
            level_cap: None,
            missing_record: MissingRecordPolicy::default(),
        }
    }

    /// Builds an engine from configuration. `registry` supplies programmatic
    /// policies; same-named policies from the config replace them.
    pub fn from_config(
        config: &LevelUpConfig,
        registry: &MultiplierRegistry,
        store: P,
        sink: E,
        clock: C,
    ) -> Result<Self> {
        config.validate()?;

        let mut registry = registry.clone();
        for (name, kind) in &config.multiplier.policies {
            registry.register_arc(kind.build(name));
        }

        let engine = Self::new(store, sink, clock)
            .with_levels(config.level_table()?)
            .with_multipliers(MultiplierResolver::from_config(&config.multiplier, &registry)?)
            .with_level_cap(config.active_level_cap())
            .with_missing_record_policy(config.deduction.missing_record);

        tracing::info!(
            "✅ Leveling engine ready (max level {}, multiplier {})",
            engine.levels.max_level(),
            if engine.multipliers.is_enabled() { "on" } else { "off" }
        );
        Ok(engine)
    }

    pub fn with_levels(mut self, levels: LevelTable) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_multipliers(mut self, multipliers: MultiplierResolver) -> Self {
        self.multipliers = multipliers;
        self
    }

    pub fn with_level_cap(mut self, level_cap: Option<LevelCapConfig>) -> Self {
        self.level_cap = level_cap.filter(|cap| cap.enabled);
        self
    }

    pub fn with_missing_record_policy(mut self, policy: MissingRecordPolicy) -> Self {
        self.missing_record = policy;
        self
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    /// Grants points, creating the experience record on first use.
    ///
    /// An explicit `multiplier` wins over the configured policy.
    pub fn add_points(
        &self,
        subject: &SubjectId,
        amount: u64,
        multiplier: Option<f64>,
    ) -> Result<PointsTransition> {
        let now = self.clock.now();
        let factor = match multiplier {
            Some(explicit) => explicit,
            None => self.multipliers.resolve(&MultiplierContext {
                subject,
                base_amount: amount,
                now,
            }),
        };
        let effective = apply_multiplier(amount, factor)?;
        let level_cap = self.level_cap;

        self.mutate(subject, OnMissing::Create, now, |ledger| {
            if let Some(cap) = level_cap {
                if !cap.points_continue && ledger.level_id >= cap.level {
                    tracing::debug!(
                        "{} is at level cap {}, ignoring {} points",
                        subject,
                        cap.level,
                        effective
                    );
                    return Ok(false);
                }
            }

            ledger.credit(effective)?;
            tracing::debug!(
                "Adding {} points (base {}, x{}) to {}",
                effective,
                amount,
                factor,
                subject
            );
            Ok(true)
        })
    }

    /// Removes points, never below zero. A subject without a record is
    /// handled according to the configured `MissingRecordPolicy`.
    pub fn deduct_points(&self, subject: &SubjectId, amount: u64) -> Result<PointsTransition> {
        let on_missing = match self.missing_record {
            MissingRecordPolicy::Ignore => OnMissing::Skip,
            MissingRecordPolicy::Error => OnMissing::Fail,
        };

        self.mutate(subject, on_missing, self.clock.now(), |ledger| {
            let removed = ledger.debit(amount);
            if removed < amount {
                tracing::debug!(
                    "Deduction of {} from {} clamped to {}",
                    amount,
                    subject,
                    removed
                );
            }
            Ok(true)
        })
    }

    /// Overwrites the point total. Requires an existing record.
    pub fn set_points(&self, subject: &SubjectId, amount: u64) -> Result<PointsTransition> {
        self.mutate(subject, OnMissing::Fail, self.clock.now(), |ledger| {
            ledger.set_total(amount);
            Ok(true)
        })
    }

    pub fn ledger(&self, subject: &SubjectId) -> Result<Option<PointsLedger>> {
        self.store.load_ledger(subject)
    }

    pub fn get_points(&self, subject: &SubjectId) -> Result<u64> {
        Ok(self.position(subject)?.1)
    }

    pub fn get_level(&self, subject: &SubjectId) -> Result<u32> {
        Ok(self.position(subject)?.0)
    }

    /// Points still needed for the next level; 0 at the highest reachable level.
    pub fn next_level_at(&self, subject: &SubjectId) -> Result<u64> {
        let (level, points) = self.position(subject)?;
        if self.at_cap(level) {
            return Ok(0);
        }
        Ok(self.levels.next_level_gap(level, points).unwrap_or(0))
    }

    /// Point total at which the next level is reached (current total at max level).
    pub fn next_level_threshold(&self, subject: &SubjectId) -> Result<u64> {
        let points = self.get_points(subject)?;
        Ok(points.saturating_add(self.next_level_at(subject)?))
    }

    /// Percentage of progress through the current level.
    pub fn level_progress(&self, subject: &SubjectId) -> Result<f64> {
        let (level, points) = self.position(subject)?;
        if self.at_cap(level) {
            return Ok(100.0);
        }
        Ok(self.levels.progress_percent(level, points))
    }

    fn position(&self, subject: &SubjectId) -> Result<(u32, u64)> {
        Ok(self
            .store
            .load_ledger(subject)?
            .map(|ledger| (ledger.level_id, ledger.experience_points))
            .unwrap_or((1, 0)))
    }

    fn at_cap(&self, level: u32) -> bool {
        self.level_cap.is_some_and(|cap| level >= cap.level)
    }

    /// Runs `change` against the subject's record inside the store's
    /// `update_ledger`, so concurrent mutations of one subject never
    /// interleave. `change` returns `false` to leave the record untouched.
    /// Events are published only once the store has accepted the new row.
    fn mutate<F>(
        &self,
        subject: &SubjectId,
        on_missing: OnMissing,
        now: DateTime<Utc>,
        mut change: F,
    ) -> Result<PointsTransition>
    where
        F: FnMut(&mut PointsLedger) -> Result<bool>,
    {
        let cap_level = self.level_cap.map(|cap| cap.level);
        let mut outcome: Option<PointsTransition> = None;

        self.store.update_ledger(subject, &mut |current| {
            let mut ledger = match (current, on_missing) {
                (Some(ledger), _) => ledger,
                (None, OnMissing::Create) => {
                    tracing::debug!("Creating experience record for {}", subject);
                    PointsLedger::new(subject.clone(), now)
                }
                (None, OnMissing::Skip) => {
                    tracing::debug!("No experience record for {}, nothing to deduct", subject);
                    outcome = Some(PointsTransition::unchanged(0, 1));
                    return Ok(None);
                }
                (None, OnMissing::Fail) => return Err(LevelUpError::no_record(subject)),
            };

            let (previous_points, previous_level) = (ledger.experience_points, ledger.level_id);
            if !change(&mut ledger)? {
                outcome = Some(PointsTransition::unchanged(previous_points, previous_level));
                return Ok(None);
            }

            ledger.level_id = self
                .levels
                .level_for_points_capped(ledger.experience_points, cap_level);
            ledger.touch(now);

            outcome = Some(PointsTransition {
                previous_points,
                points: ledger.experience_points,
                previous_level,
                level: ledger.level_id,
            });
            Ok(Some(ledger))
        })?;

        let transition = outcome
            .ok_or_else(|| LevelUpError::persistence("store did not apply the ledger update"))?;

        if transition.level != transition.previous_level {
            tracing::info!(
                "{} moved from level {} to level {} ({} points)",
                subject,
                transition.previous_level,
                transition.level,
                transition.points
            );
        }

        for event in self.events_for(subject, &transition) {
            if let Err(e) = self.sink.publish(&event) {
                tracing::warn!("Failed to publish {} for {}: {}", event.name(), subject, e);
            }
        }

        Ok(transition)
    }

    fn events_for(&self, subject: &SubjectId, transition: &PointsTransition) -> Vec<DomainEvent> {
        let mut events = Vec::new();

        if transition.points > transition.previous_points {
            events.push(DomainEvent::PointsIncreased {
                subject: subject.clone(),
                delta: transition.points - transition.previous_points,
                total: transition.points,
            });
        } else if transition.points < transition.previous_points {
            events.push(DomainEvent::PointsDecreased {
                subject: subject.clone(),
                delta: transition.previous_points - transition.points,
                total: transition.points,
            });
        }

        let mut from = transition.previous_level;
        for to in self
            .levels
            .crossed_levels(transition.previous_level, transition.level)
        {
            let event = if to > from {
                DomainEvent::LevelledUp {
                    subject: subject.clone(),
                    from,
                    to,
                }
            } else {
                DomainEvent::LevelledDown {
                    subject: subject.clone(),
                    from,
                    to,
                }
            };
            events.push(event);
            from = to;
        }

        events
    }
}
