use anyhow::Result;
use chrono::{TimeZone, Utc};
use level_up::{
    DomainEvent, FixedClock, InMemoryLedgerStore, LevelDefinition, LevelTable, LevelUpError,
    LevelingEngine, MissingRecordPolicy, MultiplierResolver, RecordingSink, SubjectId,
    ThresholdMode,
};
use level_up::config::LevelCapConfig;
use level_up::core::multiplier::MonthMultiplier;
use std::sync::Arc;

type TestEngine = LevelingEngine<Arc<InMemoryLedgerStore>, Arc<RecordingSink>, Arc<FixedClock>>;

struct Harness {
    engine: TestEngine,
    store: Arc<InMemoryLedgerStore>,
    sink: Arc<RecordingSink>,
    clock: Arc<FixedClock>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryLedgerStore::new());
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap(),
    ));
    let engine = LevelingEngine::new(Arc::clone(&store), Arc::clone(&sink), Arc::clone(&clock));
    Harness {
        engine,
        store,
        sink,
        clock,
    }
}

fn table(rows: &[(u32, Option<u64>)]) -> LevelTable {
    LevelTable::with_definitions(
        ThresholdMode::Absolute,
        rows.iter()
            .map(|&(level, next)| LevelDefinition::new(level, next)),
    )
    .unwrap()
}

fn user() -> SubjectId {
    SubjectId::from(1u64)
}

#[test]
fn test_adding_points_without_record_creates_one() -> Result<()> {
    let h = harness();
    assert!(h.store.is_empty());

    h.engine.add_points(&user(), 10, None)?;

    let ledger = h.engine.ledger(&user())?.expect("ledger created");
    assert_eq!(ledger.experience_points, 10);
    assert_eq!(ledger.level_id, 1);
    assert_eq!(h.store.len(), 1);
    Ok(())
}

#[test]
fn test_adding_points_twice_updates_the_record() -> Result<()> {
    let h = harness();
    h.engine.add_points(&user(), 10, None)?;
    h.engine.add_points(&user(), 10, None)?;

    assert_eq!(h.engine.get_points(&user())?, 20);
    assert!(h
        .sink
        .events()
        .iter()
        .all(|e| matches!(e, DomainEvent::PointsIncreased { .. })));
    assert_eq!(
        h.sink.events().last(),
        Some(&DomainEvent::PointsIncreased {
            subject: user(),
            delta: 10,
            total: 20
        })
    );
    Ok(())
}

#[test]
fn test_sequential_adds_match_single_add() -> Result<()> {
    let split = harness();
    split.engine.add_points(&user(), 7, None)?;
    split.engine.add_points(&user(), 35, None)?;

    let single = harness();
    single.engine.add_points(&user(), 42, None)?;

    assert_eq!(
        split.engine.get_points(&user())?,
        single.engine.get_points(&user())?
    );
    Ok(())
}

#[test]
fn test_deduct_points() -> Result<()> {
    let h = harness();
    h.engine.add_points(&user(), 10, None)?;
    h.sink.take();

    h.engine.deduct_points(&user(), 5)?;

    assert_eq!(h.engine.get_points(&user())?, 5);
    assert_eq!(
        h.sink.events(),
        vec![DomainEvent::PointsDecreased {
            subject: user(),
            delta: 5,
            total: 5
        }]
    );
    Ok(())
}

#[test]
fn test_deduction_never_goes_below_zero() -> Result<()> {
    let h = harness();
    h.engine.add_points(&user(), 5, None)?;
    let transition = h.engine.deduct_points(&user(), 10)?;

    assert_eq!(transition.points, 0);
    assert_eq!(h.engine.get_points(&user())?, 0);
    Ok(())
}

#[test]
fn test_deduct_without_record_follows_policy() -> Result<()> {
    let h = harness();
    let transition = h.engine.deduct_points(&user(), 5)?;
    assert_eq!(transition.points, 0);
    assert!(h.store.is_empty());
    assert!(h.sink.events().is_empty());

    let strict = harness();
    let engine = strict
        .engine
        .with_missing_record_policy(MissingRecordPolicy::Error);
    assert!(matches!(
        engine.deduct_points(&user(), 5),
        Err(LevelUpError::NoExperienceRecord { .. })
    ));
    Ok(())
}

#[test]
fn test_set_points() -> Result<()> {
    let h = harness();
    h.engine.add_points(&user(), 10, None)?;
    h.engine.set_points(&user(), 5)?;

    assert_eq!(h.engine.get_points(&user())?, 5);
    assert_eq!(h.engine.get_level(&user())?, 1);
    Ok(())
}

#[test]
fn test_set_points_without_record_fails() {
    let h = harness();
    let err = h.engine.set_points(&user(), 5).unwrap_err();
    assert!(matches!(err, LevelUpError::NoExperienceRecord { .. }));
    assert_eq!(err.to_string(), "Subject 1 has no experience record");
    assert!(h.store.is_empty());
}

#[test]
fn test_queries_without_record_use_defaults() -> Result<()> {
    let h = harness();
    assert_eq!(h.engine.get_points(&user())?, 0);
    assert_eq!(h.engine.get_level(&user())?, 1);
    assert!(h.store.is_empty());
    Ok(())
}

#[test]
fn test_explicit_multiplier_scales_points() -> Result<()> {
    let h = harness();
    h.engine.add_points(&user(), 10, Some(2.0))?;

    assert_eq!(h.engine.get_points(&user())?, 20);
    Ok(())
}

#[test]
fn test_large_totals_are_stored_exactly() -> Result<()> {
    let h = harness();
    let beyond_f64 = (1u64 << 53) + 1;

    h.engine.add_points(&user(), beyond_f64, None)?;
    assert_eq!(h.engine.get_points(&user())?, beyond_f64);

    let other = SubjectId::from(2u64);
    h.engine.add_points(&other, u64::MAX - 1000, None)?;
    assert_eq!(h.engine.get_points(&other)?, u64::MAX - 1000);

    let err = h.engine.add_points(&other, 2000, None).unwrap_err();
    assert!(matches!(err, LevelUpError::InvalidAmount { .. }));
    assert_eq!(h.engine.get_points(&other)?, u64::MAX - 1000);
    Ok(())
}

#[test]
fn test_invalid_multiplier_is_rejected_before_any_change() {
    let h = harness();
    let err = h.engine.add_points(&user(), 10, Some(-2.0)).unwrap_err();
    assert!(matches!(err, LevelUpError::InvalidAmount { .. }));
    assert!(h.store.is_empty());
    assert!(h.sink.events().is_empty());
}

#[test]
fn test_configured_multiplier_uses_injected_clock() -> Result<()> {
    let h = harness();
    let engine = h.engine.with_multipliers(MultiplierResolver::with_policy(Arc::new(
        MonthMultiplier::new("april", 4, 5.0),
    )));

    // January: policy does not qualify
    engine.add_points(&user(), 10, None)?;
    assert_eq!(engine.get_points(&user())?, 10);

    h.clock.set(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    engine.add_points(&user(), 10, None)?;
    assert_eq!(engine.get_points(&user())?, 60);

    // explicit multiplier wins over the policy
    engine.add_points(&user(), 10, Some(1.0))?;
    assert_eq!(engine.get_points(&user())?, 70);
    Ok(())
}

#[test]
fn test_level_increases_when_threshold_is_hit() -> Result<()> {
    let h = harness();
    let engine = h
        .engine
        .with_levels(table(&[(1, None), (2, Some(100)), (3, Some(250))]));

    engine.add_points(&user(), 1, None)?;
    let transition = engine.add_points(&user(), 149, None)?;

    assert_eq!(engine.get_points(&user())?, 150);
    assert_eq!(engine.get_level(&user())?, 2);
    assert!(transition.levelled_up());
    assert!(h.sink.events().contains(&DomainEvent::LevelledUp {
        subject: user(),
        from: 1,
        to: 2
    }));
    Ok(())
}

#[test]
fn test_next_level_at_reports_remaining_points() -> Result<()> {
    let h = harness();
    let engine = h.engine.with_levels(table(&[(1, Some(20)), (2, Some(40))]));

    engine.add_points(&user(), 10, None)?;

    assert_eq!(engine.next_level_at(&user())?, 30);
    assert_eq!(engine.next_level_threshold(&user())?, 40);
    assert_eq!(engine.level_progress(&user())?, 25.0);
    Ok(())
}

#[test]
fn test_next_level_at_is_zero_at_max_level() -> Result<()> {
    let h = harness();
    let engine = h.engine.with_levels(table(&[(2, Some(40))]));

    engine.add_points(&user(), 100, None)?;

    assert_eq!(engine.get_level(&user())?, 2);
    assert_eq!(engine.next_level_at(&user())?, 0);
    assert_eq!(engine.next_level_threshold(&user())?, 100);
    assert_eq!(engine.level_progress(&user())?, 100.0);
    Ok(())
}

#[test]
fn test_get_level_is_stable() -> Result<()> {
    let h = harness();
    let engine = h.engine.with_levels(table(&[(2, Some(10))]));
    engine.add_points(&user(), 15, None)?;

    let first = engine.get_level(&user())?;
    for _ in 0..5 {
        assert_eq!(engine.get_level(&user())?, first);
    }
    Ok(())
}

#[test]
fn test_multi_level_jump_emits_one_event_per_level() -> Result<()> {
    let h = harness();
    let engine = h.engine.with_levels(table(&[
        (2, Some(10)),
        (3, Some(20)),
        (4, Some(30)),
    ]));

    engine.add_points(&user(), 35, None)?;

    assert_eq!(
        h.sink.events(),
        vec![
            DomainEvent::PointsIncreased {
                subject: user(),
                delta: 35,
                total: 35
            },
            DomainEvent::LevelledUp {
                subject: user(),
                from: 1,
                to: 2
            },
            DomainEvent::LevelledUp {
                subject: user(),
                from: 2,
                to: 3
            },
            DomainEvent::LevelledUp {
                subject: user(),
                from: 3,
                to: 4
            },
        ]
    );
    Ok(())
}

#[test]
fn test_set_points_can_level_down() -> Result<()> {
    let h = harness();
    let engine = h.engine.with_levels(table(&[(2, Some(10)), (3, Some(20))]));
    engine.add_points(&user(), 25, None)?;
    h.sink.take();

    let transition = engine.set_points(&user(), 12)?;

    assert!(transition.levelled_down());
    assert_eq!(engine.get_level(&user())?, 2);
    assert_eq!(
        h.sink.events(),
        vec![
            DomainEvent::PointsDecreased {
                subject: user(),
                delta: 13,
                total: 12
            },
            DomainEvent::LevelledDown {
                subject: user(),
                from: 3,
                to: 2
            },
        ]
    );
    Ok(())
}

#[test]
fn test_deduct_points_can_level_down() -> Result<()> {
    let h = harness();
    let engine = h.engine.with_levels(table(&[(2, Some(10)), (3, Some(20))]));
    engine.add_points(&user(), 25, None)?;
    assert_eq!(engine.get_level(&user())?, 3);
    h.sink.take();

    let transition = engine.deduct_points(&user(), 15)?;

    assert!(transition.levelled_down());
    assert_eq!(transition.points, 10);
    assert_eq!(engine.get_level(&user())?, 2);
    assert_eq!(
        h.sink.events(),
        vec![
            DomainEvent::PointsDecreased {
                subject: user(),
                delta: 15,
                total: 10
            },
            DomainEvent::LevelledDown {
                subject: user(),
                from: 3,
                to: 2
            },
        ]
    );
    Ok(())
}

#[test]
fn test_level_cap_without_points_continue_stops_accrual() -> Result<()> {
    let h = harness();
    let engine = h
        .engine
        .with_levels(table(&[(2, Some(10)), (3, Some(20)), (4, Some(30))]))
        .with_level_cap(Some(LevelCapConfig {
            enabled: true,
            level: 3,
            points_continue: false,
        }));

    engine.add_points(&user(), 50, None)?;
    assert_eq!(engine.get_level(&user())?, 3);
    assert_eq!(engine.get_points(&user())?, 50);
    h.sink.take();

    let transition = engine.add_points(&user(), 10, None)?;
    assert_eq!(transition.points, transition.previous_points);
    assert_eq!(engine.get_points(&user())?, 50);
    assert_eq!(engine.next_level_at(&user())?, 0);
    assert!(h.sink.events().is_empty());
    Ok(())
}

#[test]
fn test_level_cap_with_points_continue_keeps_counting() -> Result<()> {
    let h = harness();
    let engine = h
        .engine
        .with_levels(table(&[(2, Some(10)), (3, Some(20))]))
        .with_level_cap(Some(LevelCapConfig {
            enabled: true,
            level: 2,
            points_continue: true,
        }));

    engine.add_points(&user(), 15, None)?;
    engine.add_points(&user(), 15, None)?;

    assert_eq!(engine.get_points(&user())?, 30);
    assert_eq!(engine.get_level(&user())?, 2);
    Ok(())
}

#[test]
fn test_updated_at_follows_clock() -> Result<()> {
    let h = harness();
    h.engine.add_points(&user(), 1, None)?;
    let created = h.engine.ledger(&user())?.unwrap();

    h.clock.advance(chrono::Duration::hours(2));
    h.engine.add_points(&user(), 1, None)?;
    let updated = h.engine.ledger(&user())?.unwrap();

    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.updated_at - created.updated_at, chrono::Duration::hours(2));
    Ok(())
}

#[test]
fn test_subjects_are_independent() -> Result<()> {
    let h = harness();
    let alice = SubjectId::from("alice");
    let bob = SubjectId::from("bob");

    h.engine.add_points(&alice, 10, None)?;
    h.engine.add_points(&bob, 3, None)?;
    h.engine.deduct_points(&alice, 4)?;

    assert_eq!(h.engine.get_points(&alice)?, 6);
    assert_eq!(h.engine.get_points(&bob)?, 3);
    Ok(())
}

#[test]
fn test_concurrent_adds_for_one_subject_are_not_lost() -> Result<()> {
    let h = harness();
    let engine = &h.engine;

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..500 {
                    engine.add_points(&user(), 1, None).unwrap();
                }
            });
        }
    });

    assert_eq!(h.engine.get_points(&user())?, 4000);
    assert_eq!(h.sink.events().len(), 4000);
    Ok(())
}
