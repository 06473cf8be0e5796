mod common;

use std::{cell::RefCell, rc::Rc};

use common::{arb_records, rusher};
use proptest::prelude::*;
use statboard::{
    cache::{BuildDecision, CacheKey, CachePoll, ColumnSetId, ValueCache},
    config::EngineSettings,
    dataset::Dataset,
    engine::{StatTable, ViewOptions},
    instrument::{EngineEvent, Instrumentation},
    metrics::Evaluator,
    record::{PlayerSeasonRecord, PositionGroup},
    schema::{FeatureFlags, columns_for},
};

const FOURTEEN_COLUMNS: [&str; 14] = [
    "carries",
    "rushing_yards",
    "rushing_tds",
    "yards_per_carry",
    "targets",
    "receptions",
    "receiving_yards",
    "receiving_tds",
    "touches",
    "yards_per_touch",
    "scrimmage_yards",
    "total_tds",
    "catch_percentage",
    "rushing_epa",
];

#[derive(Clone, Default)]
struct EventLog(Rc<RefCell<Vec<&'static str>>>);

impl EventLog {
    fn names(&self) -> Vec<&'static str> {
        self.0.borrow().clone()
    }
}

impl Instrumentation for EventLog {
    fn record(&self, event: &EngineEvent) {
        self.0.borrow_mut().push(event.name());
    }
}

fn backfield(count: usize) -> Vec<PlayerSeasonRecord> {
    (0..count)
        .map(|i| {
            rusher(&format!("rb{i}"), (i * 7 % 250 + 1) as f64, (i * 31 % 1400) as f64)
                .with_stat("targets", (i % 60) as f64)
                .with_stat("receptions", (i % 45) as f64)
        })
        .collect()
}

fn rb_table(count: usize, log: &EventLog) -> StatTable {
    StatTable::new(
        Dataset::new("backfield", backfield(count)),
        Evaluator::new(),
        ViewOptions {
            position: PositionGroup::Rb,
            threshold: Some(0.0),
            columns: Some(FOURTEEN_COLUMNS.iter().map(|id| id.to_string()).collect()),
            ..ViewOptions::default()
        },
        EngineSettings::default(),
        Box::new(log.clone()),
    )
}

#[test]
fn oversized_view_skips_cache_and_still_reads_correct_values() {
    let log = EventLog::default();
    let mut table = rb_table(60, &log);
    assert_eq!(table.visible_rows().len(), 60);
    assert_eq!(table.visible_columns().len(), 20);
    assert!(60 * 20 > table.settings().cache_cell_ceiling);
    assert!(log.names().contains(&"cache_build_skipped"));

    assert_eq!(table.drain_cache(), CachePoll::Idle);
    assert!(table.cache().is_empty());
    for &row in table.visible_rows() {
        for column in table.visible_columns() {
            assert_eq!(
                table.value(row, &column.id),
                table.evaluator().evaluate(&table.records()[row], &column.id)
            );
        }
    }
}

#[test]
fn view_at_the_ceiling_builds_and_commits() {
    let log = EventLog::default();
    let mut table = rb_table(50, &log);
    assert!(log.names().contains(&"cache_build_started"));
    match table.drain_cache() {
        CachePoll::Committed { cells, .. } => assert_eq!(cells, 1000),
        other => panic!("expected a committed cache, got {other:?}"),
    }
    assert!(log.names().contains(&"cache_committed"));
    let row = table.visible_rows()[0];
    assert!(table.cache().get(row, "yards_per_carry").is_some());
}

#[test]
fn threshold_change_replaces_the_running_build() {
    let log = EventLog::default();
    let mut table = rb_table(40, &log);
    assert!(matches!(table.poll_cache(), CachePoll::Building { .. }));
    let first_generation = table.cache().generation().current();

    table.set_threshold(100.0);
    assert!(table.cache().generation().current() > first_generation);
    assert!(table.cache().is_empty());
    match table.drain_cache() {
        CachePoll::Committed {
            cells, generation, ..
        } => {
            assert_eq!(cells, table.visible_rows().len() * 20);
            assert_eq!(generation, table.cache().generation().current());
        }
        other => panic!("expected a committed cache, got {other:?}"),
    }
    for &row in table.visible_rows() {
        assert!(table.records()[row].counter("carries") >= 100.0);
        assert_eq!(
            table.cache().get(row, "carries").cloned(),
            Some(table.evaluator().evaluate(&table.records()[row], "carries"))
        );
    }
}

#[test]
fn invalidation_before_completion_never_commits() {
    let records = backfield(30);
    let columns = columns_for(PositionGroup::Rb, FeatureFlags::default());
    let rows = (0..records.len()).collect::<Vec<_>>();
    let dataset = Dataset::new("backfield", records.clone());
    let key = CacheKey {
        dataset: dataset.id().clone(),
        columns: ColumnSetId::of(&columns),
        row_count: rows.len(),
    };
    let settings = EngineSettings {
        cache_batch_size: 5,
        ..EngineSettings::default()
    };
    let evaluator = Evaluator::new();
    let mut cache = ValueCache::new();
    assert!(matches!(
        cache.ensure(key, &rows, &columns, &settings),
        BuildDecision::Started { .. }
    ));
    assert!(matches!(
        cache.poll(&records, &evaluator),
        CachePoll::Building { .. }
    ));
    cache.invalidate();
    assert!(matches!(
        cache.drain(&records, &evaluator),
        CachePoll::Discarded { .. }
    ));
    assert!(cache.key().is_none());
    assert!(cache.get(0, "carries").is_none());
}

proptest! {
    #[test]
    fn committed_cells_equal_direct_evaluation(records in arb_records(25)) {
        let evaluator = Evaluator::new();
        let columns = columns_for(PositionGroup::All, FeatureFlags::default())
            .into_iter()
            .take(12)
            .collect::<Vec<_>>();
        let rows = (0..records.len()).rev().collect::<Vec<_>>();
        let dataset = Dataset::new("generated", records.clone());
        let key = CacheKey {
            dataset: dataset.id().clone(),
            columns: ColumnSetId::of(&columns),
            row_count: rows.len(),
        };
        let mut cache = ValueCache::new();
        cache.ensure(key, &rows, &columns, &EngineSettings::default());
        let outcome = cache.drain(&records, &evaluator);
        prop_assert!(
            matches!(outcome, CachePoll::Committed { .. }),
            "unexpected outcome {:?}",
            outcome
        );
        for &row in &rows {
            for column in &columns {
                prop_assert_eq!(
                    cache.get(row, &column.id).cloned(),
                    Some(evaluator.evaluate(&records[row], &column.id))
                );
            }
        }
    }
}
