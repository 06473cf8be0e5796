//! Bounded memoization of evaluated cells.
//!
//! The cache as a whole is keyed by dataset, column set and visible row
//! count; an unchanged key keeps the cache. Individual cells are keyed by
//! record index and column, so a cached value is correct for that record no
//! matter which rows happen to be visible. Builds run through a
//! [`WorkQueue`] and only commit when their generation is still current.

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    config::EngineSettings,
    data::Value,
    dataset::DatasetId,
    metrics::Evaluator,
    record::PlayerSeasonRecord,
    schema::ColumnDescriptor,
    scheduler::{Generation, Step, WorkQueue},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSetId(String);

impl ColumnSetId {
    pub fn of(columns: &[ColumnDescriptor]) -> Self {
        let mut hasher = Sha256::new();
        for column in columns {
            hasher.update(column.id.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        Self(
            digest
                .iter()
                .take(8)
                .map(|byte| format!("{byte:02x}"))
                .collect(),
        )
    }
}

impl fmt::Display for ColumnSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: DatasetId,
    pub columns: ColumnSetId,
    pub row_count: usize,
}

/// What [`ValueCache::ensure`] decided for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDecision {
    /// The committed cache already matches.
    Current,
    /// A build for this key is already queued.
    InProgress,
    Started { cells: usize, generation: u64 },
    /// Too many cells; reads fall back to the evaluator.
    Skipped { cells: usize, ceiling: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePoll {
    Idle,
    Building { completed: usize, total: usize },
    Committed {
        cells: usize,
        generation: u64,
        elapsed: Duration,
    },
    Discarded { completed: usize, total: usize },
}

#[derive(Debug)]
struct CacheBuild {
    key: CacheKey,
    columns: Vec<String>,
    queue: WorkQueue<(usize, usize)>,
    staged: HashMap<(usize, usize), Value>,
    started: Instant,
}

#[derive(Debug, Default)]
pub struct ValueCache {
    generation: Generation,
    key: Option<CacheKey>,
    column_index: HashMap<String, usize>,
    cells: HashMap<(usize, usize), Value>,
    build: Option<CacheBuild>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle; advancing it cancels the in-flight build.
    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    pub fn is_building(&self) -> bool {
        self.build.is_some()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Makes sure the cache matches `key`, queueing a build if it does not.
    pub fn ensure(
        &mut self,
        key: CacheKey,
        rows: &[usize],
        columns: &[ColumnDescriptor],
        settings: &EngineSettings,
    ) -> BuildDecision {
        if self.key.as_ref() == Some(&key) {
            return BuildDecision::Current;
        }
        if self
            .build
            .as_ref()
            .is_some_and(|build| build.key == key && !build.queue.token().is_cancelled())
        {
            return BuildDecision::InProgress;
        }
        let cells = rows.len() * columns.len();
        self.invalidate();
        if cells > settings.cache_cell_ceiling {
            self.build = None;
            debug!(
                "Skipping cache build: {cells} cells exceeds ceiling {}",
                settings.cache_cell_ceiling
            );
            return BuildDecision::Skipped {
                cells,
                ceiling: settings.cache_cell_ceiling,
            };
        }
        let token = self.generation.token();
        let generation = token.generation();
        let units = rows
            .iter()
            .flat_map(|&row| (0..columns.len()).map(move |col| (row, col)))
            .collect::<Vec<_>>();
        self.build = Some(CacheBuild {
            key,
            columns: columns.iter().map(|column| column.id.clone()).collect(),
            queue: WorkQueue::new(units, settings.cache_batch_size, token),
            staged: HashMap::with_capacity(cells),
            started: Instant::now(),
        });
        BuildDecision::Started { cells, generation }
    }

    /// Drops committed values and cancels any in-flight build. The build
    /// stays queued until the next [`poll`](Self::poll) discards it.
    pub fn invalidate(&mut self) {
        self.generation.advance();
        self.key = None;
        self.cells.clear();
        self.column_index.clear();
    }

    /// Runs one batch of the in-flight build.
    pub fn poll(&mut self, records: &[PlayerSeasonRecord], evaluator: &Evaluator) -> CachePoll {
        let Some(build) = self.build.as_mut() else {
            return CachePoll::Idle;
        };
        let CacheBuild {
            columns,
            queue,
            staged,
            ..
        } = build;
        let step = queue.run_batch(|(row, col)| {
            let value = records
                .get(row)
                .map_or(Value::Missing, |record| evaluator.evaluate(record, &columns[col]));
            staged.insert((row, col), value);
        });
        match step {
            Step::Pending { completed, total } => CachePoll::Building { completed, total },
            Step::Cancelled { completed, total } => {
                self.build = None;
                debug!("Discarded stale cache build after {completed}/{total} cells");
                CachePoll::Discarded { completed, total }
            }
            Step::Complete => {
                let Some(build) = self.build.take() else {
                    return CachePoll::Idle;
                };
                let generation = build.queue.token().generation();
                let cells = build.staged.len();
                self.column_index = build
                    .columns
                    .into_iter()
                    .enumerate()
                    .map(|(idx, id)| (id, idx))
                    .collect();
                self.cells = build.staged;
                self.key = Some(build.key);
                let elapsed = build.started.elapsed();
                debug!("Committed {cells} cached cells (generation {generation}) in {elapsed:?}");
                CachePoll::Committed {
                    cells,
                    generation,
                    elapsed,
                }
            }
        }
    }

    /// Runs the in-flight build to completion.
    pub fn drain(&mut self, records: &[PlayerSeasonRecord], evaluator: &Evaluator) -> CachePoll {
        loop {
            match self.poll(records, evaluator) {
                CachePoll::Building { .. } => continue,
                other => return other,
            }
        }
    }

    pub fn get(&self, row: usize, column_id: &str) -> Option<&Value> {
        let col = self.column_index.get(column_id)?;
        self.cells.get(&(row, *col))
    }

    /// Cached value when present, otherwise a direct evaluation.
    pub fn value(
        &self,
        records: &[PlayerSeasonRecord],
        row: usize,
        column_id: &str,
        evaluator: &Evaluator,
    ) -> Value {
        if let Some(value) = self.get(row, column_id) {
            return value.clone();
        }
        records
            .get(row)
            .map_or(Value::Missing, |record| evaluator.evaluate(record, column_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::Dataset,
        record::{Position, PositionGroup},
        schema::{FeatureFlags, columns_for},
    };

    fn dataset(n: usize) -> Dataset {
        let records = (0..n)
            .map(|i| {
                PlayerSeasonRecord::new(format!("r{i}"), format!("R{i}"), "DET", Position::Rb)
                    .with_stat("carries", (i * 3) as f64)
                    .with_stat("rushing_yards", (i * 11) as f64)
            })
            .collect();
        Dataset::new("rb", records)
    }

    fn key(dataset: &Dataset, columns: &[ColumnDescriptor], rows: usize) -> CacheKey {
        CacheKey {
            dataset: dataset.id().clone(),
            columns: ColumnSetId::of(columns),
            row_count: rows,
        }
    }

    #[test]
    fn committed_values_match_evaluator() {
        let dataset = dataset(8);
        let columns = columns_for(PositionGroup::Rb, FeatureFlags::default())[..6].to_vec();
        let rows = (0..8).collect::<Vec<_>>();
        let evaluator = Evaluator::new();
        let mut cache = ValueCache::new();
        let decision = cache.ensure(
            key(&dataset, &columns, rows.len()),
            &rows,
            &columns,
            &EngineSettings::default(),
        );
        assert!(matches!(decision, BuildDecision::Started { cells: 48, .. }));
        assert!(matches!(
            cache.poll(dataset.records(), &evaluator),
            CachePoll::Building {
                completed: 25,
                total: 48
            }
        ));
        assert!(matches!(
            cache.poll(dataset.records(), &evaluator),
            CachePoll::Committed { cells: 48, .. }
        ));
        for &row in &rows {
            for column in &columns {
                assert_eq!(
                    cache.get(row, &column.id),
                    Some(&evaluator.evaluate(&dataset.records()[row], &column.id))
                );
            }
        }
        assert_eq!(
            cache.ensure(
                key(&dataset, &columns, rows.len()),
                &rows,
                &columns,
                &EngineSettings::default()
            ),
            BuildDecision::Current
        );
    }

    #[test]
    fn oversized_views_skip_the_build() {
        let dataset = dataset(60);
        let columns = columns_for(PositionGroup::Rb, FeatureFlags::default())[..20].to_vec();
        let rows = (0..60).collect::<Vec<_>>();
        let mut cache = ValueCache::new();
        let decision = cache.ensure(
            key(&dataset, &columns, rows.len()),
            &rows,
            &columns,
            &EngineSettings::default(),
        );
        assert_eq!(
            decision,
            BuildDecision::Skipped {
                cells: 1200,
                ceiling: 1000
            }
        );
        assert_eq!(cache.poll(dataset.records(), &Evaluator::new()), CachePoll::Idle);
        let value = cache.value(dataset.records(), 7, "rushing_yards", &Evaluator::new());
        assert_eq!(value, Value::Number(77.0));
    }

    #[test]
    fn invalidated_build_never_commits() {
        let dataset = dataset(8);
        let columns = columns_for(PositionGroup::Rb, FeatureFlags::default())[..6].to_vec();
        let rows = (0..8).collect::<Vec<_>>();
        let evaluator = Evaluator::new();
        let mut cache = ValueCache::new();
        cache.ensure(
            key(&dataset, &columns, rows.len()),
            &rows,
            &columns,
            &EngineSettings::default(),
        );
        cache.poll(dataset.records(), &evaluator);
        cache.invalidate();
        assert_eq!(
            cache.poll(dataset.records(), &evaluator),
            CachePoll::Discarded {
                completed: 25,
                total: 48
            }
        );
        assert!(cache.key().is_none());
        assert!(cache.is_empty());
        assert!(cache.get(0, "player").is_none());
    }

    #[test]
    fn new_key_supersedes_in_flight_build() {
        let dataset = dataset(8);
        let columns = columns_for(PositionGroup::Rb, FeatureFlags::default())[..6].to_vec();
        let evaluator = Evaluator::new();
        let settings = EngineSettings::default();
        let mut cache = ValueCache::new();
        let all = (0..8).collect::<Vec<_>>();
        cache.ensure(key(&dataset, &columns, 8), &all, &columns, &settings);
        cache.poll(dataset.records(), &evaluator);
        let fewer = vec![1, 3];
        cache.ensure(key(&dataset, &columns, 2), &fewer, &columns, &settings);
        assert!(matches!(
            cache.drain(dataset.records(), &evaluator),
            CachePoll::Committed { cells: 12, .. }
        ));
        assert_eq!(cache.key().map(|key| key.row_count), Some(2));
        assert!(cache.get(0, "player").is_none());
        assert!(cache.get(3, "player").is_some());
    }
}
