//! The stat table: one dataset plus every view derived from it.
//!
//! State changes recompute only what depends on them:
//!
//! - position, threshold, teams, conditions: filter, sort, ranges, cache
//! - sort: sort, ranges, cache key check
//! - visible columns, NextGen flag, scoring: columns, ranges, cache
//!
//! Filtering, sorting and range aggregation run to completion; the value
//! cache is built one batch per [`StatTable::poll_cache`] call.

use std::time::{Duration, Instant};

use log::debug;

use crate::{
    cache::{BuildDecision, CacheKey, CachePoll, ColumnSetId, ValueCache},
    config::EngineSettings,
    data::Value,
    dataset::Dataset,
    error::StatResult,
    export::{self, ExportMode, ExportSource},
    filter::{self, FilterCondition, FilterState},
    format::format_value,
    instrument::{EngineEvent, Instrumentation, LogInstrumentation},
    metrics::{self, Evaluator},
    ranges::{self, RangeMap, Rgb},
    record::{PlayerSeasonRecord, PositionGroup},
    schema::{self, ColumnDescriptor, FeatureFlags, ScoringFormat},
    sort::{self, SortDirection, SortState},
};

/// Initial settings for a [`StatTable`].
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub position: PositionGroup,
    /// Seasons the dataset was restricted to, used to name exports.
    pub seasons: Vec<i32>,
    pub include_next_gen: bool,
    pub scoring: ScoringFormat,
    /// `None` shows the registry defaults.
    pub columns: Option<Vec<String>>,
    /// `None` sorts by the fantasy total, descending.
    pub sort: Option<SortState>,
    /// `None` uses the position's default threshold.
    pub threshold: Option<f64>,
    pub teams: Vec<String>,
    pub conditions: Vec<FilterCondition>,
    pub row_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: Value,
    pub text: String,
    pub color: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    pub record: usize,
    pub cells: Vec<Cell>,
}

pub struct StatTable {
    dataset: Dataset,
    seasons: Vec<i32>,
    evaluator: Evaluator,
    settings: EngineSettings,
    instrumentation: Box<dyn Instrumentation>,
    filter: FilterState,
    sort: SortState,
    include_next_gen: bool,
    scoring: ScoringFormat,
    requested_columns: Option<Vec<String>>,
    row_limit: Option<usize>,
    available: Vec<ColumnDescriptor>,
    visible: Vec<ColumnDescriptor>,
    rows: Vec<usize>,
    ranges: RangeMap,
    cache: ValueCache,
}

impl StatTable {
    pub fn new(
        dataset: Dataset,
        evaluator: Evaluator,
        options: ViewOptions,
        settings: EngineSettings,
        instrumentation: Box<dyn Instrumentation>,
    ) -> Self {
        let mut filter = FilterState::for_position(options.position);
        if let Some(threshold) = options.threshold {
            filter.set_threshold(threshold);
        }
        filter.set_teams(&options.teams);
        filter.set_conditions(options.conditions);
        let sort = options.sort.unwrap_or_else(|| {
            SortState::new(options.scoring.total_column(), SortDirection::Desc)
        });
        let mut table = Self {
            dataset,
            seasons: options.seasons,
            evaluator,
            settings,
            instrumentation,
            filter,
            sort,
            include_next_gen: options.include_next_gen,
            scoring: options.scoring,
            requested_columns: options.columns,
            row_limit: options.row_limit,
            available: Vec::new(),
            visible: Vec::new(),
            rows: Vec::new(),
            ranges: RangeMap::new(),
            cache: ValueCache::new(),
        };
        table.refresh_columns();
        table.refresh_rows();
        table
    }

    /// Defaults throughout, logging instrumentation.
    pub fn with_defaults(dataset: Dataset) -> Self {
        let settings = EngineSettings::default();
        Self::new(
            dataset,
            Evaluator::new(),
            ViewOptions::default(),
            settings,
            Box::new(LogInstrumentation::new(Duration::from_millis(
                settings.slow_operation_ms,
            ))),
        )
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn records(&self) -> &[PlayerSeasonRecord] {
        self.dataset.records()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn position(&self) -> PositionGroup {
        self.filter.position()
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags::for_view(
            self.include_next_gen,
            self.scoring,
            self.position(),
            self.dataset.has_next_gen_stats(),
        )
    }

    /// Every column the current view offers.
    pub fn available_columns(&self) -> &[ColumnDescriptor] {
        &self.available
    }

    pub fn visible_columns(&self) -> &[ColumnDescriptor] {
        &self.visible
    }

    /// Filtered and sorted record indices.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// The rows a renderer shows: [`rows`](Self::rows) cut to the row limit.
    pub fn visible_rows(&self) -> &[usize] {
        match self.row_limit {
            Some(limit) => &self.rows[..limit.min(self.rows.len())],
            None => &self.rows,
        }
    }

    pub fn ranges(&self) -> &RangeMap {
        &self.ranges
    }

    pub fn cache(&self) -> &ValueCache {
        &self.cache
    }

    pub fn threshold_bounds(&self) -> (f64, f64) {
        filter::threshold_bounds(self.records(), self.position(), &self.evaluator)
    }

    pub fn set_position(&mut self, position: PositionGroup) {
        if position == self.position() {
            return;
        }
        self.filter.set_position(position);
        self.refresh_columns();
        if !self.is_sortable(&self.sort.column_id) {
            debug!(
                "Sort column '{}' is not part of the {position} view; resetting",
                self.sort.column_id
            );
            self.sort = SortState::new(self.scoring.total_column(), SortDirection::Desc);
        }
        self.refresh_rows();
    }

    pub fn set_threshold(&mut self, value: f64) {
        self.filter.set_threshold(value);
        self.refresh_rows();
    }

    pub fn set_teams<I, S>(&mut self, teams: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter.set_teams(teams);
        self.refresh_rows();
    }

    pub fn set_conditions(&mut self, conditions: Vec<FilterCondition>) {
        self.filter.set_conditions(conditions);
        self.refresh_rows();
    }

    pub fn toggle_sort(&mut self, column_id: &str) {
        self.sort.toggle(column_id);
        self.refresh_sort();
    }

    pub fn set_sort(&mut self, state: SortState) {
        self.sort = state;
        self.refresh_sort();
    }

    pub fn set_visible_columns(&mut self, columns: Option<Vec<String>>) {
        self.requested_columns = columns;
        self.refresh_columns();
        self.refresh_view();
    }

    pub fn set_next_gen(&mut self, include: bool) {
        self.include_next_gen = include;
        self.refresh_columns();
        self.refresh_view();
    }

    pub fn set_scoring(&mut self, scoring: ScoringFormat) {
        let previous_total = self.scoring.total_column();
        self.scoring = scoring;
        self.refresh_columns();
        if self.sort.column_id == previous_total {
            self.sort.column_id = scoring.total_column().to_string();
            self.refresh_sort();
        } else {
            self.refresh_view();
        }
    }

    pub fn set_row_limit(&mut self, limit: Option<usize>) {
        self.row_limit = limit;
        self.refresh_view();
    }

    /// One cell value, from the cache when it holds it.
    pub fn value(&self, row: usize, column_id: &str) -> Value {
        self.cache
            .value(self.records(), row, column_id, &self.evaluator)
    }

    pub fn cell(&self, row: usize, column: &ColumnDescriptor) -> Cell {
        let value = self.value(row, &column.id);
        let text = format_value(&value, column.format, self.position());
        let color = match value.as_f64() {
            Some(n) if !column.is_identity() => ranges::heat_color(
                n,
                self.ranges.get(&column.id),
                metrics::polarity(&column.id),
            ),
            _ => None,
        };
        Cell { value, text, color }
    }

    pub fn rendered_rows(&self) -> Vec<RenderedRow> {
        self.visible_rows()
            .iter()
            .map(|&record| RenderedRow {
                record,
                cells: self
                    .visible
                    .iter()
                    .map(|column| self.cell(record, column))
                    .collect(),
            })
            .collect()
    }

    /// Runs one batch of the cache build.
    pub fn poll_cache(&mut self) -> CachePoll {
        let outcome = self.cache.poll(self.dataset.records(), &self.evaluator);
        match outcome {
            CachePoll::Committed {
                cells,
                generation,
                elapsed,
            } => self.instrumentation.record(&EngineEvent::CacheCommitted {
                cells,
                generation,
                elapsed,
            }),
            CachePoll::Discarded { completed, total } => self
                .instrumentation
                .record(&EngineEvent::CacheBuildDiscarded { completed, total }),
            CachePoll::Idle | CachePoll::Building { .. } => {}
        }
        outcome
    }

    /// Polls until the cache build finishes or there is none.
    pub fn drain_cache(&mut self) -> CachePoll {
        loop {
            match self.poll_cache() {
                CachePoll::Building { .. } => continue,
                other => return other,
            }
        }
    }

    pub fn export(&self, mode: ExportMode) -> StatResult<String> {
        let started = Instant::now();
        let csv = export::to_csv(&self.export_source(), mode)?;
        self.instrumentation.record(&EngineEvent::Exported {
            rows: self.visible_rows().len(),
            columns: self.visible.len(),
            bytes: csv.len(),
            elapsed: started.elapsed(),
        });
        Ok(csv)
    }

    pub fn export_source(&self) -> ExportSource<'_> {
        ExportSource {
            records: self.dataset.records(),
            rows: self.visible_rows(),
            columns: &self.visible,
            cache: &self.cache,
            evaluator: &self.evaluator,
            view: self.position(),
        }
    }

    pub fn export_file_name(&self) -> String {
        export::export_file_name(self.dataset.name(), &self.seasons, self.position())
    }

    fn is_sortable(&self, column_id: &str) -> bool {
        self.available.iter().any(|column| column.id == column_id)
            || self.visible.iter().any(|column| column.id == column_id)
    }

    fn refresh_columns(&mut self) {
        self.available = schema::columns_for(self.position(), self.feature_flags());
        self.visible = schema::resolve_visible(
            &self.available,
            self.requested_columns.as_deref(),
            &self.evaluator,
        );
    }

    fn refresh_rows(&mut self) {
        let started = Instant::now();
        let filtered = filter::filter(self.dataset.records(), &self.filter, &self.evaluator);
        self.instrumentation.record(&EngineEvent::Filtered {
            position: self.position(),
            input: self.dataset.len(),
            output: filtered.len(),
            elapsed: started.elapsed(),
        });
        self.rows = filtered;
        self.refresh_sort();
    }

    fn refresh_sort(&mut self) {
        let started = Instant::now();
        self.rows = sort::sort(
            &self.rows,
            self.dataset.records(),
            &self.sort,
            &self.evaluator,
        );
        self.instrumentation.record(&EngineEvent::Sorted {
            column: self.sort.column_id.clone(),
            rows: self.rows.len(),
            elapsed: started.elapsed(),
        });
        self.refresh_view();
    }

    fn refresh_view(&mut self) {
        let started = Instant::now();
        self.ranges = ranges::compute_ranges(
            &self.rows,
            self.dataset.records(),
            &self.visible,
            &self.evaluator,
            &self.settings,
        );
        self.instrumentation.record(&EngineEvent::RangesComputed {
            columns: self.ranges.len(),
            scanned_rows: ranges::sample_rows(&self.rows, &self.settings).len(),
            total_rows: self.rows.len(),
            elapsed: started.elapsed(),
        });
        self.request_cache();
    }

    fn request_cache(&mut self) {
        let rows = self.visible_rows().to_vec();
        let key = CacheKey {
            dataset: self.dataset.id().clone(),
            columns: ColumnSetId::of(&self.visible),
            row_count: rows.len(),
        };
        match self.cache.ensure(key, &rows, &self.visible, &self.settings) {
            BuildDecision::Started { cells, generation } => self
                .instrumentation
                .record(&EngineEvent::CacheBuildStarted { cells, generation }),
            BuildDecision::Skipped { cells, ceiling } => self
                .instrumentation
                .record(&EngineEvent::CacheBuildSkipped { cells, ceiling }),
            BuildDecision::Current | BuildDecision::InProgress => {}
        }
    }
}
