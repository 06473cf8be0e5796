//! The `table` command and the view assembly shared by every table-backed
//! command.
//!
//! Command-line flags override the YAML view file, which overrides the
//! engine defaults.

use std::{
    io::{self, IsTerminal},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    aggregate,
    cli::{ColorChoice, TableArgs, ViewArgs},
    config::ViewConfig,
    dataset::Dataset,
    derive::{self, DerivedColumn},
    engine::{StatTable, ViewOptions},
    filter,
    instrument::LogInstrumentation,
    metrics::Evaluator,
    sort::SortState,
    table,
};

pub fn execute(args: &TableArgs) -> Result<()> {
    let mut stat_table = open_table(&args.view)?;
    stat_table.drain_cache();

    let colorize = match args.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stdout().is_terminal(),
    };
    let columns = stat_table.visible_columns();
    let headers = columns
        .iter()
        .map(|column| column.label.clone())
        .collect::<Vec<_>>();
    let alignments = columns.iter().map(|column| column.alignment).collect::<Vec<_>>();
    let rows = stat_table
        .rendered_rows()
        .into_iter()
        .map(|row| {
            row.cells
                .into_iter()
                .map(|cell| {
                    if colorize {
                        table::paint(&cell.text, cell.color)
                    } else {
                        cell.text
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &alignments, &rows);

    let (low, high) = stat_table.threshold_bounds();
    let filter_state = stat_table.filter_state();
    info!(
        "Showing {} of {} {} row(s), {} >= {} (range {low}..{high}), sorted by {} {}",
        rows.len(),
        stat_table.rows().len(),
        filter_state.position(),
        filter_state.threshold_metric(),
        filter_state.threshold_value(),
        stat_table.sort_state().column_id,
        stat_table.sort_state().direction
    );
    Ok(())
}

/// Loads the records named by `args` and builds the table for them.
pub fn open_table(args: &ViewArgs) -> Result<StatTable> {
    let view = match &args.view {
        Some(path) => {
            ViewConfig::load(path).with_context(|| format!("Loading view from {path:?}"))?
        }
        None => ViewConfig::default(),
    };

    let mut dataset = Dataset::load(&args.input)
        .with_context(|| format!("Loading records from {:?}", args.input))?;
    let seasons = if args.seasons.is_empty() {
        view.selected_seasons()
    } else {
        args.seasons.clone()
    };
    if !seasons.is_empty() {
        dataset = dataset.for_seasons(&seasons);
        debug!("Restricted to seasons {seasons:?}: {} record(s)", dataset.len());
    }
    if let Some(grouping) = args.group_by.or(view.group_by) {
        dataset = aggregate::aggregate(&dataset, grouping);
    }

    let evaluator = Evaluator::with_derived(derived_columns(args, &view)?);

    let sort = match args.sort.as_deref().or(view.sort.as_deref()) {
        Some(spec) => Some(
            SortState::parse(spec).with_context(|| format!("Parsing sort directive '{spec}'"))?,
        ),
        None => None,
    };
    let mut filters = view.filters.clone();
    filters.extend(args.filters.iter().cloned());
    let conditions = filter::parse_filters(&filters).context("Parsing filters")?;
    let columns = if args.columns.is_empty() {
        view.columns.clone()
    } else {
        Some(args.columns.clone())
    };
    let teams = if args.teams.is_empty() {
        view.teams.clone()
    } else {
        args.teams.clone()
    };

    let options = ViewOptions {
        position: args.position.or(view.position).unwrap_or_default(),
        seasons,
        include_next_gen: args.next_gen || view.next_gen.unwrap_or(false),
        scoring: args.scoring.or(view.scoring).unwrap_or_default(),
        columns,
        sort,
        threshold: args.threshold.or(view.threshold),
        teams,
        conditions,
        row_limit: args.limit.or(view.limit),
    };
    debug!("View options: {options:?}");
    let settings = view.engine;
    Ok(StatTable::new(
        dataset,
        evaluator,
        options,
        settings,
        Box::new(LogInstrumentation::new(Duration::from_millis(
            settings.slow_operation_ms,
        ))),
    ))
}

fn derived_columns(args: &ViewArgs, view: &ViewConfig) -> Result<Vec<DerivedColumn>> {
    let mut columns = view
        .derive
        .iter()
        .map(|config| {
            config
                .build()
                .with_context(|| format!("Building derived column '{}'", config.name))
        })
        .collect::<Result<Vec<_>>>()?;
    columns.extend(derive::parse_derived_columns(&args.derives).context("Parsing --derive")?);
    Ok(columns)
}
