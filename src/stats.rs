use anyhow::Result;
use log::info;

use crate::{
    cli::StatsArgs,
    data::Value,
    engine::StatTable,
    format::{FormatClass, format_value},
    leaderboard,
    record::PositionGroup,
    schema::{Alignment, ColumnDescriptor},
    table,
};

pub fn execute(args: &StatsArgs) -> Result<()> {
    let stat_table = leaderboard::open_table(&args.view)?;
    let summaries = summarize(&stat_table);

    let position = stat_table.position();
    let rows = summaries
        .iter()
        .map(|stats| stats.render_row(position))
        .collect::<Vec<_>>();
    let headers = vec![
        "column".to_string(),
        "count".to_string(),
        "min".to_string(),
        "max".to_string(),
        "mean".to_string(),
        "median".to_string(),
        "std_dev".to_string(),
    ];
    let mut alignments = vec![Alignment::Left];
    alignments.extend([Alignment::Right; 6]);
    table::print_table(&headers, &alignments, &rows);
    info!(
        "Computed summary statistics for {} column(s) over {} row(s)",
        rows.len(),
        stat_table.visible_rows().len()
    );
    Ok(())
}

/// Statistics for each visible numeric, non-identity column over the
/// visible rows. Missing cells are not counted.
pub fn summarize(stat_table: &StatTable) -> Vec<ColumnStats> {
    stat_table
        .visible_columns()
        .iter()
        .filter(|column| column.format.is_numeric() && !column.is_identity())
        .map(|column| {
            let mut stats = ColumnStats::for_column(column);
            for &row in stat_table.visible_rows() {
                if let Some(value) = stat_table.value(row, &column.id).as_f64() {
                    stats.add_value(value);
                }
            }
            stats
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ColumnStats {
    pub id: String,
    format: FormatClass,
    values: Vec<f64>,
    sum: f64,
    sum_squares: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl ColumnStats {
    fn for_column(column: &ColumnDescriptor) -> Self {
        Self {
            id: column.id.clone(),
            format: column.format,
            values: Vec::new(),
            sum: 0.0,
            sum_squares: 0.0,
            min: None,
            max: None,
        }
    }

    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.sum_squares += value * value;
        self.min = Some(match self.min {
            Some(current) => current.min(value),
            None => value,
        });
        self.max = Some(match self.max {
            Some(current) => current.max(value),
            None => value,
        });
        self.values.push(value);
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.count() as f64)
        }
    }

    pub fn median(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len().is_multiple_of(2) {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        let count = self.count();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = (self.sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }

    fn render_row(&self, position: PositionGroup) -> Vec<String> {
        vec![
            self.id.clone(),
            self.count().to_string(),
            self.format_metric(self.min, position),
            self.format_metric(self.max, position),
            self.format_metric(self.mean(), position),
            self.format_metric(self.median(), position),
            self.std_dev().map(format_number).unwrap_or_default(),
        ]
    }

    /// Min, max, mean and median use the column's own display format, with
    /// integer columns shown as plain numbers so means keep their fraction.
    fn format_metric(&self, metric: Option<f64>, position: PositionGroup) -> String {
        metric
            .map(|value| match self.format {
                FormatClass::Integer => format_number(value),
                format => format_value(&Value::Number(value), format, position),
            })
            .unwrap_or_default()
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}
