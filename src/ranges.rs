//! Per-column value ranges for heat-map coloring.
//!
//! Ranges feed a visual scale, not a numeric result, so large views are
//! sampled: only a fixed prefix of rows is scanned once the view exceeds the
//! sampling threshold.

use std::collections::BTreeMap;

use itertools::{Itertools, MinMaxResult};
use log::debug;

use crate::{
    config::EngineSettings,
    metrics::{Evaluator, Polarity},
    record::PlayerSeasonRecord,
    schema::ColumnDescriptor,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Position of `value` within the range, clamped to `0..=1`.
    pub fn fraction(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

pub type RangeMap = BTreeMap<String, ColumnRange>;

/// Which prefix of `rows` the aggregator scans.
pub fn sample_rows<'a>(rows: &'a [usize], settings: &EngineSettings) -> &'a [usize] {
    if rows.len() > settings.range_sample_threshold {
        &rows[..settings.range_sample_size.min(rows.len())]
    } else {
        rows
    }
}

/// Ranges for the numeric, non-identity columns among `columns`. Columns
/// without numeric values or whose values collapse to one are omitted.
pub fn compute_ranges(
    rows: &[usize],
    records: &[PlayerSeasonRecord],
    columns: &[ColumnDescriptor],
    evaluator: &Evaluator,
    settings: &EngineSettings,
) -> RangeMap {
    let scanned = sample_rows(rows, settings);
    if scanned.len() < rows.len() {
        debug!(
            "Sampling ranges over {} of {} rows",
            scanned.len(),
            rows.len()
        );
    }
    let mut ranges = RangeMap::new();
    for column in columns {
        if column.is_identity() || !column.format.is_numeric() {
            continue;
        }
        let values = scanned
            .iter()
            .filter_map(|&idx| evaluator.evaluate(&records[idx], &column.id).as_f64());
        if let MinMaxResult::MinMax(min, max) = values.minmax()
            && min < max
        {
            ranges.insert(column.id.clone(), ColumnRange { min, max });
        }
    }
    ranges
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn ansi_background(self) -> String {
        format!("\u{1b}[48;2;{};{};{}m", self.r, self.g, self.b)
    }

    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

const BAD: Rgb = Rgb::new(99, 38, 38);
const MIDDLE: Rgb = Rgb::new(92, 84, 40);
const GOOD: Rgb = Rgb::new(34, 94, 52);

/// Background for a cell: green toward the good end, red toward the bad
/// end. Lower-is-better columns invert the scale; neutral columns and
/// missing ranges get no color.
pub fn heat_color(value: f64, range: Option<&ColumnRange>, polarity: Polarity) -> Option<Rgb> {
    let range = range?;
    let fraction = range.fraction(value);
    let goodness = match polarity {
        Polarity::HigherIsBetter => fraction,
        Polarity::LowerIsBetter => 1.0 - fraction,
        Polarity::Neutral => return None,
    };
    Some(if goodness < 0.5 {
        BAD.lerp(MIDDLE, goodness * 2.0)
    } else {
        MIDDLE.lerp(GOOD, (goodness - 0.5) * 2.0)
    })
}
