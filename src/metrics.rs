//! Declarative metric table and the evaluator built on it.
//!
//! Every column the engine knows is one [`MetricDef`] row: identity fields,
//! raw counters, NextGen fields and derived formulas. Derived formulas share
//! one division policy, [`guarded`]: a zero denominator is replaced by 1, so
//! no metric ever produces `NaN` or `Infinity`. When the data source already
//! shipped a derived metric under the same id, that value wins.

use std::{collections::HashMap, sync::OnceLock};

use crate::{
    data::Value,
    derive::DerivedColumn,
    format::FormatClass,
    record::{NGS_PREFIX, PlayerSeasonRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsBetter,
    /// Interceptions, sacks, fumbles and similar: high values color red.
    LowerIsBetter,
    Neutral,
}

/// How a stored value combines when rows are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    /// Mean over the rows that carry the value.
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Player,
    Team,
    Position,
    Season,
}

#[derive(Clone, Copy)]
pub enum MetricKind {
    Identity(IdentityField),
    /// Stored value, 0 when absent.
    Counter,
    /// Stored value, missing when absent.
    NextGen,
    /// Precomputed value when present, otherwise the formula.
    Derived(fn(&PlayerSeasonRecord) -> f64),
}

impl std::fmt::Debug for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Identity(field) => write!(f, "Identity({field:?})"),
            MetricKind::Counter => f.write_str("Counter"),
            MetricKind::NextGen => f.write_str("NextGen"),
            MetricKind::Derived(_) => f.write_str("Derived"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub id: &'static str,
    pub label: &'static str,
    pub format: FormatClass,
    pub kind: MetricKind,
    pub polarity: Polarity,
    pub aggregation: Aggregation,
}

impl MetricDef {
    /// Whether the value can be read straight off the record.
    pub fn is_direct(&self) -> bool {
        matches!(self.kind, MetricKind::Counter | MetricKind::NextGen)
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, MetricKind::Identity(_))
    }

    pub fn evaluate(&self, record: &PlayerSeasonRecord) -> Value {
        match self.kind {
            MetricKind::Identity(field) => identity_value(record, field),
            MetricKind::Counter => Value::number(record.counter(self.id)),
            MetricKind::NextGen => record.stat(self.id).map_or(Value::Missing, Value::number),
            MetricKind::Derived(compute) => {
                Value::number(record.stat(self.id).unwrap_or_else(|| compute(record)))
            }
        }
    }
}

const fn identity(id: &'static str, label: &'static str, field: IdentityField) -> MetricDef {
    MetricDef {
        id,
        label,
        format: FormatClass::Text,
        kind: MetricKind::Identity(field),
        polarity: Polarity::Neutral,
        aggregation: Aggregation::Sum,
    }
}

const fn counter(id: &'static str, label: &'static str, format: FormatClass) -> MetricDef {
    MetricDef {
        id,
        label,
        format,
        kind: MetricKind::Counter,
        polarity: Polarity::HigherIsBetter,
        aggregation: Aggregation::Sum,
    }
}

const fn next_gen(id: &'static str, label: &'static str, format: FormatClass) -> MetricDef {
    MetricDef {
        id,
        label,
        format,
        kind: MetricKind::NextGen,
        polarity: Polarity::HigherIsBetter,
        aggregation: Aggregation::Mean,
    }
}

const fn derived(
    id: &'static str,
    label: &'static str,
    format: FormatClass,
    compute: fn(&PlayerSeasonRecord) -> f64,
) -> MetricDef {
    MetricDef {
        id,
        label,
        format,
        kind: MetricKind::Derived(compute),
        polarity: Polarity::HigherIsBetter,
        aggregation: Aggregation::Mean,
    }
}

const fn lower_is_better(def: MetricDef) -> MetricDef {
    MetricDef {
        polarity: Polarity::LowerIsBetter,
        ..def
    }
}

/// Derived totals add up across rows instead of averaging.
const fn summed(def: MetricDef) -> MetricDef {
    MetricDef {
        aggregation: Aggregation::Sum,
        ..def
    }
}

const INT: FormatClass = FormatClass::Integer;
const PCT: FormatClass = FormatClass::Percentage;
const SHARE: FormatClass = FormatClass::Share;
const RATIO: FormatClass = FormatClass::Ratio;
const DEC: FormatClass = FormatClass::Decimal;
const EPA: FormatClass = FormatClass::SignedDecimal {
    explicit_plus: false,
};
const OVER_EXPECTED: FormatClass = FormatClass::SignedDecimal {
    explicit_plus: true,
};

static METRICS: &[MetricDef] = &[
    identity("player", "Player", IdentityField::Player),
    identity("team", "Team", IdentityField::Team),
    identity("position", "Pos", IdentityField::Position),
    identity("season", "Season", IdentityField::Season),
    counter("games", "G", INT),
    // Passing counters
    counter("completions", "Cmp", INT),
    counter("attempts", "Att", INT),
    counter("passing_yards", "Pass Yds", INT),
    counter("passing_tds", "Pass TD", INT),
    lower_is_better(counter("interceptions", "INT", INT)),
    lower_is_better(counter("sacks", "Sacks", INT)),
    lower_is_better(counter("sack_yards", "Sack Yds", INT)),
    lower_is_better(counter("sack_fumbles_lost", "Sack FL", INT)),
    counter("passing_air_yards", "Pass Air Yds", INT),
    counter("passing_first_downs", "Pass 1D", INT),
    counter("passing_epa", "Pass EPA", EPA),
    counter("passing_2pt_conversions", "Pass 2PT", INT),
    // Rushing counters
    counter("carries", "Car", INT),
    counter("rushing_yards", "Rush Yds", INT),
    counter("rushing_tds", "Rush TD", INT),
    counter("rushing_first_downs", "Rush 1D", INT),
    counter("rushing_epa", "Rush EPA", EPA),
    lower_is_better(counter("rushing_fumbles_lost", "Rush FL", INT)),
    counter("rushing_2pt_conversions", "Rush 2PT", INT),
    // Receiving counters
    counter("targets", "Tgt", INT),
    counter("receptions", "Rec", INT),
    counter("receiving_yards", "Rec Yds", INT),
    counter("receiving_tds", "Rec TD", INT),
    counter("receiving_air_yards", "Air Yds", INT),
    counter("receiving_yards_after_catch", "YAC", INT),
    counter("receiving_first_downs", "Rec 1D", INT),
    counter("receiving_epa", "Rec EPA", EPA),
    lower_is_better(counter("receiving_fumbles_lost", "Rec FL", INT)),
    counter("receiving_2pt_conversions", "Rec 2PT", INT),
    counter("routes", "Routes", INT),
    counter("team_targets", "Team Tgt", INT),
    counter("team_air_yards", "Team Air Yds", INT),
    // Fantasy
    summed(derived("fantasy_points_ppr", "FPTS", DEC, |r| fantasy_points(r, 1.0))),
    summed(derived("fantasy_points_half_ppr", "FPTS (Half)", DEC, |r| {
        fantasy_points(r, 0.5)
    })),
    summed(derived("fantasy_points", "FPTS (Std)", DEC, |r| fantasy_points(r, 0.0))),
    derived("fantasy_points_pg", "FPTS/G", DEC, |r| {
        per_game(r, stored_or(r, "fantasy_points_ppr", |r| fantasy_points(r, 1.0)))
    }),
    derived("fantasy_points_half_ppr_pg", "FPTS/G (Half)", DEC, |r| {
        per_game(r, stored_or(r, "fantasy_points_half_ppr", |r| fantasy_points(r, 0.5)))
    }),
    derived("fantasy_points_std_pg", "FPTS/G (Std)", DEC, |r| {
        per_game(r, stored_or(r, "fantasy_points", |r| fantasy_points(r, 0.0)))
    }),
    // Passing efficiency
    derived("completion_pct", "Cmp%", PCT, |r| {
        percent(r.counter("completions"), r.counter("attempts"))
    }),
    derived("yards_per_attempt", "Y/A", DEC, |r| {
        guarded(r.counter("passing_yards"), r.counter("attempts"))
    }),
    derived("td_percentage", "TD%", PCT, |r| {
        percent(r.counter("passing_tds"), r.counter("attempts"))
    }),
    lower_is_better(derived("int_percentage", "INT%", PCT, |r| {
        percent(r.counter("interceptions"), r.counter("attempts"))
    })),
    derived("air_yards_per_attempt", "IAY/A", DEC, |r| {
        guarded(r.counter("passing_air_yards"), r.counter("attempts"))
    }),
    summed(derived("dropbacks", "Dropbacks", INT, dropbacks)),
    derived("epa_per_dropback", "EPA/DB", EPA, |r| {
        guarded(r.counter("passing_epa"), dropbacks(r))
    }),
    derived("fantasy_points_per_dropback", "FPTS/DB", DEC, |r| {
        guarded(
            stored_or(r, "fantasy_points_ppr", |r| fantasy_points(r, 1.0)),
            dropbacks(r),
        )
    }),
    lower_is_better(derived("sack_percentage", "Sack%", PCT, |r| {
        percent(r.counter("sacks"), dropbacks(r))
    })),
    derived("any_a", "ANY/A", DEC, |r| {
        let numerator = r.counter("passing_yards") + 20.0 * r.counter("passing_tds")
            - 45.0 * r.counter("interceptions")
            - r.counter("sack_yards");
        guarded(numerator, dropbacks(r))
    }),
    derived("passer_rating", "Rate", DEC, passer_rating),
    derived("pacr", "PACR", RATIO, |r| {
        air_conversion(r.counter("passing_yards"), r.counter("passing_air_yards"))
    }),
    // Rushing efficiency
    derived("yards_per_carry", "YPC", DEC, |r| {
        guarded(r.counter("rushing_yards"), r.counter("carries"))
    }),
    derived("rushing_td_rate", "Rush TD%", PCT, |r| {
        percent(r.counter("rushing_tds"), r.counter("carries"))
    }),
    derived("rushing_epa_per_carry", "EPA/Car", EPA, |r| {
        guarded(r.counter("rushing_epa"), r.counter("carries"))
    }),
    summed(derived("touches", "Touches", INT, touches)),
    derived("yards_per_touch", "Yds/Touch", DEC, |r| {
        guarded(scrimmage_yards(r), touches(r))
    }),
    summed(derived("scrimmage_yards", "Scrim Yds", INT, scrimmage_yards)),
    summed(derived("total_tds", "TD", INT, |r| {
        r.counter("passing_tds") + r.counter("rushing_tds") + r.counter("receiving_tds")
    })),
    lower_is_better(summed(derived("fumbles_lost", "FL", INT, fumbles_lost))),
    // Receiving efficiency
    derived("catch_percentage", "Catch%", PCT, |r| {
        percent(r.counter("receptions"), r.counter("targets"))
    }),
    derived("yards_per_target", "Y/Tgt", DEC, |r| {
        guarded(r.counter("receiving_yards"), r.counter("targets"))
    }),
    derived("td_rate", "Rec TD%", PCT, |r| {
        percent(r.counter("receiving_tds"), r.counter("targets"))
    }),
    derived("adot", "aDOT", DEC, |r| {
        guarded(r.counter("receiving_air_yards"), r.counter("targets"))
    }),
    derived("yards_per_reception", "Y/R", DEC, |r| {
        guarded(r.counter("receiving_yards"), r.counter("receptions"))
    }),
    derived("first_down_rate", "1D%", PCT, |r| {
        percent(r.counter("receiving_first_downs"), r.counter("receptions"))
    }),
    derived("yprr", "YPRR", DEC, |r| {
        guarded(r.counter("receiving_yards"), r.counter("routes"))
    }),
    derived("tprr", "TPRR", SHARE, |r| {
        guarded(r.counter("targets"), r.counter("routes"))
    }),
    derived("epa_per_route", "EPA/Rt", EPA, |r| {
        guarded(r.counter("receiving_epa"), r.counter("routes"))
    }),
    derived("target_share", "Tgt Share", SHARE, target_share),
    derived("air_yards_share", "Air Share", SHARE, air_yards_share),
    derived("wopr", "WOPR", RATIO, |r| {
        1.5 * stored_or(r, "target_share", target_share)
            + 0.7 * stored_or(r, "air_yards_share", air_yards_share)
    }),
    derived("racr", "RACR", RATIO, |r| {
        air_conversion(r.counter("receiving_yards"), r.counter("receiving_air_yards"))
    }),
    derived("receiving_epa_per_target", "EPA/Tgt", EPA, |r| {
        guarded(r.counter("receiving_epa"), r.counter("targets"))
    }),
    // Per game
    derived("passing_yards_pg", "Pass Yds/G", DEC, |r| {
        per_game(r, r.counter("passing_yards"))
    }),
    derived("passing_tds_pg", "Pass TD/G", DEC, |r| {
        per_game(r, r.counter("passing_tds"))
    }),
    derived("rushing_yards_pg", "Rush Yds/G", DEC, |r| {
        per_game(r, r.counter("rushing_yards"))
    }),
    derived("carries_pg", "Car/G", DEC, |r| per_game(r, r.counter("carries"))),
    derived("receiving_yards_pg", "Rec Yds/G", DEC, |r| {
        per_game(r, r.counter("receiving_yards"))
    }),
    derived("receiving_tds_pg", "Rec TD/G", DEC, |r| {
        per_game(r, r.counter("receiving_tds"))
    }),
    derived("targets_pg", "Tgt/G", DEC, |r| per_game(r, r.counter("targets"))),
    derived("receptions_pg", "Rec/G", DEC, |r| {
        per_game(r, r.counter("receptions"))
    }),
    derived("epa_per_game", "Rec EPA/G", EPA, |r| {
        per_game(r, r.counter("receiving_epa"))
    }),
    // NextGen: passing
    next_gen("ngs_avg_time_to_throw", "TTT", DEC),
    next_gen("ngs_avg_completed_air_yards", "CAY", DEC),
    next_gen("ngs_avg_intended_air_yards", "IAY", DEC),
    next_gen("ngs_avg_air_yards_differential", "AYD", EPA),
    next_gen("ngs_avg_air_yards_to_sticks", "AYTS", EPA),
    next_gen("ngs_aggressiveness", "Aggr%", PCT),
    next_gen("ngs_max_completed_air_distance", "Max CAD", DEC),
    next_gen("ngs_expected_completion_percentage", "xCmp%", PCT),
    next_gen("ngs_completion_percentage_above_expectation", "CPOE", OVER_EXPECTED),
    // NextGen: rushing
    next_gen("ngs_efficiency", "Eff", DEC),
    next_gen("ngs_percent_attempts_gte_eight_defenders", "8+D%", PCT),
    next_gen("ngs_avg_time_to_los", "TLOS", DEC),
    next_gen("ngs_expected_rush_yards", "xRush Yds", INT),
    next_gen("ngs_rush_yards_over_expected", "RYOE", OVER_EXPECTED),
    next_gen("ngs_rush_yards_over_expected_per_att", "RYOE/Att", OVER_EXPECTED),
    next_gen("ngs_rush_pct_over_expected", "ROE%", SHARE),
    // NextGen: receiving
    next_gen("ngs_avg_cushion", "Cushion", DEC),
    next_gen("ngs_avg_separation", "Sep", DEC),
    next_gen("ngs_percent_share_of_intended_air_yards", "TAY%", PCT),
    next_gen("ngs_catch_percentage", "NGS Catch%", PCT),
    next_gen("ngs_avg_yac", "YAC/R", DEC),
    next_gen("ngs_avg_expected_yac", "xYAC/R", DEC),
    next_gen("ngs_avg_yac_above_expectation", "YAC+", OVER_EXPECTED),
];

fn index() -> &'static HashMap<&'static str, &'static MetricDef> {
    static INDEX: OnceLock<HashMap<&'static str, &'static MetricDef>> = OnceLock::new();
    INDEX.get_or_init(|| METRICS.iter().map(|def| (def.id, def)).collect())
}

pub fn metric(id: &str) -> Option<&'static MetricDef> {
    index().get(id).copied()
}

pub fn all_metrics() -> &'static [MetricDef] {
    METRICS
}

pub fn polarity(id: &str) -> Polarity {
    metric(id).map_or(Polarity::HigherIsBetter, |def| def.polarity)
}

/// Fields outside the table sum, except `ngs_*` fields, which average.
pub fn aggregation(id: &str) -> Aggregation {
    match metric(id) {
        Some(def) => def.aggregation,
        None if id.starts_with(NGS_PREFIX) => Aggregation::Mean,
        None => Aggregation::Sum,
    }
}

/// Evaluates a built-in metric, or falls back to the raw property for ids the
/// table does not know (`ngs_*` as missing, everything else as 0).
pub fn evaluate(record: &PlayerSeasonRecord, id: &str) -> Value {
    if let Some(def) = metric(id) {
        return def.evaluate(record);
    }
    raw_property(record, id)
}

pub fn raw_property(record: &PlayerSeasonRecord, id: &str) -> Value {
    if let Some(n) = record.stat(id) {
        return Value::number(n);
    }
    if let Some(text) = record.extra(id) {
        return Value::Text(text.to_string());
    }
    if id.starts_with(NGS_PREFIX) {
        Value::Missing
    } else {
        Value::Number(0.0)
    }
}

/// Built-in metrics plus user-defined expression columns.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    derived: Vec<DerivedColumn>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_derived(derived: Vec<DerivedColumn>) -> Self {
        Self { derived }
    }

    pub fn derived_columns(&self) -> &[DerivedColumn] {
        &self.derived
    }

    fn derived_column(&self, id: &str) -> Option<&DerivedColumn> {
        self.derived.iter().find(|column| column.name == id)
    }

    pub fn evaluate(&self, record: &PlayerSeasonRecord, id: &str) -> Value {
        match self.derived_column(id) {
            Some(column) => column.evaluate(record),
            None => evaluate(record, id),
        }
    }

    /// Numeric view used by filters: text and missing values count as 0.
    pub fn numeric(&self, record: &PlayerSeasonRecord, id: &str) -> f64 {
        self.evaluate(record, id).as_f64().unwrap_or(0.0)
    }

    /// True when the column is a stored property rather than a computation.
    pub fn is_direct(&self, id: &str) -> bool {
        if self.derived_column(id).is_some() {
            return false;
        }
        metric(id).is_none_or(MetricDef::is_direct)
    }

    pub fn format_class(&self, id: &str) -> FormatClass {
        if let Some(column) = self.derived_column(id) {
            return column.format;
        }
        metric(id).map_or(FormatClass::Decimal, |def| def.format)
    }
}

/// `numerator / (denominator || 1)`.
pub fn guarded(numerator: f64, denominator: f64) -> f64 {
    let denominator = if denominator == 0.0 { 1.0 } else { denominator };
    let result = numerator / denominator;
    if result.is_finite() { result } else { 0.0 }
}

fn percent(numerator: f64, denominator: f64) -> f64 {
    guarded(numerator, denominator) * 100.0
}

/// Yards over air yards. Zero air yards is its own case: the ratio is
/// undefined there even when yards were gained.
fn air_conversion(yards: f64, air_yards: f64) -> f64 {
    if air_yards == 0.0 {
        0.0
    } else {
        guarded(yards, air_yards)
    }
}

fn per_game(record: &PlayerSeasonRecord, total: f64) -> f64 {
    guarded(total, record.counter("games"))
}

fn stored_or(
    record: &PlayerSeasonRecord,
    key: &str,
    compute: fn(&PlayerSeasonRecord) -> f64,
) -> f64 {
    record.stat(key).unwrap_or_else(|| compute(record))
}

fn dropbacks(record: &PlayerSeasonRecord) -> f64 {
    record.counter("attempts") + record.counter("sacks")
}

fn touches(record: &PlayerSeasonRecord) -> f64 {
    record.counter("carries") + record.counter("receptions")
}

fn scrimmage_yards(record: &PlayerSeasonRecord) -> f64 {
    record.counter("rushing_yards") + record.counter("receiving_yards")
}

fn fumbles_lost(record: &PlayerSeasonRecord) -> f64 {
    record.counter("sack_fumbles_lost")
        + record.counter("rushing_fumbles_lost")
        + record.counter("receiving_fumbles_lost")
}

fn target_share(record: &PlayerSeasonRecord) -> f64 {
    guarded(record.counter("targets"), record.counter("team_targets"))
}

fn air_yards_share(record: &PlayerSeasonRecord) -> f64 {
    guarded(
        record.counter("receiving_air_yards"),
        record.counter("team_air_yards"),
    )
}

/// Standard scoring table; `ppr` is the per-reception bonus.
pub fn fantasy_points(record: &PlayerSeasonRecord, ppr: f64) -> f64 {
    let two_point = record.counter("passing_2pt_conversions")
        + record.counter("rushing_2pt_conversions")
        + record.counter("receiving_2pt_conversions");
    record.counter("passing_yards") * 0.04 + record.counter("passing_tds") * 4.0
        - record.counter("interceptions") * 2.0
        + record.counter("rushing_yards") * 0.1
        + record.counter("rushing_tds") * 6.0
        + record.counter("receiving_yards") * 0.1
        + record.counter("receiving_tds") * 6.0
        + record.counter("receptions") * ppr
        - stored_or(record, "fumbles_lost", fumbles_lost) * 2.0
        + two_point * 2.0
}

fn passer_rating(record: &PlayerSeasonRecord) -> f64 {
    let attempts = record.counter("attempts");
    if attempts == 0.0 {
        return 0.0;
    }
    let clamp = |component: f64| component.clamp(0.0, 2.375);
    let a = clamp((guarded(record.counter("completions"), attempts) - 0.3) * 5.0);
    let b = clamp((guarded(record.counter("passing_yards"), attempts) - 3.0) * 0.25);
    let c = clamp(guarded(record.counter("passing_tds"), attempts) * 20.0);
    let d = clamp(2.375 - guarded(record.counter("interceptions"), attempts) * 25.0);
    (a + b + c + d) / 6.0 * 100.0
}

fn identity_value(record: &PlayerSeasonRecord, field: IdentityField) -> Value {
    match field {
        IdentityField::Player => Value::Text(record.display_name.clone()),
        IdentityField::Team => Value::Text(record.team.clone()),
        IdentityField::Position => Value::Text(record.position.as_str().to_string()),
        IdentityField::Season => record
            .season
            .map_or(Value::Missing, |season| Value::Number(f64::from(season))),
    }
}
