//! Player-season records as the engine sees them.
//!
//! A record carries four identity fields plus two open maps: numeric stats
//! (counters, backend-precomputed metrics and `ngs_*` NextGen fields) and
//! any non-numeric extras. Which map a key lands in is decided once at load
//! time; the evaluator only ever reads.

use std::{collections::HashMap, fmt};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{StatError, StatResult};

pub const NGS_PREFIX: &str = "ngs_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Position {
    Qb,
    Rb,
    Wr,
    Te,
    Other(String),
}

impl Position {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "QB" => Position::Qb,
            "RB" | "HB" => Position::Rb,
            "WR" => Position::Wr,
            "TE" => Position::Te,
            _ => Position::Other(trimmed.to_ascii_uppercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Position::Qb => "QB",
            Position::Rb => "RB",
            Position::Wr => "WR",
            Position::Te => "TE",
            Position::Other(other) => other,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position selector for a view. `All` disables the position stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPERCASE")]
pub enum PositionGroup {
    #[default]
    All,
    Qb,
    Rb,
    Wr,
    Te,
}

impl PositionGroup {
    pub fn matches(self, position: &Position) -> bool {
        match self {
            PositionGroup::All => true,
            PositionGroup::Qb => *position == Position::Qb,
            PositionGroup::Rb => *position == Position::Rb,
            PositionGroup::Wr => *position == Position::Wr,
            PositionGroup::Te => *position == Position::Te,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PositionGroup::All => "ALL",
            PositionGroup::Qb => "QB",
            PositionGroup::Rb => "RB",
            PositionGroup::Wr => "WR",
            PositionGroup::Te => "TE",
        }
    }

    /// Receiving views show two decimals for plain decimal columns.
    pub fn is_receiving(self) -> bool {
        matches!(self, PositionGroup::Wr | PositionGroup::Te)
    }
}

impl fmt::Display for PositionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field as delivered by the data source, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Number(f64),
    Text(String),
    Null,
}

impl RawField {
    /// CSV cells arrive as text; empty cells are absent data.
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "NA" {
            return RawField::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => RawField::Number(n),
            _ => RawField::Text(trimmed.to_string()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawField::Null,
            serde_json::Value::Bool(b) => RawField::Number(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::Number(n) => n
                .as_f64()
                .filter(|n| n.is_finite())
                .map_or(RawField::Null, RawField::Number),
            serde_json::Value::String(s) => RawField::from_cell(s),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => RawField::Null,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            RawField::Text(s) => Some(s),
            RawField::Number(n) if n.fract() == 0.0 => Some(format!("{n:.0}")),
            RawField::Number(n) => Some(n.to_string()),
            RawField::Null => None,
        }
    }
}

/// Upstream spellings folded onto the names the metric table uses.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("recent_team", "team"),
    ("team_abbr", "team"),
    ("player_display_name", "display_name"),
    ("player_name", "display_name"),
    ("name", "display_name"),
    ("gsis_id", "player_id"),
    ("sacks_suffered", "sacks"),
    ("sack_yards_lost", "sack_yards"),
    ("passing_interceptions", "interceptions"),
    ("year", "season"),
];

pub fn canonical_field(name: &str) -> &str {
    let trimmed = name.trim();
    FIELD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(trimmed)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSeasonRecord {
    pub player_id: String,
    pub display_name: String,
    pub team: String,
    pub position: Position,
    pub season: Option<i32>,
    stats: HashMap<String, f64>,
    extras: HashMap<String, String>,
}

impl PlayerSeasonRecord {
    pub fn new(
        player_id: impl Into<String>,
        display_name: impl Into<String>,
        team: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            display_name: display_name.into(),
            team: team.into(),
            position,
            season: None,
            stats: HashMap::new(),
            extras: HashMap::new(),
        }
    }

    pub fn with_season(mut self, season: i32) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_stat(mut self, key: &str, value: f64) -> Self {
        self.stats.insert(canonical_field(key).to_string(), value);
        self
    }

    pub fn with_text(mut self, key: &str, value: &str) -> Self {
        self.extras
            .insert(canonical_field(key).to_string(), value.to_string());
        self
    }

    /// Stored numeric value, `None` when the source omitted it.
    pub fn stat(&self, key: &str) -> Option<f64> {
        self.stats.get(key).copied()
    }

    /// Counter semantics: absent means zero.
    pub fn counter(&self, key: &str) -> f64 {
        self.stat(key).unwrap_or(0.0)
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }

    pub fn stat_keys(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    pub fn extras(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extras
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn has_next_gen_stats(&self) -> bool {
        self.stats.keys().any(|key| key.starts_with(NGS_PREFIX))
            || self.extras.keys().any(|key| key.starts_with(NGS_PREFIX))
    }

    /// Builds a record from source fields, applying alias normalization.
    /// `index` is the record's position in the source, used for errors.
    pub fn from_fields<I>(index: usize, fields: I) -> StatResult<Self>
    where
        I: IntoIterator<Item = (String, RawField)>,
    {
        let mut player_id = None;
        let mut display_name = None;
        let mut team = None;
        let mut position = None;
        let mut position_group = None;
        let mut season = None;
        let mut stats = HashMap::new();
        let mut extras = HashMap::new();

        for (name, field) in fields {
            let key = canonical_field(&name);
            match key {
                "player_id" => player_id = player_id.or(field.into_text()),
                "display_name" => display_name = display_name.or(field.into_text()),
                "team" => team = team.or(field.into_text()),
                "position" => position = field.into_text(),
                "position_group" => position_group = field.into_text(),
                "season" => {
                    if let RawField::Number(n) = field {
                        season = Some(n as i32);
                    }
                }
                _ => match field {
                    RawField::Number(n) => {
                        stats.insert(key.to_string(), n);
                    }
                    RawField::Text(text) => {
                        extras.insert(key.to_string(), text);
                    }
                    RawField::Null => {}
                },
            }
        }

        let (player_id, display_name) = match (player_id, display_name) {
            (Some(id), Some(name)) => (id, name),
            (Some(id), None) => (id.clone(), id),
            (None, Some(name)) => (name.clone(), name),
            (None, None) => {
                return Err(StatError::InvalidRecord {
                    index,
                    reason: "missing both player_id and display_name".to_string(),
                });
            }
        };
        let position = position
            .or(position_group)
            .map(|raw| Position::parse(&raw))
            .unwrap_or_else(|| Position::Other(String::new()));

        Ok(Self {
            player_id,
            display_name,
            team: team.unwrap_or_default(),
            position,
            season,
            stats,
            extras,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, RawField)]) -> Vec<(String, RawField)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn from_fields_applies_aliases() {
        let record = PlayerSeasonRecord::from_fields(
            0,
            fields(&[
                ("player_id", RawField::Text("00-0036389".into())),
                ("player_display_name", RawField::Text("Jalen Hurts".into())),
                ("recent_team", RawField::Text("PHI".into())),
                ("position", RawField::Text("qb".into())),
                ("sacks_suffered", RawField::Number(38.0)),
                ("year", RawField::Number(2023.0)),
            ]),
        )
        .expect("valid record");
        assert_eq!(record.display_name, "Jalen Hurts");
        assert_eq!(record.team, "PHI");
        assert_eq!(record.position, Position::Qb);
        assert_eq!(record.season, Some(2023));
        assert_eq!(record.stat("sacks"), Some(38.0));
    }

    #[test]
    fn from_fields_requires_some_identity() {
        let err = PlayerSeasonRecord::from_fields(
            7,
            fields(&[("carries", RawField::Number(10.0))]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Record 7"));
    }

    #[test]
    fn null_fields_stay_absent() {
        let record = PlayerSeasonRecord::from_fields(
            0,
            fields(&[
                ("display_name", RawField::Text("A".into())),
                ("ngs_avg_separation", RawField::Null),
            ]),
        )
        .expect("valid record");
        assert_eq!(record.stat("ngs_avg_separation"), None);
        assert!(!record.has_next_gen_stats());
        assert_eq!(record.counter("carries"), 0.0);
    }

    #[test]
    fn cells_parse_numbers_and_blanks() {
        assert_eq!(RawField::from_cell(" 47 "), RawField::Number(47.0));
        assert_eq!(RawField::from_cell(""), RawField::Null);
        assert_eq!(RawField::from_cell("KC"), RawField::Text("KC".into()));
    }

    #[test]
    fn position_group_matches_exactly() {
        assert!(PositionGroup::All.matches(&Position::Other("K".into())));
        assert!(PositionGroup::Rb.matches(&Position::parse("RB")));
        assert!(!PositionGroup::Wr.matches(&Position::Te));
    }
}
