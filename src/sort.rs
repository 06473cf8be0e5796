//! Stable, non-mutating row ordering.
//!
//! Keys are computed once per row, then a single `sort_by` pass compares the
//! precomputed keys. The evaluator is never called from inside the
//! comparator.

use std::cmp::Ordering;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    data::{SortKey, Value},
    error::{StatError, StatResult},
    metrics::Evaluator,
    record::PlayerSeasonRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_ascending(self) -> bool {
        matches!(self, SortDirection::Asc)
    }

    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub column_id: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(column_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column_id: column_id.into(),
            direction,
        }
    }

    /// `column` or `column:asc` / `column:desc`. Direction defaults to desc.
    pub fn parse(spec: &str) -> StatResult<Self> {
        let (column, direction) = match spec.split_once(':') {
            Some((column, direction)) => {
                let direction = match direction.trim().to_ascii_lowercase().as_str() {
                    "asc" => SortDirection::Asc,
                    "desc" => SortDirection::Desc,
                    other => {
                        return Err(StatError::Sort {
                            spec: spec.to_string(),
                            reason: format!("unknown direction '{other}'"),
                        });
                    }
                };
                (column.trim(), direction)
            }
            None => (spec.trim(), SortDirection::Desc),
        };
        if column.is_empty() {
            return Err(StatError::Sort {
                spec: spec.to_string(),
                reason: "missing a column".to_string(),
            });
        }
        Ok(Self::new(column, direction))
    }

    /// Selecting the active column flips direction; any other column becomes
    /// active in descending order.
    pub fn toggle(&mut self, column_id: &str) {
        if self.column_id == column_id {
            self.direction = self.direction.flipped();
        } else {
            self.column_id = column_id.to_string();
            self.direction = SortDirection::Desc;
        }
    }
}

/// Missing keys go last regardless of direction.
pub fn compare_keys(a: &SortKey, b: &SortKey, direction: SortDirection) -> Ordering {
    match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = a.cmp_present(b);
            if direction.is_ascending() {
                ordering
            } else {
                ordering.reverse()
            }
        }
    }
}

/// Keys for `rows`, computed through the evaluator.
pub fn evaluated_keys(
    rows: &[usize],
    records: &[PlayerSeasonRecord],
    column_id: &str,
    evaluator: &Evaluator,
) -> Vec<SortKey> {
    rows.iter()
        .map(|&idx| SortKey::from_value(&evaluator.evaluate(&records[idx], column_id)))
        .collect()
}

/// Keys for a stored column, read straight off the record. Rows that lack
/// the field go through the evaluator so defaults stay identical.
pub fn direct_keys(
    rows: &[usize],
    records: &[PlayerSeasonRecord],
    column_id: &str,
    evaluator: &Evaluator,
) -> Vec<SortKey> {
    rows.iter()
        .map(|&idx| {
            let record = &records[idx];
            match record.stat(column_id) {
                Some(n) => SortKey::from_value(&Value::number(n)),
                None => SortKey::from_value(&evaluator.evaluate(record, column_id)),
            }
        })
        .collect()
}

/// Orders `rows` by precomputed `keys`. Ties keep their input order.
pub fn order_by_keys(rows: &[usize], keys: Vec<SortKey>, direction: SortDirection) -> Vec<usize> {
    let mut keyed = rows.iter().copied().zip(keys).collect::<Vec<_>>();
    keyed.sort_by(|a, b| compare_keys(&a.1, &b.1, direction));
    keyed.into_iter().map(|(idx, _)| idx).collect()
}

/// Returns `rows` reordered by `state`; the input slice is untouched.
pub fn sort(
    rows: &[usize],
    records: &[PlayerSeasonRecord],
    state: &SortState,
    evaluator: &Evaluator,
) -> Vec<usize> {
    let keys = if evaluator.is_direct(&state.column_id) {
        direct_keys(rows, records, &state.column_id, evaluator)
    } else {
        evaluated_keys(rows, records, &state.column_id, evaluator)
    };
    order_by_keys(rows, keys, state.direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Position;

    fn fantasy(points: &[f64]) -> Vec<PlayerSeasonRecord> {
        points
            .iter()
            .enumerate()
            .map(|(i, fp)| {
                PlayerSeasonRecord::new(format!("p{i}"), format!("P{i}"), "KC", Position::Wr)
                    .with_stat("fantasy_points_ppr", *fp)
            })
            .collect()
    }

    #[test]
    fn ties_keep_original_order() {
        let records = fantasy(&[20.0, 20.0, 15.0]);
        let state = SortState::new("fantasy_points_ppr", SortDirection::Desc);
        assert_eq!(sort(&[0, 1, 2], &records, &state, &Evaluator::new()), vec![0, 1, 2]);
        let asc = SortState::new("fantasy_points_ppr", SortDirection::Asc);
        assert_eq!(sort(&[0, 1, 2], &records, &asc, &Evaluator::new()), vec![2, 0, 1]);
    }

    #[test]
    fn missing_keys_sort_last_both_ways() {
        let records = vec![
            PlayerSeasonRecord::new("a", "A", "KC", Position::Wr).with_stat("ngs_avg_separation", 2.0),
            PlayerSeasonRecord::new("b", "B", "KC", Position::Wr),
            PlayerSeasonRecord::new("c", "C", "KC", Position::Wr).with_stat("ngs_avg_separation", 3.5),
        ];
        let evaluator = Evaluator::new();
        let desc = SortState::new("ngs_avg_separation", SortDirection::Desc);
        let asc = SortState::new("ngs_avg_separation", SortDirection::Asc);
        assert_eq!(sort(&[0, 1, 2], &records, &desc, &evaluator), vec![2, 0, 1]);
        assert_eq!(sort(&[0, 1, 2], &records, &asc, &evaluator), vec![0, 2, 1]);
    }

    #[test]
    fn toggle_flips_or_resets() {
        let mut state = SortState::new("carries", SortDirection::Desc);
        state.toggle("carries");
        assert_eq!(state.direction, SortDirection::Asc);
        state.toggle("rushing_yards");
        assert_eq!(state, SortState::new("rushing_yards", SortDirection::Desc));
    }

    #[test]
    fn text_columns_sort_alphabetically_ignoring_case() {
        let records = vec![
            PlayerSeasonRecord::new("a", "zed", "KC", Position::Wr),
            PlayerSeasonRecord::new("b", "Amy", "KC", Position::Wr),
        ];
        let state = SortState::new("player", SortDirection::Asc);
        assert_eq!(sort(&[0, 1], &records, &state, &Evaluator::new()), vec![1, 0]);
    }

    #[test]
    fn parse_accepts_optional_direction() {
        assert_eq!(
            SortState::parse("yprr").expect("parse"),
            SortState::new("yprr", SortDirection::Desc)
        );
        assert_eq!(
            SortState::parse("player:ASC").expect("parse"),
            SortState::new("player", SortDirection::Asc)
        );
        assert!(SortState::parse("yprr:up").is_err());
        assert!(SortState::parse(":asc").is_err());
    }
}
