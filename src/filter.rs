use itertools::{Itertools, MinMaxResult};
use log::debug;

use crate::{
    data::{Value, parse_numeric_text},
    error::{StatError, StatResult},
    metrics::Evaluator,
    record::{PlayerSeasonRecord, PositionGroup},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub operator: ComparisonOperator,
    pub raw_value: String,
}

pub fn parse_filters(filters: &[String]) -> StatResult<Vec<FilterCondition>> {
    filters.iter().map(|f| parse_filter(f)).collect()
}

fn parse_filter(filter: &str) -> StatResult<FilterCondition> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(StatError::Filter {
            expression: filter.to_string(),
            reason: "empty expression".to_string(),
        });
    }

    let lowered = trimmed.to_ascii_lowercase();
    for (needle, op) in [
        (" contains ", ComparisonOperator::Contains),
        (" startswith ", ComparisonOperator::StartsWith),
        (" endswith ", ComparisonOperator::EndsWith),
    ] {
        if let Some(idx) = lowered.find(needle) {
            let (left, right_with_space) = trimmed.split_at(idx);
            let right = right_with_space[needle.len()..].trim();
            return Ok(FilterCondition {
                column: left.trim().to_string(),
                operator: op,
                raw_value: unquote(right).to_string(),
            });
        }
    }

    for (needle, op) in [
        ("!=", ComparisonOperator::NotEq),
        (">=", ComparisonOperator::Ge),
        ("<=", ComparisonOperator::Le),
        ("=", ComparisonOperator::Eq),
        (">", ComparisonOperator::Gt),
        ("<", ComparisonOperator::Lt),
    ] {
        if let Some(idx) = trimmed.find(needle) {
            let left = trimmed[..idx].trim();
            let right = trimmed[idx + needle.len()..].trim();
            if left.is_empty() {
                return Err(StatError::Filter {
                    expression: trimmed.to_string(),
                    reason: "missing a column name".to_string(),
                });
            }
            return Ok(FilterCondition {
                column: left.to_string(),
                operator: op,
                raw_value: unquote(right).to_string(),
            });
        }
    }

    Err(StatError::Filter {
        expression: trimmed.to_string(),
        reason: "no comparison operator found".to_string(),
    })
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

impl FilterCondition {
    /// Numbers compare numerically; text compares case-insensitively.
    /// A missing value only satisfies `!=`.
    pub fn matches(&self, record: &PlayerSeasonRecord, evaluator: &Evaluator) -> bool {
        use ComparisonOperator::*;
        let value = evaluator.evaluate(record, &self.column);
        match self.operator {
            Contains | StartsWith | EndsWith => {
                let haystack = value.as_display().to_lowercase();
                let needle = self.raw_value.to_lowercase();
                match self.operator {
                    Contains => haystack.contains(&needle),
                    StartsWith => haystack.starts_with(&needle),
                    _ => haystack.ends_with(&needle),
                }
            }
            Eq | NotEq | Gt | Ge | Lt | Le => {
                let ordering = match (&value, parse_numeric_text(&self.raw_value)) {
                    (Value::Missing, _) => return self.operator == NotEq,
                    (Value::Number(left), Some(right)) => left.partial_cmp(&right),
                    (Value::Text(left), Some(right)) => {
                        match parse_numeric_text(left) {
                            Some(left) => left.partial_cmp(&right),
                            None => Some(left.to_lowercase().cmp(&self.raw_value.to_lowercase())),
                        }
                    }
                    (left, None) => Some(
                        left.as_display()
                            .to_lowercase()
                            .cmp(&self.raw_value.to_lowercase()),
                    ),
                };
                let Some(ordering) = ordering else {
                    return false;
                };
                match self.operator {
                    Eq => ordering.is_eq(),
                    NotEq => ordering.is_ne(),
                    Gt => ordering.is_gt(),
                    Ge => ordering.is_ge(),
                    Lt => ordering.is_lt(),
                    _ => ordering.is_le(),
                }
            }
        }
    }
}

/// Volume stat that gates each position's view.
pub fn threshold_metric(position: PositionGroup) -> &'static str {
    match position {
        PositionGroup::Qb => "attempts",
        PositionGroup::Rb => "carries",
        PositionGroup::Wr | PositionGroup::Te => "routes",
        PositionGroup::All => "fantasy_points_ppr",
    }
}

pub fn default_threshold(position: PositionGroup) -> f64 {
    match position {
        PositionGroup::Qb => 50.0,
        PositionGroup::Rb => 20.0,
        PositionGroup::Wr | PositionGroup::Te => 50.0,
        PositionGroup::All => 20.0,
    }
}

/// Position and threshold travel together: the threshold metric key is a
/// function of the position, so the only way to change the position is
/// [`FilterState::set_position`], which resets both.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    position: PositionGroup,
    threshold_metric: &'static str,
    threshold_value: f64,
    teams: Vec<String>,
    conditions: Vec<FilterCondition>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::for_position(PositionGroup::All)
    }
}

impl FilterState {
    pub fn for_position(position: PositionGroup) -> Self {
        Self {
            position,
            threshold_metric: threshold_metric(position),
            threshold_value: default_threshold(position),
            teams: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn position(&self) -> PositionGroup {
        self.position
    }

    pub fn threshold_metric(&self) -> &'static str {
        self.threshold_metric
    }

    pub fn threshold_value(&self) -> f64 {
        self.threshold_value
    }

    pub fn teams(&self) -> &[String] {
        &self.teams
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn set_position(&mut self, position: PositionGroup) {
        self.position = position;
        self.threshold_metric = threshold_metric(position);
        self.threshold_value = default_threshold(position);
    }

    pub fn set_threshold(&mut self, value: f64) {
        self.threshold_value = if value.is_finite() { value } else { 0.0 };
    }

    pub fn set_teams<I, S>(&mut self, teams: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.teams = teams
            .into_iter()
            .map(|team| team.as_ref().trim().to_ascii_uppercase())
            .filter(|team| !team.is_empty())
            .collect();
    }

    pub fn set_conditions(&mut self, conditions: Vec<FilterCondition>) {
        self.conditions = conditions;
    }
}

/// Indices of the records that pass every stage, in input order.
///
/// Stages run position first, so threshold bounds and later stages only
/// ever see the position-relevant subset.
pub fn filter(
    records: &[PlayerSeasonRecord],
    state: &FilterState,
    evaluator: &Evaluator,
) -> Vec<usize> {
    let by_position = position_subset(records, state.position);
    let passed = by_position
        .into_iter()
        .filter(|&idx| {
            evaluator.numeric(&records[idx], state.threshold_metric) >= state.threshold_value
        })
        .filter(|&idx| {
            state.teams.is_empty()
                || state
                    .teams
                    .iter()
                    .any(|team| records[idx].team.eq_ignore_ascii_case(team))
        })
        .filter(|&idx| {
            state
                .conditions
                .iter()
                .all(|condition| condition.matches(&records[idx], evaluator))
        })
        .collect::<Vec<_>>();
    debug!(
        "Filtered {} of {} records ({} >= {}, position {})",
        passed.len(),
        records.len(),
        state.threshold_metric,
        state.threshold_value,
        state.position
    );
    passed
}

fn position_subset(records: &[PlayerSeasonRecord], position: PositionGroup) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| position.matches(&record.position))
        .map(|(idx, _)| idx)
        .collect()
}

/// Min and max of the threshold metric over the position subset, for
/// sizing a threshold control. `(0, 0)` when the subset is empty.
pub fn threshold_bounds(
    records: &[PlayerSeasonRecord],
    position: PositionGroup,
    evaluator: &Evaluator,
) -> (f64, f64) {
    let metric = threshold_metric(position);
    let values = position_subset(records, position)
        .into_iter()
        .map(|idx| evaluator.numeric(&records[idx], metric));
    match values.minmax() {
        MinMaxResult::NoElements => (0.0, 0.0),
        MinMaxResult::OneElement(value) => (value, value),
        MinMaxResult::MinMax(min, max) => (min, max),
    }
}
