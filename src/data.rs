use std::{cmp::Ordering, fmt, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Output of the metric evaluator for a single cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    /// Data the source did not provide (NextGen fields, failing expressions).
    Missing,
}

impl Value {
    /// Wraps a computed number, collapsing `NaN`/`Infinity` to 0.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Value::Number(value)
        } else {
            Value::Number(0.0)
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) | Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Raw (unformatted) display used by raw exports and debug output.
    pub fn as_display(&self) -> String {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Value::Text(s) => s.clone(),
            Value::Missing => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Precomputed, totally ordered sort key for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(f64),
    Text(String),
    Missing,
}

impl SortKey {
    /// Builds the key for an evaluated cell. Text that still carries a number
    /// once decorations are stripped (`"64.2%"`, `"1,204"`) sorts numerically.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => SortKey::Number(*n),
            Value::Missing => SortKey::Missing,
            Value::Text(text) => match parse_numeric_text(text) {
                Some(n) => SortKey::Number(n),
                None => SortKey::Text(text.to_lowercase()),
            },
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SortKey::Missing)
    }

    /// Orders present keys: numbers before text. Missing keys are handled by
    /// the sort engine so they stay last in both directions.
    pub fn cmp_present(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => Ordering::Greater,
            (_, SortKey::Missing) => Ordering::Less,
        }
    }
}

fn non_numeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("static pattern compiles"))
}

/// Strips everything but digits, `.` and `-` and parses what is left.
pub fn parse_numeric_text(text: &str) -> Option<f64> {
    let cleaned = non_numeric().replace_all(text, "");
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn value_to_evalexpr(value: &Value) -> evalexpr::Value {
    match value {
        Value::Number(n) => evalexpr::Value::Float(*n),
        Value::Text(s) => evalexpr::Value::String(s.clone()),
        Value::Missing => evalexpr::Value::Empty,
    }
}
