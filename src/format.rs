//! Display formatting for evaluated cells.
//!
//! Formatting is kept apart from evaluation: sort keys, ranges and raw
//! exports work on [`Value`], and only rendering and formatted exports pass
//! through here.

use serde::{Deserialize, Serialize};

use crate::{data::Value, record::PositionGroup};

pub const MISSING_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatClass {
    Text,
    /// Rounded, thousands-separated.
    Integer,
    /// Already on a 0-100 scale.
    Percentage,
    /// Stored as 0-1, shown as a percentage.
    Share,
    Ratio,
    SignedDecimal { explicit_plus: bool },
    /// Plain decimal; precision depends on the view's position group.
    Decimal,
}

impl FormatClass {
    pub fn is_numeric(self) -> bool {
        !matches!(self, FormatClass::Text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormatClass::Text => "text",
            FormatClass::Integer => "integer",
            FormatClass::Percentage => "percentage",
            FormatClass::Share => "share",
            FormatClass::Ratio => "ratio",
            FormatClass::SignedDecimal { explicit_plus: true } => "signed+",
            FormatClass::SignedDecimal { explicit_plus: false } => "signed",
            FormatClass::Decimal => "decimal",
        }
    }
}

pub fn format_value(value: &Value, class: FormatClass, view: PositionGroup) -> String {
    let number = match value {
        Value::Missing => return MISSING_PLACEHOLDER.to_string(),
        Value::Text(text) => return text.clone(),
        Value::Number(n) => *n,
    };
    match class {
        FormatClass::Text => Value::Number(number).as_display(),
        FormatClass::Integer => format_integer(number),
        FormatClass::Percentage => format!("{number:.1}%"),
        FormatClass::Share => format!("{:.1}%", number * 100.0),
        FormatClass::Ratio => format!("{number:.2}"),
        FormatClass::SignedDecimal { explicit_plus } => {
            if explicit_plus && number > 0.0 {
                format!("+{number:.2}")
            } else {
                format!("{number:.2}")
            }
        }
        FormatClass::Decimal => {
            if view.is_receiving() {
                format!("{number:.2}")
            } else {
                format!("{number:.1}")
            }
        }
    }
}

pub fn format_integer(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_grouped() {
        assert_eq!(format_integer(0.0), "0");
        assert_eq!(format_integer(999.4), "999");
        assert_eq!(format_integer(1204.0), "1,204");
        assert_eq!(format_integer(-4512.6), "-4,513");
        assert_eq!(format_integer(1_000_000.0), "1,000,000");
    }

    #[test]
    fn zero_percentage_formats_without_nan() {
        let formatted = format_value(
            &Value::Number(0.0),
            FormatClass::Percentage,
            PositionGroup::Qb,
        );
        assert_eq!(formatted, "0.0%");
    }

    #[test]
    fn share_is_scaled_to_percent() {
        let formatted = format_value(&Value::Number(0.283), FormatClass::Share, PositionGroup::Wr);
        assert_eq!(formatted, "28.3%");
    }

    #[test]
    fn signed_decimal_optionally_shows_plus() {
        let plus = FormatClass::SignedDecimal { explicit_plus: true };
        let plain = FormatClass::SignedDecimal { explicit_plus: false };
        assert_eq!(format_value(&Value::Number(2.5), plus, PositionGroup::Qb), "+2.50");
        assert_eq!(format_value(&Value::Number(-1.0), plus, PositionGroup::Qb), "-1.00");
        assert_eq!(format_value(&Value::Number(2.5), plain, PositionGroup::Qb), "2.50");
    }

    #[test]
    fn decimal_precision_depends_on_view() {
        let value = Value::Number(4.666);
        assert_eq!(format_value(&value, FormatClass::Decimal, PositionGroup::Wr), "4.67");
        assert_eq!(format_value(&value, FormatClass::Decimal, PositionGroup::Te), "4.67");
        assert_eq!(format_value(&value, FormatClass::Decimal, PositionGroup::Rb), "4.7");
        assert_eq!(format_value(&value, FormatClass::Decimal, PositionGroup::All), "4.7");
    }

    #[test]
    fn missing_uses_placeholder() {
        assert_eq!(
            format_value(&Value::Missing, FormatClass::Integer, PositionGroup::Wr),
            "-"
        );
    }
}
