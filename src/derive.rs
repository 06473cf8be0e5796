use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprResult, Function,
    HashMapContext, Node, Operator, Value as EvalValue,
};
use log::debug;

use crate::{
    data::{Value, normalize_column_name, value_to_evalexpr},
    error::{StatError, StatResult},
    format::FormatClass,
    metrics,
    record::PlayerSeasonRecord,
};

/// Function every `/` in an expression is rewritten to.
const DIVIDE: &str = "div";

/// A user-defined column such as `td_per_target=receiving_tds / targets`.
///
/// Identifiers in the expression resolve through the built-in metric table,
/// so any metric id or raw record field can be referenced.
#[derive(Debug, Clone)]
pub struct DerivedColumn {
    pub name: String,
    pub expression: String,
    pub format: FormatClass,
    tree: Node,
    variables: Vec<String>,
}

impl DerivedColumn {
    pub fn parse(spec: &str) -> StatResult<Self> {
        let mut parts = spec.splitn(2, '=');
        let name = parts
            .next()
            .map(normalize_column_name)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StatError::Derive {
                name: spec.to_string(),
                reason: "missing a name".to_string(),
            })?;
        let expression = parts
            .next()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StatError::Derive {
                name: name.clone(),
                reason: "missing an expression".to_string(),
            })?;
        Self::new(&name, expression, FormatClass::Decimal)
    }

    /// The name is normalized the same way `parse` normalizes it.
    pub fn new(name: &str, expression: &str, format: FormatClass) -> StatResult<Self> {
        let name = normalize_column_name(name);
        if name.is_empty() {
            return Err(StatError::Derive {
                name,
                reason: "missing a name".to_string(),
            });
        }
        let name = name.as_str();
        if metrics::metric(name).is_some() {
            return Err(StatError::Derive {
                name: name.to_string(),
                reason: "name collides with a built-in metric".to_string(),
            });
        }
        let mut tree: Node = evalexpr::build_operator_tree(expression).map_err(|err| {
            StatError::Derive {
                name: name.to_string(),
                reason: err.to_string(),
            }
        })?;
        route_division(&mut tree);
        let mut variables = tree
            .iter_variable_identifiers()
            .map(str::to_string)
            .collect::<Vec<_>>();
        variables.sort();
        variables.dedup();
        Ok(Self {
            name: name.to_string(),
            expression: expression.to_string(),
            format,
            tree,
            variables,
        })
    }

    pub fn with_format(mut self, format: FormatClass) -> Self {
        self.format = format;
        self
    }

    /// Evaluates against one record. Failures (type errors, missing inputs)
    /// come back as [`Value::Missing`].
    pub fn evaluate(&self, record: &PlayerSeasonRecord) -> Value {
        let mut context: HashMapContext = HashMapContext::new();
        if context
            .set_function(DIVIDE.into(), Function::new(divide))
            .is_err()
        {
            return Value::Missing;
        }
        for variable in &self.variables {
            let value = metrics::evaluate(record, variable);
            if context
                .set_value(variable.clone(), value_to_evalexpr(&value))
                .is_err()
            {
                return Value::Missing;
            }
        }
        match self.tree.eval_with_context(&context) {
            Ok(EvalValue::Float(f)) => Value::number(f),
            Ok(EvalValue::Int(i)) => Value::number(i as f64),
            Ok(EvalValue::Boolean(b)) => Value::Number(if b { 1.0 } else { 0.0 }),
            Ok(EvalValue::String(s)) => Value::Text(s),
            Ok(_) => Value::Missing,
            Err(err) => {
                debug!(
                    "Derived column '{}' failed for {}: {err}",
                    self.name, record.player_id
                );
                Value::Missing
            }
        }
    }
}

/// Replaces each `a / b` node with `div(a, b)` so expressions share the
/// metric table's zero-denominator rule.
fn route_division(node: &mut Node) {
    for child in node.children_mut() {
        route_division(child);
    }
    if matches!(node.operator(), Operator::Div) {
        let mut operands = node.clone();
        *operands.operator_mut() = Operator::Tuple;
        *node.operator_mut() = Operator::FunctionIdentifier {
            identifier: DIVIDE.to_string(),
        };
        *node.children_mut() = vec![operands];
    }
}

fn divide(argument: &EvalValue) -> EvalexprResult<EvalValue> {
    let operands = argument.as_fixed_len_tuple(2)?;
    let numerator = operands[0].as_number()?;
    let denominator = operands[1].as_number()?;
    Ok(EvalValue::Float(metrics::guarded(numerator, denominator)))
}

pub fn parse_derived_columns(specs: &[String]) -> StatResult<Vec<DerivedColumn>> {
    specs
        .iter()
        .map(|spec| DerivedColumn::parse(spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Position;

    fn receiver() -> PlayerSeasonRecord {
        PlayerSeasonRecord::new("wr1", "Wideout", "CIN", Position::Wr)
            .with_stat("targets", 150.0)
            .with_stat("receiving_tds", 12.0)
            .with_stat("routes", 600.0)
    }

    #[test]
    fn parse_splits_name_and_expression() {
        let column = DerivedColumn::parse("TD per Tgt = receiving_tds / targets").expect("parse");
        assert_eq!(column.name, "td_per_tgt");
        assert_eq!(column.expression, "receiving_tds / targets");
    }

    #[test]
    fn evaluate_binds_metrics_and_raw_fields() {
        let column = DerivedColumn::parse("td_per_target=receiving_tds / targets").expect("parse");
        assert_eq!(column.evaluate(&receiver()), Value::Number(0.08));
        let derived = DerivedColumn::parse("routes_x_tprr=routes * tprr").expect("parse");
        assert_eq!(derived.evaluate(&receiver()), Value::Number(150.0));
    }

    #[test]
    fn missing_inputs_evaluate_to_missing() {
        let column = DerivedColumn::parse("sep2=ngs_avg_separation * 2").expect("parse");
        assert_eq!(column.evaluate(&receiver()), Value::Missing);
    }

    #[test]
    fn division_by_zero_uses_metric_denominator_rule() {
        let column = DerivedColumn::parse("per_carry=receiving_tds / carries").expect("parse");
        assert_eq!(column.evaluate(&receiver()), Value::Number(12.0));
        let nested =
            DerivedColumn::parse("nested=(receiving_tds / carries) / targets").expect("parse");
        assert_eq!(nested.evaluate(&receiver()), Value::Number(0.08));
    }

    #[test]
    fn expression_division_matches_built_in_ratio() {
        let column = DerivedColumn::parse("my_ypc=rushing_yards / carries").expect("parse");
        let idle = PlayerSeasonRecord::new("rb0", "Idle Back", "NYG", Position::Rb)
            .with_stat("rushing_yards", 30.0);
        let busy = PlayerSeasonRecord::new("rb1", "Busy Back", "NYG", Position::Rb)
            .with_stat("rushing_yards", 470.0)
            .with_stat("carries", 100.0);
        for record in [&idle, &busy] {
            assert_eq!(
                column.evaluate(record),
                metrics::evaluate(record, "yards_per_carry")
            );
        }
    }

    #[test]
    fn integer_literals_divide_as_floats() {
        let column = DerivedColumn::parse("half=5 / 2").expect("parse");
        assert_eq!(column.evaluate(&receiver()), Value::Number(2.5));
    }

    #[test]
    fn parse_rejects_bad_specs() {
        assert!(DerivedColumn::parse("no_expression=").is_err());
        assert!(DerivedColumn::parse("yprr=routes").is_err());
        assert!(DerivedColumn::parse("broken=(targets +").is_err());
    }
}
