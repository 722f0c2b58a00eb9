use crate::context::ConditionEvaluator;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const EXPRESSION_PATTERN: &str =
    r"^\$\{\s*(!)?\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*(?:(==|!=)\s*(.+?))?\s*\}$";

/// Small `${...}` expression dialect for if-parts:
/// `${flag}`, `${!flag}`, `${name == literal}`, `${name != literal}` plus bare `true`/`false`.
/// Dotted names walk into object variables. Missing variables read as `null`.
#[derive(Debug, Default)]
pub struct ExpressionConditionEvaluator {
    pattern: OnceLock<Result<Regex, regex::Error>>,
}

impl ExpressionConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(&self) -> Result<&Regex, String> {
        self.pattern
            .get_or_init(|| Regex::new(EXPRESSION_PATTERN))
            .as_ref()
            .map_err(|err| format!("invalid_regex:{err}"))
    }
}

impl ConditionEvaluator for ExpressionConditionEvaluator {
    fn evaluate(&self, condition: &str, variables: &Map<String, Value>) -> Result<bool, String> {
        let condition = condition.trim();
        match condition {
            "true" => return Ok(true),
            "false" => return Ok(false),
            _ => {}
        }

        let captures = self
            .pattern()?
            .captures(condition)
            .ok_or_else(|| format!("unsupported expression `{condition}`"))?;
        let negated = captures.get(1).is_some();
        let path = captures.get(2).map_or("", |m| m.as_str());
        let value = lookup(variables, path);

        match (captures.get(3), captures.get(4)) {
            (Some(operator), Some(literal)) => {
                if negated {
                    return Err(format!("negation cannot be combined with `{}`", operator.as_str()));
                }
                let expected = parse_literal(literal.as_str());
                let equal = value_equals(value.unwrap_or(&Value::Null), &expected);
                Ok(if operator.as_str() == "==" { equal } else { !equal })
            }
            _ => {
                let truth = match value {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(flag)) => *flag,
                    Some(other) => {
                        return Err(format!("variable `{path}` is not a boolean: {other}"));
                    }
                };
                Ok(truth != negated)
            }
        }
    }
}

fn lookup<'a>(variables: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = variables.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn parse_literal(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn value_equals(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => left == right,
    }
}

#[cfg(test)]
#[path = "expression_test.rs"]
mod tests;
