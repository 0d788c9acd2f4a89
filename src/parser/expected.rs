use regex::RegexBuilder;
use serde_yaml::{Mapping, Value};

use crate::model::{Expectation, Observed, ThresholdOp};

#[derive(Debug)]
pub enum ExpectedError {
    Invalid(String),
    Pattern { pattern: String, message: String },
}

/// Interpret the `expected` field of a check.
///
/// Scalars mean typed equality (text is case-insensitive). A mapping picks
/// the comparison mode explicitly: `exists`, `equals`, `pattern`/`regex`,
/// or one threshold key (`gt`, `ge`, `lt`, `le`, `eq`, `ne`).
pub fn parse_expected(value: Option<&Value>) -> Result<Expectation, ExpectedError> {
    match value {
        None | Some(Value::Null) => Ok(Expectation::Exists),
        Some(Value::Mapping(map)) => parse_mapping(map),
        Some(scalar) => scalar_equals(scalar, false),
    }
}

fn parse_mapping(map: &Mapping) -> Result<Expectation, ExpectedError> {
    let case_sensitive = match map.get("case_sensitive") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(ExpectedError::Invalid("`case_sensitive` must be a bool".into())),
    };

    if let Some(exists) = map.get("exists") {
        return match exists {
            Value::Bool(true) => Ok(Expectation::Exists),
            Value::Bool(false) => Ok(Expectation::Absent),
            _ => Err(ExpectedError::Invalid("`exists` must be a bool".into())),
        };
    }

    if let Some(value) = map.get("equals") {
        return scalar_equals(value, case_sensitive);
    }

    if let Some(pattern) = map.get("pattern").or_else(|| map.get("regex")) {
        let Value::String(pattern) = pattern else {
            return Err(ExpectedError::Invalid("`pattern` must be a string".into()));
        };
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| ExpectedError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        return Ok(Expectation::Pattern { regex });
    }

    for (key, op) in ThresholdOp::KEYS {
        if let Some(value) = map.get(key) {
            let value = value.as_f64().ok_or_else(|| {
                ExpectedError::Invalid(format!("`{key}` threshold must be a number"))
            })?;
            return Ok(Expectation::Threshold { op, value });
        }
    }

    Err(ExpectedError::Invalid(
        "expected one of `exists`, `equals`, `pattern`, `gt`, `ge`, `lt`, `le`, `eq`, `ne`".into(),
    ))
}

fn scalar_equals(value: &Value, case_sensitive: bool) -> Result<Expectation, ExpectedError> {
    let value = match value {
        Value::Bool(b) => Observed::Bool(*b),
        Value::String(s) => Observed::Text(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Observed::Integer(i),
            // Non-integral numbers only make sense as a numeric comparison.
            None => {
                let f = n.as_f64().unwrap_or(f64::NAN);
                return Ok(Expectation::Threshold {
                    op: ThresholdOp::Eq,
                    value: f,
                });
            }
        },
        _ => return Err(ExpectedError::Invalid("expected value must be a scalar".into())),
    };
    Ok(Expectation::Equals {
        value,
        case_sensitive,
    })
}
