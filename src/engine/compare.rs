use crate::model::{Expectation, Observed};
use crate::probe::Observation;

/// Outcome of comparing one observation against its expectation, before
/// negation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub matched: bool,
    pub detail: Option<String>,
}

impl Comparison {
    fn yes() -> Self {
        Self {
            matched: true,
            detail: None,
        }
    }

    fn no(detail: impl Into<String>) -> Self {
        Self {
            matched: false,
            detail: Some(detail.into()),
        }
    }

    fn from_bool(matched: bool) -> Self {
        Self {
            matched,
            detail: None,
        }
    }
}

/// Apply the declared comparison mode. Values of different types are never
/// coerced into each other; only `Threshold` parses numeric text, because
/// numeric comparison is what it declares.
pub fn compare(expected: &Expectation, observation: &Observation) -> Comparison {
    let observed = match observation {
        Observation::Absent => {
            return match expected {
                Expectation::Absent => Comparison::yes(),
                _ => Comparison::no("target not found"),
            }
        }
        Observation::Present(observed) => observed,
    };

    match expected {
        Expectation::Exists => Comparison::yes(),
        Expectation::Absent => Comparison::no("target exists"),
        Expectation::Equals {
            value,
            case_sensitive,
        } => match (value, observed) {
            (Observed::Integer(a), Observed::Integer(b)) => Comparison::from_bool(a == b),
            (Observed::Bool(a), Observed::Bool(b)) => Comparison::from_bool(a == b),
            (Observed::Text(a), Observed::Text(b)) if *case_sensitive => {
                Comparison::from_bool(a == b)
            }
            (Observed::Text(a), Observed::Text(b)) => {
                Comparison::from_bool(a.to_lowercase() == b.to_lowercase())
            }
            (expected, observed) => Comparison::no(type_mismatch(expected, observed)),
        },
        Expectation::Pattern { regex } => match observed {
            Observed::Text(s) => Comparison::from_bool(regex.is_match(s)),
            other => Comparison::no(format!(
                "type mismatch: pattern needs text, observed {}",
                other.type_name()
            )),
        },
        Expectation::Threshold { op, value } => {
            let number = match observed {
                Observed::Integer(i) => *i as f64,
                Observed::Text(s) => match s.trim().parse::<f64>() {
                    Ok(n) => n,
                    Err(_) => return Comparison::no(format!("not numeric: {observed}")),
                },
                Observed::Bool(_) => {
                    return Comparison::no("type mismatch: threshold needs a number, observed bool")
                }
            };
            Comparison::from_bool(op.holds(number, *value))
        }
    }
}

fn type_mismatch(expected: &Observed, observed: &Observed) -> String {
    format!(
        "type mismatch: expected {}, observed {}",
        expected.type_name(),
        observed.type_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThresholdOp;
    use regex::Regex;

    fn present(o: Observed) -> Observation {
        Observation::Present(o)
    }

    fn equals(value: Observed, case_sensitive: bool) -> Expectation {
        Expectation::Equals {
            value,
            case_sensitive,
        }
    }

    #[test]
    fn existence_modes() {
        let here = present(Observed::Bool(true));
        assert!(compare(&Expectation::Exists, &here).matched);
        assert!(!compare(&Expectation::Absent, &here).matched);
        assert!(compare(&Expectation::Absent, &Observation::Absent).matched);

        let missing = compare(&Expectation::Exists, &Observation::Absent);
        assert!(!missing.matched);
        assert_eq!(missing.detail.as_deref(), Some("target not found"));
    }

    #[test]
    fn text_equality_honours_case_mode() {
        let obs = present(Observed::Text("Running".into()));
        assert!(compare(&equals(Observed::Text("running".into()), false), &obs).matched);
        assert!(!compare(&equals(Observed::Text("running".into()), true), &obs).matched);
    }

    #[test]
    fn no_coercion_across_types() {
        let cmp = compare(
            &equals(Observed::Integer(1), false),
            &present(Observed::Text("1".into())),
        );
        assert!(!cmp.matched);
        assert_eq!(
            cmp.detail.as_deref(),
            Some("type mismatch: expected integer, observed text")
        );
        assert!(
            !compare(&equals(Observed::Bool(true), false), &present(Observed::Integer(1))).matched
        );
    }

    #[test]
    fn patterns_need_text() {
        let re = Expectation::Pattern {
            regex: Regex::new("^enabled").unwrap(),
        };
        assert!(compare(&re, &present(Observed::Text("enabled 1".into()))).matched);
        assert!(!compare(&re, &present(Observed::Integer(1))).matched);
    }

    #[test]
    fn thresholds_parse_numeric_text() {
        let min14 = Expectation::Threshold {
            op: ThresholdOp::Ge,
            value: 14.0,
        };
        assert!(compare(&min14, &present(Observed::Integer(14))).matched);
        assert!(compare(&min14, &present(Observed::Text(" 20 ".into()))).matched);
        assert!(!compare(&min14, &present(Observed::Integer(8))).matched);

        let junk = compare(&min14, &present(Observed::Text("lots".into())));
        assert!(!junk.matched);
        assert!(junk.detail.unwrap().starts_with("not numeric"));
        assert!(!compare(&min14, &present(Observed::Bool(true))).matched);
        assert!(!compare(&min14, &Observation::Absent).matched);
    }
}
