use std::path::PathBuf;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::expected::{parse_expected, ExpectedError};
use super::LoadError;
use crate::model::{
    CheckKind, Condition, FileAttribute, KindTag, RuleDefinition, RuleSource, SubCheckSpec,
};
use crate::scoring::Severity;

/// Rule as written in the document. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawRule {
    id: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    #[serde(alias = "logic")]
    condition: Option<String>,
    severity: Option<String>,
    #[serde(alias = "rules")]
    checks: Option<Vec<RawCheck>>,
}

#[derive(Debug, Deserialize)]
struct RawCheck {
    #[serde(alias = "type")]
    kind: Option<String>,
    target: Option<String>,
    value: Option<String>,
    attribute: Option<String>,
    args: Option<Vec<String>>,
    expected: Option<Value>,
    #[serde(default)]
    negate: bool,
}

/// Parse one document into its rules. A document may hold a single rule
/// mapping, a sequence of rules, or a mapping with a top-level `rules:`
/// sequence. Each malformed rule yields one `LoadError`; the rest load.
pub fn parse_document(content: &str, source: &RuleSource) -> (Vec<RuleDefinition>, Vec<LoadError>) {
    let mut rules = Vec::new();
    let mut errors = Vec::new();

    let value: Value = match serde_yaml::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            errors.push(LoadError::Yaml {
                path: source.path.clone(),
                message: e.to_string(),
            });
            return (rules, errors);
        }
    };

    let items = match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items,
        Value::Mapping(ref map) if is_container(map) => match map.get("rules") {
            Some(Value::Sequence(items)) => items.clone(),
            _ => Vec::new(),
        },
        other => vec![other],
    };

    for item in items {
        match parse_rule(item, source) {
            Ok(rule) => rules.push(rule),
            Err(e) => errors.push(e),
        }
    }

    (rules, errors)
}

/// A mapping without an `id` whose `rules:` entries each carry an `id` or
/// `checks` holds several rules. Without that shape, `rules:` is the legacy
/// name for a single rule's check list.
fn is_container(map: &Mapping) -> bool {
    if map.contains_key("id") {
        return false;
    }
    match map.get("rules") {
        Some(Value::Sequence(items)) => items.iter().all(|item| {
            item.as_mapping()
                .is_some_and(|m| m.contains_key("id") || m.contains_key("checks"))
        }),
        _ => false,
    }
}

fn parse_rule(value: Value, source: &RuleSource) -> Result<RuleDefinition, LoadError> {
    let path = source.path.clone();
    let raw: RawRule = serde_yaml::from_value(value).map_err(|e| LoadError::Schema {
        path: path.clone(),
        rule: None,
        message: e.to_string(),
    })?;

    // CIS section numbers such as `1.1` arrive as YAML numbers.
    let id = match raw.id.as_ref().and_then(scalar_text) {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Err(LoadError::MissingField {
                path,
                rule: None,
                field: "id".into(),
            })
        }
    };
    let ctx = RuleCtx { path, id };

    let raw_checks = raw.checks.ok_or_else(|| ctx.missing("checks"))?;

    let condition = match raw.condition {
        None => Condition::default(),
        Some(s) => Condition::from_str_lenient(&s)
            .ok_or_else(|| ctx.unknown("condition", &s, &["all", "any", "none"]))?,
    };

    let severity = match raw.severity {
        None => None,
        Some(s) => Some(Severity::from_str_lenient(&s).ok_or_else(|| {
            ctx.unknown("severity", &s, &["critical", "high", "medium", "low"])
        })?),
    };

    let checks = raw_checks
        .into_iter()
        .map(|c| parse_check(c, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleDefinition {
        title: raw.title.unwrap_or_else(|| ctx.id.clone()),
        description: raw.description.unwrap_or_default(),
        condition,
        checks,
        severity,
        source: source.clone(),
        id: ctx.id,
    })
}

fn parse_check(raw: RawCheck, ctx: &RuleCtx) -> Result<SubCheckSpec, LoadError> {
    let kind_str = raw.kind.ok_or_else(|| ctx.missing("kind"))?;
    let tag = KindTag::from_str_lenient(&kind_str).ok_or_else(|| {
        let names: Vec<&str> = KindTag::ALL.iter().map(|k| k.as_str()).collect();
        ctx.unknown("check kind", &kind_str, &names)
    })?;
    let target = raw
        .target
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ctx.missing("target"))?;

    let kind = match tag {
        KindTag::Registry => CheckKind::Registry {
            key: target,
            value: raw.value.filter(|v| !v.is_empty()),
        },
        KindTag::Service => CheckKind::Service { name: target },
        KindTag::File => {
            let attribute = match raw.attribute {
                None => FileAttribute::default(),
                Some(a) => FileAttribute::from_str_lenient(&a).ok_or_else(|| {
                    ctx.unknown(
                        "file attribute",
                        &a,
                        &["exists", "content", "size", "mode", "readonly"],
                    )
                })?,
            };
            CheckKind::File {
                path: PathBuf::from(target),
                attribute,
            }
        }
        KindTag::Command => match raw.args {
            Some(args) => CheckKind::Command {
                program: target,
                args,
            },
            None => {
                let mut parts = target.split_whitespace().map(str::to_string);
                // target is non-empty after trim, so there is a first word
                let program = parts.next().unwrap_or_default();
                CheckKind::Command {
                    program,
                    args: parts.collect(),
                }
            }
        },
        KindTag::Policy => CheckKind::Policy { key: target },
    };

    let expected = parse_expected(raw.expected.as_ref()).map_err(|e| match e {
        ExpectedError::Pattern { pattern, message } => LoadError::InvalidPattern {
            path: ctx.path.clone(),
            rule: Some(ctx.id.clone()),
            pattern,
            message,
        },
        ExpectedError::Invalid(message) => LoadError::Schema {
            path: ctx.path.clone(),
            rule: Some(ctx.id.clone()),
            message: format!("invalid `expected`: {message}"),
        },
    })?;

    Ok(SubCheckSpec {
        kind,
        expected,
        negate: raw.negate,
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

struct RuleCtx {
    path: PathBuf,
    id: String,
}

impl RuleCtx {
    fn missing(&self, field: &str) -> LoadError {
        LoadError::MissingField {
            path: self.path.clone(),
            rule: Some(self.id.clone()),
            field: field.into(),
        }
    }

    fn unknown(&self, field: &str, found: &str, candidates: &[&str]) -> LoadError {
        LoadError::UnknownValue {
            path: self.path.clone(),
            rule: Some(self.id.clone()),
            field: field.into(),
            found: found.into(),
            suggestion: suggest(found, candidates),
        }
    }
}

/// Closest candidate within edit distance 2, if any.
fn suggest(found: &str, candidates: &[&str]) -> Option<String> {
    let found = found.trim().to_lowercase();
    candidates
        .iter()
        .map(|c| (levenshtein::levenshtein(&found, c), *c))
        .filter(|(d, _)| *d > 0 && *d <= 2)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.to_string())
}
