use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Condition, KindTag};
use crate::scoring::Severity;

/// A raw value read from the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Observed {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl Observed {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
        }
    }
}

impl std::fmt::Display for Observed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A check could not be completed. Distinct from a completed check that
/// simply did not match.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum MechanismFailure {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("malformed locator: {0}")]
    MalformedLocator(String),

    #[error("timed out after {0} ms")]
    TimedOut(u64),

    #[error("unsupported on this host: {0}")]
    Unsupported(String),

    #[error("system error: {0}")]
    System(String),
}

impl MechanismFailure {
    /// Classify an I/O error raised while reading a resource.
    pub fn from_io(context: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied(format!("{context}: {err}")),
            std::io::ErrorKind::InvalidInput => Self::MalformedLocator(format!("{context}: {err}")),
            _ => Self::System(format!("{context}: {err}")),
        }
    }
}

/// Result of executing one sub-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Position of the sub-check in its rule's declaration order.
    pub index: usize,
    pub kind: KindTag,
    pub target: String,
    /// Comparison result after negation. Always false when `error` is set.
    pub matched: bool,
    /// Raw value observed, absent when the target was not found or the
    /// query failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<Observed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MechanismFailure>,
    /// Extra context, e.g. "target not found" or a type mismatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckOutcome {
    pub fn failed(index: usize, kind: KindTag, target: String, error: MechanismFailure) -> Self {
        Self {
            index,
            kind,
            target,
            matched: false,
            observed: None,
            error: Some(error),
            detail: None,
        }
    }

    pub fn is_mechanism_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Marks a FAIL caused by the rule itself rather than the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    /// The rule declares zero sub-checks.
    NoChecks,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoChecks => write!(f, "configuration error: rule declares no checks"),
        }
    }
}

/// Final verdict for one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: RuleStatus,
    pub condition: Condition,
    /// Per-check outcomes in declaration order.
    pub checks: Vec<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
    /// Explicit severity carried over from the rule definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl RuleResult {
    pub fn passed(&self) -> bool {
        self.status == RuleStatus::Pass
    }

    pub fn mechanism_failures(&self) -> usize {
        self.checks.iter().filter(|c| c.is_mechanism_failure()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Observed::Integer(1),
            Observed::Text("on".into()),
            Observed::Bool(false),
        ])
        .unwrap();
        assert_eq!(json, r#"[1,"on",false]"#);
    }

    #[test]
    fn io_errors_are_classified() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            MechanismFailure::from_io("read", &denied),
            MechanismFailure::AccessDenied(_)
        ));
        let other = std::io::Error::from(std::io::ErrorKind::Other);
        assert!(matches!(
            MechanismFailure::from_io("read", &other),
            MechanismFailure::System(_)
        ));
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RuleStatus::Fail).unwrap(), "\"FAIL\"");
    }
}
