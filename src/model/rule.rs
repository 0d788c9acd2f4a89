use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Observed;
use crate::scoring::Severity;

/// One compliance requirement, immutable after load.
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    /// Stable identifier, unique across the loaded rule set.
    pub id: String,
    pub title: String,
    pub description: String,
    /// How the outcomes of `checks` combine into a verdict.
    pub condition: Condition,
    /// Sub-checks in declaration order.
    pub checks: Vec<SubCheckSpec>,
    /// Explicit severity, takes precedence over title keyword inference.
    pub severity: Option<Severity>,
    /// Document the rule was loaded from.
    pub source: RuleSource,
}

/// Provenance of a rule: the document path and the SHA-256 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSource {
    pub path: PathBuf,
    pub content_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    All,
    Any,
    None,
}

impl Condition {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "and" => Some(Self::All),
            "any" | "or" => Some(Self::Any),
            "none" | "not" => Some(Self::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
            Self::None => write!(f, "none"),
        }
    }
}

/// One concrete probe belonging to a rule.
#[derive(Debug, Clone)]
pub struct SubCheckSpec {
    pub kind: CheckKind,
    pub expected: Expectation,
    /// Invert the comparison result. Never applied to mechanism failures.
    pub negate: bool,
}

/// What to query, carrying only the locator fields each kind needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    /// Registry key, optionally narrowed to a single named value.
    Registry { key: String, value: Option<String> },
    Service { name: String },
    File { path: PathBuf, attribute: FileAttribute },
    Command { program: String, args: Vec<String> },
    /// Local security policy setting, e.g. `MinimumPasswordLength`.
    Policy { key: String },
}

impl CheckKind {
    pub fn tag(&self) -> KindTag {
        match self {
            Self::Registry { .. } => KindTag::Registry,
            Self::Service { .. } => KindTag::Service,
            Self::File { .. } => KindTag::File,
            Self::Command { .. } => KindTag::Command,
            Self::Policy { .. } => KindTag::Policy,
        }
    }

    /// Human-readable locator, used for traceability in results.
    pub fn target(&self) -> String {
        match self {
            Self::Registry { key, value: Some(v) } => format!("{key}\\{v}"),
            Self::Registry { key, value: None } => key.clone(),
            Self::Service { name } => name.clone(),
            Self::File { path, attribute } => format!("{} [{}]", path.display(), attribute),
            Self::Command { program, args } if args.is_empty() => program.clone(),
            Self::Command { program, args } => format!("{} {}", program, args.join(" ")),
            Self::Policy { key } => key.clone(),
        }
    }
}

/// Field-less discriminant of `CheckKind`, used for logging, resource
/// gating and rule document parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Registry,
    Service,
    File,
    Command,
    Policy,
}

impl KindTag {
    pub const ALL: [KindTag; 5] = [
        Self::Registry,
        Self::Service,
        Self::File,
        Self::Command,
        Self::Policy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Service => "service",
            Self::File => "file",
            Self::Command => "command",
            Self::Policy => "policy",
        }
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "registry" | "reg" => Some(Self::Registry),
            "service" => Some(Self::Service),
            "file" => Some(Self::File),
            "command" | "cmd" => Some(Self::Command),
            "policy" | "secpol" => Some(Self::Policy),
            _ => None,
        }
    }
}

impl std::fmt::Display for KindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which attribute of a file a `file` check observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAttribute {
    #[default]
    Exists,
    Content,
    Size,
    /// Unix permission bits, rendered as an octal string such as `"644"`.
    Mode,
    ReadOnly,
}

impl FileAttribute {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exists" => Some(Self::Exists),
            "content" | "contents" => Some(Self::Content),
            "size" => Some(Self::Size),
            "mode" | "permissions" => Some(Self::Mode),
            "readonly" | "read_only" => Some(Self::ReadOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exists => write!(f, "exists"),
            Self::Content => write!(f, "content"),
            Self::Size => write!(f, "size"),
            Self::Mode => write!(f, "mode"),
            Self::ReadOnly => write!(f, "readonly"),
        }
    }
}

/// Declared comparison mode for an observation.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Target must be present. The default when no `expected` is given.
    Exists,
    /// Target must not be present.
    Absent,
    /// Typed equality. Text comparison honours `case_sensitive`.
    Equals { value: Observed, case_sensitive: bool },
    /// Regex match against a text observation.
    Pattern { regex: Regex },
    /// Numeric comparison of the observation against `value`.
    Threshold { op: ThresholdOp, value: f64 },
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exists => write!(f, "exists"),
            Self::Absent => write!(f, "absent"),
            Self::Equals {
                value,
                case_sensitive: true,
            } => write!(f, "== {value} (case-sensitive)"),
            Self::Equals { value, .. } => write!(f, "== {value}"),
            Self::Pattern { regex } => write!(f, "~ /{}/", regex.as_str()),
            Self::Threshold { op, value } => write!(f, "{op} {value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl ThresholdOp {
    pub const KEYS: [(&'static str, ThresholdOp); 6] = [
        ("gt", Self::Gt),
        ("ge", Self::Ge),
        ("lt", Self::Lt),
        ("le", Self::Le),
        ("eq", Self::Eq),
        ("ne", Self::Ne),
    ];

    pub fn holds(&self, observed: f64, expected: f64) -> bool {
        match self {
            Self::Gt => observed > expected,
            Self::Ge => observed >= expected,
            Self::Lt => observed < expected,
            Self::Le => observed <= expected,
            Self::Eq => observed == expected,
            Self::Ne => observed != expected,
        }
    }
}

impl std::fmt::Display for ThresholdOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sym = match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        f.write_str(sym)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_target_joins_value_name() {
        let kind = CheckKind::Registry {
            key: r"HKLM\SOFTWARE\Policies".into(),
            value: Some("NoAutorun".into()),
        };
        assert_eq!(kind.target(), r"HKLM\SOFTWARE\Policies\NoAutorun");
        assert_eq!(kind.tag(), KindTag::Registry);
    }

    #[test]
    fn kind_tag_lenient_parsing() {
        assert_eq!(KindTag::from_str_lenient(" Registry "), Some(KindTag::Registry));
        assert_eq!(KindTag::from_str_lenient("cmd"), Some(KindTag::Command));
        assert_eq!(KindTag::from_str_lenient("wmi"), None);
    }

    #[test]
    fn threshold_ops() {
        assert!(ThresholdOp::Ge.holds(14.0, 14.0));
        assert!(!ThresholdOp::Gt.holds(14.0, 14.0));
        assert!(ThresholdOp::Ne.holds(1.0, 0.0));
    }
}
