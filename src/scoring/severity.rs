use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::RuleResult;

/// Weight class used for weighted scoring only. Never affects PASS/FAIL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Keyword sets checked in order; the first set with a hit wins, so a
/// title matching both a critical and a high keyword is critical.
const DEFAULT_KEYWORDS: &[(Severity, &[&str])] = &[
    (
        Severity::Critical,
        &["password", "encryption", "audit", "privilege", "admin"],
    ),
    (
        Severity::High,
        &["firewall", "network", "service", "registry"],
    ),
    (Severity::Medium, &["logon", "screen", "update"]),
];

/// Infers a severity from a rule title by keyword substring match.
///
/// This is a heuristic and only approximate: "Audit screen saver timeout"
/// lands in critical because "audit" is checked first. Rules that need a
/// definite class should declare `severity:` explicitly, which
/// [`SeverityClassifier::classify`] honours before falling back to keywords.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    keyword_sets: Vec<(Severity, Vec<String>)>,
    fallback: Severity,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self {
            keyword_sets: DEFAULT_KEYWORDS
                .iter()
                .map(|(sev, words)| (*sev, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
            fallback: Severity::Low,
        }
    }
}

impl SeverityClassifier {
    pub fn classify_title(&self, title: &str) -> Severity {
        let title = title.to_lowercase();
        self.keyword_sets
            .iter()
            .find(|(_, words)| words.iter().any(|w| title.contains(w.as_str())))
            .map(|(sev, _)| *sev)
            .unwrap_or(self.fallback)
    }

    pub fn classify(&self, result: &RuleResult) -> Severity {
        result
            .severity
            .unwrap_or_else(|| self.classify_title(&result.title))
    }
}

/// Severity → integer weight. Severities missing from a caller-supplied
/// table weigh 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(BTreeMap<Severity, u32>);

impl Default for WeightTable {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Severity::Critical, 3),
            (Severity::High, 2),
            (Severity::Medium, 1),
            (Severity::Low, 1),
        ]))
    }
}

impl WeightTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, severity: Severity, weight: u32) -> Self {
        self.0.insert(severity, weight);
        self
    }

    pub fn weight(&self, severity: Severity) -> u32 {
        self.0.get(&severity).copied().unwrap_or(1)
    }
}
