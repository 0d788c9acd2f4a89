//! Compliance scoring over a completed `RuleResult` sequence.
//!
//! Both modes are pure functions of their input: calling them twice on
//! the same results yields the same `Summary`.

pub mod severity;

use serde::{Deserialize, Serialize};

use crate::model::RuleResult;

pub use severity::{Severity, SeverityClassifier, WeightTable};

/// Scan-wide compliance metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub score_percent: u32,
    pub weighted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed_weight: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<u64>,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Reduce results into a summary. `weights` only matters when `weighted`
/// is set and falls back to [`WeightTable::default`].
pub fn summarize(results: &[RuleResult], weighted: bool, weights: Option<&WeightTable>) -> Summary {
    if weighted {
        let default_weights = WeightTable::default();
        weighted_score(
            results,
            weights.unwrap_or(&default_weights),
            &SeverityClassifier::default(),
        )
    } else {
        basic_score(results)
    }
}

/// Percentage of passed rules.
pub fn basic_score(results: &[RuleResult]) -> Summary {
    let (passed, failed) = count(results);
    let total = results.len();
    Summary {
        passed,
        failed,
        total,
        score_percent: percent(passed as u64, total as u64),
        weighted: false,
        passed_weight: None,
        total_weight: None,
    }
}

/// Percentage of passed weight, each rule weighted by its severity.
pub fn weighted_score(
    results: &[RuleResult],
    weights: &WeightTable,
    classifier: &SeverityClassifier,
) -> Summary {
    let (passed, failed) = count(results);
    let mut total_weight = 0u64;
    let mut passed_weight = 0u64;

    for result in results {
        let weight = u64::from(weights.weight(classifier.classify(result)));
        total_weight += weight;
        if result.passed() {
            passed_weight += weight;
        }
    }

    Summary {
        passed,
        failed,
        total: results.len(),
        score_percent: percent(passed_weight, total_weight),
        weighted: true,
        passed_weight: Some(passed_weight),
        total_weight: Some(total_weight),
    }
}

fn count(results: &[RuleResult]) -> (usize, usize) {
    let passed = results.iter().filter(|r| r.passed()).count();
    (passed, results.len() - passed)
}

/// `round(part / whole * 100)` with ties to even; 0 for an empty whole.
fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round_ties_even() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, RuleStatus};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn result(title: &str, status: RuleStatus) -> RuleResult {
        RuleResult {
            id: title.replace(' ', "-"),
            title: title.into(),
            description: String::new(),
            status,
            condition: Condition::All,
            checks: vec![],
            diagnostic: None,
            severity: None,
        }
    }

    fn example_results() -> Vec<RuleResult> {
        vec![
            result("Minimum password length", RuleStatus::Pass),
            result("Password complexity", RuleStatus::Fail),
            result("Firewall enabled", RuleStatus::Pass),
            result("Screen lock", RuleStatus::Pass),
        ]
    }

    #[test]
    fn basic_score_of_example_set() {
        let summary = summarize(&example_results(), false, None);
        assert_eq!(
            summary,
            Summary {
                passed: 3,
                failed: 1,
                total: 4,
                score_percent: 75,
                weighted: false,
                passed_weight: None,
                total_weight: None,
            }
        );
    }

    #[test]
    fn weighted_score_of_example_set() {
        let summary = summarize(&example_results(), true, None);
        assert_eq!(summary.total_weight, Some(9));
        assert_eq!(summary.passed_weight, Some(6));
        assert_eq!(summary.score_percent, 67);
        assert_eq!((summary.passed, summary.failed, summary.total), (3, 1, 4));
        assert!(summary.weighted);
    }

    #[test]
    fn empty_results_score_zero() {
        assert_eq!(summarize(&[], false, None).score_percent, 0);
        let weighted = summarize(&[], true, None);
        assert_eq!(weighted.score_percent, 0);
        assert_eq!(weighted.total_weight, Some(0));
    }

    #[test]
    fn zero_total_weight_scores_zero() {
        let weights = WeightTable::empty()
            .with(Severity::Critical, 0)
            .with(Severity::High, 0)
            .with(Severity::Medium, 0)
            .with(Severity::Low, 0);
        let summary = summarize(&example_results(), true, Some(&weights));
        assert_eq!(summary.total_weight, Some(0));
        assert_eq!(summary.score_percent, 0);
    }

    #[test]
    fn explicit_severity_overrides_title() {
        let mut r = result("Disable autoplay", RuleStatus::Fail);
        r.severity = Some(Severity::Critical);
        let summary = summarize(&[r, result("Other", RuleStatus::Pass)], true, None);
        assert_eq!(summary.total_weight, Some(4));
        assert_eq!(summary.passed_weight, Some(1));
        assert_eq!(summary.score_percent, 25);
    }

    #[test]
    fn rounding_ties_to_even() {
        assert_eq!(percent(1, 8), 12);
        assert_eq!(percent(3, 8), 38);
        assert_eq!(percent(2, 3), 67);
    }

    #[test]
    fn scoring_is_idempotent() {
        let results = example_results();
        assert_eq!(summarize(&results, true, None), summarize(&results, true, None));
    }

    proptest! {
        #[test]
        fn counts_always_add_up(statuses in proptest::collection::vec(any::<bool>(), 0..64)) {
            let results: Vec<RuleResult> = statuses
                .iter()
                .enumerate()
                .map(|(i, pass)| {
                    let status = if *pass { RuleStatus::Pass } else { RuleStatus::Fail };
                    result(&format!("rule {i} password"), status)
                })
                .collect();
            for weighted in [false, true] {
                let s = summarize(&results, weighted, None);
                prop_assert_eq!(s.total, s.passed + s.failed);
                prop_assert!(s.score_percent <= 100);
                if let (Some(p), Some(t)) = (s.passed_weight, s.total_weight) {
                    prop_assert!(t >= p);
                }
            }
        }
    }
}
