use crate::model::{CheckOutcome, Condition, Diagnostic, RuleDefinition, RuleResult, RuleStatus};

/// Fold a rule's check outcomes into its verdict.
///
/// Outcomes are put back into declaration order first, so the result is
/// the same whether the checks ran sequentially or concurrently. A rule
/// without checks fails with [`Diagnostic::NoChecks`] instead of passing
/// vacuously.
pub fn evaluate(rule: &RuleDefinition, mut outcomes: Vec<CheckOutcome>) -> RuleResult {
    outcomes.sort_by_key(|o| o.index);

    let (status, diagnostic) = if rule.checks.is_empty() {
        (RuleStatus::Fail, Some(Diagnostic::NoChecks))
    } else if combine(rule.condition, &outcomes) {
        (RuleStatus::Pass, None)
    } else {
        (RuleStatus::Fail, None)
    };

    RuleResult {
        id: rule.id.clone(),
        title: rule.title.clone(),
        description: rule.description.clone(),
        status,
        condition: rule.condition,
        checks: outcomes,
        diagnostic,
        severity: rule.severity,
    }
}

/// Combination semantics over a non-empty outcome list.
pub fn combine(condition: Condition, outcomes: &[CheckOutcome]) -> bool {
    if outcomes.is_empty() {
        return false;
    }
    match condition {
        Condition::All => outcomes
            .iter()
            .all(|o| o.matched && !o.is_mechanism_failure()),
        Condition::Any => outcomes.iter().any(|o| o.matched),
        Condition::None => !outcomes.iter().any(|o| o.matched),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{check, rule, service};
    use crate::model::{KindTag, MechanismFailure};

    fn outcome(index: usize, matched: bool) -> CheckOutcome {
        CheckOutcome {
            index,
            kind: KindTag::Service,
            target: format!("svc{index}"),
            matched,
            observed: None,
            error: None,
            detail: None,
        }
    }

    fn failure(index: usize) -> CheckOutcome {
        CheckOutcome::failed(
            index,
            KindTag::Service,
            format!("svc{index}"),
            MechanismFailure::TimedOut(10),
        )
    }

    fn two_check_rule(condition: Condition) -> RuleDefinition {
        rule(
            "r",
            "Rule",
            condition,
            vec![check(service("a"), "running"), check(service("b"), "running")],
        )
    }

    #[test]
    fn all_requires_every_match_and_no_failures() {
        let r = two_check_rule(Condition::All);
        assert_eq!(evaluate(&r, vec![outcome(0, true), outcome(1, true)]).status, RuleStatus::Pass);
        assert_eq!(evaluate(&r, vec![outcome(0, true), outcome(1, false)]).status, RuleStatus::Fail);
        assert_eq!(evaluate(&r, vec![outcome(0, true), failure(1)]).status, RuleStatus::Fail);
    }

    #[test]
    fn any_passes_despite_failures_on_other_branches() {
        let r = two_check_rule(Condition::Any);
        assert_eq!(evaluate(&r, vec![failure(0), outcome(1, true)]).status, RuleStatus::Pass);
        assert_eq!(evaluate(&r, vec![failure(0), outcome(1, false)]).status, RuleStatus::Fail);
    }

    #[test]
    fn none_passes_with_zero_matches() {
        let r = two_check_rule(Condition::None);
        assert_eq!(evaluate(&r, vec![outcome(0, false), outcome(1, false)]).status, RuleStatus::Pass);
        assert_eq!(evaluate(&r, vec![outcome(0, false), outcome(1, true)]).status, RuleStatus::Fail);
    }

    #[test]
    fn empty_rule_fails_with_marker() {
        for condition in [Condition::All, Condition::Any, Condition::None] {
            let r = rule("empty", "Empty", condition, vec![]);
            let result = evaluate(&r, vec![]);
            assert_eq!(result.status, RuleStatus::Fail);
            assert_eq!(result.diagnostic, Some(Diagnostic::NoChecks));
        }
    }

    #[test]
    fn genuine_failures_carry_no_marker() {
        let r = two_check_rule(Condition::All);
        let result = evaluate(&r, vec![outcome(0, false), outcome(1, false)]);
        assert_eq!(result.diagnostic, None);
    }

    #[test]
    fn outcomes_are_reordered_and_all_kept() {
        let r = two_check_rule(Condition::Any);
        let result = evaluate(&r, vec![failure(1), outcome(0, true)]);
        let indices: Vec<_> = result.checks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(result.mechanism_failures(), 1);
    }
}
