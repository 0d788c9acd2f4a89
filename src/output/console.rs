use crate::model::RuleStatus;
use crate::ScanReport;

/// Render results as plain console text: failures first with their check
/// details, then the passes, then the summary.
pub fn render(report: &ScanReport) -> String {
    let mut output = String::new();
    let meta = &report.metadata;

    output.push_str(&format!(
        "\n  Host: {}  OS: {}{}\n",
        meta.host,
        meta.os,
        meta.benchmark
            .as_ref()
            .map(|b| format!("  Benchmark: {b}"))
            .unwrap_or_default()
    ));

    if !report.load_errors.is_empty() {
        output.push_str(&format!(
            "\n  {} rule load error(s):\n",
            report.load_errors.len()
        ));
        for error in &report.load_errors {
            output.push_str(&format!("    - {}\n", error));
        }
    }

    if report.results.is_empty() {
        output.push_str("\n  No rules evaluated.\n\n");
        return output;
    }

    output.push('\n');
    let failed = report.results.iter().filter(|r| !r.passed());
    let passed = report.results.iter().filter(|r| r.passed());
    for result in failed.chain(passed) {
        let tag = match result.status {
            RuleStatus::Pass => "[PASS]",
            RuleStatus::Fail => "[FAIL]",
        };
        output.push_str(&format!("  {} {} {}\n", tag, result.id, result.title));

        if result.passed() {
            continue;
        }
        if let Some(diagnostic) = &result.diagnostic {
            output.push_str(&format!("         {}\n", diagnostic));
        }
        for check in &result.checks {
            let state = match (&check.error, check.matched) {
                (Some(e), _) => format!("error: {e}"),
                (None, true) => "matched".into(),
                (None, false) => check
                    .detail
                    .clone()
                    .unwrap_or_else(|| "not matched".into()),
            };
            let observed = check
                .observed
                .as_ref()
                .map(|o| format!(" (observed {o})"))
                .unwrap_or_default();
            output.push_str(&format!(
                "         {} {}: {}{}\n",
                check.kind, check.target, state, observed
            ));
        }
    }

    let s = &report.summary;
    output.push_str(&format!(
        "\n  Result: {} passed, {} failed, {} total. Score: {}%{}\n",
        s.passed,
        s.failed,
        s.total,
        s.score_percent,
        match (s.weighted, s.passed_weight, s.total_weight) {
            (true, Some(p), Some(t)) => format!(" (weighted {p}/{t})"),
            _ => String::new(),
        }
    ));
    if report.cancelled {
        output.push_str("  Scan was cancelled; the summary covers completed rules only.\n");
    }
    output.push('\n');

    output
}
