use crate::model::{RuleResult, RuleStatus};
use crate::scoring::{Severity, SeverityClassifier};
use crate::ScanReport;

/// Render results as a self-contained HTML report.
pub fn render(report: &ScanReport) -> String {
    let classifier = SeverityClassifier::default();
    let summary = &report.summary;
    let meta = &report.metadata;
    let status_class = if summary.all_passed() { "pass" } else { "fail" };
    let status_text = if summary.all_passed() { "PASS" } else { "FAIL" };

    let rows: String = report
        .results
        .iter()
        .map(|r| result_row(r, classifier.classify(r)))
        .collect();

    let load_errors = if report.load_errors.is_empty() {
        String::new()
    } else {
        let items: String = report
            .load_errors
            .iter()
            .map(|e| format!("<li>{}</li>", html_escape(&e.to_string())))
            .collect();
        format!(
            "<section class=\"load-errors\"><h2>Rule load errors</h2><ul>{items}</ul></section>"
        )
    };

    let weighted = match (summary.passed_weight, summary.total_weight) {
        (Some(p), Some(t)) => format!(
            "<div class=\"stat\"><div class=\"count\">{p}/{t}</div><div class=\"label\">Weight</div></div>"
        ),
        _ => String::new(),
    };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Compliance Report: {host}</title>
<style>
  :root {{
    --bg: #0d1117; --fg: #c9d1d9; --border: #30363d; --card: #161b22;
    --crit: #f85149; --high: #f0883e; --med: #d29922; --low: #58a6ff;
    --muted: #8b949e; --pass: #3fb950; --fail: #f85149;
  }}
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
    background: var(--bg); color: var(--fg); line-height: 1.5; padding: 2rem; }}
  .container {{ max-width: 1200px; margin: 0 auto; }}
  header {{ display: flex; align-items: center; justify-content: space-between;
    padding: 1.5rem; background: var(--card); border: 1px solid var(--border);
    border-radius: 8px; margin-bottom: 1.5rem; }}
  header h1 {{ font-size: 1.4rem; }}
  header h1 span {{ color: var(--low); font-weight: 400; }}
  .verdict {{ font-size: 1.2rem; font-weight: 700; padding: 0.4rem 1.2rem; border-radius: 6px; }}
  .verdict.pass {{ background: var(--pass); color: #000; }}
  .verdict.fail {{ background: var(--fail); color: #fff; }}
  .summary {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr));
    gap: 1rem; margin-bottom: 1.5rem; }}
  .stat {{ background: var(--card); border: 1px solid var(--border);
    border-radius: 8px; padding: 1rem; text-align: center; }}
  .stat .count {{ font-size: 2rem; font-weight: 700; }}
  .stat .label {{ font-size: 0.85rem; color: var(--muted); }}
  .stat.passed .count {{ color: var(--pass); }}
  .stat.failed .count {{ color: var(--fail); }}
  table {{ width: 100%; border-collapse: collapse; background: var(--card);
    border: 1px solid var(--border); border-radius: 8px; overflow: hidden; }}
  th {{ text-align: left; padding: 0.75rem 1rem; border-bottom: 2px solid var(--border);
    font-size: 0.8rem; text-transform: uppercase; color: var(--muted); }}
  td {{ padding: 0.6rem 1rem; border-bottom: 1px solid var(--border);
    font-size: 0.9rem; vertical-align: top; }}
  .badge {{ display: inline-block; padding: 0.15rem 0.5rem; border-radius: 4px;
    font-size: 0.75rem; font-weight: 700; color: #000; }}
  .badge.pass {{ background: var(--pass); }}
  .badge.fail {{ background: var(--fail); color: #fff; }}
  .badge.critical {{ background: var(--crit); color: #fff; }}
  .badge.high {{ background: var(--high); }}
  .badge.medium {{ background: var(--med); }}
  .badge.low {{ background: var(--low); }}
  details {{ cursor: pointer; }}
  details summary {{ color: var(--low); font-size: 0.85rem; }}
  details ul {{ margin: 0.5rem 0 0.5rem 1.5rem; }}
  details li {{ margin-bottom: 0.3rem; font-size: 0.85rem; }}
  .load-errors {{ background: var(--card); border: 1px solid var(--fail);
    border-radius: 8px; padding: 1rem; margin-bottom: 1.5rem; }}
  .load-errors h2 {{ font-size: 1rem; margin-bottom: 0.5rem; }}
  .load-errors li {{ margin-left: 1.5rem; font-size: 0.85rem; }}
  footer {{ margin-top: 1.5rem; text-align: center; font-size: 0.8rem; color: var(--muted); }}
  .empty {{ text-align: center; padding: 3rem; color: var(--muted); font-size: 1.2rem; }}
</style>
</head>
<body>
<div class="container">
  <header>
    <h1>{benchmark} <span>{host} / {os}</span></h1>
    <div class="verdict {status_class}">{status_text}</div>
  </header>

  <div class="summary">
    <div class="stat"><div class="count">{score}%</div><div class="label">{score_label}</div></div>
    <div class="stat"><div class="count">{total}</div><div class="label">Total</div></div>
    <div class="stat passed"><div class="count">{passed}</div><div class="label">Passed</div></div>
    <div class="stat failed"><div class="count">{failed}</div><div class="label">Failed</div></div>
    {weighted}
  </div>

  {load_errors}

  {content}

  <footer>
    Scan {scan_id} at {scanned_at}, cisaudit {version}, rule set {digest}{cancelled}
  </footer>
</div>
</body>
</html>"##,
        host = html_escape(&meta.host),
        os = html_escape(&meta.os),
        benchmark = html_escape(meta.benchmark.as_deref().unwrap_or("Compliance Scan")),
        status_class = status_class,
        status_text = status_text,
        score = summary.score_percent,
        score_label = if summary.weighted { "Weighted score" } else { "Score" },
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        weighted = weighted,
        load_errors = load_errors,
        content = if report.results.is_empty() {
            "<div class=\"empty\">No rules evaluated.</div>".to_string()
        } else {
            format!(
                r#"<table>
  <thead>
    <tr><th>Status</th><th>Rule</th><th>Title</th><th>Severity</th><th>Checks</th></tr>
  </thead>
  <tbody>
    {rows}
  </tbody>
</table>"#
            )
        },
        scan_id = html_escape(&report.scan_id),
        scanned_at = html_escape(&report.scanned_at),
        version = env!("CARGO_PKG_VERSION"),
        digest = &meta.rule_set_digest[..meta.rule_set_digest.len().min(12)],
        cancelled = if report.cancelled { " (cancelled, partial results)" } else { "" },
    )
}

fn result_row(result: &RuleResult, severity: Severity) -> String {
    let status_class = match result.status {
        RuleStatus::Pass => "pass",
        RuleStatus::Fail => "fail",
    };
    let mut items: String = result
        .checks
        .iter()
        .map(|c| {
            let state = match (&c.error, c.matched) {
                (Some(e), _) => format!("error: {e}"),
                (None, true) => "matched".into(),
                (None, false) => c.detail.clone().unwrap_or_else(|| "not matched".into()),
            };
            let observed = c
                .observed
                .as_ref()
                .map(|o| format!(", observed {o}"))
                .unwrap_or_default();
            format!(
                "<li><code>{} {}</code>: {}{}</li>",
                c.kind,
                html_escape(&c.target),
                html_escape(&state),
                html_escape(&observed)
            )
        })
        .collect();
    if let Some(diagnostic) = &result.diagnostic {
        items.push_str(&format!("<li>{}</li>", html_escape(&diagnostic.to_string())));
    }

    format!(
        r#"<tr>
  <td><span class="badge {status_class}">{status}</span></td>
  <td><code>{id}</code></td>
  <td>{title}<br><small>{description}</small></td>
  <td><span class="badge {severity}">{severity_upper}</span></td>
  <td><details><summary>{count} check(s), {condition}</summary><ul>{items}</ul></details></td>
</tr>"#,
        status_class = status_class,
        status = result.status,
        id = html_escape(&result.id),
        title = html_escape(&result.title),
        description = html_escape(&result.description),
        severity = severity,
        severity_upper = severity.to_string().to_uppercase(),
        count = result.checks.len(),
        condition = result.condition,
        items = items,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
