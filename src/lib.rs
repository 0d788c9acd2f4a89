//! cisaudit: read-only host configuration auditing against CIS-style
//! compliance rules.
//!
//! Rules are YAML documents on local storage. Each rule combines one or
//! more checks (registry, service, file, command, security policy) with an
//! `all` / `any` / `none` condition; the scan produces a PASS/FAIL verdict
//! per rule and a basic or severity-weighted compliance score.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use cisaudit::{scan, ScanOptions};
//!
//! let options = ScanOptions::default();
//! let report = scan(Path::new("./rules/windows"), &options).unwrap();
//! println!("Score: {}%, failed: {}", report.summary.score_percent, report.summary.failed);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;
pub mod parser;
pub mod probe;
pub mod scoring;

use std::path::{Path, PathBuf};

use serde::Serialize;

use config::Config;
use engine::{ScanOutcome, ScanSession};
use error::Result;
use model::{RuleDefinition, RuleResult};
use output::OutputFormat;
use parser::LoadError;
use scoring::Summary;

pub use parser::{load_rules, LoadedRules};
pub use scoring::summarize;

/// Options for a scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Path to config file (defaults to `.cisaudit.toml` in the rules root).
    pub config_path: Option<PathBuf>,
    /// CLI override for weighted scoring.
    pub weighted_override: Option<bool>,
    /// CLI override for the batch size.
    pub batch_size_override: Option<usize>,
    /// CLI override for the per-check timeout, in seconds.
    pub timeout_override: Option<u64>,
    /// Host label for report metadata.
    pub host: String,
    /// Operating system label for report metadata.
    pub os: String,
    /// Benchmark name for report metadata.
    pub benchmark: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            weighted_override: None,
            batch_size_override: None,
            timeout_override: None,
            host: default_host(),
            os: std::env::consts::OS.to_string(),
            benchmark: None,
        }
    }
}

fn default_host() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "localhost".into())
}

/// Descriptive metadata carried alongside results for report collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub host: String,
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<String>,
    pub rules_root: PathBuf,
    pub rule_set_digest: String,
    pub tool_version: String,
}

/// Complete scan report.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub scanned_at: String,
    pub metadata: ReportMetadata,
    pub summary: Summary,
    pub results: Vec<RuleResult>,
    pub load_errors: Vec<LoadError>,
    pub cancelled: bool,
}

impl ScanReport {
    /// Process exit status for compliance gating: 0 when every rule passed.
    pub fn exit_code(&self) -> i32 {
        if self.summary.all_passed() {
            0
        } else {
            1
        }
    }
}

/// Execute and evaluate already-loaded rules within a session.
pub fn run_scan(rules: &[RuleDefinition], session: &ScanSession) -> ScanOutcome {
    session.run(rules)
}

/// Resolve the effective configuration for a scan: file first, then CLI
/// overrides.
pub fn resolve_config(rules_root: &Path, options: &ScanOptions) -> Result<Config> {
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| rules_root.join(".cisaudit.toml"));
    let mut config = Config::load(&config_path)?;

    if let Some(weighted) = options.weighted_override {
        config.scoring.weighted = weighted;
    }
    if let Some(batch_size) = options.batch_size_override {
        config.scan.batch_size = batch_size;
    }
    if let Some(timeout) = options.timeout_override {
        config.scan.check_timeout_secs = timeout;
    }
    config.validate()?;
    Ok(config)
}

/// Run a complete scan: load rules, execute in batches, evaluate, score.
pub fn scan(rules_root: &Path, options: &ScanOptions) -> Result<ScanReport> {
    let config = resolve_config(rules_root, options)?;
    let session = ScanSession::new(config.scan.clone());
    scan_with_session(rules_root, options, &config, &session)
}

/// [`scan`] with a caller-built session, e.g. one holding a cancellation
/// token or a custom probe.
pub fn scan_with_session(
    rules_root: &Path,
    options: &ScanOptions,
    config: &Config,
    session: &ScanSession,
) -> Result<ScanReport> {
    let loaded = load_rules(rules_root)?;
    let outcome = run_scan(&loaded.rules, session);
    let summary = summarize(
        &outcome.results,
        config.scoring.weighted,
        Some(&config.scoring.weights),
    );

    tracing::info!(
        passed = summary.passed,
        failed = summary.failed,
        score = summary.score_percent,
        weighted = summary.weighted,
        "scan completed"
    );

    Ok(ScanReport {
        scan_id: uuid::Uuid::new_v4().to_string(),
        scanned_at: chrono::Utc::now().to_rfc3339(),
        metadata: ReportMetadata {
            host: options.host.clone(),
            os: options.os.clone(),
            benchmark: options.benchmark.clone(),
            rules_root: rules_root.to_path_buf(),
            rule_set_digest: loaded.rule_set_digest(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        summary,
        results: outcome.results,
        load_errors: loaded.errors,
        cancelled: outcome.cancelled,
    })
}

/// Render a scan report in the specified format.
pub fn render_report(report: &ScanReport, format: OutputFormat) -> Result<String> {
    output::render(report, format)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::model::{Diagnostic, RuleStatus};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const BENCHMARK: &str = "tests/fixtures/rules/benchmark";
    const MIXED: &str = "tests/fixtures/rules/mixed";

    fn options(weighted: bool) -> ScanOptions {
        ScanOptions {
            weighted_override: Some(weighted),
            host: "test-host".into(),
            os: "test-os".into(),
            benchmark: Some("Fixture Benchmark".into()),
            ..ScanOptions::default()
        }
    }

    #[test]
    fn benchmark_fixture_basic_score() {
        let report = scan(Path::new(BENCHMARK), &options(false)).unwrap();
        let statuses: Vec<_> = report
            .results
            .iter()
            .map(|r| (r.id.as_str(), r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("acct-1", RuleStatus::Pass),
                ("acct-2", RuleStatus::Fail),
                ("net-1", RuleStatus::Pass),
                ("sys-1", RuleStatus::Pass),
            ]
        );
        assert_eq!(
            (report.summary.passed, report.summary.failed, report.summary.total),
            (3, 1, 4)
        );
        assert_eq!(report.summary.score_percent, 75);
        assert_eq!(report.exit_code(), 1);
        assert!(report.load_errors.is_empty());
    }

    #[test]
    fn benchmark_fixture_weighted_score() {
        let report = scan(Path::new(BENCHMARK), &options(true)).unwrap();
        assert_eq!(report.summary.total_weight, Some(9));
        assert_eq!(report.summary.passed_weight, Some(6));
        assert_eq!(report.summary.score_percent, 67);
    }

    #[test]
    fn mixed_fixture_degrades_gracefully() {
        let report = scan(Path::new(MIXED), &options(false)).unwrap();
        let ids: Vec<_> = report.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["mix-1", "mix-2", "mix-3"]);

        let empty = &report.results[1];
        assert_eq!(empty.status, RuleStatus::Fail);
        assert_eq!(empty.diagnostic, Some(Diagnostic::NoChecks));

        let none = &report.results[2];
        assert_eq!(none.status, RuleStatus::Pass);

        assert_eq!(report.load_errors.len(), 2);
        assert!(report
            .load_errors
            .iter()
            .any(|e| matches!(e, LoadError::DuplicateId { id, .. } if id == "mix-1")));
        assert!(report
            .load_errors
            .iter()
            .any(|e| matches!(e, LoadError::Yaml { .. })));
    }

    #[test]
    fn missing_rules_root_is_fatal() {
        let err = scan(Path::new("tests/fixtures/rules/nope"), &options(false)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn reports_render_in_every_format() {
        let report = scan(Path::new(BENCHMARK), &options(true)).unwrap();

        let json = render_report(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["score_percent"], 67);
        assert_eq!(value["results"][1]["status"], "FAIL");
        assert_eq!(value["metadata"]["host"], "test-host");

        let console = render_report(&report, OutputFormat::Console).unwrap();
        assert!(console.contains("[FAIL] acct-2"));
        assert!(console.contains("Score: 67% (weighted 6/9)"));

        let html = render_report(&report, OutputFormat::Html).unwrap();
        assert!(html.contains("Fixture Benchmark"));
        assert!(html.contains("<code>acct-2</code>"));
    }

    #[test]
    fn cli_overrides_beat_config() {
        let opts = ScanOptions {
            batch_size_override: Some(1),
            timeout_override: Some(3),
            ..options(true)
        };
        let config = resolve_config(Path::new(BENCHMARK), &opts).unwrap();
        assert_eq!(config.scan.batch_size, 1);
        assert_eq!(config.scan.check_timeout_secs, 3);
        assert!(config.scoring.weighted);

        let bad = ScanOptions {
            batch_size_override: Some(0),
            ..options(false)
        };
        assert!(resolve_config(Path::new(BENCHMARK), &bad).is_err());
    }
}
