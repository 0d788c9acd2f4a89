use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cisaudit::config::Config;
use cisaudit::error::AuditError;
use cisaudit::output::OutputFormat;
use cisaudit::scoring::SeverityClassifier;
use cisaudit::ScanOptions;

#[derive(Parser)]
#[command(
    name = "cisaudit",
    about = "Audit host configuration against CIS-style compliance rules",
    version,
    author
)]
struct Cli {
    /// Verbose logging (debug level) unless RUST_LOG is set
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan this host against a rules directory
    Scan {
        /// Directory containing .yml rule files
        #[arg(long, default_value = "./rules/windows")]
        rules: PathBuf,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Stdout format (console, json, html)
        #[arg(long, short = 'f', default_value = "console")]
        format: String,

        /// Also write a JSON report to this path
        #[arg(long)]
        json: Option<PathBuf>,

        /// Also write an HTML report to this path
        #[arg(long)]
        html: Option<PathBuf>,

        /// Host label for report metadata
        #[arg(long)]
        host: Option<String>,

        /// OS label for report metadata
        #[arg(long)]
        os: Option<String>,

        /// Benchmark name to display in reports
        #[arg(long)]
        benchmark: Option<String>,

        /// Use weighted scoring based on severity
        #[arg(long)]
        weighted: bool,

        /// Rules per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Per-check timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// List the rules in a rules directory
    ListRules {
        /// Directory containing .yml rule files
        #[arg(long, default_value = "./rules/windows")]
        rules: PathBuf,

        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .cisaudit.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            rules,
            config,
            format,
            json,
            html,
            host,
            os,
            benchmark,
            weighted,
            batch_size,
            timeout_secs,
        } => {
            let defaults = ScanOptions::default();
            let options = ScanOptions {
                config_path: config,
                weighted_override: weighted.then_some(true),
                batch_size_override: batch_size,
                timeout_override: timeout_secs,
                host: host.unwrap_or(defaults.host),
                os: os.unwrap_or(defaults.os),
                benchmark,
            };
            cmd_scan(&rules, &options, format, json, html)
        }
        Commands::ListRules { rules, format } => cmd_list_rules(&rules, format),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_scan(
    rules: &Path,
    options: &ScanOptions,
    format_str: String,
    json_path: Option<PathBuf>,
    html_path: Option<PathBuf>,
) -> Result<i32, AuditError> {
    let format = OutputFormat::from_str_lenient(&format_str).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", format_str);
        OutputFormat::Console
    });

    let report = cisaudit::scan(rules, options)?;

    for (path, report_format) in [(json_path, OutputFormat::Json), (html_path, OutputFormat::Html)] {
        let Some(path) = path else { continue };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, cisaudit::render_report(&report, report_format)?)?;
        eprintln!("Report saved to: {}", path.display());
    }

    print!("{}", cisaudit::render_report(&report, format)?);

    // Exit code: 0 = all rules pass, 1 = at least one rule failed
    Ok(report.exit_code())
}

fn cmd_list_rules(rules: &Path, format_str: String) -> Result<i32, AuditError> {
    let loaded = cisaudit::load_rules(rules)?;
    let classifier = SeverityClassifier::default();

    match format_str.as_str() {
        "json" => {
            let listing: Vec<serde_json::Value> = loaded
                .rules
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "title": r.title,
                        "condition": r.condition,
                        "checks": r.checks.len(),
                        "severity": r.severity.unwrap_or_else(|| classifier.classify_title(&r.title)),
                        "source": r.source.path,
                    })
                })
                .collect();
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "rules": listing,
                "errors": loaded.errors,
                "rule_set_digest": loaded.rule_set_digest(),
            }))?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<16} {:<10} {:<6} {:<7} TITLE",
                "ID", "SEVERITY", "LOGIC", "CHECKS"
            );
            println!("{}", "-".repeat(80));
            for rule in &loaded.rules {
                let severity = rule
                    .severity
                    .unwrap_or_else(|| classifier.classify_title(&rule.title));
                println!(
                    "{:<16} {:<10} {:<6} {:<7} {}",
                    rule.id,
                    severity.to_string(),
                    rule.condition.to_string(),
                    rule.checks.len(),
                    rule.title,
                );
            }
            for error in &loaded.errors {
                eprintln!("Warning: {}", error);
            }
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, AuditError> {
    let path = PathBuf::from(".cisaudit.toml");

    if path.exists() && !force {
        eprintln!(".cisaudit.toml already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created .cisaudit.toml");

    Ok(0)
}
