use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::model::KindTag;
use crate::scoring::WeightTable;

/// Top-level configuration from `.cisaudit.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
}

/// Execution tuning for the scan orchestrator and check executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Rules processed per batch before intermediate buffers are released.
    pub batch_size: usize,
    /// Upper bound on a single check, in seconds.
    pub check_timeout_secs: u64,
    /// Run the checks of one rule concurrently.
    pub parallel_checks: bool,
    /// Evaluate the rules of one batch concurrently.
    pub parallel_rules: bool,
    /// Resource kinds the host only lets one check query at a time.
    pub serialize_kinds: Vec<KindTag>,
    /// Key/value file read by `policy` checks on non-Windows hosts.
    pub policy_source: PathBuf,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            check_timeout_secs: 10,
            parallel_checks: false,
            parallel_rules: false,
            serialize_kinds: vec![KindTag::Registry, KindTag::Policy],
            policy_source: PathBuf::from("/etc/login.defs"),
        }
    }
}

impl ScanSettings {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weighted: bool,
    #[serde(default)]
    pub weights: WeightTable,
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.batch_size == 0 {
            return Err(AuditError::Config("scan.batch_size must be at least 1".into()));
        }
        if self.scan.check_timeout_secs == 0 {
            return Err(AuditError::Config(
                "scan.check_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# cisaudit configuration

[scan]
# Rules evaluated per batch; intermediate check outcomes are released
# between batches.
batch_size = 50

# Per-check timeout. A check that exceeds it is reported as a mechanism
# failure on its rule instead of stalling the scan.
check_timeout_secs = 10

# Concurrency. Results are always reported in rule declaration order.
parallel_checks = false
parallel_rules = false

# Resource kinds that must be queried one at a time.
serialize_kinds = ["registry", "policy"]

# Key/value source for `policy` checks on non-Windows hosts.
# policy_source = "/etc/login.defs"

[scoring]
# Weight rules by severity inferred from their titles.
weighted = false

# [scoring.weights]
# critical = 3
# high = 2
# medium = 1
# low = 1
"#
    }
}
