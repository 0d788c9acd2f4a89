use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

/// Process-level failures. Anything scoped to a single document, rule or
/// check is reported as a value instead (see `LoadError`, `MechanismFailure`).
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Rules root is not accessible: {path}: {source}")]
    RulesRootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rules root is not a directory: {0}")]
    RulesRootNotDirectory(PathBuf),

    #[error("No valid rules in {path}: all {documents} rule document(s) failed to load")]
    NoValidRules { path: PathBuf, documents: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AuditError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}
