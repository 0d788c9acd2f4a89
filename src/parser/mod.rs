//! Rule repository: discovers rule documents under a root directory and
//! turns them into validated `RuleDefinition`s.
//!
//! Problems with individual documents or rules are collected as
//! `LoadError` values. Only an unusable root (or a rule set where nothing
//! loads at all) is escalated as an `AuditError`.

pub mod document;
pub mod expected;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::error::{AuditError, Result};
use crate::model::{RuleDefinition, RuleSource};

/// Output of [`load_rules`]: every valid rule plus the per-document failures.
#[derive(Debug, Clone, Default)]
pub struct LoadedRules {
    pub rules: Vec<RuleDefinition>,
    pub errors: Vec<LoadError>,
    /// Every rule document that could be read, in discovery order.
    pub documents: Vec<RuleSource>,
}

impl LoadedRules {
    /// SHA-256 over the paths and digests of all documents read, tying a
    /// report to the exact rule material scanned.
    pub fn rule_set_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for doc in &self.documents {
            hasher.update(doc.path.to_string_lossy().as_bytes());
            hasher.update([0]);
            hasher.update(doc.content_hash.as_bytes());
            hasher.update([b'\n']);
        }
        hex::encode(hasher.finalize())
    }
}

/// A recoverable problem with one rule document or one rule inside it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadError {
    #[error("{}: unreadable: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("{}: invalid YAML: {message}", .path.display())]
    Yaml { path: PathBuf, message: String },

    #[error("{}: {}{message}", .path.display(), rule_prefix(.rule))]
    Schema {
        path: PathBuf,
        rule: Option<String>,
        message: String,
    },

    #[error("{}: {}missing required field `{field}`", .path.display(), rule_prefix(.rule))]
    MissingField {
        path: PathBuf,
        rule: Option<String>,
        field: String,
    },

    #[error(
        "{}: {}unknown {field} '{found}'{}",
        .path.display(),
        rule_prefix(.rule),
        did_you_mean(.suggestion)
    )]
    UnknownValue {
        path: PathBuf,
        rule: Option<String>,
        field: String,
        found: String,
        suggestion: Option<String>,
    },

    #[error("{}: {}invalid pattern '{pattern}': {message}", .path.display(), rule_prefix(.rule))]
    InvalidPattern {
        path: PathBuf,
        rule: Option<String>,
        pattern: String,
        message: String,
    },

    #[error("{}: duplicate rule id '{id}' (first defined in {})", .path.display(), .first.display())]
    DuplicateId {
        id: String,
        path: PathBuf,
        first: PathBuf,
    },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Yaml { path, .. }
            | Self::Schema { path, .. }
            | Self::MissingField { path, .. }
            | Self::UnknownValue { path, .. }
            | Self::InvalidPattern { path, .. }
            | Self::DuplicateId { path, .. } => path,
        }
    }
}

fn rule_prefix(rule: &Option<String>) -> String {
    rule.as_ref()
        .map(|id| format!("rule '{id}': "))
        .unwrap_or_default()
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// Load every rule document under `root`.
///
/// Documents are discovered recursively (`*.yml`, `*.yaml`) in file-name
/// order, so rule declaration order is stable across runs. When two
/// documents declare the same id, the first one discovered wins and the
/// later one is reported as [`LoadError::DuplicateId`].
pub fn load_rules(root: &Path) -> Result<LoadedRules> {
    let metadata = std::fs::metadata(root).map_err(|source| AuditError::RulesRootInaccessible {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(AuditError::RulesRootNotDirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|source| AuditError::RulesRootInaccessible {
        path: root.to_path_buf(),
        source,
    })?;

    let mut loaded = LoadedRules::default();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut discovered = 0usize;

    let walker = WalkDir::new(root).follow_links(true).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                loaded.errors.push(LoadError::Io {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_rule_document(path) {
            continue;
        }
        discovered += 1;

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                loaded.errors.push(LoadError::Io {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
                continue;
            }
        };
        let source = RuleSource {
            path: path.to_path_buf(),
            content_hash: hex::encode(Sha256::digest(&bytes)),
        };
        loaded.documents.push(source.clone());

        let content = String::from_utf8_lossy(&bytes);
        let (rules, errors) = document::parse_document(&content, &source);
        loaded.errors.extend(errors);

        for rule in rules {
            if let Some(first) = seen.get(&rule.id) {
                loaded.errors.push(LoadError::DuplicateId {
                    id: rule.id.clone(),
                    path: path.to_path_buf(),
                    first: first.clone(),
                });
                continue;
            }
            seen.insert(rule.id.clone(), path.to_path_buf());
            loaded.rules.push(rule);
        }
    }

    for error in &loaded.errors {
        tracing::warn!(error = %error, "rule load error");
    }

    if loaded.rules.is_empty() && !loaded.errors.is_empty() {
        return Err(AuditError::NoValidRules {
            path: root.to_path_buf(),
            documents: discovered,
        });
    }

    tracing::info!(
        rules = loaded.rules.len(),
        documents = loaded.documents.len(),
        errors = loaded.errors.len(),
        root = %root.display(),
        "rules loaded"
    );

    Ok(loaded)
}

fn is_rule_document(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| e == "yml" || e == "yaml")
}
