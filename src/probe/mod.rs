//! Read-only system queries, one module per check kind.
//!
//! A probe answers "what is the current value of this resource?" and
//! nothing else. Comparison against the expected value, negation and
//! timeouts are the executor's job.

pub mod command;
pub mod file;
pub mod policy;
pub mod process;
pub mod registry;
pub mod service;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::{FileAttribute, MechanismFailure, Observed};

/// What a completed query found.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Present(Observed),
    /// The target does not exist. A defined outcome, not a failure.
    Absent,
}

pub type ProbeResult = std::result::Result<Observation, MechanismFailure>;

/// Host surface queried by the executor. Implementations must never
/// modify system state.
pub trait SystemProbe: Send + Sync {
    fn registry(&self, key: &str, value: Option<&str>) -> ProbeResult;

    fn service(&self, name: &str) -> ProbeResult;

    fn file(&self, path: &Path, attribute: FileAttribute) -> ProbeResult;

    fn command(&self, program: &str, args: &[String]) -> ProbeResult;

    fn policy(&self, key: &str) -> ProbeResult;
}

/// Probes the machine the scanner runs on.
pub struct HostProbe {
    /// Deadline handed to spawned helper processes so they are killed
    /// rather than orphaned when a check times out.
    process_timeout: Duration,
    policy: policy::PolicyStore,
}

impl HostProbe {
    pub fn new(process_timeout: Duration, policy_source: PathBuf) -> Self {
        Self {
            process_timeout,
            policy: policy::PolicyStore::new(policy_source),
        }
    }
}

impl SystemProbe for HostProbe {
    fn registry(&self, key: &str, value: Option<&str>) -> ProbeResult {
        registry::query(key, value, self.process_timeout)
    }

    fn service(&self, name: &str) -> ProbeResult {
        service::query(name, self.process_timeout)
    }

    fn file(&self, path: &Path, attribute: FileAttribute) -> ProbeResult {
        file::query(path, attribute)
    }

    fn command(&self, program: &str, args: &[String]) -> ProbeResult {
        command::query(program, args, self.process_timeout)
    }

    fn policy(&self, key: &str) -> ProbeResult {
        self.policy.lookup(key, self.process_timeout)
    }
}
