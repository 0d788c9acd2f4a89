use std::time::Duration;

use super::process;
use super::{Observation, ProbeResult};
use crate::model::{MechanismFailure, Observed};

/// Run an audit command and observe its trimmed stdout. A program that
/// does not exist is an absent target.
pub fn query(program: &str, args: &[String], timeout: Duration) -> ProbeResult {
    if program.is_empty() {
        return Err(MechanismFailure::MalformedLocator("empty command".into()));
    }
    match process::run(program, args, timeout)? {
        None => Ok(Observation::Absent),
        Some(out) => {
            if !out.success() {
                tracing::debug!(
                    program,
                    code = ?out.code,
                    stderr = %out.stderr.trim(),
                    "audit command exited non-zero"
                );
            }
            Ok(Observation::Present(Observed::Text(out.stdout.trim().to_string())))
        }
    }
}
