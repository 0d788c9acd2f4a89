use std::time::Duration;

use super::process::{self, looks_denied};
use super::{Observation, ProbeResult};
use crate::model::{MechanismFailure, Observed};

/// Report a service's state, normalised to `running` / `stopped` where
/// the platform allows, otherwise the manager's own state word.
pub fn query(name: &str, timeout: Duration) -> ProbeResult {
    if name.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        return Err(MechanismFailure::MalformedLocator(format!(
            "invalid service name: {name}"
        )));
    }

    if cfg!(windows) {
        let Some(out) = process::run("sc", &["query", name], timeout)? else {
            return Err(MechanismFailure::Unsupported("sc.exe not found".into()));
        };
        parse_sc_query(&out.combined())
    } else {
        let property = "--property=LoadState,ActiveState,SubState";
        let Some(out) = process::run("systemctl", &["show", name, property, "--no-pager"], timeout)?
        else {
            return Err(MechanismFailure::Unsupported(
                "no supported service manager (systemctl) found".into(),
            ));
        };
        if !out.success() {
            if looks_denied(&out.stderr) {
                return Err(MechanismFailure::AccessDenied(name.into()));
            }
            return Err(MechanismFailure::System(out.stderr.trim().to_string()));
        }
        parse_systemctl_show(&out.stdout)
    }
}

/// Parse `sc query <name>` output.
pub fn parse_sc_query(text: &str) -> ProbeResult {
    if text.contains("1060") || text.to_lowercase().contains("does not exist") {
        return Ok(Observation::Absent);
    }
    if looks_denied(text) {
        return Err(MechanismFailure::AccessDenied(text.trim().to_string()));
    }
    let state = text
        .lines()
        .find(|l| l.trim_start().starts_with("STATE"))
        .and_then(|l| l.split_whitespace().last())
        .ok_or_else(|| MechanismFailure::System("no STATE in sc output".into()))?;
    Ok(Observation::Present(Observed::Text(state.to_lowercase())))
}

/// Parse `systemctl show` `Key=Value` output.
pub fn parse_systemctl_show(text: &str) -> ProbeResult {
    let field = |key: &str| {
        text.lines()
            .find_map(|l| l.strip_prefix(key)?.strip_prefix('='))
            .map(str::trim)
    };
    if field("LoadState") == Some("not-found") {
        return Ok(Observation::Absent);
    }
    let active = field("ActiveState")
        .ok_or_else(|| MechanismFailure::System("no ActiveState in systemctl output".into()))?;
    let state = match (active, field("SubState")) {
        ("active", Some("running")) => "running",
        ("inactive", _) | ("failed", _) => "stopped",
        (other, _) => other,
    };
    Ok(Observation::Present(Observed::Text(state.to_string())))
}
