use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::process::{self, looks_denied};
use super::{Observation, ProbeResult};
use crate::model::{MechanismFailure, Observed};

/// `    Name    REG_TYPE    data` line of `reg query` output.
static VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+(?P<name>.+?)\s{2,}(?P<ty>REG_[A-Z_]+)(?:\s+(?P<data>.*))?$")
        .expect("static regex")
});

const HIVES: &[&str] = &[
    "HKLM",
    "HKCU",
    "HKCR",
    "HKU",
    "HKCC",
    "HKEY_LOCAL_MACHINE",
    "HKEY_CURRENT_USER",
    "HKEY_CLASSES_ROOT",
    "HKEY_USERS",
    "HKEY_CURRENT_CONFIG",
];

/// Read a registry key or value through `reg.exe query`.
pub fn query(key: &str, value: Option<&str>, timeout: Duration) -> ProbeResult {
    validate_key(key)?;
    if !cfg!(windows) {
        return Err(MechanismFailure::Unsupported(
            "registry checks require a Windows host".into(),
        ));
    }

    let mut args = vec!["query".to_string(), key.to_string()];
    if let Some(name) = value {
        args.push("/v".into());
        args.push(name.into());
    }

    let Some(out) = process::run("reg", &args, timeout)? else {
        return Err(MechanismFailure::Unsupported("reg.exe not found".into()));
    };

    if !out.success() {
        let text = out.combined();
        if looks_denied(&text) {
            return Err(MechanismFailure::AccessDenied(key.into()));
        }
        if text.to_lowercase().contains("unable to find") {
            return Ok(Observation::Absent);
        }
        return Err(MechanismFailure::System(text.trim().to_string()));
    }

    match value {
        None => Ok(Observation::Present(Observed::Text(key.into()))),
        Some(name) => parse_value(&out.stdout, name),
    }
}

fn validate_key(key: &str) -> Result<(), MechanismFailure> {
    let hive = key.split('\\').next().unwrap_or_default().to_uppercase();
    if HIVES.contains(&hive.as_str()) {
        Ok(())
    } else {
        Err(MechanismFailure::MalformedLocator(format!(
            "registry key must start with a hive such as HKLM: {key}"
        )))
    }
}

/// Extract `name` from `reg query` output and type it by its registry type.
pub fn parse_value(stdout: &str, name: &str) -> ProbeResult {
    for line in stdout.lines() {
        let Some(caps) = VALUE_LINE.captures(line) else {
            continue;
        };
        if !caps["name"].eq_ignore_ascii_case(name) {
            continue;
        }
        let data = caps.name("data").map(|m| m.as_str().trim()).unwrap_or("");
        let observed = match &caps["ty"] {
            "REG_DWORD" | "REG_QWORD" => {
                let digits = data.trim_start_matches("0x").trim_start_matches("0X");
                let n = u64::from_str_radix(digits, 16).map_err(|e| {
                    MechanismFailure::System(format!("unparsable {} data '{data}': {e}", &caps["ty"]))
                })?;
                let n = i64::try_from(n).map_err(|_| {
                    MechanismFailure::System(format!(
                        "{} data {data} exceeds the signed 64-bit range",
                        &caps["ty"]
                    ))
                })?;
                Observed::Integer(n)
            }
            _ => Observed::Text(data.to_string()),
        };
        return Ok(Observation::Present(observed));
    }
    Ok(Observation::Absent)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\Policies\\Microsoft\\Windows\\System\r\n    EnableSmartScreen    REG_DWORD    0x1\r\n    ShellSmartScreenLevel    REG_SZ    Block\r\n    Empty Name Value    REG_SZ\r\n\r\n";

    #[test]
    fn dword_values_become_integers() {
        assert_eq!(
            parse_value(OUTPUT, "EnableSmartScreen").unwrap(),
            Observation::Present(Observed::Integer(1))
        );
    }

    #[test]
    fn string_values_stay_text() {
        assert_eq!(
            parse_value(OUTPUT, "shellsmartscreenlevel").unwrap(),
            Observation::Present(Observed::Text("Block".into()))
        );
        assert_eq!(
            parse_value(OUTPUT, "Empty Name Value").unwrap(),
            Observation::Present(Observed::Text(String::new()))
        );
    }

    #[test]
    fn qword_beyond_i64_is_a_failure_not_a_wrap() {
        let out = "    Huge    REG_QWORD    0xffffffffffffffff\r\n    Max    REG_QWORD    0x7fffffffffffffff\r\n";
        assert!(matches!(
            parse_value(out, "Huge"),
            Err(MechanismFailure::System(msg)) if msg.contains("64-bit")
        ));
        assert_eq!(
            parse_value(out, "Max").unwrap(),
            Observation::Present(Observed::Integer(i64::MAX))
        );
    }

    #[test]
    fn missing_value_is_absent() {
        assert_eq!(parse_value(OUTPUT, "Nope").unwrap(), Observation::Absent);
    }

    #[test]
    fn key_without_hive_is_malformed() {
        let err = query(r"SOFTWARE\Foo", None, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, MechanismFailure::MalformedLocator(_)));
    }

    #[cfg(not(windows))]
    #[test]
    fn unsupported_off_windows() {
        let err = query(r"HKLM\SOFTWARE\Foo", Some("Bar"), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, MechanismFailure::Unsupported(_)));
    }
}
