use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::OnceCell;

use super::process::{self, looks_denied};
use super::{Observation, ProbeResult};
use crate::model::{MechanismFailure, Observed};

type PolicyTable = HashMap<String, Observed>;

/// Local security policy, read once per scan session and shared by all
/// `policy` checks. Only a successful load is cached; after a failed one
/// (e.g. a timed-out export) the next lookup tries again.
///
/// On Windows the table comes from `secedit /export` into a scratch
/// directory; elsewhere from a `KEY value` / `KEY=value` file such as
/// `/etc/login.defs`.
pub struct PolicyStore {
    source: PathBuf,
    table: OnceCell<PolicyTable>,
}

impl PolicyStore {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            table: OnceCell::new(),
        }
    }

    pub fn lookup(&self, key: &str, timeout: Duration) -> ProbeResult {
        if key.trim().is_empty() {
            return Err(MechanismFailure::MalformedLocator("empty policy key".into()));
        }
        let table = self.table.get_or_try_init(|| self.load(timeout))?;
        Ok(table
            .get(&key.trim().to_lowercase())
            .cloned()
            .map(Observation::Present)
            .unwrap_or(Observation::Absent))
    }

    fn load(&self, timeout: Duration) -> Result<PolicyTable, MechanismFailure> {
        let bytes = if cfg!(windows) {
            export_secedit(timeout)?
        } else {
            std::fs::read(&self.source)
                .map_err(|e| MechanismFailure::from_io(&self.source.display().to_string(), &e))?
        };
        let table = parse_policy(&decode(&bytes));
        tracing::debug!(entries = table.len(), "security policy loaded");
        Ok(table)
    }
}

fn export_secedit(timeout: Duration) -> Result<Vec<u8>, MechanismFailure> {
    let scratch = tempfile::tempdir().map_err(|e| MechanismFailure::from_io("scratch dir", &e))?;
    let cfg = scratch.path().join("secpol.inf");
    let cfg_arg = cfg.display().to_string();
    let args = ["/export", "/cfg", cfg_arg.as_str(), "/areas", "SECURITYPOLICY"];

    let Some(out) = process::run("secedit", &args, timeout)? else {
        return Err(MechanismFailure::Unsupported("secedit.exe not found".into()));
    };
    if !out.success() {
        let text = out.combined();
        if looks_denied(&text) {
            return Err(MechanismFailure::AccessDenied("secedit /export".into()));
        }
        return Err(MechanismFailure::System(text.trim().to_string()));
    }
    std::fs::read(&cfg).map_err(|e| MechanismFailure::from_io("secedit export", &e))
}

/// secedit writes UTF-16LE with a BOM; policy files elsewhere are UTF-8.
fn decode(bytes: &[u8]) -> String {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Parse `Key = Value` (INF) or `KEY value` (login.defs) lines. Keys are
/// matched case-insensitively; integral values are typed as integers.
fn parse_policy(text: &str) -> PolicyTable {
    let mut table = PolicyTable::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(['#', ';', '[']) {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => match line.split_once(char::is_whitespace) {
                Some((k, v)) => (k.trim(), v.trim()),
                None => continue,
            },
        };
        let value = value.trim_matches('"');
        let observed = value
            .parse::<i64>()
            .map(Observed::Integer)
            .unwrap_or_else(|_| Observed::Text(value.to_string()));
        table.insert(key.to_lowercase(), observed);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_inf_and_login_defs_lines() {
        let table = parse_policy(
            "[Unicode]\nUnicode=yes\n[System Access]\nMinimumPasswordLength = 14\nNewAdministratorName = \"Administrator\"\n# comment\nPASS_MAX_DAYS\t90\nENCRYPT_METHOD SHA512\n",
        );
        assert_eq!(table.get("minimumpasswordlength"), Some(&Observed::Integer(14)));
        assert_eq!(
            table.get("newadministratorname"),
            Some(&Observed::Text("Administrator".into()))
        );
        assert_eq!(table.get("pass_max_days"), Some(&Observed::Integer(90)));
        assert_eq!(table.get("encrypt_method"), Some(&Observed::Text("SHA512".into())));
    }

    #[test]
    fn decodes_utf16_exports() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "LockoutBadCount = 5\r\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let table = parse_policy(&decode(&bytes));
        assert_eq!(table.get("lockoutbadcount"), Some(&Observed::Integer(5)));
    }

    #[cfg(not(windows))]
    #[test]
    fn looks_up_keys_from_source_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("login.defs");
        std::fs::write(&path, "PASS_MIN_LEN 12\n").unwrap();
        let store = PolicyStore::new(path);
        assert_eq!(
            store.lookup("pass_min_len", Duration::from_secs(1)).unwrap(),
            Observation::Present(Observed::Integer(12))
        );
        assert_eq!(
            store.lookup("PASS_WARN_AGE", Duration::from_secs(1)).unwrap(),
            Observation::Absent
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn failed_load_is_retried_on_next_lookup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("login.defs");
        let store = PolicyStore::new(path.clone());
        assert!(store.lookup("PASS_MIN_LEN", Duration::from_secs(1)).is_err());

        std::fs::write(&path, "PASS_MIN_LEN 14\n").unwrap();
        assert_eq!(
            store.lookup("PASS_MIN_LEN", Duration::from_secs(1)).unwrap(),
            Observation::Present(Observed::Integer(14))
        );

        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            store.lookup("PASS_MIN_LEN", Duration::from_secs(1)).unwrap(),
            Observation::Present(Observed::Integer(14))
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn missing_source_is_a_mechanism_failure() {
        let tmp = TempDir::new().unwrap();
        let store = PolicyStore::new(tmp.path().join("missing.defs"));
        assert!(matches!(
            store.lookup("PASS_MIN_LEN", Duration::from_secs(1)),
            Err(MechanismFailure::System(_))
        ));
    }
}
