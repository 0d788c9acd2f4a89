use std::path::Path;

use super::{Observation, ProbeResult};
use crate::model::{FileAttribute, MechanismFailure, Observed};

/// Content checks refuse files above this size.
const MAX_CONTENT_BYTES: u64 = 1_048_576;

pub fn query(path: &Path, attribute: FileAttribute) -> ProbeResult {
    if path.as_os_str().is_empty() {
        return Err(MechanismFailure::MalformedLocator("empty file path".into()));
    }

    let context = path.display().to_string();
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Observation::Absent),
        Err(e) => return Err(MechanismFailure::from_io(&context, &e)),
    };

    let observed = match attribute {
        FileAttribute::Exists => Observed::Bool(true),
        FileAttribute::Size => Observed::Integer(metadata.len() as i64),
        FileAttribute::ReadOnly => Observed::Bool(metadata.permissions().readonly()),
        FileAttribute::Mode => Observed::Text(mode_string(&metadata)?),
        FileAttribute::Content => {
            if !metadata.is_file() {
                return Err(MechanismFailure::MalformedLocator(format!(
                    "{context} is not a regular file"
                )));
            }
            if metadata.len() > MAX_CONTENT_BYTES {
                return Err(MechanismFailure::System(format!(
                    "{context} exceeds {MAX_CONTENT_BYTES} bytes"
                )));
            }
            let bytes = std::fs::read(path).map_err(|e| MechanismFailure::from_io(&context, &e))?;
            Observed::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
    };

    Ok(Observation::Present(observed))
}

#[cfg(unix)]
fn mode_string(metadata: &std::fs::Metadata) -> Result<String, MechanismFailure> {
    use std::os::unix::fs::PermissionsExt;
    Ok(format!("{:o}", metadata.permissions().mode() & 0o7777))
}

#[cfg(not(unix))]
fn mode_string(_metadata: &std::fs::Metadata) -> Result<String, MechanismFailure> {
    Err(MechanismFailure::Unsupported(
        "permission bits are only available on Unix hosts".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_absent() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            query(&tmp.path().join("nope"), FileAttribute::Exists).unwrap(),
            Observation::Absent
        );
    }

    #[test]
    fn reads_size_and_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sshd_config");
        std::fs::write(&path, "PermitRootLogin no\n").unwrap();

        assert_eq!(
            query(&path, FileAttribute::Size).unwrap(),
            Observation::Present(Observed::Integer(19))
        );
        assert_eq!(
            query(&path, FileAttribute::Content).unwrap(),
            Observation::Present(Observed::Text("PermitRootLogin no\n".into()))
        );
        assert_eq!(
            query(&path, FileAttribute::Exists).unwrap(),
            Observation::Present(Observed::Bool(true))
        );
    }

    #[test]
    fn content_of_directory_is_malformed() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            query(tmp.path(), FileAttribute::Content),
            Err(MechanismFailure::MalformedLocator(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn reports_octal_mode() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shadow");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();
        assert_eq!(
            query(&path, FileAttribute::Mode).unwrap(),
            Observation::Present(Observed::Text("640".into()))
        );
    }
}
