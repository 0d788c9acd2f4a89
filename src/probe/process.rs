use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::model::MechanismFailure;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a helper process that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout and stderr together, for matching error text that tools
    /// print to either stream.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Run `program` with `args`, killing it once `timeout` elapses.
///
/// Returns `Ok(None)` when the program itself does not exist.
pub fn run<S: AsRef<str>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<Option<ProcessOutput>, MechanismFailure> {
    let mut child = match Command::new(program)
        .args(args.iter().map(|a| a.as_ref()))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MechanismFailure::from_io(program, &e)),
    };

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!(program, "helper process killed at deadline");
                return Err(MechanismFailure::TimedOut(timeout.as_millis() as u64));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(MechanismFailure::from_io(program, &e));
            }
        }
    };

    Ok(Some(ProcessOutput {
        code: status.code(),
        stdout: stdout.and_then(|h| h.join().ok()).unwrap_or_default(),
        stderr: stderr.and_then(|h| h.join().ok()).unwrap_or_default(),
    }))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Heuristic for "access denied" text printed by Windows and Unix tools.
pub fn looks_denied(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("access is denied")
        || lower.contains("access denied")
        || lower.contains("permission denied")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let out = run("sh", &["-c", "echo hello; exit 3"], Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
    }

    #[test]
    fn missing_program_is_none() {
        let out = run::<&str>("definitely-not-a-real-binary-xyz", &[], Duration::from_secs(1)).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn slow_program_times_out() {
        let started = Instant::now();
        let err = run("sleep", &["5"], Duration::from_millis(100)).unwrap_err();
        assert_eq!(err, MechanismFailure::TimedOut(100));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn denied_text_detection() {
        assert!(looks_denied("ERROR: Access is denied."));
        assert!(looks_denied("cat: /root/x: Permission denied"));
        assert!(!looks_denied("all good"));
    }
}
