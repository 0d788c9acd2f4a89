use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;

use super::compare::compare;
use crate::model::{CheckKind, CheckOutcome, KindTag, MechanismFailure, SubCheckSpec};
use crate::probe::{Observation, ProbeResult, SystemProbe};

/// How long a check may queue for its kind's gate, as a multiple of the
/// check timeout. Gate holders are themselves bounded by their deadline,
/// so this only trips when a probe ignores it.
const GATE_WAIT_FACTOR: u32 = 10;

/// Worker-to-caller messages for one check.
enum WorkerEvent {
    /// The worker holds its gate (if any) and is about to query.
    Started,
    Finished(ProbeResult),
}

/// Executes sub-checks against a [`SystemProbe`] under a per-check deadline.
///
/// Each check runs on its own worker thread. The deadline starts once the
/// worker holds its kind's gate, so time spent queued behind another check
/// of a serialized kind is never charged to this one. If the query does
/// not answer in time the check is reported as
/// [`MechanismFailure::TimedOut`] and the scan moves on; the worker
/// finishes (or is killed with its helper process) in the background.
pub struct Executor {
    probe: Arc<dyn SystemProbe>,
    timeout: Duration,
    gate_wait: Duration,
    gates: HashMap<KindTag, Arc<Mutex<()>>>,
}

impl Executor {
    /// `serialized` lists the resource kinds that may only be queried by
    /// one check at a time.
    pub fn new(probe: Arc<dyn SystemProbe>, timeout: Duration, serialized: &[KindTag]) -> Self {
        let gates = serialized
            .iter()
            .map(|kind| (*kind, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            probe,
            timeout,
            gate_wait: timeout.saturating_mul(GATE_WAIT_FACTOR),
            gates,
        }
    }

    /// Execute every check of a rule. Outcomes come back in declaration
    /// order whether or not they ran concurrently.
    pub fn execute_all(&self, checks: &[SubCheckSpec], parallel: bool) -> Vec<CheckOutcome> {
        if parallel {
            checks
                .par_iter()
                .enumerate()
                .map(|(index, check)| self.execute(index, check))
                .collect()
        } else {
            checks
                .iter()
                .enumerate()
                .map(|(index, check)| self.execute(index, check))
                .collect()
        }
    }

    /// Execute one check. Never panics and never returns an error: every
    /// failure mode is folded into the outcome.
    pub fn execute(&self, index: usize, check: &SubCheckSpec) -> CheckOutcome {
        let tag = check.kind.tag();
        let target = check.kind.target();

        match self.query(&check.kind) {
            Ok(observation) => {
                let comparison = compare(&check.expected, &observation);
                let observed = match observation {
                    Observation::Present(value) => Some(value),
                    Observation::Absent => None,
                };
                CheckOutcome {
                    index,
                    kind: tag,
                    target,
                    matched: comparison.matched != check.negate,
                    observed,
                    error: None,
                    detail: comparison.detail,
                }
            }
            Err(failure) => {
                tracing::debug!(kind = %tag, target = %target, error = %failure, "check failed");
                CheckOutcome::failed(index, tag, target, failure)
            }
        }
    }

    fn query(&self, kind: &CheckKind) -> ProbeResult {
        let (tx, rx) = mpsc::channel();
        let probe = Arc::clone(&self.probe);
        let tag = kind.tag();
        let gate = self.gates.get(&tag).cloned();
        let kind = kind.clone();

        let spawned = thread::Builder::new()
            .name(format!("check-{tag}"))
            .spawn(move || {
                // Held for the whole query, released however the worker exits.
                let _guard = gate
                    .as_ref()
                    .map(|g| g.lock().unwrap_or_else(PoisonError::into_inner));
                // The caller gave up while we queued: skip the query.
                if tx.send(WorkerEvent::Started).is_err() {
                    return;
                }
                let _ = tx.send(WorkerEvent::Finished(dispatch(probe.as_ref(), &kind)));
            });
        if let Err(e) = spawned {
            return Err(MechanismFailure::System(format!("cannot start check worker: {e}")));
        }

        match rx.recv_timeout(self.gate_wait) {
            Ok(WorkerEvent::Started) => {}
            Ok(WorkerEvent::Finished(result)) => return result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(MechanismFailure::System(format!(
                    "{tag} checks busy: no exclusive access within {} ms",
                    self.gate_wait.as_millis()
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(MechanismFailure::System("check worker panicked".into()))
            }
        }

        match rx.recv_timeout(self.timeout) {
            Ok(WorkerEvent::Finished(result)) => result,
            Ok(WorkerEvent::Started) => {
                Err(MechanismFailure::System("check worker started twice".into()))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(MechanismFailure::TimedOut(self.timeout.as_millis() as u64))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(MechanismFailure::System("check worker panicked".into()))
            }
        }
    }
}

fn dispatch(probe: &dyn SystemProbe, kind: &CheckKind) -> ProbeResult {
    match kind {
        CheckKind::Registry { key, value } => probe.registry(key, value.as_deref()),
        CheckKind::Service { name } => probe.service(name),
        CheckKind::File { path, attribute } => probe.file(path, *attribute),
        CheckKind::Command { program, args } => probe.command(program, args),
        CheckKind::Policy { key } => probe.policy(key),
    }
}
