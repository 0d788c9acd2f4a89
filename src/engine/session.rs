use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::evaluator::evaluate;
use super::executor::Executor;
use crate::config::ScanSettings;
use crate::model::{CheckOutcome, RuleDefinition, RuleResult};
use crate::probe::{HostProbe, SystemProbe};

/// Receives progress and diagnostics from a running scan.
pub trait DiagnosticSink: Send + Sync {
    fn batch_started(&self, _batch: usize, _rules: usize) {}

    fn check_failed(&self, _rule_id: &str, _outcome: &CheckOutcome) {}

    fn rule_evaluated(&self, _result: &RuleResult) {}

    fn cancelled(&self, _completed: usize, _total: usize) {}
}

/// Default sink: structured `tracing` events.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn batch_started(&self, batch: usize, rules: usize) {
        tracing::info!(batch, rules, "processing batch");
    }

    fn check_failed(&self, rule_id: &str, outcome: &CheckOutcome) {
        if let Some(error) = &outcome.error {
            tracing::warn!(
                rule_id,
                kind = %outcome.kind,
                target = %outcome.target,
                error = %error,
                "check could not complete"
            );
        }
    }

    fn rule_evaluated(&self, result: &RuleResult) {
        match &result.diagnostic {
            Some(diagnostic) => {
                tracing::warn!(rule_id = %result.id, %diagnostic, "rule forced to FAIL")
            }
            None => tracing::debug!(rule_id = %result.id, status = %result.status, "rule evaluated"),
        }
    }

    fn cancelled(&self, completed: usize, total: usize) {
        tracing::warn!(completed, total, "scan cancelled");
    }
}

/// Cooperative cancellation for a running scan. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Results of a scan, in rule declaration order.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub results: Vec<RuleResult>,
    /// Set when the scan stopped early. `results` then holds only the rules
    /// that completed, still in declaration order with no gaps.
    pub cancelled: bool,
}

/// Everything one scan needs: settings, the executor, a diagnostics sink
/// and a cancellation token. Nothing is global.
pub struct ScanSession {
    settings: ScanSettings,
    executor: Executor,
    sink: Arc<dyn DiagnosticSink>,
    cancel: CancellationToken,
}

impl ScanSession {
    /// Session probing the local host.
    pub fn new(settings: ScanSettings) -> Self {
        let probe = HostProbe::new(settings.check_timeout(), settings.policy_source.clone());
        Self::with_probe(settings, Arc::new(probe))
    }

    pub fn with_probe(settings: ScanSettings, probe: Arc<dyn SystemProbe>) -> Self {
        let executor = Executor::new(probe, settings.check_timeout(), &settings.serialize_kinds);
        Self {
            settings,
            executor,
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the executor, e.g. to use a sub-second check timeout.
    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute and evaluate `rules` in batches of `batch_size`.
    ///
    /// A batch is fully evaluated before the next one starts, and its
    /// working buffers are dropped in between. Batch size never changes
    /// the results.
    pub fn run(&self, rules: &[RuleDefinition]) -> ScanOutcome {
        let batch_size = self.settings.batch_size.max(1);
        let mut results = Vec::with_capacity(rules.len());

        for (n, batch) in rules.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.sink.batch_started(n + 1, batch.len());
            let completed = self.run_batch(batch);
            let finished = completed.len() == batch.len();
            results.extend(completed);
            if !finished {
                break;
            }
        }

        let cancelled = results.len() < rules.len();
        if cancelled {
            self.sink.cancelled(results.len(), rules.len());
        }
        ScanOutcome { results, cancelled }
    }

    /// Evaluate one batch. On cancellation, returns the completed prefix.
    fn run_batch(&self, batch: &[RuleDefinition]) -> Vec<RuleResult> {
        if self.settings.parallel_rules {
            let slots: Vec<Option<RuleResult>> = batch
                .par_iter()
                .map(|rule| (!self.cancel.is_cancelled()).then(|| self.run_rule(rule)))
                .collect();
            slots.into_iter().map_while(|slot| slot).collect()
        } else {
            let mut completed = Vec::with_capacity(batch.len());
            for rule in batch {
                if self.cancel.is_cancelled() {
                    break;
                }
                completed.push(self.run_rule(rule));
            }
            completed
        }
    }

    fn run_rule(&self, rule: &RuleDefinition) -> RuleResult {
        let outcomes = self
            .executor
            .execute_all(&rule.checks, self.settings.parallel_checks);
        for outcome in outcomes.iter().filter(|o| o.is_mechanism_failure()) {
            self.sink.check_failed(&rule.id, outcome);
        }
        let result = evaluate(rule, outcomes);
        self.sink.rule_evaluated(&result);
        result
    }
}
