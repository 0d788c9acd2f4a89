//! In-memory model shared by every stage of a scan.
//!
//! The parser produces `RuleDefinition`s, the executor produces
//! `CheckOutcome`s and the evaluator folds them into `RuleResult`s.
//! Reporting collaborators only ever see `RuleResult` and `Summary`.

pub mod outcome;
pub mod rule;

pub use outcome::{CheckOutcome, Diagnostic, MechanismFailure, Observed, RuleResult, RuleStatus};
pub use rule::{
    CheckKind, Condition, Expectation, FileAttribute, KindTag, RuleDefinition, RuleSource,
    SubCheckSpec, ThresholdOp,
};
