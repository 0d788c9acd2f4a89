//! Rule execution and evaluation.
//!
//! The executor turns each `SubCheckSpec` into a `CheckOutcome`, the
//! evaluator folds a rule's outcomes into a `RuleResult`, and the session
//! drives both over a rule set in bounded batches.

pub mod compare;
pub mod evaluator;
pub mod executor;
pub mod session;

pub use evaluator::evaluate;
pub use executor::Executor;
pub use session::{CancellationToken, DiagnosticSink, ScanOutcome, ScanSession, TracingSink};
