//! Per-load-event run metrics.
//!
//! This module defines a small set of structs used to observe and debug how
//! one load event was processed.
//!
//! The intended usage is:
//!
//! - `Agent::process` for normal operation.
//! - `Agent::process_verbose` for profiling, debugging rule regressions, and
//!   inspecting what each matched rule contributed.
//!
//! Metrics are intentionally simple and *opt-in*: the hot path skips the
//! per-rule application trace entirely, and the timing fields are plain
//! monotonic-clock durations.

use crate::TransformOutcome;
use std::time::Duration;

/// Timings and counters for one `process` call.
#[derive(Debug, Default, Clone)]
pub struct ProcessMetrics {
    /// Total elapsed time for the load event.
    pub total: Duration,
    /// Time spent selecting matching rules.
    pub matching: Duration,
    /// Time spent folding matched rules through the Enhancer.
    pub fold: Duration,
    /// Per-rule application trace. Empty on the non-verbose path.
    pub applications: Vec<RuleApplication>,
}

/// One rule's application during the fold (verbose runs only).
#[derive(Debug, Clone)]
pub struct RuleApplication {
    /// Name of the applied rule.
    pub rule: String,
    /// Elapsed time for this rule's Enhancer call.
    pub duration: Duration,
    /// What the application produced.
    pub outcome: RuleOutcome,
}

/// Outcome of a single rule application within the fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The rule contributed a rewrite; the fold adopted its unit.
    Rewritten,
    /// The rule declined at instruction-application time. Not an error.
    Declined,
    /// The rule's instructions failed; its contribution was skipped.
    Failed(String),
}

/// Orchestrator output bundled with timing information.
#[derive(Debug, Clone)]
pub(crate) struct ProcessRun {
    /// Final result for the load event.
    pub outcome: TransformOutcome,
    /// Names of the matched rules, in fold order (verbose runs only).
    pub matched: Vec<String>,
    /// Timing measurements for the run.
    pub metrics: ProcessMetrics,
}
