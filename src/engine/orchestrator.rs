//! The per-load-event transformation fold.
//!
//! This module is the operational core of the engine:
//!
//! - Select the ordered subset of rules matching the unit (see `matcher.rs`).
//! - Fold the matched rules over the unit's original form, invoking the
//!   opaque [`Enhancer`] once per rule with a shared [`EnhanceContext`].
//! - Contain every per-rule failure: a failing rule's contribution is
//!   skipped, the previous `current` unit is kept, and the fold continues —
//!   one bad rule never aborts the unit's load or its sibling rules.
//! - Report the event's life through the [`LifecycleObserver`].
//!
//! ## Fold structure
//!
//! ```text
//! (0) Discovery event
//! (1) match rules          -> empty? Ignored + Complete, Unchanged
//! (2) fresh EnhanceContext
//! (3) fold, in matcher order:
//!        current ── rule k ──> Rewritten(next)  adopt next
//!                          └─> Declined         keep current (debug log)
//!                          └─> Err(e)           keep current, RuleError event
//! (4) any contribution? Transform event, Rewritten(final) : Unchanged
//! (5) Complete event (always)
//! ```
//!
//! `process` may be invoked concurrently for many independent units: the only
//! shared state is the read-only catalog, and everything per-event lives on
//! this call's stack. Fold order within one call is deterministic; there are
//! no ordering guarantees between calls.

use super::catalog::RuleCatalog;
use super::metrics::{ProcessMetrics, ProcessRun, RuleApplication, RuleOutcome};
use super::observer::{LifecycleEvent, LifecycleObserver, deliver};
use crate::{Applied, CodeUnit, CodeUnitDescriptor, EnhanceContext, EnhanceError, Enhancer, TransformOutcome};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

/// Orchestrates applying the catalog's rules to one load event at a time.
///
/// Borrowed view over the agent's collaborators; construction is free, so the
/// API layer builds one per call.
pub(crate) struct Orchestrator<'a> {
    catalog: &'a RuleCatalog,
    enhancer: &'a dyn Enhancer,
    observer: &'a dyn LifecycleObserver,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        catalog: &'a RuleCatalog,
        enhancer: &'a dyn Enhancer,
        observer: &'a dyn LifecycleObserver,
    ) -> Self {
        Orchestrator { catalog, enhancer, observer }
    }

    /// Process one load event and return only the outcome.
    pub fn process(
        &self,
        descriptor: &CodeUnitDescriptor,
        original: &CodeUnit,
    ) -> TransformOutcome {
        self.run(descriptor, original, false).outcome
    }

    /// Process one load event, optionally tracing per-rule applications.
    ///
    /// With `trace` off, the matched-name list and application trace stay
    /// empty so the hot path does not allocate for diagnostics.
    pub fn run(
        &self,
        descriptor: &CodeUnitDescriptor,
        original: &CodeUnit,
        trace: bool,
    ) -> ProcessRun {
        let total_start = Instant::now();
        deliver(self.observer, &LifecycleEvent::Discovery { descriptor });

        let matching_start = Instant::now();
        let matched = self.catalog.match_rules(descriptor);
        let matching = matching_start.elapsed();

        if matched.is_empty() {
            deliver(self.observer, &LifecycleEvent::Ignored { descriptor });
            deliver(self.observer, &LifecycleEvent::Complete { descriptor, rewritten: false });
            return ProcessRun {
                outcome: TransformOutcome::Unchanged,
                matched: Vec::new(),
                metrics: ProcessMetrics {
                    total: total_start.elapsed(),
                    matching,
                    ..ProcessMetrics::default()
                },
            };
        }

        let matched_names: Vec<String> =
            if trace { matched.iter().map(|r| r.name.clone()).collect() } else { Vec::new() };

        // Fresh per-event state; dropped at the end of this call.
        let mut ctx = EnhanceContext::new();
        // `None` until the first rule contributes; the host keeps its own
        // original, so an all-decline fold allocates nothing.
        let mut current: Option<CodeUnit> = None;
        let mut applications: Vec<RuleApplication> = Vec::new();

        let fold_start = Instant::now();
        for rule in &matched {
            let step_start = Instant::now();
            let unit = current.as_ref().unwrap_or(original);

            // A panicking Enhancer call is a per-rule failure, not a host
            // crash; the Enhancer contract keeps failed calls side-effect
            // free, so `current` is still valid afterwards.
            let applied = catch_unwind(AssertUnwindSafe(|| {
                self.enhancer.apply(unit, &rule.instructions, &mut ctx)
            }))
            .unwrap_or_else(|panic| {
                Err(EnhanceError::Panicked {
                    unit: descriptor.qualified_name.clone(),
                    message: panic_message(panic),
                })
            });

            let outcome = match applied {
                Ok(Applied::Rewritten(next)) => {
                    ctx.mark_enhanced();
                    current = Some(next);
                    RuleOutcome::Rewritten
                }
                Ok(Applied::Declined) => {
                    // Distinct from an error: the rule had nothing to
                    // contribute for this specific unit.
                    tracing::debug!(
                        unit = %descriptor.qualified_name,
                        rule = %rule.name,
                        "rule declined"
                    );
                    RuleOutcome::Declined
                }
                Err(error) => {
                    tracing::warn!(
                        unit = %descriptor.qualified_name,
                        rule = %rule.name,
                        %error,
                        "rule application failed; continuing with remaining rules"
                    );
                    deliver(
                        self.observer,
                        &LifecycleEvent::RuleError { descriptor, rule: &rule.name, error: &error },
                    );
                    RuleOutcome::Failed(error.to_string())
                }
            };

            if trace {
                applications.push(RuleApplication {
                    rule: rule.name.clone(),
                    duration: step_start.elapsed(),
                    outcome,
                });
            }
        }
        let fold = fold_start.elapsed();

        let outcome = match current {
            Some(unit) => {
                debug_assert!(ctx.is_enhanced());
                deliver(self.observer, &LifecycleEvent::Transform { descriptor, unit: &unit });
                TransformOutcome::Rewritten(unit)
            }
            None => TransformOutcome::Unchanged,
        };
        deliver(
            self.observer,
            &LifecycleEvent::Complete { descriptor, rewritten: outcome.is_rewritten() },
        );

        ProcessRun {
            outcome,
            matched: matched_names,
            metrics: ProcessMetrics { total: total_start.elapsed(), matching, fold, applications },
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
