use crate::engine::{
    LifecycleObserver, NullObserver, Orchestrator, RuleApplication, RuleCatalog,
};
use crate::{CodeUnit, CodeUnitDescriptor, Enhancer, TransformOutcome};
use std::time::Duration;

/// The agent's dispatch context.
///
/// Explicitly constructed at startup and owned by the process entry point —
/// there is no global service registry. It bundles the read-only
/// [`RuleCatalog`], the opaque [`Enhancer`] capability and an optional
/// [`LifecycleObserver`], and is the host's single integration point: the
/// host calls [`Agent::process`] exactly once per code-unit load, from any
/// number of loading threads, and applies the returned outcome before
/// execution of that unit proceeds.
pub struct Agent {
    catalog: RuleCatalog,
    enhancer: Box<dyn Enhancer>,
    observer: Box<dyn LifecycleObserver>,
}

impl Agent {
    /// Build an agent over a loaded catalog with no diagnostic observer.
    pub fn new(catalog: RuleCatalog, enhancer: Box<dyn Enhancer>) -> Self {
        Agent { catalog, enhancer, observer: Box::new(NullObserver) }
    }

    /// Attach a lifecycle observer (diagnostics only, never control flow).
    pub fn with_observer(mut self, observer: Box<dyn LifecycleObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Process one load event.
    ///
    /// Safe to call concurrently for independent units; the only shared state
    /// is the read-only catalog.
    pub fn process(
        &self,
        descriptor: &CodeUnitDescriptor,
        original: &CodeUnit,
    ) -> TransformOutcome {
        Orchestrator::new(&self.catalog, self.enhancer.as_ref(), self.observer.as_ref())
            .process(descriptor, original)
    }

    /// Process one load event and return extra (compact) diagnostic details.
    ///
    /// Useful for profiling and rule debugging; the default [`Agent::process`]
    /// path does not allocate these extra traces.
    pub fn process_verbose(
        &self,
        descriptor: &CodeUnitDescriptor,
        original: &CodeUnit,
    ) -> ProcessReport {
        let run = Orchestrator::new(&self.catalog, self.enhancer.as_ref(), self.observer.as_ref())
            .run(descriptor, original, true);

        ProcessReport {
            unit: descriptor.qualified_name.clone(),
            outcome: run.outcome,
            details: ProcessDetails {
                total: run.metrics.total,
                matching: run.metrics.matching,
                fold: run.metrics.fold,
                matched_rules: run.matched,
                applications: run.metrics.applications,
            },
        }
    }
}

/// Result from [`Agent::process_verbose`].
#[derive(Debug, Clone)]
pub struct ProcessReport {
    /// Qualified name of the processed unit.
    pub unit: String,
    /// Final result for the load event.
    pub outcome: TransformOutcome,
    /// Per-stage diagnostics.
    pub details: ProcessDetails,
}

/// Additional details returned by [`Agent::process_verbose`].
///
/// Intentionally compact: meant for debugging and performance inspection
/// without dumping the engine's internal state.
#[derive(Debug, Clone)]
pub struct ProcessDetails {
    /// Total elapsed time.
    pub total: Duration,
    /// Time spent selecting matching rules.
    pub matching: Duration,
    /// Time spent folding matched rules through the Enhancer.
    pub fold: Duration,
    /// Names of the rules that matched this unit, in fold order.
    pub matched_rules: Vec<String>,
    /// Per-rule application trace.
    pub applications: Vec<RuleApplication>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RuleOutcome;
    use crate::testkit::{RecordingObserver, TagEnhancer};
    use crate::{Instruction, Matcher};
    use std::sync::Arc;

    fn inject(field: &str) -> Instruction {
        Instruction::InjectField { field: field.into() }
    }

    fn scenario_agent() -> Agent {
        let catalog = RuleCatalog::from_rules(vec![
            rule! {
                name: "RuleA",
                matchers: [name_like!(r".*Service$")],
                instructions: [inject("I1")],
            },
            rule! {
                name: "RuleB",
                matchers: [Matcher::Name("UserService".into())],
                instructions: [inject("I2")],
            },
        ])
        .unwrap();
        Agent::new(catalog, Box::new(TagEnhancer::default()))
    }

    #[test]
    fn scenario_user_order_util() {
        let agent = scenario_agent();
        let base = |name: &str| CodeUnit::new(name, b"base".to_vec());

        let user = agent.process(&CodeUnitDescriptor::named("UserService"), &base("UserService"));
        assert_eq!(user.unit().unwrap().bytes, b"base;I1;I2".to_vec());

        let order =
            agent.process(&CodeUnitDescriptor::named("OrderService"), &base("OrderService"));
        assert_eq!(order.unit().unwrap().bytes, b"base;I1".to_vec());

        let util = agent.process(&CodeUnitDescriptor::named("Util"), &base("Util"));
        assert_eq!(util, TransformOutcome::Unchanged);
    }

    #[test]
    fn verbose_report_carries_matched_rules_and_trace() {
        let agent = scenario_agent();
        let descriptor = CodeUnitDescriptor::named("UserService");
        let base = CodeUnit::new("UserService", b"base".to_vec());

        let report = agent.process_verbose(&descriptor, &base);
        assert_eq!(report.unit, "UserService");
        assert_eq!(report.details.matched_rules, vec!["RuleA", "RuleB"]);
        assert_eq!(report.details.applications.len(), 2);
        assert!(report
            .details
            .applications
            .iter()
            .all(|a| a.outcome == RuleOutcome::Rewritten));
        assert!(report.details.total >= report.details.fold);
        assert!(report.outcome.is_rewritten());
    }

    #[test]
    fn hot_path_report_is_equivalent_to_verbose_outcome() {
        let agent = scenario_agent();
        let descriptor = CodeUnitDescriptor::named("UserService");
        let base = CodeUnit::new("UserService", b"base".to_vec());

        let plain = agent.process(&descriptor, &base);
        let verbose = agent.process_verbose(&descriptor, &base);
        assert_eq!(plain, verbose.outcome);
    }

    #[test]
    fn observer_panics_do_not_change_the_outcome() {
        struct ExplodingObserver;
        impl crate::LifecycleObserver for ExplodingObserver {
            fn on_event(&self, _event: &crate::LifecycleEvent<'_>) {
                panic!("observer bug");
            }
        }

        let agent = scenario_agent().with_observer(Box::new(ExplodingObserver));
        let descriptor = CodeUnitDescriptor::named("UserService");
        let base = CodeUnit::new("UserService", b"base".to_vec());

        let outcome = agent.process(&descriptor, &base);
        assert_eq!(outcome.unit().unwrap().bytes, b"base;I1;I2".to_vec());
    }

    #[test]
    fn concurrent_events_match_sequential_results() {
        let observer = Arc::new(RecordingObserver::default());
        struct Forward(Arc<RecordingObserver>);
        impl crate::LifecycleObserver for Forward {
            fn on_event(&self, event: &crate::LifecycleEvent<'_>) {
                self.0.on_event(event);
            }
        }

        let agent =
            Arc::new(scenario_agent().with_observer(Box::new(Forward(Arc::clone(&observer)))));

        let units: Vec<String> = (0..16)
            .map(|i| match i % 3 {
                0 => format!("unit{i}.UserService"),
                1 => format!("unit{i}.OrderService"),
                _ => format!("unit{i}.Util"),
            })
            .collect();

        // Sequential pass.
        let sequential: Vec<TransformOutcome> = units
            .iter()
            .map(|name| {
                agent.process(
                    &CodeUnitDescriptor::named(name.clone()),
                    &CodeUnit::new(name.clone(), b"base".to_vec()),
                )
            })
            .collect();
        observer.take();

        // Concurrent pass over the same inputs.
        let handles: Vec<_> = units
            .iter()
            .map(|name| {
                let agent = Arc::clone(&agent);
                let name = name.clone();
                std::thread::spawn(move || {
                    agent.process(
                        &CodeUnitDescriptor::named(name.clone()),
                        &CodeUnit::new(name, b"base".to_vec()),
                    )
                })
            })
            .collect();
        let concurrent: Vec<TransformOutcome> =
            handles.into_iter().map(|h| h.join().expect("worker panicked")).collect();

        assert_eq!(sequential, concurrent);
        // Every event was delivered, even if interleaved across units.
        assert_eq!(observer.take().len() % 3, 0);
    }
}
