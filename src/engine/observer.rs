//! Lifecycle events and observer delivery.
//!
//! The orchestrator reports the life of each load event through a single
//! tagged event type and a single dispatch function — there is no listener
//! hierarchy with empty default methods to override.
//!
//! Event order per load event, as applicable:
//!
//! ```text
//! Discovery → (Ignored | RuleError* → Transform) → Complete
//! ```
//!
//! `Complete` always fires, regardless of outcome.
//!
//! Observers are diagnostics, never control flow: delivery is synchronous and
//! inline, and a failing (panicking) observer is swallowed and logged, never
//! allowed to affect the transformation outcome.

use crate::{CodeUnit, CodeUnitDescriptor, EnhanceError};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// One lifecycle event for one load event.
#[derive(Debug)]
pub enum LifecycleEvent<'a> {
    /// The unit was seen, before matching.
    Discovery { descriptor: &'a CodeUnitDescriptor },
    /// No rule matched; the unit passes through unchanged.
    Ignored { descriptor: &'a CodeUnitDescriptor },
    /// The fold finished with at least one contribution; `unit` is final.
    Transform { descriptor: &'a CodeUnitDescriptor, unit: &'a CodeUnit },
    /// One rule's instructions failed during the fold.
    RuleError { descriptor: &'a CodeUnitDescriptor, rule: &'a str, error: &'a EnhanceError },
    /// Processing for the unit finished, regardless of outcome.
    Complete { descriptor: &'a CodeUnitDescriptor, rewritten: bool },
}

impl LifecycleEvent<'_> {
    /// The descriptor of the unit this event concerns.
    pub fn descriptor(&self) -> &CodeUnitDescriptor {
        match self {
            LifecycleEvent::Discovery { descriptor }
            | LifecycleEvent::Ignored { descriptor }
            | LifecycleEvent::Transform { descriptor, .. }
            | LifecycleEvent::RuleError { descriptor, .. }
            | LifecycleEvent::Complete { descriptor, .. } => descriptor,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Discovery { .. } => "discovery",
            LifecycleEvent::Ignored { .. } => "ignored",
            LifecycleEvent::Transform { .. } => "transform",
            LifecycleEvent::RuleError { .. } => "error",
            LifecycleEvent::Complete { .. } => "complete",
        }
    }
}

/// A diagnostic sink for lifecycle events.
///
/// Absence (see [`NullObserver`]) must not affect correctness, and neither
/// may presence: implementations should not panic, but if one does the event
/// is dropped and logged.
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent<'_>);
}

/// Deliver one event, isolating the orchestrator from observer failures.
pub(crate) fn deliver(observer: &dyn LifecycleObserver, event: &LifecycleEvent<'_>) {
    let delivery = catch_unwind(AssertUnwindSafe(|| observer.on_event(event)));
    if delivery.is_err() {
        tracing::error!(
            kind = event.kind(),
            unit = %event.descriptor().qualified_name,
            "lifecycle observer panicked; event dropped"
        );
    }
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl LifecycleObserver for NullObserver {
    fn on_event(&self, _event: &LifecycleEvent<'_>) {}
}

/// Observer that forwards events to the `tracing` diagnostic sink.
///
/// Discovery/ignored/complete are debug-level chatter; transforms are worth
/// an info line and rule errors a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        match event {
            LifecycleEvent::Discovery { descriptor } => {
                tracing::debug!(unit = %descriptor.qualified_name, "unit discovered");
            }
            LifecycleEvent::Ignored { descriptor } => {
                tracing::debug!(unit = %descriptor.qualified_name, "unit ignored, no matching rule");
            }
            LifecycleEvent::Transform { descriptor, unit } => {
                tracing::info!(
                    unit = %descriptor.qualified_name,
                    bytes = unit.bytes.len(),
                    "unit transformed"
                );
            }
            LifecycleEvent::RuleError { descriptor, rule, error } => {
                tracing::warn!(
                    unit = %descriptor.qualified_name,
                    rule = %rule,
                    %error,
                    "rule failed to apply"
                );
            }
            LifecycleEvent::Complete { descriptor, rewritten } => {
                tracing::debug!(
                    unit = %descriptor.qualified_name,
                    rewritten = rewritten,
                    "unit processing complete"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickyObserver;
    impl LifecycleObserver for PanickyObserver {
        fn on_event(&self, _event: &LifecycleEvent<'_>) {
            panic!("observer bug");
        }
    }

    #[test]
    fn delivery_swallows_observer_panics() {
        let descriptor = CodeUnitDescriptor::named("a.B");
        let event = LifecycleEvent::Discovery { descriptor: &descriptor };
        // Must not propagate.
        deliver(&PanickyObserver, &event);
    }

    #[test]
    fn event_kind_and_descriptor_accessors() {
        let descriptor = CodeUnitDescriptor::named("a.B");
        let unit = CodeUnit::new("a.B", b"base".to_vec());
        let error = EnhanceError::Apply {
            unit: "a.B".into(),
            instruction: "inject".into(),
            reason: "boom".into(),
        };

        let events = [
            LifecycleEvent::Discovery { descriptor: &descriptor },
            LifecycleEvent::Ignored { descriptor: &descriptor },
            LifecycleEvent::Transform { descriptor: &descriptor, unit: &unit },
            LifecycleEvent::RuleError { descriptor: &descriptor, rule: "r", error: &error },
            LifecycleEvent::Complete { descriptor: &descriptor, rewritten: true },
        ];
        let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["discovery", "ignored", "transform", "error", "complete"]);
        for event in &events {
            assert_eq!(event.descriptor().qualified_name, "a.B");
        }
    }
}
