//! Rule definitions for the built-in observability catalog.

use crate::engine::TraitMask;
use crate::{EnhancementRule, Instruction, Matcher};

fn wrap(method: &str, interceptor: &str) -> Instruction {
    Instruction::WrapMethod { method: method.into(), interceptor: interceptor.into() }
}

/// Entry spans around every public method of `*Service` types.
fn rule_service_entry_spans() -> EnhancementRule {
    rule! {
        name: "service-entry-spans",
        matchers: [name_like!(r".*Service$")],
        instructions: [
            wrap("*", "codegraft.trace.EntrySpanInterceptor"),
        ],
    }
}

/// Span context slot plus handler wrapping for HTTP controller/handler types.
fn rule_http_handler_spans() -> EnhancementRule {
    rule! {
        name: "http-handler-spans",
        matchers: [name_like!(r".*(Controller|Handler)$")],
        instructions: [
            Instruction::InjectField { field: "__graft_span".into() },
            wrap("handle", "codegraft.trace.HttpSpanInterceptor"),
        ],
    }
}

/// Call counters and latency timers for repository implementations.
///
/// Gated on the supertype trait: only units that actually declare supertypes
/// are candidates, which keeps this rule away from plain utility types.
fn rule_repository_metrics() -> EnhancementRule {
    rule! {
        name: "repository-call-metrics",
        matchers: [Matcher::Extends("core.data.Repository".into())],
        traits: TraitMask::HAS_SUPER_TYPES.bits(),
        instructions: [
            wrap("*", "codegraft.metrics.CallTimerInterceptor"),
        ],
    }
}

/// Explicit opt-in timing for anything annotated `Timed`.
fn rule_annotated_timers() -> EnhancementRule {
    rule! {
        name: "annotated-timers",
        matchers: [Matcher::Annotated("Timed".into())],
        traits: TraitMask::HAS_ANNOTATIONS.bits(),
        instructions: [
            Instruction::WrapConstructor { interceptor: "codegraft.metrics.TimerInitInterceptor".into() },
            wrap("*", "codegraft.metrics.TimedMethodInterceptor"),
        ],
    }
}

/// The full built-in ruleset, in registration order.
pub fn get() -> Vec<EnhancementRule> {
    vec![
        rule_service_entry_spans(),
        rule_http_handler_spans(),
        rule_repository_metrics(),
        rule_annotated_timers(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RuleCatalog;
    use crate::rules::BuiltinRules;
    use crate::CodeUnitDescriptor;

    #[test]
    fn builtin_ruleset_loads_as_a_catalog() {
        let catalog = RuleCatalog::load(&BuiltinRules).unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn builtin_rules_match_the_expected_units() {
        let catalog = RuleCatalog::load(&BuiltinRules).unwrap();

        let names = |descriptor: &CodeUnitDescriptor| -> Vec<String> {
            catalog.match_rules(descriptor).iter().map(|r| r.name.clone()).collect()
        };

        let service = CodeUnitDescriptor::named("shop.core.UserService");
        assert_eq!(names(&service), vec!["service-entry-spans"]);

        let controller = CodeUnitDescriptor::named("shop.api.CheckoutController");
        assert_eq!(names(&controller), vec!["http-handler-spans"]);

        let repo = CodeUnitDescriptor::named("shop.data.UserStore")
            .extending("core.data.Repository")
            .annotated("Timed");
        assert_eq!(names(&repo), vec!["repository-call-metrics", "annotated-timers"]);

        let util = CodeUnitDescriptor::named("shop.util.Strings");
        assert!(names(&util).is_empty());
    }
}
