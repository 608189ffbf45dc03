//! Built-in observability ruleset.
//!
//! A small, compiled-in catalog in the spirit of a tracing/metrics agent:
//! entry-span wrapping for service types, span propagation for HTTP handler
//! types, and call metrics for repository types. Rules are declared with the
//! `rule!` macro; the engine treats them as plain data.
//!
//! This is the default catalog used by the demo binary. Hosts with their own
//! rulesets supply a different [`RuleSource`](crate::RuleSource).

pub mod observability;

use crate::engine::{CatalogError, RuleSource};
use crate::EnhancementRule;

/// [`RuleSource`](crate::RuleSource) serving the compiled-in ruleset.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinRules;

impl RuleSource for BuiltinRules {
    fn load(&self) -> Result<Vec<EnhancementRule>, CatalogError> {
        Ok(observability::get())
    }
}
