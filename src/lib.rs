extern crate self as codegraft;

use regex::Regex;
use std::collections::HashSet;

#[macro_use]
mod macros;
mod api;
mod engine;
mod rules;
mod shutdown;

#[cfg(test)]
pub(crate) mod testkit;

pub use api::{Agent, ProcessDetails, ProcessReport};
pub use engine::{
    CatalogError, DescriptorTraits, LifecycleEvent, LifecycleObserver, NullObserver,
    ProcessMetrics, RuleApplication, RuleCatalog, RuleOutcome, RuleSource, TracingObserver,
    TraitMask,
};
pub use rules::BuiltinRules;
pub use shutdown::ShutdownCoordinator;

// --- Code units and their descriptors ----------------------------------------

/// The loading context a code unit is defined in.
///
/// Independent loading contexts may load units with identical qualified names;
/// the context is therefore part of a unit's identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum LoaderContext {
    /// The host's primordial loader.
    #[default]
    Bootstrap,
    /// A named, isolated loading context (application, plugin, ...).
    Named(String),
}

/// Identity of a code unit (class/module) as it is about to be loaded.
///
/// Read-only input to matching; the engine never mutates a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnitDescriptor {
    /// Fully qualified name, e.g. `shop.core.UserService`.
    pub qualified_name: String,
    /// Loading context the unit is defined in.
    pub loader: LoaderContext,
    /// True when the unit was already loaded before this pass (retransform).
    pub already_loaded: bool,
    /// Qualified names of supertypes/interfaces, as reported by the host.
    pub super_types: Vec<String>,
    /// Annotation/attribute names present on the unit.
    pub annotations: Vec<String>,
}

impl CodeUnitDescriptor {
    /// Create a descriptor for `qualified_name` with no supertypes or
    /// annotations, defined in the bootstrap loading context.
    pub fn named(qualified_name: impl Into<String>) -> Self {
        CodeUnitDescriptor {
            qualified_name: qualified_name.into(),
            loader: LoaderContext::Bootstrap,
            already_loaded: false,
            super_types: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn in_loader(mut self, loader: LoaderContext) -> Self {
        self.loader = loader;
        self
    }

    pub fn extending(mut self, super_type: impl Into<String>) -> Self {
        self.super_types.push(super_type.into());
        self
    }

    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn previously_loaded(mut self) -> Self {
        self.already_loaded = true;
        self
    }
}

/// A code unit's binary form as handed over by the host at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    /// Qualified name, matching the descriptor it was loaded under.
    pub name: String,
    /// Opaque binary representation (bytecode, module image, ...).
    pub bytes: Vec<u8>,
}

impl CodeUnit {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        CodeUnit { name: name.into(), bytes: bytes.into() }
    }
}

// --- Rules --------------------------------------------------------------------

/// A single predicate atom over a [`CodeUnitDescriptor`].
///
/// A rule carries an ordered list of matchers; the rule matches a descriptor
/// when **all** of its matchers hold (see [`EnhancementRule::matches`]).
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact qualified-name match.
    Name(String),
    /// Regex over the qualified name. Built with the `pattern!` macro for
    /// compiled-in rules, or from an owned `Regex` for loaded catalogs.
    Pattern(Regex),
    /// The descriptor lists this supertype.
    Extends(String),
    /// The descriptor carries this annotation.
    Annotated(String),
    /// Arbitrary predicate over the descriptor. Must be pure.
    Custom(fn(&CodeUnitDescriptor) -> bool),
}

impl Matcher {
    /// Evaluate this matcher against a descriptor. Pure; no side effects.
    pub fn matches(&self, descriptor: &CodeUnitDescriptor) -> bool {
        match self {
            Matcher::Name(name) => descriptor.qualified_name == *name,
            Matcher::Pattern(re) => re.is_match(&descriptor.qualified_name),
            Matcher::Extends(super_type) => {
                descriptor.super_types.iter().any(|s| s == super_type)
            }
            Matcher::Annotated(annotation) => {
                descriptor.annotations.iter().any(|a| a == annotation)
            }
            Matcher::Custom(pred) => pred(descriptor),
        }
    }
}

/// A single rewrite instruction, interpreted by the [`Enhancer`].
///
/// The engine treats instructions as opaque data: it decides *which* rules
/// apply and in what order, while the Enhancer decides what an instruction
/// does to the unit's binary form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Wrap an instance method with an interceptor.
    WrapMethod { method: String, interceptor: String },
    /// Wrap a static method with an interceptor.
    WrapStaticMethod { method: String, interceptor: String },
    /// Wrap the unit's constructors with an interceptor.
    WrapConstructor { interceptor: String },
    /// Inject a field into the unit (e.g. a per-instance context slot).
    InjectField { field: String },
}

/// An enhancement rule: a name, a predicate (matcher list plus declared
/// descriptor traits) and an ordered list of rewrite instructions.
///
/// Immutable after catalog load. Many rules may match one unit; the engine
/// folds all of them, in registration order, into a single rewrite.
#[derive(Debug, Clone)]
pub struct EnhancementRule {
    /// Unique rule name; referenced by error events and diagnostics.
    pub name: String,
    /// Predicate atoms; all must hold for the rule to match.
    pub matchers: Vec<Matcher>,
    /// Instructions handed to the Enhancer when the rule is applied.
    pub instructions: Vec<Instruction>,
    /// Declared coarse descriptor-trait requirements ([`TraitMask`] bits).
    /// Part of the rule's predicate: a rule declaring traits is only
    /// considered for descriptors exhibiting at least one of them.
    pub traits: u32,
}

impl EnhancementRule {
    /// Evaluate the rule's matcher list against a descriptor.
    ///
    /// Trait gating is applied separately by the catalog index; see
    /// `engine::matcher`.
    pub fn matches(&self, descriptor: &CodeUnitDescriptor) -> bool {
        self.matchers.iter().all(|m| m.matches(descriptor))
    }
}

// --- Per-load-event enhancement state -----------------------------------------

/// Scratch state for one load event.
///
/// Created fresh when the orchestrator starts folding rules over a unit and
/// dropped when the fold ends; never shared across units or events. It exists
/// so that independently authored rules can avoid duplicate or conflicting
/// rewrites within the same event without a second catalog pass.
#[derive(Debug, Default)]
pub struct EnhanceContext {
    enhanced: bool,
    extended: bool,
    marks: HashSet<String>,
}

impl EnhanceContext {
    pub fn new() -> Self {
        EnhanceContext::default()
    }

    /// True once any rule has successfully contributed a rewrite.
    pub fn is_enhanced(&self) -> bool {
        self.enhanced
    }

    pub(crate) fn mark_enhanced(&mut self) {
        self.enhanced = true;
    }

    /// Claim the one-per-unit structural extension (field/constructor
    /// injection). Returns true for the first caller within this event and
    /// false afterwards, so two rules cannot both extend the same unit.
    pub fn extend_once(&mut self) -> bool {
        if self.extended {
            false
        } else {
            self.extended = true;
            true
        }
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Record a cross-rule fact (e.g. `"ctor-wrapped"`). Returns true when the
    /// fact was newly recorded, false when a previous rule already set it.
    pub fn mark(&mut self, fact: impl Into<String>) -> bool {
        self.marks.insert(fact.into())
    }

    pub fn has_mark(&self, fact: &str) -> bool {
        self.marks.contains(fact)
    }
}

// --- Enhancer capability --------------------------------------------------------

/// What one rule application produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The rule contributed; the fold adopts this unit as the new `current`.
    Rewritten(CodeUnit),
    /// The rule decided it has nothing to contribute for this unit.
    /// Not an error; logged at debug level only.
    Declined,
}

/// Failure of one rule's instructions against one unit.
///
/// Always contained to the load event it occurred in: the orchestrator keeps
/// the previous unit, reports the error, and continues with remaining rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnhanceError {
    #[error("instruction `{instruction}` failed on `{unit}`: {reason}")]
    Apply { unit: String, instruction: String, reason: String },
    #[error("enhancer panicked while rewriting `{unit}`: {message}")]
    Panicked { unit: String, message: String },
}

/// The opaque low-level rewriting capability.
///
/// Contract: deterministic for identical inputs, synchronous and fast (its
/// latency is the unit's load latency), and side-effect-free on failure — the
/// input unit is taken by shared reference and a rewrite returns a new unit,
/// so a failed application cannot leave `current` half-mutated.
pub trait Enhancer: Send + Sync {
    fn apply(
        &self,
        unit: &CodeUnit,
        instructions: &[Instruction],
        ctx: &mut EnhanceContext,
    ) -> Result<Applied, EnhanceError>;
}

// --- Transformation result -------------------------------------------------------

/// Outcome of one load event, produced once per [`Agent::process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// At least one rule contributed; the host must load this unit instead.
    Rewritten(CodeUnit),
    /// No rule matched, every matched rule declined, or every matched rule
    /// failed. The host passes the original unit through unchanged.
    Unchanged,
}

impl TransformOutcome {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, TransformOutcome::Rewritten(_))
    }

    /// The rewritten unit, if any.
    pub fn unit(&self) -> Option<&CodeUnit> {
        match self {
            TransformOutcome::Rewritten(unit) => Some(unit),
            TransformOutcome::Unchanged => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_variants_evaluate_against_descriptor() {
        let descriptor = CodeUnitDescriptor::named("shop.core.UserService")
            .extending("shop.core.Service")
            .annotated("Traced");

        assert!(Matcher::Name("shop.core.UserService".into()).matches(&descriptor));
        assert!(!Matcher::Name("shop.core.OrderService".into()).matches(&descriptor));
        assert!(Matcher::Pattern(pattern!(r".*Service$")).matches(&descriptor));
        assert!(Matcher::Extends("shop.core.Service".into()).matches(&descriptor));
        assert!(!Matcher::Extends("shop.core.Repository".into()).matches(&descriptor));
        assert!(Matcher::Annotated("Traced".into()).matches(&descriptor));
        assert!(Matcher::Custom(|d| d.qualified_name.starts_with("shop.")).matches(&descriptor));
    }

    #[test]
    fn rule_matches_requires_all_matchers() {
        let rule = rule! {
            name: "user-service-only",
            matchers: [
                Matcher::Pattern(pattern!(r".*Service$")),
                Matcher::Annotated("Traced".into()),
            ],
            instructions: [Instruction::InjectField { field: "ctx".into() }],
        };

        let both = CodeUnitDescriptor::named("a.UserService").annotated("Traced");
        let name_only = CodeUnitDescriptor::named("a.UserService");
        assert!(rule.matches(&both));
        assert!(!rule.matches(&name_only));
    }

    #[test]
    fn enhance_context_extend_once_yields_exactly_once() {
        let mut ctx = EnhanceContext::new();
        assert!(!ctx.is_extended());
        assert!(ctx.extend_once());
        assert!(!ctx.extend_once());
        assert!(ctx.is_extended());
    }

    #[test]
    fn enhance_context_marks_record_cross_rule_facts() {
        let mut ctx = EnhanceContext::new();
        assert!(!ctx.has_mark("ctor-wrapped"));
        assert!(ctx.mark("ctor-wrapped"));
        assert!(!ctx.mark("ctor-wrapped"));
        assert!(ctx.has_mark("ctor-wrapped"));
    }
}
