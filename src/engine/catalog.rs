//! Rule catalog: load-once compilation and indexing.
//!
//! This module holds the *static* side of the engine: the structures derived
//! from the full rule list at agent startup that make per-load-event matching
//! fast and predictable.
//!
//! Operation is intentionally split into two phases:
//!
//! 1. **Load/index rules** (this module): pull the rule definitions from a
//!    [`RuleSource`] exactly once, validate them, and pre-index them with
//!    coarse metadata. A failure here is fatal — an agent with no rules, or a
//!    corrupted rule set, cannot safely instrument anything.
//! 2. **Run** (see `matcher.rs` / `orchestrator.rs`): scan each descriptor for
//!    coarse traits, select the matching subset, fold it.
//!
//! The indexing currently supports:
//!
//! - **Traits** ([`TraitMask`]): coarse boolean features of a descriptor (e.g.
//!   "has supertypes") used to quickly discard entire swathes of rules.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleCatalog::rules` and `RuleCatalog::metas`.
//!   Those vectors must stay aligned; `RuleId` is also the registration order
//!   used for deterministic composition.
//! - The catalog is append-only during `load` and read-only afterwards. No
//!   interior mutability, so unsynchronized concurrent reads are safe.
//! - `RuleIndex::by_trait` uses fixed indices (`TRAIT_*`) to avoid `HashMap`
//!   overhead in the hot path.

use crate::{CodeUnitDescriptor, EnhancementRule};

/// Rule identifier: index into the rules vector, i.e. registration order.
pub(crate) type RuleId = usize;

bitflags::bitflags! {
    /// Coarse descriptor traits for fast candidate gating.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TraitMask: u32 {
        const HAS_SUPER_TYPES  = 1 << 0;
        const HAS_ANNOTATIONS  = 1 << 1;
        const NESTED           = 1 << 2;
        const ALREADY_LOADED   = 1 << 3;
        const BOOTSTRAP_LOADER = 1 << 4;
    }
}

pub(crate) const TRAIT_COUNT: usize = 5;
pub(crate) const TRAIT_HAS_SUPER_TYPES: usize = 0;
pub(crate) const TRAIT_HAS_ANNOTATIONS: usize = 1;
pub(crate) const TRAIT_NESTED: usize = 2;
pub(crate) const TRAIT_ALREADY_LOADED: usize = 3;
pub(crate) const TRAIT_BOOTSTRAP_LOADER: usize = 4;

/// Metadata attached to a rule at load time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RuleMeta {
    pub traits: TraitMask,
}

#[derive(Default, Debug)]
pub(crate) struct RuleIndex {
    pub always_on: Vec<RuleId>,
    pub by_trait: [Vec<RuleId>; TRAIT_COUNT],
}

/// Supplies the rule definitions at agent startup.
///
/// External collaborator: rule authoring and pattern compilation live behind
/// this trait. Failure here aborts agent startup.
pub trait RuleSource {
    fn load(&self) -> Result<Vec<EnhancementRule>, CatalogError>;
}

/// Fatal startup error: the catalog could not be loaded or is unusable.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("rule catalog source failed")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("rule catalog is empty")]
    Empty,
    #[error("duplicate rule name `{0}` in catalog")]
    DuplicateRule(String),
}

/// The immutable, indexed rule catalog.
///
/// Loaded once before any load events are processed; safe for unsynchronized
/// concurrent reads afterwards.
#[derive(Debug)]
pub struct RuleCatalog {
    rules: Vec<EnhancementRule>,
    metas: Vec<RuleMeta>,
    index: RuleIndex,
}

impl RuleCatalog {
    /// Load the catalog from `source`, exactly once at startup.
    ///
    /// Fails fatally (the caller must abort agent startup) when the source
    /// fails, the rule set is empty, or two rules share a name.
    pub fn load(source: &dyn RuleSource) -> Result<Self, CatalogError> {
        let rules = source.load()?;
        Self::from_rules(rules)
    }

    /// Build a catalog from an in-memory rule list.
    ///
    /// Convenience for compiled-in rulesets and tests; applies the same
    /// validation as [`RuleCatalog::load`].
    pub fn from_rules(rules: Vec<EnhancementRule>) -> Result<Self, CatalogError> {
        if rules.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut names = std::collections::HashSet::new();
        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(CatalogError::DuplicateRule(rule.name.clone()));
            }
        }

        // Metadata comes directly from the raw trait bits on each rule.
        let metas: Vec<RuleMeta> = rules
            .iter()
            .map(|r| RuleMeta { traits: TraitMask::from_bits_truncate(r.traits) })
            .collect();

        // Build the trait-bucket index.
        let mut index = RuleIndex::default();

        for (id, meta) in metas.iter().enumerate() {
            if meta.traits.is_empty() {
                // No trait requirements -> considered for every descriptor.
                index.always_on.push(id);
            } else {
                if meta.traits.contains(TraitMask::HAS_SUPER_TYPES) {
                    index.by_trait[TRAIT_HAS_SUPER_TYPES].push(id);
                }
                if meta.traits.contains(TraitMask::HAS_ANNOTATIONS) {
                    index.by_trait[TRAIT_HAS_ANNOTATIONS].push(id);
                }
                if meta.traits.contains(TraitMask::NESTED) {
                    index.by_trait[TRAIT_NESTED].push(id);
                }
                if meta.traits.contains(TraitMask::ALREADY_LOADED) {
                    index.by_trait[TRAIT_ALREADY_LOADED].push(id);
                }
                if meta.traits.contains(TraitMask::BOOTSTRAP_LOADER) {
                    index.by_trait[TRAIT_BOOTSTRAP_LOADER].push(id);
                }
            }
        }

        Ok(RuleCatalog { rules, metas, index })
    }

    /// All rules, in registration order.
    pub fn rules(&self) -> &[EnhancementRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        // A loaded catalog is never empty; kept for API symmetry.
        self.rules.is_empty()
    }

    pub(crate) fn metas(&self) -> &[RuleMeta] {
        &self.metas
    }

    pub(crate) fn index(&self) -> &RuleIndex {
        &self.index
    }

    /// The ordered subset of rules whose predicate matches `descriptor`.
    ///
    /// Order is registration order and is stable across repeated calls; see
    /// `matcher.rs` for the selection algorithm.
    pub fn match_rules(&self, descriptor: &CodeUnitDescriptor) -> Vec<&EnhancementRule> {
        super::matcher::select(self, descriptor)
    }
}
