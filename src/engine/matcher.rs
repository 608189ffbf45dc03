//! Descriptor scanning and candidate-rule selection.
//!
//! This module inspects a [`CodeUnitDescriptor`] and produces the ordered
//! subset of catalog rules whose predicate matches it.
//!
//! Selection happens in two stages:
//!
//! - **Trait scan** ([`DescriptorTraits::scan`]): cheap booleans derived from
//!   the descriptor such as "has supertypes" or "name is nested". These enable
//!   trait-gated rules via `RuleIndex::by_trait`.
//! - **Full evaluation**: every candidate rule's matcher list is evaluated
//!   against the descriptor, in registration order.
//!
//! ## Design notes
//!
//! - Matching is a pure function of (descriptor, catalog) with no side
//!   effects. A rule's declared traits are part of its predicate, so trait
//!   gating never changes the result relative to evaluating the full catalog.
//! - The returned order is **registration order**. This is what makes
//!   composition reproducible when several rules touch the same unit: the
//!   orchestrator folds instructions in exactly this order, every time.
//! - The scan is a heuristic prefilter only in the performance sense; false
//!   candidates are fine because the matcher list still has to hold.

use super::catalog::{
    RuleCatalog, RuleId, TRAIT_ALREADY_LOADED, TRAIT_BOOTSTRAP_LOADER, TRAIT_HAS_ANNOTATIONS,
    TRAIT_HAS_SUPER_TYPES, TRAIT_NESTED, TraitMask,
};
use crate::{CodeUnitDescriptor, EnhancementRule, LoaderContext};
use std::collections::HashSet;

/// Coarse characteristics detected on a descriptor.
///
/// Used to quickly gate rule candidacy before full matcher evaluation.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorTraits {
    pub mask: TraitMask,
}

impl DescriptorTraits {
    /// Scan `descriptor` for coarse traits.
    pub fn scan(descriptor: &CodeUnitDescriptor) -> Self {
        let mut mask = TraitMask::empty();

        if !descriptor.super_types.is_empty() {
            mask |= TraitMask::HAS_SUPER_TYPES;
        }
        if !descriptor.annotations.is_empty() {
            mask |= TraitMask::HAS_ANNOTATIONS;
        }
        // `$` marks synthetic/nested units in qualified names.
        if descriptor.qualified_name.contains('$') {
            mask |= TraitMask::NESTED;
        }
        if descriptor.already_loaded {
            mask |= TraitMask::ALREADY_LOADED;
        }
        if descriptor.loader == LoaderContext::Bootstrap {
            mask |= TraitMask::BOOTSTRAP_LOADER;
        }

        DescriptorTraits { mask }
    }
}

/// Select the ordered subset of catalog rules matching `descriptor`.
pub(crate) fn select<'a>(
    catalog: &'a RuleCatalog,
    descriptor: &CodeUnitDescriptor,
) -> Vec<&'a EnhancementRule> {
    let scanned = DescriptorTraits::scan(descriptor);

    // Candidate set: trait-free rules plus rules gated on a trait the
    // descriptor exhibits. Direct checks avoid HashMap overhead.
    let index = catalog.index();
    let mut candidates: HashSet<RuleId> = index.always_on.iter().copied().collect();

    if scanned.mask.contains(TraitMask::HAS_SUPER_TYPES) {
        candidates.extend(&index.by_trait[TRAIT_HAS_SUPER_TYPES]);
    }
    if scanned.mask.contains(TraitMask::HAS_ANNOTATIONS) {
        candidates.extend(&index.by_trait[TRAIT_HAS_ANNOTATIONS]);
    }
    if scanned.mask.contains(TraitMask::NESTED) {
        candidates.extend(&index.by_trait[TRAIT_NESTED]);
    }
    if scanned.mask.contains(TraitMask::ALREADY_LOADED) {
        candidates.extend(&index.by_trait[TRAIT_ALREADY_LOADED]);
    }
    if scanned.mask.contains(TraitMask::BOOTSTRAP_LOADER) {
        candidates.extend(&index.by_trait[TRAIT_BOOTSTRAP_LOADER]);
    }

    // Full evaluation in registration order keeps the fold deterministic.
    let matched: Vec<&EnhancementRule> = catalog
        .rules()
        .iter()
        .enumerate()
        .filter(|(id, _)| candidates.contains(id))
        .filter(|(_, rule)| rule.matches(descriptor))
        .map(|(_, rule)| rule)
        .collect();

    tracing::debug!(
        unit = %descriptor.qualified_name,
        candidates = candidates.len(),
        matched = matched.len(),
        total = catalog.len(),
        "rule selection"
    );

    matched
}
