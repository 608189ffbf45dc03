//! Matching-and-composition engine.
//!
//! This module is the dispatch core of the agent: given a load event for one
//! code unit and the immutable rule catalog, it finds the applicable rules,
//! folds them into a single rewrite, and keeps every failure contained to the
//! event it occurred in.
//!
//! ## How the parts work together
//!
//! Processing one load event is a pipeline:
//!
//! ```text
//! rules (all) ──┐
//!              │  RuleCatalog::load            (catalog.rs)
//!              └───────────────┬──────────────
//!                              │
//! descriptor ── DescriptorTraits::scan ──┼─ select candidate rules (trait buckets)
//!              (matcher.rs)              │
//!                                        v
//!                      Orchestrator::process (orchestrator.rs)
//!                        - fold matched rules in registration order
//!                        - one EnhanceContext per event
//!                        - per-rule failures contained, fold continues
//!                              │
//!                              v
//!                      TransformOutcome + LifecycleEvents (observer.rs)
//! ```
//!
//! The engine leans on **determinism**: the matched-rule sequence is a pure
//! function of (descriptor, catalog) and is folded in registration order, so
//! repeated load events for identical inputs compose identically.
//!
//! ## Responsibilities by module
//!
//! - `catalog.rs`: loads the catalog once at startup (fatal on failure),
//!   derives per-rule metadata and a cheap trait-bucket index.
//! - `matcher.rs`: scans a descriptor for coarse traits and selects the
//!   ordered subset of rules whose predicate matches.
//! - `orchestrator.rs`: the per-load-event fold through the opaque
//!   [`Enhancer`](crate::Enhancer), guarded by a fresh
//!   [`EnhanceContext`](crate::EnhanceContext).
//! - `observer.rs`: lifecycle events (discovery/ignored/transform/error/
//!   complete) and panic-isolated delivery to diagnostic sinks.
//! - `metrics.rs`: opt-in timing/trace data for verbose runs.
//!
//! ## Concurrency
//!
//! Load events may arrive concurrently from independent loading contexts.
//! Nothing here holds shared mutable state: catalog reads are lock-free
//! (read-only after load) and all per-event state lives on the caller's
//! stack, so `process` is safely re-entrant.

#[path = "engine/catalog.rs"]
mod catalog;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/observer.rs"]
mod observer;
#[path = "engine/orchestrator.rs"]
mod orchestrator;

pub use catalog::{CatalogError, RuleCatalog, RuleSource, TraitMask};
pub use matcher::DescriptorTraits;
pub use metrics::{ProcessMetrics, RuleApplication, RuleOutcome};
pub use observer::{LifecycleEvent, LifecycleObserver, NullObserver, TracingObserver};

pub(crate) use orchestrator::Orchestrator;
