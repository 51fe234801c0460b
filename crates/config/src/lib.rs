//! Build-configuration resolution engine for a hardware simulator.
//!
//! This crate turns layered JSON configuration fragments into one fully
//! explicit machine description, in stages:
//! 1. **Document:** lenient parse of raw JSON into typed documents.
//! 2. **Normalize:** reshape each document into the canonical form (caches
//!    lifted into a flat map, core templates broadcast across `num_cores`).
//! 3. **Merge:** fold the layers field-wise, earlier layers winning.
//! 4. **Expand:** fill deterministic default names, wire the default
//!    hierarchy, anchor dangling chains, prune unreachable caches.
//! 5. **Frequency:** propagate core clocks down the hierarchy graph.
//! 6. **Modules:** resolve referenced algorithm modules into a registry.
//!
//! The entry point is [`resolve`], which runs the whole pipeline and
//! validates that no dangling references survive.

/// Raw JSON document shapes, lenient reference forms, and key tables.
pub mod document;
/// Error taxonomy for the resolution pipeline.
pub mod error;
/// Hierarchy expansion: default names, broadcast, chain termination,
/// reachability filtering.
pub mod expand;
/// Topological clock-frequency propagation.
pub mod frequency;
/// Canonical machine records (cores, caches, walkers, constants).
pub mod machine;
/// Field-wise layer merging and executable naming.
pub mod merge;
/// Module lookup capabilities and registry resolution.
pub mod modules;
/// Document-to-canonical normalization.
pub mod normalize;
/// Pipeline orchestration and final validation.
pub mod resolve;

pub use crate::document::ConfigDocument;
pub use crate::error::{ConfigError, Result};
pub use crate::machine::{
    Cache, Constants, Core, MEMORY_SENTINEL, NormalizedConfig, Ptw, ResolvedConfig,
};
pub use crate::modules::{ModuleCategory, ModuleContext, ModuleContexts, ModuleRecord};
pub use crate::resolve::resolve;
