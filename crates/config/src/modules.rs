//! Module lookup and registry resolution.
//!
//! Branch predictors, BTBs, prefetchers and replacement policies are
//! pluggable algorithm modules selected by name. Lookup is a capability
//! injected by the module-discovery subsystem: one [`ModuleContext`] per
//! category, each able to resolve a single name or enumerate everything it
//! can discover. The resolver builds a single deduplicated name-to-record
//! registry that decides what gets compiled into the final binary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::machine::{Cache, Core};

/// The four pluggable module categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCategory {
    /// Conditional branch direction predictors.
    BranchPredictor,
    /// Branch-target buffers.
    Btb,
    /// Cache prefetchers.
    Prefetcher,
    /// Cache replacement policies.
    Replacement,
}

impl ModuleCategory {
    /// All categories, in registry resolution order.
    pub const ALL: [ModuleCategory; 4] = [
        ModuleCategory::BranchPredictor,
        ModuleCategory::Btb,
        ModuleCategory::Prefetcher,
        ModuleCategory::Replacement,
    ];
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModuleCategory::BranchPredictor => "branch-predictor",
            ModuleCategory::Btb => "BTB",
            ModuleCategory::Prefetcher => "prefetcher",
            ModuleCategory::Replacement => "replacement",
        };
        write!(f, "{label}")
    }
}

/// One discovered module: its name, category, and source location, plus the
/// metadata downstream consumers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module name, unique within the registry.
    pub name: String,
    /// Category the module belongs to.
    pub category: ModuleCategory,
    /// Source location reported by the discovery capability.
    pub path: String,
    /// Whether a prefetcher module targets instruction caches.
    #[serde(default, rename = "_is_instruction_prefetcher")]
    pub is_instruction_prefetcher: bool,
}

/// Lookup capability for one module category.
///
/// Supplied by the module-discovery subsystem; the engine only ever reads
/// through it. Implementations must be safe for concurrent lookups, since
/// independent resolutions may share one context.
pub trait ModuleContext: Sync {
    /// Resolves a single module by name, or `None` if it is unknown.
    fn find(&self, name: &str) -> Option<ModuleRecord>;

    /// Enumerates every module the capability can discover, referenced or
    /// not.
    fn find_all(&self) -> Vec<ModuleRecord>;
}

/// The four lookup capabilities injected into a resolution pass.
pub struct ModuleContexts<'a> {
    /// Branch-predictor lookup.
    pub branch_predictor: &'a dyn ModuleContext,
    /// BTB lookup.
    pub btb: &'a dyn ModuleContext,
    /// Prefetcher lookup.
    pub prefetcher: &'a dyn ModuleContext,
    /// Replacement-policy lookup.
    pub replacement: &'a dyn ModuleContext,
}

impl<'a> ModuleContexts<'a> {
    fn context(&self, category: ModuleCategory) -> &'a dyn ModuleContext {
        match category {
            ModuleCategory::BranchPredictor => self.branch_predictor,
            ModuleCategory::Btb => self.btb,
            ModuleCategory::Prefetcher => self.prefetcher,
            ModuleCategory::Replacement => self.replacement,
        }
    }
}

/// Resolves one list of referenced names, inserting each record into the
/// registry and returning the records for annotation on the referrer.
fn resolve_references(
    names: &[String],
    category: ModuleCategory,
    contexts: &ModuleContexts<'_>,
    registry: &mut BTreeMap<String, ModuleRecord>,
) -> Result<Vec<ModuleRecord>> {
    names
        .iter()
        .map(|name| {
            let record =
                contexts
                    .context(category)
                    .find(name)
                    .ok_or_else(|| ConfigError::ModuleNotFound {
                        category,
                        name: name.clone(),
                    })?;
            registry
                .entry(record.name.clone())
                .or_insert_with(|| record.clone());
            Ok(record)
        })
        .collect()
}

/// Builds the module registry for a resolved machine.
///
/// Every referenced name is resolved through its category's context and the
/// referencing core or cache annotated with the resolved records. With
/// `compile_all`, every additionally-discoverable module is unioned in,
/// deduplicated by name with referenced records taking priority; without
/// it, only referenced modules appear. A referenced-but-unknown name is an
/// error in both modes.
pub fn resolve_modules(
    cores: &mut [Core],
    caches: &mut BTreeMap<String, Cache>,
    contexts: &ModuleContexts<'_>,
    compile_all: bool,
) -> Result<BTreeMap<String, ModuleRecord>> {
    let mut registry = BTreeMap::new();

    for core in cores.iter_mut() {
        let names = core.branch_predictor.clone().unwrap_or_default();
        core.branch_predictor_data =
            resolve_references(&names, ModuleCategory::BranchPredictor, contexts, &mut registry)?;

        let names = core.btb.clone().unwrap_or_default();
        core.btb_data = resolve_references(&names, ModuleCategory::Btb, contexts, &mut registry)?;
    }

    for cache in caches.values_mut() {
        let names = cache.prefetcher.clone().unwrap_or_default();
        cache.prefetcher_data =
            resolve_references(&names, ModuleCategory::Prefetcher, contexts, &mut registry)?;

        let names = cache.replacement.clone().unwrap_or_default();
        cache.replacement_data =
            resolve_references(&names, ModuleCategory::Replacement, contexts, &mut registry)?;
    }

    if compile_all {
        for category in ModuleCategory::ALL {
            for record in contexts.context(category).find_all() {
                registry.entry(record.name.clone()).or_insert(record);
            }
        }
    }

    debug!(modules = registry.len(), compile_all, "module registry resolved");
    Ok(registry)
}
