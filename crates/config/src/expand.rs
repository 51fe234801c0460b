//! Hierarchy expansion.
//!
//! Takes the merged canonical configuration and makes the machine shape
//! explicit. It provides:
//! 1. **Default naming:** missing core names and cache/walker/module
//!    references are synthesized deterministically from the owning core's
//!    own name, never from a global counter, so resolution is reproducible.
//! 2. **Broadcast:** a short template list is grown to a requested count by
//!    grouped duplication.
//! 3. **Chain termination:** dangling `lower_level` chains are anchored to
//!    the memory sentinel or the owning core's page-table walker, with
//!    explicit cycle detection.
//! 4. **Reachability filtering:** caches no core's hierarchy can reach are
//!    dropped.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Value, json};
use tracing::trace;

use crate::error::{ConfigError, Result};
use crate::machine::{Cache, Core, MEMORY_SENTINEL, Ptw};

/// Baseline values filled in wherever the configuration is silent.
mod defaults {
    /// Default core clock multiplier.
    pub const CORE_FREQUENCY: u64 = 4000;

    /// Default branch-predictor module.
    pub const BRANCH_PREDICTOR: &str = "bimodal";

    /// Default branch-target-buffer module.
    pub const BTB: &str = "basic_btb";

    /// Default prefetcher for data caches and TLBs.
    pub const DATA_PREFETCHER: &str = "no";

    /// Default prefetcher for instruction caches.
    pub const INSTRUCTION_PREFETCHER: &str = "no_instr";

    /// Default replacement-policy module.
    pub const REPLACEMENT: &str = "lru";

    /// Name of the shared last-level cache in the default hierarchy.
    pub const LAST_LEVEL_CACHE: &str = "LLC";
}

fn default_dib() -> Value {
    json!({ "window_size": 16, "sets": 32, "ways": 8 })
}

/// Broadcasts a template list across a requested count.
///
/// If `count` does not exceed the template length, the first `count`
/// elements are returned unchanged. Otherwise the count is partitioned into
/// one contiguous group per template element, the leading `count % len`
/// groups one element larger, and each group is filled with repeated copies
/// of its template element in template order: `[a, b]` broadcast to 5 gives
/// `[a, a, a, b, b]`.
pub fn duplicate_to_length<T: Clone>(template: &[T], count: usize) -> Vec<T> {
    if template.is_empty() || count <= template.len() {
        return template[..count.min(template.len())].to_vec();
    }

    let base = count / template.len();
    let extra = count % template.len();
    let mut out = Vec::with_capacity(count);
    for (index, item) in template.iter().enumerate() {
        let group = base + usize::from(index < extra);
        for _ in 0..group {
            out.push(item.clone());
        }
    }
    out
}

/// Fills every missing name and reference on a core with its deterministic
/// default, derived from the core's own name. Existing values are never
/// overwritten.
pub fn core_default_names(core: &mut Core, index: usize) {
    let name = core
        .name
        .get_or_insert_with(|| Core::default_name(index))
        .clone();
    core.l1i.get_or_insert_with(|| format!("{name}_L1I"));
    core.l1d.get_or_insert_with(|| format!("{name}_L1D"));
    core.itlb.get_or_insert_with(|| format!("{name}_ITLB"));
    core.dtlb.get_or_insert_with(|| format!("{name}_DTLB"));
    core.ptw.get_or_insert_with(|| format!("{name}_PTW"));
    core.frequency.get_or_insert(defaults::CORE_FREQUENCY);
    core.branch_predictor
        .get_or_insert_with(|| vec![defaults::BRANCH_PREDICTOR.to_string()]);
    core.btb
        .get_or_insert_with(|| vec![defaults::BTB.to_string()]);
    core.dib.get_or_insert_with(default_dib);
}

/// Creates minimal records for a core's referenced-but-missing caches and
/// walker, wiring the default hierarchy shape as it goes: L1s drain into a
/// per-core L2C, L2Cs into a shared LLC, TLBs into a per-core STLB, and the
/// STLB into the core's walker. User-supplied records never have chain
/// links injected; their dangling chains are anchored later.
fn ensure_core_records(
    core: &Core,
    caches: &mut BTreeMap<String, Cache>,
    ptws: &mut BTreeMap<String, Ptw>,
) {
    let Some(core_name) = core.name.as_deref() else {
        return;
    };
    let l2c_name = format!("{core_name}_L2C");
    let stlb_name = format!("{core_name}_STLB");

    for (slot, translate) in [(&core.l1i, &core.itlb), (&core.l1d, &core.dtlb)] {
        if let Some(name) = slot
            && !caches.contains_key(name)
        {
            caches.insert(
                name.clone(),
                Cache {
                    name: name.clone(),
                    lower_level: Some(l2c_name.clone()),
                    lower_translate: translate.clone(),
                    ..Cache::default()
                },
            );
        }
    }

    // Spawn default mid-level records only once something drains into them.
    let drains_into = |caches: &BTreeMap<String, Cache>, target: &str| {
        caches
            .values()
            .any(|cache| cache.lower_level.as_deref() == Some(target))
    };

    if !caches.contains_key(&l2c_name) && drains_into(caches, &l2c_name) {
        caches.insert(
            l2c_name.clone(),
            Cache {
                name: l2c_name.clone(),
                lower_level: Some(defaults::LAST_LEVEL_CACHE.to_string()),
                ..Cache::default()
            },
        );
    }
    if !caches.contains_key(defaults::LAST_LEVEL_CACHE)
        && drains_into(caches, defaults::LAST_LEVEL_CACHE)
    {
        caches.insert(
            defaults::LAST_LEVEL_CACHE.to_string(),
            Cache::named(defaults::LAST_LEVEL_CACHE),
        );
    }

    for slot in [&core.itlb, &core.dtlb] {
        if let Some(name) = slot
            && !caches.contains_key(name)
        {
            caches.insert(
                name.clone(),
                Cache {
                    name: name.clone(),
                    lower_level: Some(stlb_name.clone()),
                    ..Cache::default()
                },
            );
        }
    }
    if !caches.contains_key(&stlb_name) && drains_into(caches, &stlb_name) {
        caches.insert(
            stlb_name.clone(),
            Cache {
                name: stlb_name.clone(),
                lower_level: core.ptw.clone(),
                ..Cache::default()
            },
        );
    }

    if let Some(ptw_name) = &core.ptw
        && !ptws.contains_key(ptw_name)
    {
        ptws.insert(ptw_name.clone(), Ptw::named(ptw_name.clone()));
    }
}

/// Follows a hierarchy chain to its end and anchors a dangling final
/// element with `lower_level = sentinel`.
///
/// A chain already ending at a name outside the cache map (the sentinel, a
/// walker, or a dangling reference caught by later validation) is left
/// alone. Revisiting a cache means the chain loops and can never reach a
/// terminal, which is reported rather than traversed forever.
pub fn terminate_path(
    caches: &mut BTreeMap<String, Cache>,
    start: &str,
    sentinel: &str,
) -> Result<()> {
    let mut visited = BTreeSet::new();
    let mut current = start.to_string();
    loop {
        if !visited.insert(current.clone()) {
            return Err(ConfigError::UnterminatedHierarchy {
                start: start.to_string(),
            });
        }
        let next = match caches.get(&current) {
            None => return Ok(()),
            Some(cache) => cache.lower_level.clone(),
        };
        match next {
            Some(next) if caches.contains_key(&next) => current = next,
            Some(_) => return Ok(()),
            None => {
                if let Some(cache) = caches.get_mut(&current) {
                    cache.lower_level = Some(sentinel.to_string());
                }
                return Ok(());
            }
        }
    }
}

/// Walks a data path and its companion TLB path in lockstep, assigning each
/// translated cache a `lower_translate` default from the TLB chain node at
/// the same depth, clamped to the last TLB. Explicit values are kept.
fn default_translation(caches: &mut BTreeMap<String, Cache>, data_root: &str, tlb_root: &str) {
    let mut tlb_chain = Vec::new();
    let mut seen = BTreeSet::new();
    let mut cursor = Some(tlb_root.to_string());
    while let Some(name) = cursor {
        if !seen.insert(name.clone()) {
            break;
        }
        match caches.get(&name) {
            Some(cache) => {
                cursor = cache.lower_level.clone();
                tlb_chain.push(name);
            }
            None => break,
        }
    }
    if tlb_chain.is_empty() {
        return;
    }

    let mut seen = BTreeSet::new();
    let mut cursor = Some(data_root.to_string());
    let mut depth = 0usize;
    while let Some(name) = cursor {
        if !seen.insert(name.clone()) {
            break;
        }
        let Some(cache) = caches.get_mut(&name) else {
            break;
        };
        if cache.lower_translate.is_none() {
            cache.lower_translate = Some(tlb_chain[depth.min(tlb_chain.len() - 1)].clone());
        }
        cursor = cache.lower_level.clone();
        depth += 1;
    }
}

/// Drops every cache unreachable by following `lower_level` pointers from
/// the given hierarchy roots. An empty root set yields an empty map.
pub fn filter_inaccessible(
    mut caches: BTreeMap<String, Cache>,
    roots: impl IntoIterator<Item = String>,
) -> BTreeMap<String, Cache> {
    let mut keep = BTreeSet::new();
    let mut stack: Vec<String> = roots.into_iter().collect();
    while let Some(name) = stack.pop() {
        if let Some(cache) = caches.get(&name)
            && keep.insert(name)
        {
            if let Some(lower) = &cache.lower_level {
                stack.push(lower.clone());
            }
        }
    }
    caches.retain(|name, _| keep.contains(name));
    caches
}

/// Expands the merged configuration into an explicit machine shape.
///
/// Fills core defaults, creates missing records, anchors every chain,
/// assigns translation defaults, prunes unreachable caches, and finally
/// fills per-cache module-name defaults. Returns the pruned cache map.
pub fn expand(
    cores: &mut [Core],
    caches: BTreeMap<String, Cache>,
    ptws: &mut BTreeMap<String, Ptw>,
) -> Result<BTreeMap<String, Cache>> {
    let mut caches = caches;

    for (index, core) in cores.iter_mut().enumerate() {
        core_default_names(core, index);
    }
    for core in cores.iter() {
        ensure_core_records(core, &mut caches, ptws);
    }

    for core in cores.iter() {
        if let Some(l1i) = &core.l1i {
            terminate_path(&mut caches, l1i, MEMORY_SENTINEL)?;
        }
        if let Some(l1d) = &core.l1d {
            terminate_path(&mut caches, l1d, MEMORY_SENTINEL)?;
        }
        if let (Some(itlb), Some(ptw)) = (&core.itlb, &core.ptw) {
            terminate_path(&mut caches, itlb, ptw)?;
        }
        if let (Some(dtlb), Some(ptw)) = (&core.dtlb, &core.ptw) {
            terminate_path(&mut caches, dtlb, ptw)?;
        }
    }

    for core in cores.iter() {
        if let (Some(l1i), Some(itlb)) = (&core.l1i, &core.itlb) {
            default_translation(&mut caches, l1i, itlb);
        }
        if let (Some(l1d), Some(dtlb)) = (&core.l1d, &core.dtlb) {
            default_translation(&mut caches, l1d, dtlb);
        }
    }

    let roots: Vec<String> = cores
        .iter()
        .flat_map(|core| core.first_level_caches().map(String::from))
        .collect();
    let before = caches.len();
    let mut caches = filter_inaccessible(caches, roots);
    trace!(kept = caches.len(), dropped = before - caches.len(), "reachability filter applied");

    for core in cores.iter() {
        if let Some(l1i) = &core.l1i
            && let Some(cache) = caches.get_mut(l1i)
        {
            cache.is_instruction_cache = true;
        }
    }
    for cache in caches.values_mut() {
        cache
            .replacement
            .get_or_insert_with(|| vec![defaults::REPLACEMENT.to_string()]);
        let prefetcher = if cache.is_instruction_cache {
            defaults::INSTRUCTION_PREFETCHER
        } else {
            defaults::DATA_PREFETCHER
        };
        cache
            .prefetcher
            .get_or_insert_with(|| vec![prefetcher.to_string()]);
    }

    Ok(caches)
}
