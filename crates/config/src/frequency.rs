//! Clock-frequency propagation.
//!
//! Caches and walkers form a directed acyclic graph: cores are the sources,
//! the memory sentinel and walkers the sinks, and every `lower_level`
//! reference an edge. A node without an explicit frequency takes the
//! maximum over all of its parents' resolved frequencies — a shared lower
//! level fed by two faster upper levels runs at the faster of the two, not
//! at whichever parent happened to be visited last. Processing follows a
//! topological order so a node is finalized only after every parent is,
//! and explicit frequencies are never overwritten.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{ConfigError, Result};
use crate::machine::{Cache, Core, Ptw};

/// Propagates core frequencies down through the cache/TLB graph.
///
/// Every remaining cache is reachable from some core after expansion, so
/// every cache lacking an explicit frequency receives one. Walkers
/// participate as sinks and inherit along TLB chains and their core edge. A
/// cycle leaves nodes that never become ready, which is reported as an
/// unterminated hierarchy.
pub fn propagate(
    cores: &[Core],
    caches: &mut BTreeMap<String, Cache>,
    ptws: &mut BTreeMap<String, Ptw>,
) -> Result<()> {
    let nodes: BTreeSet<String> = caches.keys().chain(ptws.keys()).cloned().collect();

    let mut indegree: BTreeMap<String, usize> = nodes.iter().map(|n| (n.clone(), 0)).collect();
    for cache in caches.values() {
        if let Some(lower) = &cache.lower_level
            && nodes.contains(lower)
            && let Some(count) = indegree.get_mut(lower)
        {
            *count += 1;
        }
    }

    // Cores are pre-resolved sources: seed their direct attachments.
    let mut inherited: BTreeMap<String, u64> = BTreeMap::new();
    for core in cores {
        let Some(frequency) = core.frequency else {
            continue;
        };
        for target in core.first_level_caches().chain(core.ptw.as_deref()) {
            if nodes.contains(target) {
                let best = inherited.entry(target.to_string()).or_insert(0);
                *best = (*best).max(frequency);
            }
        }
    }

    let mut ready: VecDeque<String> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();

    let mut processed = 0usize;
    while let Some(name) = ready.pop_front() {
        processed += 1;

        let (frequency, lower) = if let Some(cache) = caches.get_mut(&name) {
            if cache.frequency.is_none() {
                cache.frequency = inherited.get(&name).copied();
            }
            (cache.frequency, cache.lower_level.clone())
        } else if let Some(ptw) = ptws.get_mut(&name) {
            if ptw.frequency.is_none() {
                ptw.frequency = inherited.get(&name).copied();
            }
            (ptw.frequency, None)
        } else {
            (None, None)
        };

        let Some(lower) = lower else {
            continue;
        };
        if !nodes.contains(&lower) {
            continue;
        }
        if let Some(frequency) = frequency {
            let best = inherited.entry(lower.clone()).or_insert(0);
            *best = (*best).max(frequency);
        }
        if let Some(degree) = indegree.get_mut(&lower) {
            *degree -= 1;
            if *degree == 0 {
                ready.push_back(lower);
            }
        }
    }

    if processed < nodes.len() {
        let stuck = indegree
            .iter()
            .find(|(_, degree)| **degree > 0)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        return Err(ConfigError::UnterminatedHierarchy { start: stuck });
    }
    Ok(())
}
