//! Document normalization.
//!
//! Turns one raw, loosely-structured [`ConfigDocument`] into the canonical
//! [`NormalizedConfig`] shape: an ordered core list plus name-keyed cache
//! and walker maps. Cache objects may arrive from three places — an explicit
//! `caches` array, inline inside a core entry, or as a root-level named
//! object — and the same name may be declared by more than one of them. The
//! explicit array beats inline-in-core beats root, reconciled with the
//! field-wise merge rule from [`crate::merge`].

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::trace;

use crate::document::{
    CORE_PARAM_KEYS, CacheDocument, CacheRef, ConfigDocument, CoreDocument, ENVIRONMENT_KEYS,
    NameOrList, PtwDocument, PtwRef,
};
use crate::error::{ConfigError, Result};
use crate::expand::duplicate_to_length;
use crate::machine::{Cache, Core, NormalizedConfig, Ptw};
use crate::merge::{merge_cache, merge_ptw};

/// Priority of a cache declaration's source within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    /// Root-level named object (`L1I`, `L2C`, ...).
    Root,
    /// Inline object inside a core entry.
    Inline,
    /// Entry in the explicit `caches`/`ptws` array.
    Array,
}

fn cache_from_document(doc: CacheDocument, name: String) -> Cache {
    Cache {
        name,
        lower_level: doc.lower_level,
        lower_translate: doc.lower_translate,
        frequency: doc.frequency,
        prefetcher: doc.prefetcher.map(NameOrList::into_names),
        replacement: doc.replacement.map(NameOrList::into_names),
        params: doc.params,
        ..Cache::default()
    }
}

fn ptw_from_document(doc: PtwDocument, name: String) -> Ptw {
    Ptw {
        name,
        frequency: doc.frequency,
        params: doc.params,
    }
}

/// Inserts a cache, reconciling a same-name declaration from another source
/// by tier: the higher tier's fields win, same-tier keeps the earlier one.
fn upsert_cache(
    caches: &mut BTreeMap<String, Cache>,
    tiers: &mut BTreeMap<String, Tier>,
    cache: Cache,
    tier: Tier,
) {
    let name = cache.name.clone();
    match caches.remove(&name) {
        None => {
            caches.insert(name.clone(), cache);
            tiers.insert(name, tier);
        }
        Some(existing) => {
            let existing_tier = tiers.get(&name).copied().unwrap_or(Tier::Root);
            let merged = if tier > existing_tier {
                merge_cache(cache, existing)
            } else {
                merge_cache(existing, cache)
            };
            caches.insert(name.clone(), merged);
            if tier > existing_tier {
                tiers.insert(name, tier);
            }
        }
    }
}

fn upsert_ptw(
    ptws: &mut BTreeMap<String, Ptw>,
    tiers: &mut BTreeMap<String, Tier>,
    ptw: Ptw,
    tier: Tier,
) {
    let name = ptw.name.clone();
    match ptws.remove(&name) {
        None => {
            ptws.insert(name.clone(), ptw);
            tiers.insert(name, tier);
        }
        Some(existing) => {
            let existing_tier = tiers.get(&name).copied().unwrap_or(Tier::Root);
            let merged = if tier > existing_tier {
                merge_ptw(ptw, existing)
            } else {
                merge_ptw(existing, ptw)
            };
            ptws.insert(name.clone(), merged);
            if tier > existing_tier {
                tiers.insert(name, tier);
            }
        }
    }
}

/// Resolves one cache slot of a core: lifts inline and root-level objects
/// into the cache map and returns the name the core should reference.
#[allow(clippy::too_many_arguments)]
fn lift_cache_slot(
    slot: &str,
    inline: Option<CacheRef>,
    root_object: Option<&CacheDocument>,
    core_name: &str,
    caches: &mut BTreeMap<String, Cache>,
    tiers: &mut BTreeMap<String, Tier>,
    claimed_inline: &mut BTreeSet<String>,
) -> Result<Option<String>> {
    // The root-level object applies underneath whatever the core declares.
    let lift_root = |caches: &mut BTreeMap<String, Cache>, tiers: &mut BTreeMap<String, Tier>| {
        root_object.map(|obj| {
            let name = obj
                .name
                .clone()
                .unwrap_or_else(|| format!("{core_name}_{slot}"));
            upsert_cache(caches, tiers, cache_from_document(obj.clone(), name.clone()), Tier::Root);
            name
        })
    };

    match inline {
        Some(CacheRef::Inline(doc)) => {
            let name = doc
                .name
                .clone()
                .unwrap_or_else(|| format!("{core_name}_{slot}"));
            if !claimed_inline.insert(name.clone()) {
                return Err(ConfigError::Conflict {
                    name,
                    reason: format!("claimed by two different cache slots of core '{core_name}'"),
                });
            }
            upsert_cache(caches, tiers, cache_from_document(doc, name.clone()), Tier::Inline);
            lift_root(caches, tiers);
            Ok(Some(name))
        }
        Some(CacheRef::Name(name)) => {
            lift_root(caches, tiers);
            Ok(Some(name))
        }
        None => Ok(lift_root(caches, tiers)),
    }
}

fn lift_ptw_slot(
    inline: Option<PtwRef>,
    root_object: Option<&PtwDocument>,
    core_name: &str,
    ptws: &mut BTreeMap<String, Ptw>,
    tiers: &mut BTreeMap<String, Tier>,
) -> Option<String> {
    let lift_root = |ptws: &mut BTreeMap<String, Ptw>, tiers: &mut BTreeMap<String, Tier>| {
        root_object.map(|obj| {
            let name = obj
                .name
                .clone()
                .unwrap_or_else(|| format!("{core_name}_PTW"));
            upsert_ptw(ptws, tiers, ptw_from_document(obj.clone(), name.clone()), Tier::Root);
            name
        })
    };

    match inline {
        Some(PtwRef::Inline(doc)) => {
            let name = doc
                .name
                .clone()
                .unwrap_or_else(|| format!("{core_name}_PTW"));
            upsert_ptw(ptws, tiers, ptw_from_document(doc, name.clone()), Tier::Inline);
            lift_root(ptws, tiers);
            Some(name)
        }
        Some(PtwRef::Name(name)) => {
            lift_root(ptws, tiers);
            Some(name)
        }
        None => lift_root(ptws, tiers),
    }
}

/// Copies a root-level core parameter into a core, never overwriting a value
/// the core's own entry already supplies.
fn apply_core_default(core: &mut Core, key: &str, value: &Value) {
    match key {
        "frequency" => {
            if core.frequency.is_none() {
                core.frequency = value.as_u64();
            }
        }
        "branch_predictor" => {
            if core.branch_predictor.is_none() {
                core.branch_predictor = names_from_value(value);
            }
        }
        "btb" => {
            if core.btb.is_none() {
                core.btb = names_from_value(value);
            }
        }
        "DIB" => {
            if core.dib.is_none() {
                core.dib = Some(value.clone());
            }
        }
        _ => {
            core.params
                .entry(key.to_string())
                .or_insert_with(|| value.clone());
        }
    }
}

fn names_from_value(value: &Value) -> Option<Vec<String>> {
    serde_json::from_value::<NameOrList>(value.clone())
        .ok()
        .map(NameOrList::into_names)
}

/// Normalizes one raw configuration document into the canonical shape.
///
/// If the document gives no core array, exactly one core is synthesized from
/// the root-level core parameters. `num_cores` broadcasts the core template
/// list before per-core cache lifting, so index-derived default names stay
/// distinct across the copies.
pub fn normalize(document: &ConfigDocument) -> Result<NormalizedConfig> {
    let document = document.clone();

    let templates = if document.cores.is_empty() {
        vec![CoreDocument::default()]
    } else {
        document.cores.clone()
    };
    let count = document.num_cores.unwrap_or(templates.len());
    let core_docs = duplicate_to_length(&templates, count);
    trace!(cores = core_docs.len(), "normalizing configuration document");

    let mut caches = BTreeMap::new();
    let mut cache_tiers = BTreeMap::new();
    let mut ptws = BTreeMap::new();
    let mut ptw_tiers = BTreeMap::new();
    let mut cores = Vec::with_capacity(core_docs.len());

    for (index, doc) in core_docs.into_iter().enumerate() {
        let core_name = doc
            .name
            .clone()
            .unwrap_or_else(|| Core::default_name(index));
        let mut claimed = BTreeSet::new();

        let mut core = Core {
            name: Some(core_name.clone()),
            frequency: doc.frequency,
            branch_predictor: doc.branch_predictor.map(NameOrList::into_names),
            btb: doc.btb.map(NameOrList::into_names),
            dib: doc.dib,
            params: doc.params,
            ..Core::default()
        };

        core.l1i = lift_cache_slot(
            "L1I",
            doc.l1i,
            document.l1i.as_ref(),
            &core_name,
            &mut caches,
            &mut cache_tiers,
            &mut claimed,
        )?;
        core.l1d = lift_cache_slot(
            "L1D",
            doc.l1d,
            document.l1d.as_ref(),
            &core_name,
            &mut caches,
            &mut cache_tiers,
            &mut claimed,
        )?;
        core.itlb = lift_cache_slot(
            "ITLB",
            doc.itlb,
            document.itlb.as_ref(),
            &core_name,
            &mut caches,
            &mut cache_tiers,
            &mut claimed,
        )?;
        core.dtlb = lift_cache_slot(
            "DTLB",
            doc.dtlb,
            document.dtlb.as_ref(),
            &core_name,
            &mut caches,
            &mut cache_tiers,
            &mut claimed,
        )?;
        core.ptw = lift_ptw_slot(
            doc.ptw,
            document.ptw.as_ref(),
            &core_name,
            &mut ptws,
            &mut ptw_tiers,
        );

        // Root-level second-level objects have no core slot; they are
        // instantiated per core and linked up by the default hierarchy.
        for (slot, object) in [("L2C", &document.l2c), ("STLB", &document.stlb)] {
            if let Some(obj) = object {
                let name = obj
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{core_name}_{slot}"));
                upsert_cache(
                    &mut caches,
                    &mut cache_tiers,
                    cache_from_document(obj.clone(), name),
                    Tier::Root,
                );
            }
        }

        cores.push(core);
    }

    // Root-level core parameters act as per-core defaults.
    for key in CORE_PARAM_KEYS {
        if let Some(value) = document.root.get(key) {
            for core in &mut cores {
                apply_core_default(core, key, value);
            }
        }
    }

    // Explicit arrays take priority over everything lifted so far.
    let mut seen = BTreeSet::new();
    for entry in document.caches {
        let Some(name) = entry.name.clone() else {
            return Err(ConfigError::Conflict {
                name: String::from("caches"),
                reason: String::from("explicit cache array entries must carry a name"),
            });
        };
        if !seen.insert(name.clone()) {
            return Err(ConfigError::Conflict {
                name,
                reason: String::from("declared twice in the 'caches' array"),
            });
        }
        upsert_cache(
            &mut caches,
            &mut cache_tiers,
            cache_from_document(entry, name),
            Tier::Array,
        );
    }

    let mut seen = BTreeSet::new();
    for entry in document.ptws {
        let Some(name) = entry.name.clone() else {
            return Err(ConfigError::Conflict {
                name: String::from("ptws"),
                reason: String::from("explicit walker array entries must carry a name"),
            });
        };
        if !seen.insert(name.clone()) {
            return Err(ConfigError::Conflict {
                name,
                reason: String::from("declared twice in the 'ptws' array"),
            });
        }
        upsert_ptw(&mut ptws, &mut ptw_tiers, ptw_from_document(entry, name), Tier::Array);
    }

    // Caches and walkers share a namespace; a name in both is unresolvable.
    if let Some(collision) = caches.keys().find(|name| ptws.contains_key(*name)) {
        return Err(ConfigError::Conflict {
            name: collision.clone(),
            reason: String::from("declared as both a cache and a page-table walker"),
        });
    }

    // Split the build environment out of the root pass-through.
    let mut root = document.root;
    let mut env = Map::new();
    for key in ENVIRONMENT_KEYS {
        if let Some(value) = root.remove(key) {
            env.insert(key.to_string(), value);
        }
    }

    Ok(NormalizedConfig {
        name: document.name,
        executable_name: document.executable_name,
        cores,
        caches,
        ptws,
        physical_memory: document.physical_memory,
        virtual_memory: document.virtual_memory,
        env,
        root,
    })
}
