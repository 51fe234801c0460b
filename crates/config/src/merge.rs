//! Layer merging and executable naming.
//!
//! `merge(a, b)` combines two normalized configurations with `a` strictly
//! higher priority than `b`, field by field rather than whole-record: a
//! field present in `a` always wins, a field absent from `a` falls back to
//! `b`. The same rule layers a user configuration over built-in defaults and
//! reconciles duplicate cache declarations inside one document.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::machine::{Cache, Core, NormalizedConfig, Ptw};

/// Shallow key-wise map merge; keys in `a` win.
pub(crate) fn merge_map(a: Map<String, Value>, mut b: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in a {
        b.insert(key, value);
    }
    b
}

/// Field-wise core merge; fields present in `a` win.
fn merge_core(a: Core, b: Core) -> Core {
    Core {
        name: a.name.or(b.name),
        l1i: a.l1i.or(b.l1i),
        l1d: a.l1d.or(b.l1d),
        itlb: a.itlb.or(b.itlb),
        dtlb: a.dtlb.or(b.dtlb),
        ptw: a.ptw.or(b.ptw),
        frequency: a.frequency.or(b.frequency),
        branch_predictor: a.branch_predictor.or(b.branch_predictor),
        btb: a.btb.or(b.btb),
        dib: a.dib.or(b.dib),
        branch_predictor_data: Vec::new(),
        btb_data: Vec::new(),
        params: merge_map(a.params, b.params),
    }
}

/// Field-wise cache merge; fields present in `a` win.
///
/// Also reconciles same-name declarations from different sources within one
/// document (explicit array over inline over root).
pub(crate) fn merge_cache(a: Cache, b: Cache) -> Cache {
    Cache {
        name: a.name,
        lower_level: a.lower_level.or(b.lower_level),
        lower_translate: a.lower_translate.or(b.lower_translate),
        frequency: a.frequency.or(b.frequency),
        prefetcher: a.prefetcher.or(b.prefetcher),
        replacement: a.replacement.or(b.replacement),
        is_instruction_cache: a.is_instruction_cache || b.is_instruction_cache,
        prefetcher_data: Vec::new(),
        replacement_data: Vec::new(),
        params: merge_map(a.params, b.params),
    }
}

/// Field-wise walker merge; fields present in `a` win.
pub(crate) fn merge_ptw(a: Ptw, b: Ptw) -> Ptw {
    Ptw {
        name: a.name,
        frequency: a.frequency.or(b.frequency),
        params: merge_map(a.params, b.params),
    }
}

/// Key-wise merge of a name-keyed record map; keys only in `b` are carried
/// through unchanged.
fn merge_keyed<T>(
    a: BTreeMap<String, T>,
    mut b: BTreeMap<String, T>,
    combine: impl Fn(T, T) -> T,
) -> BTreeMap<String, T> {
    for (key, high) in a {
        let merged = match b.remove(&key) {
            Some(low) => combine(high, low),
            None => high,
        };
        b.insert(key, merged);
    }
    b
}

/// Combines two normalized configurations, `a` strictly higher priority.
///
/// Cores merge by index, the longer list carried through; cache and walker
/// maps merge key-wise; memory records and pass-through maps merge key-wise
/// with the same precedence.
pub fn merge(a: NormalizedConfig, b: NormalizedConfig) -> NormalizedConfig {
    let mut cores = Vec::with_capacity(a.cores.len().max(b.cores.len()));
    let mut high = a.cores.into_iter();
    let mut low = b.cores.into_iter();
    loop {
        match (high.next(), low.next()) {
            (Some(h), Some(l)) => cores.push(merge_core(h, l)),
            (Some(h), None) => cores.push(h),
            (None, Some(l)) => cores.push(l),
            (None, None) => break,
        }
    }

    NormalizedConfig {
        name: a.name.or(b.name),
        executable_name: a.executable_name.or(b.executable_name),
        cores,
        caches: merge_keyed(a.caches, b.caches, merge_cache),
        ptws: merge_keyed(a.ptws, b.ptws, merge_ptw),
        physical_memory: merge_map(a.physical_memory, b.physical_memory),
        virtual_memory: merge_map(a.virtual_memory, b.virtual_memory),
        env: merge_map(a.env, b.env),
        root: merge_map(a.root, b.root),
    }
}

/// Derives the executable name from the configuration layers, highest
/// priority first.
///
/// An explicit `executable_name` in the highest layer that carries one wins
/// outright. Otherwise the name is `"champsim"` followed by each layer's
/// `name` (layers without one are skipped), joined with underscores; with no
/// names anywhere the result is exactly `"champsim"`.
pub fn executable_name(layers: &[NormalizedConfig]) -> String {
    if let Some(explicit) = layers
        .iter()
        .find_map(|layer| layer.executable_name.clone())
    {
        return explicit;
    }

    let mut parts = vec![String::from("champsim")];
    parts.extend(layers.iter().filter_map(|layer| layer.name.clone()));
    parts.join("_")
}
