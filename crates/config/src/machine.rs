//! Canonical machine description.
//!
//! The normalizer reshapes a raw document into these records; every later
//! stage works on them. The cache/TLB hierarchy is held arena-style: a flat
//! name-to-record map with string references between records, never nested
//! ownership, so diamond-shaped hierarchies (two L1s over one L2) have a
//! single record per cache and the frequency propagator can take a maximum
//! over parents without aliasing ambiguity.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::modules::ModuleRecord;

/// Terminal marker name anchoring every data-path hierarchy chain.
///
/// Not itself a resolvable record; following `lower_level` to this name ends
/// the chain at the memory controller.
pub const MEMORY_SENTINEL: &str = "DRAM";

/// One simulated out-of-order processor core.
///
/// Cores are held in an ordered list; the index is the core id. Reference
/// fields hold names into the cache/PTW maps and stay `None` until the
/// hierarchy expander fills deterministic defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Core {
    /// Core name; defaults to `cpu{index}`.
    pub name: Option<String>,
    /// First-level instruction cache name.
    #[serde(rename = "L1I")]
    pub l1i: Option<String>,
    /// First-level data cache name.
    #[serde(rename = "L1D")]
    pub l1d: Option<String>,
    /// Instruction TLB name.
    #[serde(rename = "ITLB")]
    pub itlb: Option<String>,
    /// Data TLB name.
    #[serde(rename = "DTLB")]
    pub dtlb: Option<String>,
    /// Page-table-walker name.
    #[serde(rename = "PTW")]
    pub ptw: Option<String>,
    /// Clock multiplier; the ultimate frequency source for attached caches.
    pub frequency: Option<u64>,
    /// Branch-predictor module names.
    pub branch_predictor: Option<Vec<String>>,
    /// Branch-target-buffer module names.
    pub btb: Option<Vec<String>>,
    /// Decoded instruction buffer geometry, opaque.
    #[serde(rename = "DIB")]
    pub dib: Option<Value>,
    /// Resolved branch-predictor module records.
    #[serde(rename = "_branch_predictor_data")]
    pub branch_predictor_data: Vec<ModuleRecord>,
    /// Resolved branch-target-buffer module records.
    #[serde(rename = "_btb_data")]
    pub btb_data: Vec<ModuleRecord>,
    /// Pipeline widths, queue sizes and other opaque scalars.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Core {
    /// The deterministic default name for the core at `index`.
    pub fn default_name(index: usize) -> String {
        format!("cpu{index}")
    }

    /// The four first-level cache references, in declaration order.
    ///
    /// These are the hierarchy entry points: reachability filtering and
    /// frequency seeding both start here. Unset slots are skipped.
    pub fn first_level_caches(&self) -> impl Iterator<Item = &str> {
        [&self.l1i, &self.l1d, &self.itlb, &self.dtlb]
            .into_iter()
            .filter_map(|slot| slot.as_deref())
    }
}

/// One cache or TLB record, keyed by unique name in the cache map.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cache {
    /// Unique cache name.
    pub name: String,
    /// Next cache down, the memory sentinel, or a PTW (for TLB chains).
    pub lower_level: Option<String>,
    /// TLB consulted for address translation. Present on data and
    /// instruction caches, never on TLBs themselves.
    pub lower_translate: Option<String>,
    /// Clock multiplier; propagated from parents when absent.
    pub frequency: Option<u64>,
    /// Prefetcher module names.
    pub prefetcher: Option<Vec<String>>,
    /// Replacement-policy module names.
    pub replacement: Option<Vec<String>>,
    /// Whether this cache serves as some core's L1I. Selects the
    /// instruction-prefetcher default.
    #[serde(rename = "_is_instruction_cache")]
    pub is_instruction_cache: bool,
    /// Resolved prefetcher module records.
    #[serde(rename = "_prefetcher_data")]
    pub prefetcher_data: Vec<ModuleRecord>,
    /// Resolved replacement-policy module records.
    #[serde(rename = "_replacement_data")]
    pub replacement_data: Vec<ModuleRecord>,
    /// Sets, ways, latencies and other opaque scalars.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Cache {
    /// A minimal record carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Cache {
            name: name.into(),
            ..Cache::default()
        }
    }
}

/// One page-table walker, the terminal node for TLB miss handling.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ptw {
    /// Unique walker name.
    pub name: String,
    /// Clock multiplier; propagated from the TLB chain when absent.
    pub frequency: Option<u64>,
    /// Remaining opaque scalars.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Ptw {
    /// A minimal record carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Ptw {
            name: name.into(),
            ..Ptw::default()
        }
    }
}

/// The canonical shape of one configuration layer after normalization.
#[derive(Debug, Clone, Default)]
pub struct NormalizedConfig {
    /// Fragment name, consumed by executable-name joining.
    pub name: Option<String>,
    /// Explicit executable name, overriding name joining.
    pub executable_name: Option<String>,
    /// Ordered core list; index = core id.
    pub cores: Vec<Core>,
    /// Cache map, keyed by name.
    pub caches: BTreeMap<String, Cache>,
    /// Page-table-walker map, keyed by name.
    pub ptws: BTreeMap<String, Ptw>,
    /// Physical-memory record, opaque.
    pub physical_memory: Map<String, Value>,
    /// Virtual-memory record, opaque.
    pub virtual_memory: Map<String, Value>,
    /// Build-environment pass-through (`CC`, `CXX`, flags).
    pub env: Map<String, Value>,
    /// Residual root pass-through, including simulation constants.
    pub root: Map<String, Value>,
}

/// Global simulation constants lifted from the merged root pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Constants {
    /// Cache block size in bytes.
    pub block_size: u64,
    /// Virtual-memory page size in bytes.
    pub page_size: u64,
    /// Progress-heartbeat interval in instructions.
    pub heartbeat_frequency: u64,
}

impl Default for Constants {
    fn default() -> Self {
        Constants {
            block_size: 64,
            page_size: 4096,
            heartbeat_frequency: 10_000_000,
        }
    }
}

impl Constants {
    /// Reads the constants out of a merged root map, keeping the defaults
    /// for anything absent or non-numeric.
    pub fn from_root(root: &Map<String, Value>) -> Self {
        let defaults = Constants::default();
        let read = |key: &str, fallback: u64| {
            root.get(key).and_then(Value::as_u64).unwrap_or(fallback)
        };
        Constants {
            block_size: read("block_size", defaults.block_size),
            page_size: read("page_size", defaults.page_size),
            heartbeat_frequency: read("heartbeat_frequency", defaults.heartbeat_frequency),
        }
    }
}

/// The fully-resolved machine description plus module registry.
///
/// Output of [`resolve`](crate::resolve::resolve); consumed by the
/// downstream build-generation step. Every name referenced by a core or
/// cache is guaranteed to exist in the corresponding map.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Name of the executable to build.
    pub executable_name: String,
    /// Ordered core list.
    pub cores: Vec<Core>,
    /// Cache map, pruned to the records reachable from some core.
    pub caches: BTreeMap<String, Cache>,
    /// Page-table-walker map.
    pub ptws: BTreeMap<String, Ptw>,
    /// Physical-memory record.
    pub physical_memory: Map<String, Value>,
    /// Virtual-memory record.
    pub virtual_memory: Map<String, Value>,
    /// Deduplicated module registry, keyed by module name.
    pub modules: BTreeMap<String, ModuleRecord>,
    /// Global simulation constants.
    pub constants: Constants,
    /// Build-environment pass-through.
    pub env: Map<String, Value>,
    /// Residual root pass-through.
    pub root: Map<String, Value>,
}
