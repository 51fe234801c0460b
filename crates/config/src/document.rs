//! Raw configuration documents.
//!
//! These types model the loosely-structured wire format produced by the
//! upstream configuration loader. A document mixes root-level scalars, named
//! cache objects, an optional core array (`ooo_cpu`) whose elements may
//! inline their own cache objects, explicit `caches`/`ptws` arrays, and
//! free-form pass-through keys. Anything not recognized here is preserved
//! verbatim in a flattened map and forwarded through resolution untouched.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Root cache keys recognized on a document or a core entry.
pub const PINNED_CACHE_KEYS: [&str; 6] = ["L1I", "L1D", "ITLB", "DTLB", "L2C", "STLB"];

/// Core-parameter keys that may appear at the document root and are copied
/// into every core as defaults during normalization.
pub const CORE_PARAM_KEYS: [&str; 23] = [
    "frequency",
    "ifetch_buffer_size",
    "decode_buffer_size",
    "dispatch_buffer_size",
    "rob_size",
    "lq_size",
    "sq_size",
    "fetch_width",
    "decode_width",
    "dispatch_width",
    "execute_width",
    "lq_width",
    "sq_width",
    "retire_width",
    "mispredict_penalty",
    "scheduler_size",
    "decode_latency",
    "dispatch_latency",
    "schedule_latency",
    "execute_latency",
    "branch_predictor",
    "btb",
    "DIB",
];

/// Build-environment keys forwarded verbatim to the build layer.
pub const ENVIRONMENT_KEYS: [&str; 6] = ["CC", "CXX", "CPPFLAGS", "CXXFLAGS", "LDFLAGS", "LDLIBS"];

/// A module reference field: either a single comma-separated string or an
/// explicit list of names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NameOrList {
    /// One name, or several joined by commas (`"a, b"`).
    One(String),
    /// An explicit list, passed through unchanged.
    Many(Vec<String>),
}

impl NameOrList {
    /// Normalizes the reference into a list of names.
    ///
    /// Comma-separated strings are split and trimmed; empty segments (and
    /// the empty string) vanish. Lists pass through untouched.
    pub fn into_names(self) -> Vec<String> {
        match self {
            NameOrList::One(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(String::from)
                .collect(),
            NameOrList::Many(names) => names,
        }
    }
}

/// A core's cache slot: a bare name referencing a shared record, or an
/// inline object to be lifted into the cache map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CacheRef {
    /// Reference to a cache declared elsewhere.
    Name(String),
    /// Inline cache object, owned by this core entry.
    Inline(CacheDocument),
}

/// A core's PTW slot, by name or inline.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PtwRef {
    /// Reference to a walker declared elsewhere.
    Name(String),
    /// Inline walker object.
    Inline(PtwDocument),
}

/// One raw cache (or TLB) object as it appears on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheDocument {
    /// Explicit cache name; synthesized from the owning core when absent.
    pub name: Option<String>,
    /// Name of the next cache down, or absent for a dangling chain.
    pub lower_level: Option<String>,
    /// Name of the TLB consulted for address translation.
    pub lower_translate: Option<String>,
    /// Explicit clock multiplier; propagated from above when absent.
    pub frequency: Option<u64>,
    /// Prefetcher module reference(s).
    pub prefetcher: Option<NameOrList>,
    /// Replacement-policy module reference(s).
    pub replacement: Option<NameOrList>,
    /// Sets, ways, latencies and other scalars, forwarded opaquely.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// One raw page-table-walker object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PtwDocument {
    /// Explicit walker name; synthesized from the owning core when absent.
    pub name: Option<String>,
    /// Explicit clock multiplier.
    pub frequency: Option<u64>,
    /// Remaining scalars, forwarded opaquely.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// One raw core entry from the `ooo_cpu` array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreDocument {
    /// Explicit core name; defaults to `cpu{index}`.
    pub name: Option<String>,
    /// First-level instruction cache, by name or inline.
    #[serde(rename = "L1I")]
    pub l1i: Option<CacheRef>,
    /// First-level data cache, by name or inline.
    #[serde(rename = "L1D")]
    pub l1d: Option<CacheRef>,
    /// Instruction TLB, by name or inline.
    #[serde(rename = "ITLB")]
    pub itlb: Option<CacheRef>,
    /// Data TLB, by name or inline.
    #[serde(rename = "DTLB")]
    pub dtlb: Option<CacheRef>,
    /// Page-table walker, by name or inline.
    #[serde(rename = "PTW")]
    pub ptw: Option<PtwRef>,
    /// Clock multiplier for this core.
    pub frequency: Option<u64>,
    /// Branch-predictor module reference(s).
    pub branch_predictor: Option<NameOrList>,
    /// Branch-target-buffer module reference(s).
    pub btb: Option<NameOrList>,
    /// Decoded instruction buffer geometry, forwarded opaquely.
    #[serde(rename = "DIB")]
    pub dib: Option<Value>,
    /// Pipeline widths, queue sizes and other scalars, forwarded opaquely.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// One raw configuration document.
///
/// Every field is optional; an empty document normalizes to the all-defaults
/// single-core machine. Unrecognized root keys land in [`root`](Self::root)
/// and pass through resolution unmodified, except for the core-parameter
/// keys in [`CORE_PARAM_KEYS`] (copied into cores) and the environment keys
/// in [`ENVIRONMENT_KEYS`] (split into the build-environment map).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// Fragment name, used when joining executable names across layers.
    pub name: Option<String>,
    /// Explicit executable name; overrides all name joining.
    pub executable_name: Option<String>,
    /// Requested core count; the `ooo_cpu` template list is broadcast to
    /// this length.
    pub num_cores: Option<usize>,
    /// Explicit core array.
    #[serde(rename = "ooo_cpu")]
    pub cores: Vec<CoreDocument>,
    /// Explicit cache array; entries here beat inline and root declarations.
    pub caches: Vec<CacheDocument>,
    /// Explicit page-table-walker array.
    pub ptws: Vec<PtwDocument>,
    /// Root-level L1 instruction cache, instantiated per core.
    #[serde(rename = "L1I")]
    pub l1i: Option<CacheDocument>,
    /// Root-level L1 data cache, instantiated per core.
    #[serde(rename = "L1D")]
    pub l1d: Option<CacheDocument>,
    /// Root-level instruction TLB, instantiated per core.
    #[serde(rename = "ITLB")]
    pub itlb: Option<CacheDocument>,
    /// Root-level data TLB, instantiated per core.
    #[serde(rename = "DTLB")]
    pub dtlb: Option<CacheDocument>,
    /// Root-level second-level cache, instantiated per core.
    #[serde(rename = "L2C")]
    pub l2c: Option<CacheDocument>,
    /// Root-level second-level TLB, instantiated per core.
    #[serde(rename = "STLB")]
    pub stlb: Option<CacheDocument>,
    /// Root-level page-table walker, instantiated per core.
    #[serde(rename = "PTW")]
    pub ptw: Option<PtwDocument>,
    /// Physical-memory record, forwarded opaquely.
    pub physical_memory: Map<String, Value>,
    /// Virtual-memory record, forwarded opaquely.
    pub virtual_memory: Map<String, Value>,
    /// Everything else: core-parameter defaults, build environment,
    /// simulation constants, and unrecognized pass-through keys.
    #[serde(flatten)]
    pub root: Map<String, Value>,
}

impl ConfigDocument {
    /// Deserializes a document from JSON text.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
