//! Error definitions for configuration resolution.
//!
//! Resolution is deterministic and side-effect free, so every failure is
//! surfaced immediately and none are retried. The taxonomy distinguishes:
//! 1. **Conflict:** structurally incompatible duplicate declarations.
//! 2. **DanglingReference:** a name that survives no resolution stage.
//! 3. **UnterminatedHierarchy:** a `lower_level` chain that never reaches its
//!    sentinel, including cyclic chains.
//! 4. **ModuleNotFound:** a referenced module unknown to its lookup context.

use thiserror::Error;

use crate::modules::ModuleCategory;

/// Errors raised while resolving a build configuration.
///
/// The offending name is carried on every variant so the build layer can
/// report exactly which field or declaration aborted the build.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two declarations claim the same name with incompatible intent.
    #[error("conflicting declarations for '{name}': {reason}")]
    Conflict {
        /// The colliding name.
        name: String,
        /// Why the merge rules could not reconcile the declarations.
        reason: String,
    },

    /// A core or cache references a name absent from the relevant map after
    /// all resolution stages.
    #[error("'{referrer}' references '{name}', which does not exist after resolution")]
    DanglingReference {
        /// The record holding the reference.
        referrer: String,
        /// The missing name.
        name: String,
    },

    /// A `lower_level` chain does not terminate at the memory sentinel or a
    /// page-table walker. Cyclic chains are detected and reported here
    /// rather than traversed forever.
    #[error("hierarchy chain starting at '{start}' does not terminate")]
    UnterminatedHierarchy {
        /// The first element of the offending chain.
        start: String,
    },

    /// A referenced module name is unknown to its module context.
    #[error("no {category} module named '{name}' could be found")]
    ModuleNotFound {
        /// The module category that was searched.
        category: ModuleCategory,
        /// The unresolved module name.
        name: String,
    },

    /// A raw configuration document failed to deserialize.
    #[error("malformed configuration document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
