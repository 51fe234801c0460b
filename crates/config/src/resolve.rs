//! Resolution orchestration.
//!
//! Sequences the whole pipeline for one or more layered configuration
//! sources: normalize each document, merge highest-priority-first, expand
//! the hierarchy, propagate frequencies, resolve modules, then validate
//! that every surviving reference lands in its map. The engine is a pure
//! function of (documents, module contexts, flags); independent resolutions
//! may run in parallel.

use std::mem;

use tracing::debug;

use crate::document::ConfigDocument;
use crate::error::{ConfigError, Result};
use crate::expand::expand;
use crate::frequency::propagate;
use crate::machine::{Constants, Core, MEMORY_SENTINEL, NormalizedConfig, ResolvedConfig};
use crate::merge::{executable_name, merge};
use crate::modules::{ModuleContexts, resolve_modules};
use crate::normalize::normalize;

/// Resolves layered configuration documents into a build configuration.
///
/// Documents are given highest priority first. The empty document is the
/// implicit lowest layer, so resolving no documents at all still yields the
/// all-defaults single-core machine. With `compile_all`, every module each
/// context can discover is compiled in alongside the referenced ones.
pub fn resolve(
    documents: &[ConfigDocument],
    contexts: &ModuleContexts<'_>,
    compile_all: bool,
) -> Result<ResolvedConfig> {
    let mut layers = Vec::with_capacity(documents.len() + 1);
    for document in documents {
        layers.push(normalize(document)?);
    }
    layers.push(normalize(&ConfigDocument::default())?);

    let executable = executable_name(&layers);
    debug!(layers = layers.len(), executable = %executable, "merging configuration layers");

    let mut merged = NormalizedConfig::default();
    for layer in layers.into_iter().rev() {
        merged = merge(layer, merged);
    }

    merged.caches = expand(&mut merged.cores, mem::take(&mut merged.caches), &mut merged.ptws)?;
    propagate(&merged.cores, &mut merged.caches, &mut merged.ptws)?;
    let modules = resolve_modules(&mut merged.cores, &mut merged.caches, contexts, compile_all)?;
    validate(&merged)?;

    let constants = Constants::from_root(&merged.root);
    debug!(
        cores = merged.cores.len(),
        caches = merged.caches.len(),
        ptws = merged.ptws.len(),
        modules = modules.len(),
        "configuration resolved"
    );

    Ok(ResolvedConfig {
        executable_name: executable,
        cores: merged.cores,
        caches: merged.caches,
        ptws: merged.ptws,
        physical_memory: merged.physical_memory,
        virtual_memory: merged.virtual_memory,
        modules,
        constants,
        env: merged.env,
        root: merged.root,
    })
}

/// Checks that every name a core or cache still references exists in the
/// corresponding map. Expansion guarantees this for everything it creates;
/// this pass catches user references that no stage could satisfy.
fn validate(config: &NormalizedConfig) -> Result<()> {
    for (index, core) in config.cores.iter().enumerate() {
        let referrer = core
            .name
            .clone()
            .unwrap_or_else(|| Core::default_name(index));
        for slot in core.first_level_caches() {
            if !config.caches.contains_key(slot) {
                return Err(ConfigError::DanglingReference {
                    referrer: referrer.clone(),
                    name: slot.to_string(),
                });
            }
        }
        if let Some(ptw) = &core.ptw
            && !config.ptws.contains_key(ptw)
        {
            return Err(ConfigError::DanglingReference {
                referrer: referrer.clone(),
                name: ptw.clone(),
            });
        }
    }

    for cache in config.caches.values() {
        if let Some(lower) = &cache.lower_level {
            let known = lower == MEMORY_SENTINEL
                || config.caches.contains_key(lower)
                || config.ptws.contains_key(lower);
            if !known {
                return Err(ConfigError::DanglingReference {
                    referrer: cache.name.clone(),
                    name: lower.clone(),
                });
            }
        }
        if let Some(translate) = &cache.lower_translate
            && !config.caches.contains_key(translate)
        {
            return Err(ConfigError::DanglingReference {
                referrer: cache.name.clone(),
                name: translate.clone(),
            });
        }
    }
    Ok(())
}
