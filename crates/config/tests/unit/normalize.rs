//! # Normalization Tests
//!
//! Tests for reshaping raw documents into the canonical form: core
//! broadcast, cache lifting, declaration-source precedence, root-level
//! core defaults, and the conflict conditions.

use champsim_config::ConfigError;
use champsim_config::normalize::normalize;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::document;

#[test]
fn test_empty_document_yields_one_bare_core() {
    let config = normalize(&document(json!({}))).unwrap();
    assert_eq!(config.cores.len(), 1);
    assert_eq!(config.cores[0].name.as_deref(), Some("cpu0"));
    assert_eq!(config.cores[0].l1i, None);
    assert!(config.caches.is_empty());
    assert!(config.ptws.is_empty());
}

#[test]
fn test_num_cores_broadcasts_an_absent_core_array() {
    let config = normalize(&document(json!({ "num_cores": 3 }))).unwrap();
    let names: Vec<_> = config
        .cores
        .iter()
        .map(|core| core.name.as_deref().unwrap())
        .collect();
    assert_eq!(names, vec!["cpu0", "cpu1", "cpu2"]);
}

#[test]
fn test_num_cores_broadcasts_templates_in_groups() {
    let config = normalize(&document(json!({
        "ooo_cpu": [{ "frequency": 2000 }, { "frequency": 3000 }],
        "num_cores": 5
    })))
    .unwrap();
    let frequencies: Vec<_> = config.cores.iter().map(|core| core.frequency).collect();
    assert_eq!(
        frequencies,
        vec![Some(2000), Some(2000), Some(2000), Some(3000), Some(3000)]
    );
}

#[test]
fn test_inline_cache_is_lifted_with_a_derived_name() {
    let config = normalize(&document(json!({
        "ooo_cpu": [{ "L1D": { "sets": 64 } }]
    })))
    .unwrap();
    assert_eq!(config.cores[0].l1d.as_deref(), Some("cpu0_L1D"));
    assert_eq!(config.caches["cpu0_L1D"].params["sets"], json!(64));
}

#[test]
fn test_named_inline_cache_keeps_its_name() {
    let config = normalize(&document(json!({
        "ooo_cpu": [{ "L1D": { "name": "fancy", "sets": 64 } }]
    })))
    .unwrap();
    assert_eq!(config.cores[0].l1d.as_deref(), Some("fancy"));
    assert!(config.caches.contains_key("fancy"));
}

#[test]
fn test_root_cache_object_is_instantiated_per_core() {
    let config = normalize(&document(json!({
        "L1I": { "sets": 64 },
        "num_cores": 2
    })))
    .unwrap();
    assert_eq!(config.cores[0].l1i.as_deref(), Some("cpu0_L1I"));
    assert_eq!(config.cores[1].l1i.as_deref(), Some("cpu1_L1I"));
    assert_eq!(config.caches["cpu0_L1I"].params["sets"], json!(64));
    assert_eq!(config.caches["cpu1_L1I"].params["sets"], json!(64));
}

#[test]
fn test_named_root_cache_object_is_shared_across_cores() {
    let config = normalize(&document(json!({
        "L1I": { "name": "shared_l1i" },
        "num_cores": 2
    })))
    .unwrap();
    assert_eq!(config.cores[0].l1i.as_deref(), Some("shared_l1i"));
    assert_eq!(config.cores[1].l1i.as_deref(), Some("shared_l1i"));
    assert_eq!(config.caches.len(), 1);
}

#[test]
fn test_inline_declaration_beats_root_declaration() {
    let config = normalize(&document(json!({
        "L1I": { "sets": 64, "rq_size": 8 },
        "ooo_cpu": [{ "L1I": { "sets": 128 } }]
    })))
    .unwrap();
    let cache = &config.caches["cpu0_L1I"];
    assert_eq!(cache.params["sets"], json!(128));
    assert_eq!(cache.params["rq_size"], json!(8));
}

#[test]
fn test_explicit_array_beats_inline_declaration() {
    let config = normalize(&document(json!({
        "ooo_cpu": [{ "L1I": { "name": "front", "sets": 128, "rq_size": 8 } }],
        "caches": [{ "name": "front", "sets": 256 }]
    })))
    .unwrap();
    let cache = &config.caches["front"];
    assert_eq!(cache.params["sets"], json!(256));
    assert_eq!(cache.params["rq_size"], json!(8));
}

#[test]
fn test_root_core_parameters_default_into_every_core() {
    let config = normalize(&document(json!({
        "rob_size": 352,
        "ooo_cpu": [{}, { "rob_size": 128 }]
    })))
    .unwrap();
    assert_eq!(config.cores[0].params["rob_size"], json!(352));
    assert_eq!(config.cores[1].params["rob_size"], json!(128));
}

#[test]
fn test_root_second_level_objects_are_instantiated_per_core() {
    let config = normalize(&document(json!({
        "L2C": { "sets": 1024 },
        "num_cores": 2
    })))
    .unwrap();
    assert_eq!(config.caches["cpu0_L2C"].params["sets"], json!(1024));
    assert_eq!(config.caches["cpu1_L2C"].params["sets"], json!(1024));
}

#[test]
fn test_environment_keys_are_split_from_the_root() {
    let config = normalize(&document(json!({
        "CC": "clang",
        "CXXFLAGS": "-O3",
        "block_size": 32
    })))
    .unwrap();
    assert_eq!(config.env["CC"], json!("clang"));
    assert_eq!(config.env["CXXFLAGS"], json!("-O3"));
    assert!(!config.root.contains_key("CC"));
    assert_eq!(config.root["block_size"], json!(32));
}

#[test]
fn test_unnamed_explicit_cache_entry_is_a_conflict() {
    let err = normalize(&document(json!({ "caches": [{ "sets": 64 }] }))).unwrap_err();
    assert!(matches!(err, ConfigError::Conflict { .. }));
}

#[test]
fn test_duplicate_explicit_cache_entries_are_a_conflict() {
    let err = normalize(&document(json!({
        "caches": [{ "name": "dup" }, { "name": "dup" }]
    })))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Conflict { ref name, .. } if name == "dup"));
}

#[test]
fn test_cache_and_walker_sharing_a_name_is_a_conflict() {
    let err = normalize(&document(json!({
        "caches": [{ "name": "X" }],
        "ptws": [{ "name": "X" }]
    })))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Conflict { ref name, .. } if name == "X"));
}

#[test]
fn test_one_inline_cache_claimed_by_two_slots_is_a_conflict() {
    let err = normalize(&document(json!({
        "ooo_cpu": [{
            "L1I": { "name": "same" },
            "L1D": { "name": "same" }
        }]
    })))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Conflict { ref name, .. } if name == "same"));
}
