//! # Expansion Tests
//!
//! Tests for broadcast, default naming, default hierarchy wiring, chain
//! termination, and reachability filtering.

use std::collections::BTreeMap;

use champsim_config::expand::{
    core_default_names, duplicate_to_length, expand, filter_inaccessible, terminate_path,
};
use champsim_config::machine::{Cache, Core, MEMORY_SENTINEL};
use champsim_config::ConfigError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::Value;

fn cache(name: &str, lower: Option<&str>) -> Cache {
    Cache {
        name: name.to_string(),
        lower_level: lower.map(String::from),
        ..Cache::default()
    }
}

fn cache_map(entries: &[(&str, Option<&str>)]) -> BTreeMap<String, Cache> {
    entries
        .iter()
        .map(|(name, lower)| (name.to_string(), cache(name, *lower)))
        .collect()
}

#[rstest]
#[case(&["a", "b"], 5, &["a", "a", "a", "b", "b"])]
#[case(&["a", "b", "c"], 3, &["a", "b", "c"])]
#[case(&["a", "b", "c"], 2, &["a", "b"])]
#[case(&["a"], 4, &["a", "a", "a", "a"])]
#[case(&["a", "b"], 0, &[])]
fn test_duplicate_to_length_groups_in_template_order(
    #[case] template: &[&str],
    #[case] count: usize,
    #[case] expected: &[&str],
) {
    assert_eq!(duplicate_to_length(template, count), expected);
}

#[test]
fn test_duplicate_to_length_of_an_empty_template_is_empty() {
    assert_eq!(duplicate_to_length::<u32>(&[], 4), Vec::<u32>::new());
}

proptest! {
    #[test]
    fn test_duplicate_to_length_yields_exactly_count_grouped_elements(
        template in proptest::collection::vec(0u8..8, 1..5),
        count in 0usize..40,
    ) {
        let out = duplicate_to_length(&template, count);
        prop_assert_eq!(out.len(), count);

        // Each output element belongs to one contiguous group per template
        // slot, in template order.
        let mut cursor = 0;
        for item in &out {
            while cursor < template.len() && template[cursor] != *item {
                cursor += 1;
            }
            prop_assert!(cursor < template.len());
        }
    }
}

#[test]
fn test_core_default_names_fill_every_missing_field() {
    let mut core = Core {
        l1d: Some("mine".to_string()),
        ..Core::default()
    };
    core_default_names(&mut core, 2);
    assert_eq!(core.name.as_deref(), Some("cpu2"));
    assert_eq!(core.l1d.as_deref(), Some("mine"));
    assert_eq!(core.l1i.as_deref(), Some("cpu2_L1I"));
    assert_eq!(core.itlb.as_deref(), Some("cpu2_ITLB"));
    assert_eq!(core.dtlb.as_deref(), Some("cpu2_DTLB"));
    assert_eq!(core.ptw.as_deref(), Some("cpu2_PTW"));
    assert_eq!(core.frequency, Some(4000));
    assert_eq!(core.branch_predictor, Some(vec!["bimodal".to_string()]));
    assert_eq!(core.btb, Some(vec!["basic_btb".to_string()]));
    let dib = core.dib.unwrap();
    assert_eq!(dib.get("window_size").and_then(Value::as_u64), Some(16));
    assert_eq!(dib.get("sets").and_then(Value::as_u64), Some(32));
    assert_eq!(dib.get("ways").and_then(Value::as_u64), Some(8));
}

#[test]
fn test_expand_builds_the_default_hierarchy() {
    let mut cores = vec![Core::default()];
    let mut ptws = BTreeMap::new();
    let caches = expand(&mut cores, BTreeMap::new(), &mut ptws).unwrap();

    let names: Vec<_> = caches.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["LLC", "cpu0_DTLB", "cpu0_ITLB", "cpu0_L1D", "cpu0_L1I", "cpu0_L2C", "cpu0_STLB"]
    );
    assert_eq!(caches["cpu0_L1I"].lower_level.as_deref(), Some("cpu0_L2C"));
    assert_eq!(caches["cpu0_L2C"].lower_level.as_deref(), Some("LLC"));
    assert_eq!(caches["LLC"].lower_level.as_deref(), Some(MEMORY_SENTINEL));
    assert_eq!(caches["cpu0_ITLB"].lower_level.as_deref(), Some("cpu0_STLB"));
    assert_eq!(caches["cpu0_STLB"].lower_level.as_deref(), Some("cpu0_PTW"));
    assert!(ptws.contains_key("cpu0_PTW"));
}

#[test]
fn test_expand_assigns_translation_defaults_in_lockstep() {
    let mut cores = vec![Core::default()];
    let mut ptws = BTreeMap::new();
    let caches = expand(&mut cores, BTreeMap::new(), &mut ptws).unwrap();

    assert_eq!(caches["cpu0_L1I"].lower_translate.as_deref(), Some("cpu0_ITLB"));
    assert_eq!(caches["cpu0_L1D"].lower_translate.as_deref(), Some("cpu0_DTLB"));
    assert_eq!(caches["cpu0_L2C"].lower_translate.as_deref(), Some("cpu0_STLB"));
    // Deeper than the TLB chain clamps to its last element.
    assert_eq!(caches["LLC"].lower_translate.as_deref(), Some("cpu0_STLB"));
    assert_eq!(caches["cpu0_ITLB"].lower_translate, None);
}

#[test]
fn test_expand_fills_module_defaults_per_cache_kind() {
    let mut cores = vec![Core::default()];
    let mut ptws = BTreeMap::new();
    let caches = expand(&mut cores, BTreeMap::new(), &mut ptws).unwrap();

    assert!(caches["cpu0_L1I"].is_instruction_cache);
    assert!(!caches["cpu0_L1D"].is_instruction_cache);
    assert_eq!(caches["cpu0_L1I"].prefetcher, Some(vec!["no_instr".to_string()]));
    assert_eq!(caches["cpu0_L1D"].prefetcher, Some(vec!["no".to_string()]));
    assert_eq!(caches["cpu0_L1D"].replacement, Some(vec!["lru".to_string()]));
}

#[test]
fn test_expand_leaves_user_hierarchies_unlinked() {
    let mut cores = vec![Core {
        l1i: Some("I".to_string()),
        l1d: Some("D".to_string()),
        itlb: Some("IT".to_string()),
        dtlb: Some("DT".to_string()),
        ..Core::default()
    }];
    let caches = cache_map(&[("I", None), ("D", None), ("IT", None), ("DT", None)]);
    let mut ptws = BTreeMap::new();
    let caches = expand(&mut cores, caches, &mut ptws).unwrap();

    // No default mid-levels appear when nothing drains into them.
    assert!(!caches.contains_key("cpu0_L2C"));
    assert!(!caches.contains_key("LLC"));
    assert!(!caches.contains_key("cpu0_STLB"));
    // Dangling chains are anchored directly instead.
    assert_eq!(caches["I"].lower_level.as_deref(), Some(MEMORY_SENTINEL));
    assert_eq!(caches["IT"].lower_level.as_deref(), Some("cpu0_PTW"));
    assert_eq!(caches["I"].lower_translate.as_deref(), Some("IT"));
    assert_eq!(caches["D"].lower_translate.as_deref(), Some("DT"));
}

#[test]
fn test_terminate_path_anchors_a_dangling_chain_end() {
    let mut caches = cache_map(&[("A", Some("B")), ("B", None)]);
    terminate_path(&mut caches, "A", MEMORY_SENTINEL).unwrap();
    assert_eq!(caches["A"].lower_level.as_deref(), Some("B"));
    assert_eq!(caches["B"].lower_level.as_deref(), Some(MEMORY_SENTINEL));
}

#[test]
fn test_terminate_path_leaves_external_ends_alone() {
    let mut caches = cache_map(&[("A", Some("B")), ("B", Some("elsewhere"))]);
    terminate_path(&mut caches, "A", MEMORY_SENTINEL).unwrap();
    assert_eq!(caches["B"].lower_level.as_deref(), Some("elsewhere"));
}

#[test]
fn test_terminate_path_reports_cycles() {
    let mut caches = cache_map(&[("A", Some("B")), ("B", Some("A"))]);
    let err = terminate_path(&mut caches, "A", MEMORY_SENTINEL).unwrap_err();
    assert!(matches!(err, ConfigError::UnterminatedHierarchy { ref start } if start == "A"));
}

#[test]
fn test_filter_inaccessible_drops_orphans() {
    let caches = cache_map(&[("A", Some("B")), ("B", None), ("orphan", None)]);
    let kept = filter_inaccessible(caches, vec!["A".to_string()]);
    let names: Vec<_> = kept.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn test_filter_inaccessible_with_no_roots_is_empty() {
    let caches = cache_map(&[("A", None)]);
    assert!(filter_inaccessible(caches, Vec::new()).is_empty());
}
