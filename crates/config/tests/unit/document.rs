//! # Document Tests
//!
//! Tests for the lenient wire-format parsing: string-or-list references,
//! name-or-inline cache slots, and opaque pass-through of unknown keys.

use champsim_config::document::{CacheRef, NameOrList};
use champsim_config::{ConfigDocument, ConfigError};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::document;
use serde_json::json;

#[rstest]
#[case("", vec![])]
#[case("a", vec!["a"])]
#[case("a, b", vec!["a", "b"])]
#[case(" a ,, b ", vec!["a", "b"])]
fn test_into_names_splits_comma_strings(#[case] joined: &str, #[case] expected: Vec<&str>) {
    let expected: Vec<String> = expected.into_iter().map(String::from).collect();
    assert_eq!(NameOrList::One(joined.to_string()).into_names(), expected);
}

#[test]
fn test_into_names_passes_lists_through() {
    let list = NameOrList::Many(vec!["a".to_string(), "b".to_string()]);
    assert_eq!(list.into_names(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_empty_document_has_no_content() {
    let doc = ConfigDocument::from_json("{}").unwrap();
    assert_eq!(doc.name, None);
    assert_eq!(doc.executable_name, None);
    assert_eq!(doc.num_cores, None);
    assert!(doc.cores.is_empty());
    assert!(doc.caches.is_empty());
    assert!(doc.root.is_empty());
}

#[test]
fn test_unrecognized_root_keys_are_preserved() {
    let doc = document(json!({
        "block_size": 32,
        "CC": "clang",
        "something_custom": { "nested": true }
    }));
    assert_eq!(doc.root["block_size"], json!(32));
    assert_eq!(doc.root["CC"], json!("clang"));
    assert_eq!(doc.root["something_custom"]["nested"], json!(true));
}

#[test]
fn test_core_slots_accept_names_and_inline_objects() {
    let doc = document(json!({
        "ooo_cpu": [{
            "L1I": "shared_instruction_cache",
            "L1D": { "sets": 64, "ways": 12 }
        }]
    }));
    let core = &doc.cores[0];
    assert!(matches!(core.l1i, Some(CacheRef::Name(ref name)) if name == "shared_instruction_cache"));
    assert!(matches!(core.l1d, Some(CacheRef::Inline(_))));
}

#[test]
fn test_module_references_parse_as_string_or_list() {
    let doc = document(json!({
        "ooo_cpu": [{ "branch_predictor": "bimodal, gshare" }],
        "caches": [{ "name": "LLC", "replacement": ["lru", "srrip"] }]
    }));
    let predictor = doc.cores[0].branch_predictor.clone().unwrap();
    assert_eq!(predictor.into_names(), vec!["bimodal".to_string(), "gshare".to_string()]);
    let replacement = doc.caches[0].replacement.clone().unwrap();
    assert_eq!(replacement.into_names(), vec!["lru".to_string(), "srrip".to_string()]);
}

#[test]
fn test_malformed_json_is_a_document_error() {
    let err = ConfigDocument::from_json("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Document(_)));
}
