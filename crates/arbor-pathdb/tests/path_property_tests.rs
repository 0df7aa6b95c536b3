use arbor_pathdb::{shred, Path, Step};
use proptest::prelude::*;
use serde_json::{json, Value};

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => "[a-z]{1,4}".prop_map(|label: String| Step::child(label.as_str())),
        1 => Just(Step::child_array()),
    ]
}

fn concrete_path() -> impl Strategy<Value = Path> {
    prop::collection::vec(step(), 0..6).prop_map(Path::new)
}

/// Paths with at least one step; the summary root has no entry of its own.
fn non_root_path() -> impl Strategy<Value = Path> {
    prop::collection::vec(step(), 1..6).prop_map(Path::new)
}

/// Nest `leaf` under `path`, so shredding the result stores `path`.
fn document_for(path: &Path, leaf: Value) -> Value {
    path.steps().iter().rev().fold(leaf, |inner, step| match &step.label {
        Some(label) => json!({ (label.local_name()): inner }),
        None => json!([inner]),
    })
}

proptest! {
    #[test]
    fn prop_display_reparses(path in concrete_path()) {
        let text = path.to_string();
        prop_assert_eq!(Path::parse(&text).unwrap(), path);
    }

    #[test]
    fn prop_concrete_path_matches_itself(path in concrete_path()) {
        prop_assert!(path.matches(&path));
    }

    #[test]
    fn prop_descendant_pattern_covers_nested_leaf(path in concrete_path(), leaf in "[a-z]{1,4}") {
        let concrete = path.clone().with_step(Step::child(leaf.as_str()));
        let pattern = Path::new(vec![Step::descendant(leaf.as_str())]);
        prop_assert!(pattern.matches(&concrete));
    }

    #[test]
    fn prop_shredded_summary_contains_the_nesting_path(path in non_root_path()) {
        let (_, summary) = shred(&document_for(&path, json!(1))).unwrap();
        let stored: Vec<Path> = summary
            .nodes()
            .filter_map(|node| summary.path_of(node.key))
            .collect();
        prop_assert!(stored.contains(&path));
    }
}

#[test]
fn root_level_scalar_adds_no_summary_entry() {
    let (_, summary) = shred(&json!(1)).unwrap();
    assert_eq!(summary.nodes().count(), 0);
}
