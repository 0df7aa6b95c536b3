use arbor_pathdb::{
    shred, ArrayNode, AtomicValue, Hash128, Node, ValueNode, WideHash, DOCUMENT_NODE_KEY,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn child_hashes() -> impl Strategy<Value = Vec<u128>> {
    prop::collection::vec(any::<u128>(), 0..8)
}

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|i| json!(i)),
        "[a-z]{0,6}".prop_map(Value::String),
        Just(Value::Null),
    ]
}

fn json_doc() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-c]", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_compute_hash_is_deterministic(children in child_hashes()) {
        let mut array = ArrayNode::new(1, 0, 1);
        array.struct_delegate_mut().child_count = children.len() as u64;
        let hashes: Vec<Hash128> = children.into_iter().map(Hash128::new).collect();
        prop_assert_eq!(array.compute_hash(&hashes), array.compute_hash(&hashes));
    }

    #[test]
    fn prop_changing_a_child_changes_the_hash(
        children in prop::collection::vec(any::<u128>(), 1..8),
        pick in any::<prop::sample::Index>(),
        delta in 1u128..,
    ) {
        let mut array = ArrayNode::new(1, 0, 1);
        array.struct_delegate_mut().child_count = children.len() as u64;
        let before: Vec<Hash128> = children.iter().copied().map(Hash128::new).collect();
        let mut after = before.clone();
        let i = pick.index(after.len());
        after[i] = Hash128::new(after[i].raw().wrapping_add(delta));
        prop_assert_ne!(array.compute_hash(&before), array.compute_hash(&after));
    }

    #[test]
    fn prop_normalize_is_idempotent(bytes in prop::collection::vec(any::<u8>(), 0..48)) {
        let once = Hash128::normalize(&bytes);
        let twice = Hash128::normalize(&once.to_be_bytes());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_set_hash_clamps_any_width(bytes in prop::collection::vec(any::<u8>(), 0..48)) {
        let mut node = ValueNode::new(2, 1, AtomicValue::Null);
        node.set_hash(WideHash::from_be_bytes(bytes.clone()));
        prop_assert_eq!(node.hash(), Some(Hash128::normalize(&bytes)));
    }

    #[test]
    fn prop_shredding_is_deterministic(doc in json_doc()) {
        let (left, left_summary) = shred(&doc).unwrap();
        let (right, right_summary) = shred(&doc).unwrap();
        prop_assert_eq!(left.root_hash(), right.root_hash());
        prop_assert_eq!(left_summary.len(), right_summary.len());
        prop_assert_eq!(
            left.descendant_count(DOCUMENT_NODE_KEY),
            Some(left.len() as u64 - 1)
        );
    }
}
