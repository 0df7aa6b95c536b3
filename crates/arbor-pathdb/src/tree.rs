//! Node-tree storage for one document revision.
//!
//! Node keys are assigned in document order (pre-order), starting with the
//! document node at key 0. Children therefore always have larger keys than
//! their parent, which lets bottom-up passes simply walk keys in reverse.

use crate::hash::{Hash128, WideHash};
use crate::node::{
    ArrayNode, AtomicValue, DocumentNode, JsonNode, Node, NodeKey, NodeKind, ObjectKeyNode,
    ObjectNode, PathNodeKey, ValueNode,
};
use crate::path::Step;
use crate::summary::{PathSummary, ROOT_PATH_NODE_KEY};
use arbor_dsl::QName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DOCUMENT_NODE_KEY: NodeKey = 0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unknown node key {0}")]
    UnknownNode(NodeKey),
    #[error("unknown path node key {0}")]
    UnknownPathNode(PathNodeKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTree {
    nodes: Vec<JsonNode>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// A tree holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![JsonNode::Document(DocumentNode::new(DOCUMENT_NODE_KEY))],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when only the document node exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, key: NodeKey) -> Option<&JsonNode> {
        self.nodes.get(key as usize)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut JsonNode> {
        self.nodes.get_mut(key as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JsonNode> {
        self.nodes.iter()
    }

    /// Child keys of `key`, in document order.
    pub fn children(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut next = self.get(key).and_then(|n| n.as_node().first_child_key());
        while let Some(child) = next {
            out.push(child);
            next = self.get(child).and_then(|n| n.as_node().right_sibling_key());
        }
        out
    }

    pub fn descendant_count(&self, key: NodeKey) -> Option<u64> {
        self.get(key).map(|n| n.as_node().descendant_count())
    }

    pub fn root_hash(&self) -> Option<Hash128> {
        self.get(DOCUMENT_NODE_KEY)?.as_node().hash()
    }

    /// Recompute and store every node hash, leaves first.
    pub fn rehash(&mut self) -> Result<(), TreeError> {
        for index in (0..self.nodes.len()).rev() {
            let key = index as NodeKey;
            let child_hashes = self
                .children(key)
                .into_iter()
                .map(|child| {
                    self.get(child)
                        .and_then(|n| n.as_node().hash())
                        .ok_or(TreeError::UnknownNode(child))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let node = self.nodes[index].as_node_mut();
            let hash = node.compute_hash(&child_hashes);
            node.set_hash(WideHash::from(hash));
        }
        Ok(())
    }

    fn push(&mut self, node: JsonNode) -> Result<NodeKey, TreeError> {
        let key = self.nodes.len() as NodeKey;
        let parent = node.as_node().parent_key();
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.link_child(parent, key)?;
        }
        Ok(key)
    }

    fn link_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), TreeError> {
        let previous = {
            let parent_struct = self
                .get_mut(parent)
                .ok_or(TreeError::UnknownNode(parent))?
                .as_node_mut()
                .struct_delegate_mut();
            let previous = parent_struct.last_child.replace(child);
            if previous.is_none() {
                parent_struct.first_child = Some(child);
            }
            parent_struct.child_count += 1;
            previous
        };

        if let Some(previous) = previous {
            self.get_mut(previous)
                .ok_or(TreeError::UnknownNode(previous))?
                .as_node_mut()
                .struct_delegate_mut()
                .right_sibling = Some(child);
            self.get_mut(child)
                .ok_or(TreeError::UnknownNode(child))?
                .as_node_mut()
                .struct_delegate_mut()
                .left_sibling = Some(previous);
        }
        Ok(())
    }

    fn update_descendant_counts(&mut self) {
        for index in (0..self.nodes.len()).rev() {
            let key = index as NodeKey;
            let count: u64 = self
                .children(key)
                .into_iter()
                .filter_map(|child| self.descendant_count(child))
                .map(|d| d + 1)
                .sum();
            self.nodes[index].as_node_mut().struct_delegate_mut().descendant_count = count;
        }
    }
}

// ============================================================================
// Shredding
// ============================================================================

/// Shred a JSON value into a node tree plus the path summary describing it.
///
/// Object keys become `Child` steps and arrays become `ChildArray` steps;
/// objects and atomic values share the path node of their parent. Hashes
/// are computed before returning.
pub fn shred(value: &Value) -> Result<(DocumentTree, PathSummary), TreeError> {
    let mut tree = DocumentTree::new();
    let mut summary = PathSummary::new();
    insert_value(
        &mut tree,
        &mut summary,
        DOCUMENT_NODE_KEY,
        ROOT_PATH_NODE_KEY,
        value,
    )?;
    tree.update_descendant_counts();
    tree.rehash()?;
    Ok((tree, summary))
}

fn insert_value(
    tree: &mut DocumentTree,
    summary: &mut PathSummary,
    parent: NodeKey,
    parent_path: PathNodeKey,
    value: &Value,
) -> Result<NodeKey, TreeError> {
    let next_key = tree.len() as NodeKey;
    match value {
        Value::Object(map) => {
            let object = tree.push(JsonNode::Object(ObjectNode::new(
                next_key,
                parent,
                parent_path,
            )))?;
            for (name, child) in map {
                let key_path = summary
                    .get_or_insert(parent_path, Step::child(name.as_str()), NodeKind::ObjectKey)
                    .ok_or(TreeError::UnknownPathNode(parent_path))?;
                let key_key = tree.len() as NodeKey;
                let key_node = tree.push(JsonNode::ObjectKey(ObjectKeyNode::new(
                    key_key,
                    object,
                    QName::local(name.as_str()),
                    key_path,
                )))?;
                insert_value(tree, summary, key_node, key_path, child)?;
            }
            Ok(object)
        }
        Value::Array(items) => {
            let array_path = summary
                .get_or_insert(parent_path, Step::child_array(), NodeKind::Array)
                .ok_or(TreeError::UnknownPathNode(parent_path))?;
            let array = tree.push(JsonNode::Array(ArrayNode::new(
                next_key, parent, array_path,
            )))?;
            for item in items {
                insert_value(tree, summary, array, array_path, item)?;
            }
            Ok(array)
        }
        Value::String(s) => tree.push(value_node(next_key, parent, AtomicValue::String(s.clone()))),
        Value::Number(n) => tree.push(value_node(next_key, parent, AtomicValue::Number(n.clone()))),
        Value::Bool(b) => tree.push(value_node(next_key, parent, AtomicValue::Boolean(*b))),
        Value::Null => tree.push(value_node(next_key, parent, AtomicValue::Null)),
    }
}

fn value_node(key: NodeKey, parent: NodeKey, value: AtomicValue) -> JsonNode {
    JsonNode::Value(ValueNode::new(key, parent, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shred_builds_links_and_counts() {
        let (tree, summary) = shred(&json!({"a": {"b": 1}, "c": [true, null]})).unwrap();

        // doc, object, a, {}, b, 1, c, [], true, null
        assert_eq!(tree.len(), 10);
        assert_eq!(tree.descendant_count(DOCUMENT_NODE_KEY), Some(9));

        let object = tree.children(DOCUMENT_NODE_KEY);
        assert_eq!(object, vec![1]);
        let keys = tree.children(1);
        assert_eq!(keys.len(), 2);
        let a = tree.get(keys[0]).unwrap().as_node();
        assert_eq!(a.kind(), NodeKind::ObjectKey);
        assert_eq!(a.right_sibling_key(), Some(keys[1]));
        assert_eq!(
            tree.get(keys[1]).unwrap().as_node().left_sibling_key(),
            Some(keys[0])
        );

        // /a, /a/b, /c, /c/[]
        assert_eq!(summary.len(), 5);
        let b = summary.match_label(&QName::local("b"), 0, NodeKind::ObjectKey);
        let b_key = b.iter().next().unwrap();
        assert_eq!(summary.path_of(b_key).unwrap().to_string(), "/a/b");
    }

    #[test]
    fn repeated_paths_share_one_summary_entry() {
        let (tree, summary) = shred(&json!([{"x": 1}, {"x": 2}, {"x": 3}])).unwrap();
        let x = summary.match_label(&QName::local("x"), 0, NodeKind::ObjectKey);
        assert_eq!(x.len(), 1);
        let node = summary.path_node(x.iter().next().unwrap()).unwrap();
        assert_eq!(node.references, 3);
        assert_eq!(summary.path_of(node.key).unwrap().to_string(), "/[]/x");

        let keys: Vec<_> = tree
            .iter()
            .filter(|n| n.as_node().kind() == NodeKind::ObjectKey)
            .map(|n| n.as_node().path_node_key())
            .collect();
        assert_eq!(keys, vec![Some(node.key); 3]);
    }

    #[test]
    fn equal_documents_hash_equal_and_values_matter() {
        let (left, _) = shred(&json!({"a": [1, 2]})).unwrap();
        let (right, _) = shred(&json!({"a": [1, 2]})).unwrap();
        let (other, _) = shred(&json!({"a": [2, 1]})).unwrap();
        assert!(left.root_hash().is_some());
        assert_eq!(left.root_hash(), right.root_hash());
        assert_ne!(left.root_hash(), other.root_hash());
    }

    #[test]
    fn rehash_is_stable() {
        let (mut tree, _) = shred(&json!({"k": "v"})).unwrap();
        let before = tree.root_hash();
        tree.rehash().unwrap();
        assert_eq!(tree.root_hash(), before);
    }
}
