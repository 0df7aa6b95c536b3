//! Document nodes.
//!
//! Every node is composed of two owned delegates instead of an inheritance
//! chain:
//!
//! - [`NodeDelegate`]: identity (node key, parent key, kind)
//! - [`StructDelegate`]: tree structure (first/last child, siblings, counts)
//!
//! The [`Node`] trait forwards its accessors to those delegates. Each node
//! type only supplies the delegate accessors, its path-node reference, its
//! stored hash and (for keys and values) a payload digest.

use crate::hash::{ComponentHasher, Hash128, WideHash};
use arbor_dsl::QName;
use serde::{Deserialize, Serialize};

pub type NodeKey = u64;
pub type PathNodeKey = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Object,
    Array,
    ObjectKey,
    String,
    Number,
    Boolean,
    Null,
}

impl NodeKind {
    /// Stable numeric id; part of the hash contract.
    pub fn id(self) -> u8 {
        match self {
            NodeKind::Document => 1,
            NodeKind::Object => 2,
            NodeKind::Array => 3,
            NodeKind::ObjectKey => 4,
            NodeKind::String => 5,
            NodeKind::Number => 6,
            NodeKind::Boolean => 7,
            NodeKind::Null => 8,
        }
    }

    pub fn is_value(self) -> bool {
        matches!(
            self,
            NodeKind::String | NodeKind::Number | NodeKind::Boolean | NodeKind::Null
        )
    }
}

/// Identity fields shared by every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDelegate {
    pub node_key: NodeKey,
    pub parent_key: Option<NodeKey>,
    pub kind: NodeKind,
}

impl NodeDelegate {
    pub fn new(node_key: NodeKey, parent_key: Option<NodeKey>, kind: NodeKind) -> Self {
        Self {
            node_key,
            parent_key,
            kind,
        }
    }

    /// Only the kind is hashed; node keys are positional and would make equal
    /// subtrees in different revisions hash differently.
    pub fn compute_hash(&self) -> Hash128 {
        let mut hasher = ComponentHasher::new();
        hasher.write_u8(self.kind.id());
        hasher.finish()
    }
}

/// Structural fields shared by every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDelegate {
    pub first_child: Option<NodeKey>,
    pub last_child: Option<NodeKey>,
    pub left_sibling: Option<NodeKey>,
    pub right_sibling: Option<NodeKey>,
    pub child_count: u64,
    pub descendant_count: u64,
}

impl StructDelegate {
    /// Digest of the child count followed by every child hash, in document
    /// order.
    pub fn compute_hash(&self, child_hashes: &[Hash128]) -> Hash128 {
        let mut hasher = ComponentHasher::new();
        hasher.write_u64(self.child_count);
        child_hashes
            .iter()
            .fold(hasher.finish(), |acc, child| acc.fold(*child))
    }
}

pub trait Node {
    fn node_delegate(&self) -> &NodeDelegate;
    fn struct_delegate(&self) -> &StructDelegate;
    fn struct_delegate_mut(&mut self) -> &mut StructDelegate;

    /// Reference into the path summary, if this kind of node has one.
    fn path_node_key(&self) -> Option<PathNodeKey> {
        None
    }

    /// Stored hash; `None` until assigned with [`Node::set_hash`].
    fn hash(&self) -> Option<Hash128>;

    /// Store `hash`, clamped to 128 bits.
    fn set_hash(&mut self, hash: WideHash);

    /// Digest of the node's own content (key names, atomic values).
    fn payload_hash(&self) -> Option<Hash128> {
        None
    }

    /// Compose this node's hash from its delegates and its children's hashes.
    ///
    /// Pure: the result is not stored.
    fn compute_hash(&self, child_hashes: &[Hash128]) -> Hash128 {
        let mut hash = Hash128::SEED
            .fold(self.node_delegate().compute_hash())
            .fold(self.struct_delegate().compute_hash(child_hashes));
        if let Some(payload) = self.payload_hash() {
            hash = hash.fold(payload);
        }
        hash
    }

    fn kind(&self) -> NodeKind {
        self.node_delegate().kind
    }

    fn node_key(&self) -> NodeKey {
        self.node_delegate().node_key
    }

    fn parent_key(&self) -> Option<NodeKey> {
        self.node_delegate().parent_key
    }

    fn first_child_key(&self) -> Option<NodeKey> {
        self.struct_delegate().first_child
    }

    fn last_child_key(&self) -> Option<NodeKey> {
        self.struct_delegate().last_child
    }

    fn left_sibling_key(&self) -> Option<NodeKey> {
        self.struct_delegate().left_sibling
    }

    fn right_sibling_key(&self) -> Option<NodeKey> {
        self.struct_delegate().right_sibling
    }

    fn child_count(&self) -> u64 {
        self.struct_delegate().child_count
    }

    fn descendant_count(&self) -> u64 {
        self.struct_delegate().descendant_count
    }
}

macro_rules! forward_delegates {
    ($ty:ty) => {
        impl $ty {
            pub fn delegates(&self) -> (&NodeDelegate, &StructDelegate) {
                (&self.node_del, &self.struct_del)
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    node_del: NodeDelegate,
    struct_del: StructDelegate,
    hash: Option<Hash128>,
}

impl DocumentNode {
    pub fn new(node_key: NodeKey) -> Self {
        Self {
            node_del: NodeDelegate::new(node_key, None, NodeKind::Document),
            struct_del: StructDelegate::default(),
            hash: None,
        }
    }
}

forward_delegates!(DocumentNode);

impl Node for DocumentNode {
    fn node_delegate(&self) -> &NodeDelegate {
        &self.node_del
    }

    fn struct_delegate(&self) -> &StructDelegate {
        &self.struct_del
    }

    fn struct_delegate_mut(&mut self) -> &mut StructDelegate {
        &mut self.struct_del
    }

    fn hash(&self) -> Option<Hash128> {
        self.hash
    }

    fn set_hash(&mut self, hash: WideHash) {
        self.hash = Some(hash.normalize());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectNode {
    node_del: NodeDelegate,
    struct_del: StructDelegate,
    path_node_key: PathNodeKey,
    hash: Option<Hash128>,
}

impl ObjectNode {
    pub fn new(node_key: NodeKey, parent_key: NodeKey, path_node_key: PathNodeKey) -> Self {
        Self {
            node_del: NodeDelegate::new(node_key, Some(parent_key), NodeKind::Object),
            struct_del: StructDelegate::default(),
            path_node_key,
            hash: None,
        }
    }
}

forward_delegates!(ObjectNode);

impl Node for ObjectNode {
    fn node_delegate(&self) -> &NodeDelegate {
        &self.node_del
    }

    fn struct_delegate(&self) -> &StructDelegate {
        &self.struct_del
    }

    fn struct_delegate_mut(&mut self) -> &mut StructDelegate {
        &mut self.struct_del
    }

    fn path_node_key(&self) -> Option<PathNodeKey> {
        Some(self.path_node_key)
    }

    fn hash(&self) -> Option<Hash128> {
        self.hash
    }

    fn set_hash(&mut self, hash: WideHash) {
        self.hash = Some(hash.normalize());
    }
}

/// A JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayNode {
    node_del: NodeDelegate,
    struct_del: StructDelegate,
    path_node_key: PathNodeKey,
    hash: Option<Hash128>,
}

impl ArrayNode {
    pub fn new(node_key: NodeKey, parent_key: NodeKey, path_node_key: PathNodeKey) -> Self {
        Self {
            node_del: NodeDelegate::new(node_key, Some(parent_key), NodeKind::Array),
            struct_del: StructDelegate::default(),
            path_node_key,
            hash: None,
        }
    }

    /// Rebuild an array node with a hash taken from a stored revision.
    pub fn with_hash(
        node_key: NodeKey,
        parent_key: NodeKey,
        path_node_key: PathNodeKey,
        hash: WideHash,
    ) -> Self {
        let mut node = Self::new(node_key, parent_key, path_node_key);
        node.set_hash(hash);
        node
    }
}

forward_delegates!(ArrayNode);

impl Node for ArrayNode {
    fn node_delegate(&self) -> &NodeDelegate {
        &self.node_del
    }

    fn struct_delegate(&self) -> &StructDelegate {
        &self.struct_del
    }

    fn struct_delegate_mut(&mut self) -> &mut StructDelegate {
        &mut self.struct_del
    }

    fn path_node_key(&self) -> Option<PathNodeKey> {
        Some(self.path_node_key)
    }

    fn hash(&self) -> Option<Hash128> {
        self.hash
    }

    fn set_hash(&mut self, hash: WideHash) {
        self.hash = Some(hash.normalize());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectKeyNode {
    node_del: NodeDelegate,
    struct_del: StructDelegate,
    name: QName,
    path_node_key: PathNodeKey,
    hash: Option<Hash128>,
}

impl ObjectKeyNode {
    pub fn new(
        node_key: NodeKey,
        parent_key: NodeKey,
        name: QName,
        path_node_key: PathNodeKey,
    ) -> Self {
        Self {
            node_del: NodeDelegate::new(node_key, Some(parent_key), NodeKind::ObjectKey),
            struct_del: StructDelegate::default(),
            name,
            path_node_key,
            hash: None,
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }
}

forward_delegates!(ObjectKeyNode);

impl Node for ObjectKeyNode {
    fn node_delegate(&self) -> &NodeDelegate {
        &self.node_del
    }

    fn struct_delegate(&self) -> &StructDelegate {
        &self.struct_del
    }

    fn struct_delegate_mut(&mut self) -> &mut StructDelegate {
        &mut self.struct_del
    }

    fn path_node_key(&self) -> Option<PathNodeKey> {
        Some(self.path_node_key)
    }

    fn hash(&self) -> Option<Hash128> {
        self.hash
    }

    fn set_hash(&mut self, hash: WideHash) {
        self.hash = Some(hash.normalize());
    }

    fn payload_hash(&self) -> Option<Hash128> {
        let mut hasher = ComponentHasher::new();
        hasher.write_str(self.name.namespace.as_deref().unwrap_or_default());
        hasher.write_str(&self.name.local);
        Some(hasher.finish())
    }
}

/// Atomic JSON value carried by a [`ValueNode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AtomicValue {
    String(String),
    Number(serde_json::Number),
    Boolean(bool),
    Null,
}

impl AtomicValue {
    pub fn kind(&self) -> NodeKind {
        match self {
            AtomicValue::String(_) => NodeKind::String,
            AtomicValue::Number(_) => NodeKind::Number,
            AtomicValue::Boolean(_) => NodeKind::Boolean,
            AtomicValue::Null => NodeKind::Null,
        }
    }

    fn digest(&self) -> Hash128 {
        let mut hasher = ComponentHasher::new();
        hasher.write_u8(self.kind().id());
        match self {
            AtomicValue::String(s) => hasher.write_str(s),
            AtomicValue::Number(n) => hasher.write_str(&n.to_string()),
            AtomicValue::Boolean(b) => hasher.write_u8(u8::from(*b)),
            AtomicValue::Null => {}
        }
        hasher.finish()
    }
}

/// A string, number, boolean or null leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueNode {
    node_del: NodeDelegate,
    struct_del: StructDelegate,
    value: AtomicValue,
    hash: Option<Hash128>,
}

impl ValueNode {
    pub fn new(node_key: NodeKey, parent_key: NodeKey, value: AtomicValue) -> Self {
        Self {
            node_del: NodeDelegate::new(node_key, Some(parent_key), value.kind()),
            struct_del: StructDelegate::default(),
            value,
            hash: None,
        }
    }

    pub fn value(&self) -> &AtomicValue {
        &self.value
    }
}

forward_delegates!(ValueNode);

impl Node for ValueNode {
    fn node_delegate(&self) -> &NodeDelegate {
        &self.node_del
    }

    fn struct_delegate(&self) -> &StructDelegate {
        &self.struct_del
    }

    fn struct_delegate_mut(&mut self) -> &mut StructDelegate {
        &mut self.struct_del
    }

    fn hash(&self) -> Option<Hash128> {
        self.hash
    }

    fn set_hash(&mut self, hash: WideHash) {
        self.hash = Some(hash.normalize());
    }

    fn payload_hash(&self) -> Option<Hash128> {
        Some(self.value.digest())
    }
}

/// Any node stored in a [`crate::DocumentTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum JsonNode {
    Document(DocumentNode),
    Object(ObjectNode),
    Array(ArrayNode),
    ObjectKey(ObjectKeyNode),
    Value(ValueNode),
}

impl JsonNode {
    pub fn as_node(&self) -> &dyn Node {
        match self {
            JsonNode::Document(n) => n,
            JsonNode::Object(n) => n,
            JsonNode::Array(n) => n,
            JsonNode::ObjectKey(n) => n,
            JsonNode::Value(n) => n,
        }
    }

    pub fn as_node_mut(&mut self) -> &mut dyn Node {
        match self {
            JsonNode::Document(n) => n,
            JsonNode::Object(n) => n,
            JsonNode::Array(n) => n,
            JsonNode::ObjectKey(n) => n,
            JsonNode::Value(n) => n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_with_children(count: u64) -> ArrayNode {
        let mut array = ArrayNode::new(1, 0, 1);
        array.struct_delegate_mut().child_count = count;
        array
    }

    #[test]
    fn array_hash_is_seeded_fold_of_delegates() {
        let array = array_with_children(2);
        let children = [Hash128::new(3), Hash128::new(4)];
        let (node_del, struct_del) = array.delegates();

        let expected = Hash128::SEED
            .fold(node_del.compute_hash())
            .fold(struct_del.compute_hash(&children));
        assert_eq!(array.compute_hash(&children), expected);
    }

    #[test]
    fn compute_hash_does_not_store() {
        let array = array_with_children(0);
        let _ = array.compute_hash(&[]);
        assert_eq!(array.hash(), None);
    }

    #[test]
    fn with_hash_clamps_wide_input() {
        let mut wide = vec![0xFF; 4];
        wide.extend_from_slice(&9u128.to_be_bytes());
        let array = ArrayNode::with_hash(1, 0, 1, WideHash::from_be_bytes(wide));
        assert_eq!(array.hash(), Some(Hash128::new(9)));
    }

    #[test]
    fn key_name_changes_hash() {
        let a = ObjectKeyNode::new(1, 0, QName::local("a"), 1);
        let b = ObjectKeyNode::new(1, 0, QName::local("b"), 1);
        assert_ne!(a.compute_hash(&[]), b.compute_hash(&[]));
    }

    #[test]
    fn node_keys_do_not_affect_hash() {
        let left = ValueNode::new(3, 2, AtomicValue::Boolean(true));
        let right = ValueNode::new(17, 9, AtomicValue::Boolean(true));
        assert_eq!(left.compute_hash(&[]), right.compute_hash(&[]));
    }
}
