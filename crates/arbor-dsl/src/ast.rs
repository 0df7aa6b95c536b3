//! Arena-backed, mutable query AST.
//!
//! Nodes live in a single `Vec` and refer to each other by [`AstId`]. Every
//! node records its parent handle, so rewrites can walk upward (ancestor
//! checks) and splice replacements in place without reference cycles.
//!
//! Detached nodes stay in the arena; they are simply no longer reachable
//! from the query root.

use crate::qname::QName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Handle of a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct AstId(u32);

impl AstId {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstKind {
    /// Root of a compiled query body.
    Query,
    /// `target.label`: children are `[target, label literal]`.
    DerefExpr,
    /// `target[index]`: children are `[target, index]`.
    ArrayAccess,
    /// Function call; the node value is the function's [`QName`].
    FunctionCall,
    /// `target[? predicate]`: children are `[target, predicate]`.
    FilterExpr,
    /// `lhs op rhs`; the node value is the [`Comparator`].
    ComparisonExpr,
    /// `$$`, the context item inside a filter predicate.
    ContextItemExpr,
    /// A sequence constructor. Without children it is the empty sequence.
    SequenceExpr,
    /// Index scan produced by the optimizer.
    IndexExpr,
    StrLiteral,
    IntLiteral,
    BoolLiteral,
}

impl AstKind {
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            AstKind::StrLiteral | AstKind::IntLiteral | AstKind::BoolLiteral
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Lt => "lt",
            Comparator::Le => "le",
            Comparator::Gt => "gt",
            Comparator::Ge => "ge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AstValue {
    Str(String),
    Int(i64),
    Bool(bool),
    QName(QName),
    Comparator(Comparator),
}

impl fmt::Display for AstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstValue::Str(s) => write!(f, "{s:?}"),
            AstValue::Int(i) => write!(f, "{i}"),
            AstValue::Bool(b) => write!(f, "{b}"),
            AstValue::QName(q) => write!(f, "{q}"),
            AstValue::Comparator(c) => f.write_str(c.symbol()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: AstKind,
    pub value: Option<AstValue>,
    children: Vec<AstId>,
    parent: Option<AstId>,
    properties: BTreeMap<String, serde_json::Value>,
}

impl AstNode {
    fn new(kind: AstKind, value: Option<AstValue>) -> Self {
        Self {
            kind,
            value,
            children: Vec::new(),
            parent: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn children(&self) -> &[AstId] {
        &self.children
    }

    pub fn parent(&self) -> Option<AstId> {
        self.parent
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AstError {
    #[error("unknown AST node {0}")]
    UnknownNode(AstId),
    #[error("node {parent} has no child at index {index}")]
    ChildOutOfBounds { parent: AstId, index: usize },
    #[error("node {0} is already attached to a parent")]
    AlreadyAttached(AstId),
    #[error("node {0} has no parent")]
    Detached(AstId),
}

/// The AST arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a detached node.
    pub fn add_node(&mut self, kind: AstKind, value: Option<AstValue>) -> AstId {
        let id = AstId(self.nodes.len() as u32);
        self.nodes.push(AstNode::new(kind, value));
        id
    }

    pub fn get(&self, id: AstId) -> Option<&AstNode> {
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: AstId) -> Result<&mut AstNode, AstError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(AstError::UnknownNode(id))
    }

    fn require(&self, id: AstId) -> Result<&AstNode, AstError> {
        self.get(id).ok_or(AstError::UnknownNode(id))
    }

    pub fn kind(&self, id: AstId) -> Option<AstKind> {
        self.get(id).map(|n| n.kind)
    }

    pub fn value(&self, id: AstId) -> Option<&AstValue> {
        self.get(id)?.value.as_ref()
    }

    pub fn children(&self, id: AstId) -> &[AstId] {
        self.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn child(&self, id: AstId, index: usize) -> Option<AstId> {
        self.children(id).get(index).copied()
    }

    pub fn last_child(&self, id: AstId) -> Option<AstId> {
        self.children(id).last().copied()
    }

    pub fn child_count(&self, id: AstId) -> usize {
        self.children(id).len()
    }

    pub fn parent(&self, id: AstId) -> Option<AstId> {
        self.get(id)?.parent
    }

    /// Position of `id` among its parent's children.
    pub fn child_index(&self, id: AstId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// String form of a literal leaf (the label of a deref step, a database
    /// name argument, ...).
    pub fn string_value(&self, id: AstId) -> Option<&str> {
        match self.value(id)? {
            AstValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn int_value(&self, id: AstId) -> Option<i64> {
        match self.value(id)? {
            AstValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn qname_value(&self, id: AstId) -> Option<&QName> {
        match self.value(id)? {
            AstValue::QName(q) => Some(q),
            _ => None,
        }
    }

    /// Iterate over the strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: AstId) -> Ancestors<'_> {
        Ancestors {
            ast: self,
            next: self.parent(id),
        }
    }

    /// `true` when walking parents from `id` reaches `root` (or `id == root`).
    pub fn is_reachable_from(&self, root: AstId, id: AstId) -> bool {
        id == root || self.ancestors(id).any(|a| a == root)
    }

    pub fn add_child(&mut self, parent: AstId, child: AstId) -> Result<(), AstError> {
        self.require(parent)?;
        let node = self.get_mut(child)?;
        if node.parent.is_some() {
            return Err(AstError::AlreadyAttached(child));
        }
        node.parent = Some(parent);
        self.get_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Replace the child at `index` of `parent` with the detached node
    /// `replacement`. The previous child is detached and returned.
    pub fn replace_child(
        &mut self,
        parent: AstId,
        index: usize,
        replacement: AstId,
    ) -> Result<AstId, AstError> {
        if self.require(replacement)?.parent.is_some() {
            return Err(AstError::AlreadyAttached(replacement));
        }
        let old = self
            .child(parent, index)
            .ok_or(AstError::ChildOutOfBounds { parent, index })?;
        self.get_mut(parent)?.children[index] = replacement;
        self.get_mut(replacement)?.parent = Some(parent);
        self.get_mut(old)?.parent = None;
        Ok(old)
    }

    /// Replace `node` in its parent with `replacement`.
    pub fn replace(&mut self, node: AstId, replacement: AstId) -> Result<AstId, AstError> {
        let parent = self.parent(node).ok_or(AstError::Detached(node))?;
        let index = self
            .child_index(node)
            .ok_or(AstError::Detached(node))?;
        self.replace_child(parent, index, replacement)
    }

    /// Deep copy of the subtree under `id`. The copy is detached.
    pub fn copy_tree(&mut self, id: AstId) -> Result<AstId, AstError> {
        let source = self.require(id)?.clone();
        let copy = self.add_node(source.kind, source.value);
        self.get_mut(copy)?.properties = source.properties;
        for child in source.children {
            let child_copy = self.copy_tree(child)?;
            self.add_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    pub fn set_property(
        &mut self,
        id: AstId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), AstError> {
        self.get_mut(id)?.properties.insert(key.into(), value);
        Ok(())
    }

    pub fn property(&self, id: AstId, key: &str) -> Option<&serde_json::Value> {
        self.get(id)?.property(key)
    }

    /// Pre-order traversal of the subtree under `root`.
    pub fn preorder(&self, root: AstId) -> Vec<AstId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.get(id).is_none() {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Compact s-expression rendering, handy for logs and assertions.
    pub fn to_sexpr(&self, id: AstId) -> String {
        let mut out = String::new();
        self.write_sexpr(id, &mut out);
        out
    }

    fn write_sexpr(&self, id: AstId, out: &mut String) {
        let Some(node) = self.get(id) else {
            out.push_str("<?>");
            return;
        };
        if node.kind.is_literal() {
            if let Some(value) = &node.value {
                out.push_str(&value.to_string());
            }
            return;
        }
        out.push('(');
        out.push_str(&format!("{:?}", node.kind));
        if let Some(value) = &node.value {
            out.push(' ');
            out.push_str(&value.to_string());
        }
        for child in &node.children {
            out.push(' ');
            self.write_sexpr(*child, out);
        }
        out.push(')');
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub fn str_literal(&mut self, value: impl Into<String>) -> AstId {
        self.add_node(AstKind::StrLiteral, Some(AstValue::Str(value.into())))
    }

    pub fn int_literal(&mut self, value: i64) -> AstId {
        self.add_node(AstKind::IntLiteral, Some(AstValue::Int(value)))
    }

    pub fn bool_literal(&mut self, value: bool) -> AstId {
        self.add_node(AstKind::BoolLiteral, Some(AstValue::Bool(value)))
    }

    pub fn context_item(&mut self) -> AstId {
        self.add_node(AstKind::ContextItemExpr, None)
    }

    pub fn empty_sequence(&mut self) -> AstId {
        self.add_node(AstKind::SequenceExpr, None)
    }

    /// Wrap `body` in a fresh [`AstKind::Query`] root.
    pub fn query(&mut self, body: AstId) -> Result<AstId, AstError> {
        let root = self.add_node(AstKind::Query, None);
        self.add_child(root, body)?;
        Ok(root)
    }

    pub fn function_call(&mut self, name: QName, args: Vec<AstId>) -> Result<AstId, AstError> {
        let call = self.add_node(AstKind::FunctionCall, Some(AstValue::QName(name)));
        for arg in args {
            self.add_child(call, arg)?;
        }
        Ok(call)
    }

    /// `jn:doc(database, resource[, revision])`.
    pub fn doc_call(
        &mut self,
        database: &str,
        resource: &str,
        revision: Option<i64>,
    ) -> Result<AstId, AstError> {
        let mut args = vec![self.str_literal(database), self.str_literal(resource)];
        if let Some(revision) = revision {
            args.push(self.int_literal(revision));
        }
        self.function_call(QName::json_function("doc"), args)
    }

    pub fn deref(&mut self, target: AstId, label: &str) -> Result<AstId, AstError> {
        let deref = self.add_node(AstKind::DerefExpr, None);
        let label = self.str_literal(label);
        self.add_child(deref, target)?;
        self.add_child(deref, label)?;
        Ok(deref)
    }

    pub fn array_access(&mut self, target: AstId, index: i64) -> Result<AstId, AstError> {
        let access = self.add_node(AstKind::ArrayAccess, None);
        let index = self.int_literal(index);
        self.add_child(access, target)?;
        self.add_child(access, index)?;
        Ok(access)
    }

    pub fn filter(&mut self, target: AstId, predicate: AstId) -> Result<AstId, AstError> {
        let filter = self.add_node(AstKind::FilterExpr, None);
        self.add_child(filter, target)?;
        self.add_child(filter, predicate)?;
        Ok(filter)
    }

    pub fn comparison(
        &mut self,
        op: Comparator,
        lhs: AstId,
        rhs: AstId,
    ) -> Result<AstId, AstError> {
        let cmp = self.add_node(AstKind::ComparisonExpr, Some(AstValue::Comparator(op)));
        self.add_child(cmp, lhs)?;
        self.add_child(cmp, rhs)?;
        Ok(cmp)
    }
}

pub struct Ancestors<'a> {
    ast: &'a Ast,
    next: Option<AstId>,
}

impl Iterator for Ancestors<'_> {
    type Item = AstId;

    fn next(&mut self) -> Option<AstId> {
        let current = self.next?;
        self.next = self.ast.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_a_b(ast: &mut Ast) -> (AstId, AstId, AstId) {
        let doc = ast.doc_call("db1", "r1", None).unwrap();
        let a = ast.deref(doc, "a").unwrap();
        let b = ast.deref(a, "b").unwrap();
        let root = ast.query(b).unwrap();
        (root, a, b)
    }

    #[test]
    fn replace_child_detaches_previous_node() {
        let mut ast = Ast::new();
        let (root, _a, b) = doc_a_b(&mut ast);

        let empty = ast.empty_sequence();
        let old = ast.replace(b, empty).unwrap();

        assert_eq!(old, b);
        assert_eq!(ast.parent(b), None);
        assert_eq!(ast.child(root, 0), Some(empty));
        assert_eq!(ast.parent(empty), Some(root));
    }

    #[test]
    fn replace_rejects_attached_replacement() {
        let mut ast = Ast::new();
        let (_root, a, b) = doc_a_b(&mut ast);
        assert_eq!(ast.replace(b, a), Err(AstError::AlreadyAttached(a)));
    }

    #[test]
    fn copy_tree_is_deep_and_detached() {
        let mut ast = Ast::new();
        let (_root, _a, b) = doc_a_b(&mut ast);
        ast.set_property(b, "k", serde_json::json!(1)).unwrap();

        let copy = ast.copy_tree(b).unwrap();
        assert_ne!(copy, b);
        assert_eq!(ast.parent(copy), None);
        assert_eq!(ast.to_sexpr(copy), ast.to_sexpr(b));
        assert_eq!(ast.property(copy, "k"), Some(&serde_json::json!(1)));

        let inner = ast.child(copy, 0).unwrap();
        assert_ne!(Some(inner), ast.child(b, 0));
    }

    #[test]
    fn ancestors_walk_to_root() {
        let mut ast = Ast::new();
        let (root, a, b) = doc_a_b(&mut ast);
        let doc = ast.child(a, 0).unwrap();
        let chain: Vec<AstId> = ast.ancestors(doc).collect();
        assert_eq!(chain, vec![a, b, root]);
        assert!(ast.is_reachable_from(root, doc));
    }

    #[test]
    fn sexpr_rendering() {
        let mut ast = Ast::new();
        let (root, _, _) = doc_a_b(&mut ast);
        assert_eq!(
            ast.to_sexpr(root),
            r#"(Query (DerefExpr (DerefExpr (FunctionCall jn:doc "db1" "r1") "a") "b"))"#
        );
    }
}
