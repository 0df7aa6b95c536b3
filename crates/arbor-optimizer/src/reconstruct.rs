//! Logical path reconstruction from navigation ASTs.
//!
//! A navigation chain is nested leaf-outward: `doc(..).a[1].b` is
//! `Deref(ArrayAccess(Deref(Call, "a"), 1), "b")`. Peeling it from the outer
//! node inward yields the labels leaf first (`b`, `a`) and ends at the chain's
//! root (the document call, or `$$` inside a predicate).

use arbor_dsl::{Ast, AstId, AstKind};
use std::collections::{BTreeMap, VecDeque};

/// Labels and array positions collected while peeling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSegments {
    /// Leaf first. Predicate labels (if any) come before the main path's.
    pub labels: VecDeque<String>,
    /// Literal array positions per label, outermost access first.
    pub array_indexes: BTreeMap<String, Vec<i64>>,
}

impl PathSegments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn push_label(&mut self, label: impl Into<String>) {
        self.labels.push_back(label.into());
    }

    pub fn record_index(&mut self, label: &str, index: i64) {
        self.array_indexes
            .entry(label.to_string())
            .or_default()
            .push(index);
    }

    pub fn pop_leading(&mut self) -> Option<String> {
        self.labels.pop_front()
    }
}

/// `true` if some ancestor of `node` is a dereference; such a node is part
/// of a larger chain and not a rewrite root.
pub fn find_deref_ancestor(ast: &Ast, node: AstId) -> bool {
    ast.ancestors(node)
        .any(|ancestor| ast.kind(ancestor) == Some(AstKind::DerefExpr))
}

/// The label carried by a dereference (its last child).
pub fn deref_label(ast: &Ast, deref: AstId) -> Option<&str> {
    if ast.kind(deref) != Some(AstKind::DerefExpr) {
        return None;
    }
    ast.string_value(ast.last_child(deref)?)
}

/// Peel the chain below `node`, pushing labels and recording array
/// positions, until a node of kind `root` is reached.
///
/// The label of `node` itself must already be in `segments`. Returns the
/// root, or `None` if the chain contains anything else.
pub fn path_step(
    ast: &Ast,
    node: AstId,
    root: AstKind,
    segments: &mut PathSegments,
) -> Option<AstId> {
    for &step in ast.children(node) {
        match ast.kind(step)? {
            AstKind::ArrayAccess if ast.child_count(step) == 2 => {
                let innermost = collapse_array_access(ast, step, segments)?;
                let deref = ast.child(innermost, 0)?;
                let label = deref_label(ast, deref)?;
                let index = ast.int_value(ast.child(innermost, 1)?)?;
                segments.push_label(label);
                segments.record_index(label, index);
                return path_step(ast, deref, root, segments);
            }
            AstKind::DerefExpr => {
                segments.push_label(deref_label(ast, step)?);
                return path_step(ast, step, root, segments);
            }
            kind if kind == root => return Some(step),
            _ => {}
        }
    }
    None
}

/// Collapse a run of nested array accesses (`a[1][2]`).
///
/// Every access above the innermost one has its position recorded under the
/// label of the dereference the run is applied to, outermost first. Returns
/// the innermost access.
pub fn collapse_array_access(
    ast: &Ast,
    access: AstId,
    segments: &mut PathSegments,
) -> Option<AstId> {
    let mut outer = Vec::new();
    let mut current = access;
    loop {
        let target = ast.child(current, 0)?;
        if ast.kind(target) != Some(AstKind::ArrayAccess) {
            break;
        }
        outer.push(ast.int_value(ast.child(current, 1)?)?);
        current = target;
    }

    if !outer.is_empty() {
        let label = deref_label(ast, ast.child(current, 0)?)?;
        for index in outer {
            segments.record_index(label, index);
        }
    }
    Some(current)
}

/// Peel a predicate chain (`$$.c[0].d`) down to its context item.
///
/// Pushes the predicate's own label first, then the labels below it.
pub fn predicate_path_step(
    ast: &Ast,
    predicate: AstId,
    segments: &mut PathSegments,
) -> Option<AstId> {
    segments.push_label(deref_label(ast, predicate)?);
    path_step(ast, predicate, AstKind::ContextItemExpr, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_dsl::parse_query;

    fn body(ast: &mut Ast, text: &str) -> AstId {
        let root = parse_query(ast, text).unwrap();
        ast.child(root, 0).unwrap()
    }

    fn peel(text: &str) -> (Option<AstKind>, PathSegments) {
        let mut ast = Ast::new();
        let node = body(&mut ast, text);
        let mut segments = PathSegments::new();
        segments.push_label(deref_label(&ast, node).unwrap());
        let root = path_step(&ast, node, AstKind::FunctionCall, &mut segments);
        (root.and_then(|r| ast.kind(r)), segments)
    }

    #[test]
    fn labels_are_leaf_first() {
        let (root, segments) = peel(r#"jn:doc("db","r").a.b.c"#);
        assert_eq!(root, Some(AstKind::FunctionCall));
        assert_eq!(segments.labels, ["c", "b", "a"]);
        assert!(segments.array_indexes.is_empty());
    }

    #[test]
    fn array_positions_follow_their_label() {
        let (_, segments) = peel(r#"jn:doc("db","r").a[1].b[2].c"#);
        assert_eq!(segments.labels, ["c", "b", "a"]);
        assert_eq!(segments.array_indexes["a"], vec![1]);
        assert_eq!(segments.array_indexes["b"], vec![2]);
    }

    #[test]
    fn nested_accesses_record_outer_index_first() {
        let (_, segments) = peel(r#"jn:doc("db","r").a[1][2].b"#);
        assert_eq!(segments.labels, ["b", "a"]);
        assert_eq!(segments.array_indexes["a"], vec![2, 1]);
    }

    #[test]
    fn access_on_the_document_itself_is_not_a_path() {
        let (root, _) = peel(r#"jn:doc("db","r")[0].a"#);
        assert_eq!(root, None);
    }

    #[test]
    fn ancestor_guard_sees_enclosing_derefs() {
        let mut ast = Ast::new();
        let outer = body(&mut ast, r#"jn:doc("db","r").a.b"#);
        let inner = ast.child(outer, 0).unwrap();
        assert!(!find_deref_ancestor(&ast, outer));
        assert!(find_deref_ancestor(&ast, inner));
    }

    #[test]
    fn predicate_chain_ends_at_context_item() {
        let mut ast = Ast::new();
        let filter = body(&mut ast, r#"jn:doc("db","r").a[? $$.c[0].d = 1]"#);
        let cmp = ast.child(filter, 1).unwrap();
        let lhs = ast.child(cmp, 0).unwrap();

        let mut segments = PathSegments::new();
        let root = predicate_path_step(&ast, lhs, &mut segments).unwrap();
        assert_eq!(ast.kind(root), Some(AstKind::ContextItemExpr));
        assert_eq!(segments.labels, ["d", "c"]);
        assert_eq!(segments.array_indexes["c"], vec![0]);
    }
}
