use super::{IndexRewriteStrategy, IndexScanSpec, MaterializeRequest};
use crate::error::RewriteError;
use crate::reconstruct::{self, PathSegments};
use arbor_dsl::{Ast, AstId, AstKind, AstValue, Comparator};
use arbor_pathdb::{ContentType, IndexController, IndexDef, IndexType, Path};
use serde::{Deserialize, Serialize};

/// The literal side of a filter comparison, carried into the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonBound {
    pub op: Comparator,
    pub value: AstValue,
}

/// Rewrites a filtered navigation (`doc(..).a[? $$.b = 1]`) onto a
/// content-and-structure index.
#[derive(Debug, Clone, PartialEq)]
pub struct CasIndexStrategy {
    bound: ComparisonBound,
    content_type: ContentType,
}

impl CasIndexStrategy {
    /// Build the strategy for a comparison `$$.path op literal`.
    pub fn for_comparison(ast: &Ast, comparison: AstId) -> Option<Self> {
        if ast.kind(comparison) != Some(AstKind::ComparisonExpr) {
            return None;
        }
        let op = match ast.value(comparison)? {
            AstValue::Comparator(op) => *op,
            _ => return None,
        };

        let lhs = ast.child(comparison, 0)?;
        let mut scratch = PathSegments::new();
        reconstruct::predicate_path_step(ast, lhs, &mut scratch)?;

        let rhs = ast.child(comparison, 1)?;
        if !ast.kind(rhs)?.is_literal() {
            return None;
        }
        let value = ast.value(rhs)?.clone();
        let content_type = ContentType::of_literal(&value)?;

        Some(Self {
            bound: ComparisonBound { op, value },
            content_type,
        })
    }

    pub fn bound(&self) -> &ComparisonBound {
        &self.bound
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }
}

impl IndexRewriteStrategy for CasIndexStrategy {
    fn index_type(&self) -> IndexType {
        IndexType::Cas
    }

    fn find_index(&self, path: &Path, controller: &IndexController) -> Option<IndexDef> {
        controller.find_cas_index(path, self.content_type).cloned()
    }

    fn materialize(
        &self,
        ast: &mut Ast,
        request: &MaterializeRequest<'_>,
    ) -> Result<AstId, RewriteError> {
        let mut spec = IndexScanSpec::from_request(IndexType::Cas, request);
        spec.comparison = Some(self.bound.clone());
        spec.materialize(ast, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_dsl::parse_query;

    fn comparison(text: &str) -> (Ast, AstId) {
        let mut ast = Ast::new();
        let root = parse_query(&mut ast, text).unwrap();
        let filter = ast.child(root, 0).unwrap();
        let cmp = ast.child(filter, 1).unwrap();
        (ast, cmp)
    }

    #[test]
    fn context_rooted_comparison_with_literal() {
        let (ast, cmp) = comparison(r#"jn:doc("db","r").a[? $$.b.c >= 10]"#);
        let strategy = CasIndexStrategy::for_comparison(&ast, cmp).unwrap();
        assert_eq!(strategy.content_type(), ContentType::Number);
        assert_eq!(
            strategy.bound(),
            &ComparisonBound {
                op: Comparator::Ge,
                value: AstValue::Int(10),
            }
        );
    }

    #[test]
    fn string_literal_selects_string_content() {
        let (ast, cmp) = comparison(r#"jn:doc("db","r").a[? $$.name eq "x"]"#);
        let strategy = CasIndexStrategy::for_comparison(&ast, cmp).unwrap();
        assert_eq!(strategy.content_type(), ContentType::String);
    }

    #[test]
    fn non_literal_side_is_refused() {
        let (ast, cmp) = comparison(r#"jn:doc("db","r").a[? $$.b = $$.c]"#);
        assert!(CasIndexStrategy::for_comparison(&ast, cmp).is_none());
    }

    #[test]
    fn bound_is_carried_into_the_scan() {
        let (mut ast, cmp) = comparison(r#"jn:doc("db","r").a[? $$.b = 1]"#);
        let strategy = CasIndexStrategy::for_comparison(&ast, cmp).unwrap();
        let def = IndexDef::cas(1, [Path::parse("/a/b").unwrap()], ContentType::Number);
        let paths = std::collections::BTreeMap::from([(def, vec![Path::parse("/a/b").unwrap()])]);
        let levels = Default::default();
        let arrays = Default::default();
        let target = crate::root::DocumentTarget {
            database: "db".into(),
            resource: "r".into(),
            revision: None,
        };
        let fragment = ast.empty_sequence();
        let request = MaterializeRequest {
            fragment,
            target: &target,
            paths_by_index: &paths,
            predicate_levels: &levels,
            array_indexes: &arrays,
        };

        let node = strategy.materialize(&mut ast, &request).unwrap();
        let spec = IndexScanSpec::read(&ast, node).unwrap();
        assert_eq!(spec.index_type, IndexType::Cas);
        assert_eq!(spec.comparison, Some(strategy.bound().clone()));
        assert_eq!(
            ast.property(node, IndexScanSpec::REPLACES_PROPERTY),
            Some(&serde_json::Value::from(ast.to_sexpr(fragment)))
        );
    }
}
