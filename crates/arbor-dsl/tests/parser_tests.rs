use arbor_dsl::{parse_query, Ast, AstKind, Comparator, QName, AstValue};
use proptest::prelude::*;

#[test]
fn test_doc_navigation_shape() {
    let mut ast = Ast::new();
    let root = parse_query(&mut ast, r#"jn:doc("db1", "r1").a[1].b"#).unwrap();
    assert_eq!(
        ast.to_sexpr(root),
        r#"(Query (DerefExpr (ArrayAccess (DerefExpr (FunctionCall jn:doc "db1" "r1") "a") 1) "b"))"#
    );

    let doc = ast.preorder(root)
        .into_iter()
        .find(|id| ast.kind(*id) == Some(AstKind::FunctionCall))
        .unwrap();
    assert_eq!(ast.qname_value(doc), Some(&QName::json_function("doc")));
}

#[test]
fn test_revision_argument_and_quoted_label() {
    let mut ast = Ast::new();
    let root = parse_query(&mut ast, r#"jn:open('db', 'res', 3)."first name""#).unwrap();
    assert_eq!(
        ast.to_sexpr(root),
        r#"(Query (DerefExpr (FunctionCall jn:open "db" "res" 3) "first name"))"#
    );
}

#[test]
fn test_filter_with_comparison() {
    let mut ast = Ast::new();
    let root = parse_query(&mut ast, r#"jn:doc("db","r").a.b[? $$.c >= 10]"#).unwrap();
    let filter = ast.child(root, 0).unwrap();
    assert_eq!(ast.kind(filter), Some(AstKind::FilterExpr));

    let cmp = ast.child(filter, 1).unwrap();
    assert_eq!(ast.kind(cmp), Some(AstKind::ComparisonExpr));
    assert_eq!(ast.value(cmp), Some(&AstValue::Comparator(Comparator::Ge)));

    let lhs = ast.child(cmp, 0).unwrap();
    assert_eq!(ast.kind(ast.child(lhs, 0).unwrap()), Some(AstKind::ContextItemExpr));
    assert_eq!(ast.int_value(ast.child(cmp, 1).unwrap()), Some(10));
}

#[test]
fn test_unprefixed_function_has_no_namespace() {
    let mut ast = Ast::new();
    let root = parse_query(&mut ast, r#"doc("db","r").a"#).unwrap();
    let call = ast.child(ast.child(root, 0).unwrap(), 0).unwrap();
    assert_eq!(ast.qname_value(call).and_then(|q| q.namespace.clone()), None);
}

#[test]
fn test_syntax_errors_are_reported() {
    let mut ast = Ast::new();
    assert!(parse_query(&mut ast, r#"jn:doc("db","r")."#).is_err());
    assert!(parse_query(&mut ast, r#"jn:doc("db","r").a[x]"#).is_err());
    assert!(parse_query(&mut ast, "").is_err());
}

fn label() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,6}").unwrap()
}

proptest! {
    #[test]
    fn prop_chain_depth_matches_labels(
        steps in proptest::collection::vec((label(), proptest::option::of(0i64..100)), 1..8)
    ) {
        let mut text = String::from(r#"jn:doc("db","r")"#);
        for (label, index) in &steps {
            text.push('.');
            text.push_str(label);
            if let Some(index) = index {
                text.push_str(&format!("[{index}]"));
            }
        }

        let mut ast = Ast::new();
        let root = parse_query(&mut ast, &text).unwrap();
        let nodes = ast.preorder(root);
        let derefs = nodes.iter().filter(|id| ast.kind(**id) == Some(AstKind::DerefExpr)).count();
        let accesses = nodes.iter().filter(|id| ast.kind(**id) == Some(AstKind::ArrayAccess)).count();

        prop_assert_eq!(derefs, steps.len());
        prop_assert_eq!(accesses, steps.iter().filter(|(_, i)| i.is_some()).count());
    }
}
