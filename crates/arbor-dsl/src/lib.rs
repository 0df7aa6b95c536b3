//! Arbor query DSL surface.
//!
//! This crate owns the pieces of the query compiler the optimizer needs to
//! see: qualified names, a mutable arena-backed AST, and a small reader for
//! path-navigation fragments (`jn:doc("db", "res").a[1].b`).
//!
//! The full query language is parsed elsewhere; the reader here exists so
//! tooling and tests can produce the same AST shapes the compiler emits.

pub mod ast;
pub mod parser;
pub mod qname;

pub use ast::{Ast, AstError, AstId, AstKind, AstNode, AstValue, Comparator};
pub use parser::{parse_query, ParseError};
pub use qname::{QName, JSON_NSURI, JSON_PREFIX};
