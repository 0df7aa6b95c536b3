//! Index rewriting for Arbor navigation queries.
//!
//! Before a query runs, navigation fragments such as
//! `jn:doc("db", "res").a[1].b` are checked against the resource's path
//! summary:
//!
//! - if no stored path can match, the fragment becomes the empty sequence
//! - if every matching path is covered by an index of the strategy's kind,
//!   the fragment becomes an `IndexExpr` scanning those indexes
//! - otherwise the fragment is left alone
//!
//! [`QueryOptimizer`] drives a whole query; [`PathRewriteEngine`] performs
//! one attempt with one [`IndexRewriteStrategy`].

pub mod config;
pub mod engine;
pub mod error;
pub mod reconstruct;
pub mod root;
pub mod strategy;
pub mod validate;
pub mod walker;

pub use config::{OptimizerConfig, StrategyKind};
pub use engine::{PathRewriteEngine, RewriteOutcome, RewriteScope};
pub use error::RewriteError;
pub use reconstruct::PathSegments;
pub use root::DocumentTarget;
pub use strategy::{
    CasIndexStrategy, ComparisonBound, IndexBinding, IndexRewriteStrategy, IndexScanSpec,
    MaterializeRequest, NameIndexStrategy, PathIndexStrategy, RevisionSelector,
};
pub use walker::{OptimizeReport, QueryOptimizer};
