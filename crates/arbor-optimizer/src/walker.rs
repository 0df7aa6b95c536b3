//! Whole-query driver: finds rewrite roots and tries strategies on each.

use crate::config::{OptimizerConfig, StrategyKind};
use crate::engine::{self, PathRewriteEngine, RewriteOutcome};
use crate::error::RewriteError;
use crate::strategy::{CasIndexStrategy, IndexRewriteStrategy, NameIndexStrategy, PathIndexStrategy};
use arbor_dsl::{Ast, AstId, AstKind};
use arbor_storage::DocumentStore;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    /// Strategy attempts made, successful or not.
    pub attempts: usize,
    pub index_rewrites: usize,
    pub empty_rewrites: usize,
}

impl OptimizeReport {
    fn record(&mut self, outcome: RewriteOutcome) {
        match outcome {
            RewriteOutcome::Unchanged => {}
            RewriteOutcome::EmptyResult(_) => self.empty_rewrites += 1,
            RewriteOutcome::IndexScan(_) => self.index_rewrites += 1,
        }
    }

    pub fn rewrites(&self) -> usize {
        self.index_rewrites + self.empty_rewrites
    }
}

pub struct QueryOptimizer<'s> {
    engine: PathRewriteEngine<'s>,
}

impl<'s> QueryOptimizer<'s> {
    pub fn new(store: &'s dyn DocumentStore, config: &'s OptimizerConfig) -> Self {
        Self {
            engine: PathRewriteEngine::new(store, config),
        }
    }

    /// Rewrite every navigation fragment under `root` that an index (or the
    /// path summary alone) can answer.
    ///
    /// Roots are collected up front in pre-order; a root detached by an
    /// earlier rewrite is skipped.
    pub fn optimize(&self, ast: &mut Ast, root: AstId) -> Result<OptimizeReport, RewriteError> {
        let roots: Vec<AstId> = ast
            .preorder(root)
            .into_iter()
            .filter(|&id| engine::is_rewrite_root(ast, id))
            .collect();

        let mut report = OptimizeReport::default();
        for node in roots {
            if !ast.is_reachable_from(root, node) {
                continue;
            }
            let outcome = self.rewrite_root(ast, node, &mut report)?;
            report.record(outcome);
        }
        tracing::debug!(
            attempts = report.attempts,
            index_rewrites = report.index_rewrites,
            empty_rewrites = report.empty_rewrites,
            "optimized query"
        );
        Ok(report)
    }

    fn rewrite_root(
        &self,
        ast: &mut Ast,
        node: AstId,
        report: &mut OptimizeReport,
    ) -> Result<RewriteOutcome, RewriteError> {
        let config = self.engine.config();

        if config.is_enabled(StrategyKind::Cas) {
            if let Some((predicate, strategy)) = filter_comparison(ast, node) {
                report.attempts += 1;
                let outcome = self.engine.attempt(ast, node, Some(predicate), &strategy)?;
                if outcome.is_rewritten() {
                    return Ok(outcome);
                }
            }
        }

        for kind in &config.strategies {
            let strategy: &dyn IndexRewriteStrategy = match kind {
                StrategyKind::Cas => continue,
                StrategyKind::Path => &PathIndexStrategy,
                StrategyKind::Name => &NameIndexStrategy,
            };
            report.attempts += 1;
            let outcome = self.engine.attempt(ast, node, None, strategy)?;
            if outcome.is_rewritten() {
                return Ok(outcome);
            }
        }
        Ok(RewriteOutcome::Unchanged)
    }
}

/// If `node` is the target of `[? $$.path op literal]`, the predicate path
/// and the CAS strategy for it.
fn filter_comparison(ast: &Ast, node: AstId) -> Option<(AstId, CasIndexStrategy)> {
    let filter = ast.parent(node)?;
    if ast.kind(filter) != Some(AstKind::FilterExpr) || ast.child_index(node) != Some(0) {
        return None;
    }
    let comparison = ast.child(filter, 1)?;
    let strategy = CasIndexStrategy::for_comparison(ast, comparison)?;
    Some((ast.child(comparison, 0)?, strategy))
}
