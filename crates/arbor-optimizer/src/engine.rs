//! The shared rewrite algorithm.
//!
//! One [`PathRewriteEngine::attempt`] moves through
//! extract path → resolve root → match candidates → validate → resolve
//! indexes → materialize, and ends in one of the three
//! [`RewriteOutcome`]s. The AST is only mutated after every storage lookup
//! of the attempt has succeeded.

use crate::config::OptimizerConfig;
use crate::error::RewriteError;
use crate::reconstruct::{self, PathSegments};
use crate::root::DocumentTarget;
use crate::strategy::{IndexRewriteStrategy, MaterializeRequest};
use crate::validate;
use arbor_dsl::{Ast, AstId, AstKind, QName};
use arbor_pathdb::{IndexDef, NodeKind, Path};
use arbor_storage::{
    Collection, DocumentStore, NodeReadOnlyTrx, PathSummaryHandle, ResourceManager,
    RevisionNumber,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Nothing was changed.
    Unchanged,
    /// The fragment was replaced by the empty sequence node carried here.
    EmptyResult(AstId),
    /// The fragment was replaced by the index scan node carried here.
    IndexScan(AstId),
}

impl RewriteOutcome {
    pub fn is_rewritten(self) -> bool {
        !matches!(self, RewriteOutcome::Unchanged)
    }

    pub fn replacement(self) -> Option<AstId> {
        match self {
            RewriteOutcome::Unchanged => None,
            RewriteOutcome::EmptyResult(id) | RewriteOutcome::IndexScan(id) => Some(id),
        }
    }
}

// ============================================================================
// Scoped handles
// ============================================================================

/// The read-only handles one attempt holds.
///
/// Fields drop in declaration order, so handles are released in reverse
/// order of acquisition.
pub struct RewriteScope {
    summary: PathSummaryHandle,
    trx: Box<dyn NodeReadOnlyTrx>,
    manager: Box<dyn ResourceManager>,
    collection: Box<dyn Collection>,
}

impl RewriteScope {
    /// Open collection, resource manager, transaction and path summary for
    /// `target`. Anything opened before a failure is released on return.
    ///
    /// The summary is pinned to the revision the transaction resolved, so a
    /// commit landing in between cannot split the scope across revisions.
    pub fn open(store: &dyn DocumentStore, target: &DocumentTarget) -> Result<Self, RewriteError> {
        let collection = store.lookup(&target.database)?;
        let manager = collection.open_resource_manager(&target.resource)?;
        let trx = manager.begin_node_read_only_trx(target.revision)?;
        let revision = trx.revision_number();
        let summary = manager.open_path_summary(Some(revision))?;
        tracing::trace!(
            database = %target.database,
            resource = %target.resource,
            revision,
            "opened rewrite scope"
        );
        Ok(Self {
            summary,
            trx,
            manager,
            collection,
        })
    }

    pub fn collection(&self) -> &dyn Collection {
        self.collection.as_ref()
    }

    pub fn manager(&self) -> &dyn ResourceManager {
        self.manager.as_ref()
    }

    pub fn trx(&self) -> &dyn NodeReadOnlyTrx {
        self.trx.as_ref()
    }

    /// The revision every handle of this scope reads.
    pub fn revision(&self) -> RevisionNumber {
        self.trx.revision_number()
    }

    pub fn summary(&mut self) -> &mut PathSummaryHandle {
        &mut self.summary
    }
}

impl Drop for RewriteScope {
    fn drop(&mut self) {
        tracing::trace!(
            database = self.collection.name(),
            resource = self.manager.resource_name(),
            "closing rewrite scope"
        );
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct PathRewriteEngine<'s> {
    store: &'s dyn DocumentStore,
    config: &'s OptimizerConfig,
}

impl<'s> PathRewriteEngine<'s> {
    pub fn new(store: &'s dyn DocumentStore, config: &'s OptimizerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        self.config
    }

    /// Try to rewrite the navigation fragment `node` with `strategy`.
    ///
    /// `predicate` is the path side of a filter predicate applied to the
    /// fragment, if the strategy works on filtered navigation.
    pub fn attempt(
        &self,
        ast: &mut Ast,
        node: AstId,
        predicate: Option<AstId>,
        strategy: &dyn IndexRewriteStrategy,
    ) -> Result<RewriteOutcome, RewriteError> {
        let index_type = strategy.index_type();
        if !is_rewrite_root(ast, node) {
            return Ok(RewriteOutcome::Unchanged);
        }

        let mut segments = PathSegments::new();
        let mut predicate_labels = Vec::new();
        if let Some(predicate) = predicate {
            if strategy
                .predicate_path_step(ast, predicate, &mut segments)
                .is_none()
            {
                tracing::debug!(%index_type, "predicate is not a context-rooted path");
                return Ok(RewriteOutcome::Unchanged);
            }
            predicate_labels.extend(segments.labels.iter().cloned());
        }

        let Some(label) = reconstruct::deref_label(ast, node) else {
            return Ok(RewriteOutcome::Unchanged);
        };
        segments.push_label(label);
        let root = reconstruct::path_step(ast, node, AstKind::FunctionCall, &mut segments);
        let Some(call) = root.filter(|_| segments.len() > 1) else {
            tracing::debug!(%index_type, labels = segments.len(), "no rewritable path");
            return Ok(RewriteOutcome::Unchanged);
        };
        let Some(target) = DocumentTarget::resolve(ast, call, self.config) else {
            tracing::debug!(%index_type, "navigation does not start at a stored document");
            return Ok(RewriteOutcome::Unchanged);
        };

        let mut scope = RewriteScope::open(self.store, &target)?;

        let descendants = scope.trx().descendant_count();
        if descendants < self.config.min_descendant_count {
            tracing::debug!(
                descendants,
                minimum = self.config.min_descendant_count,
                "document too small to rewrite"
            );
            return Ok(RewriteOutcome::Unchanged);
        }

        let Some(leading) = segments.pop_leading() else {
            return Ok(RewriteOutcome::Unchanged);
        };
        let expected: Vec<String> = segments.labels.iter().cloned().collect();
        let summary = scope.summary();
        let candidates =
            summary.match_label(&QName::local(leading.as_str()), 0, NodeKind::ObjectKey);
        if candidates.is_empty() {
            tracing::debug!(label = %leading, "no path carries the leaf label");
            return splice_empty(ast, node);
        }

        let survivors = validate::retain_matching(&mut **summary, &candidates, &expected);
        tracing::debug!(
            label = %leading,
            candidates = candidates.len(),
            survivors = survivors.len(),
            "validated candidate paths"
        );
        if survivors.is_empty() {
            return splice_empty(ast, node);
        }

        let mut paths = Vec::with_capacity(survivors.len());
        for key in survivors {
            let path = summary
                .path_of(key)
                .ok_or(RewriteError::MissingPathNode(key))?;
            paths.push(path);
        }

        let revision = scope.revision();
        let controller = scope.manager().rtx_index_controller(revision)?;

        let mut paths_by_index: BTreeMap<IndexDef, Vec<Path>> = BTreeMap::new();
        let mut predicate_levels: BTreeMap<IndexDef, u32> = BTreeMap::new();
        for path in paths {
            let Some(def) = strategy.find_index(&path, &controller) else {
                tracing::warn!(
                    %index_type,
                    path = %path,
                    revision,
                    "path not covered by any index, keeping navigation"
                );
                return Ok(RewriteOutcome::Unchanged);
            };
            if predicate.is_some() {
                let level = strategy.predicate_level(&path, &predicate_labels);
                predicate_levels.insert(def.clone(), level);
            }
            paths_by_index.entry(def).or_default().push(path);
        }
        drop(scope);

        let request = MaterializeRequest {
            fragment: node,
            target: &target,
            paths_by_index: &paths_by_index,
            predicate_levels: &predicate_levels,
            array_indexes: &segments.array_indexes,
        };
        let replacement = strategy.materialize(ast, &request)?;
        ast.replace(node, replacement)?;
        tracing::debug!(
            %index_type,
            indexes = paths_by_index.len(),
            "rewrote navigation to index scan"
        );
        Ok(RewriteOutcome::IndexScan(replacement))
    }
}

/// An attached dereference that is not nested in a larger chain and
/// navigates from a dereference, array access or call.
pub(crate) fn is_rewrite_root(ast: &Ast, node: AstId) -> bool {
    if ast.kind(node) != Some(AstKind::DerefExpr)
        || ast.parent(node).is_none()
        || reconstruct::find_deref_ancestor(ast, node)
    {
        return false;
    }
    matches!(
        ast.child(node, 0).and_then(|target| ast.kind(target)),
        Some(AstKind::DerefExpr | AstKind::ArrayAccess | AstKind::FunctionCall)
    )
}

fn splice_empty(ast: &mut Ast, node: AstId) -> Result<RewriteOutcome, RewriteError> {
    let empty = ast.empty_sequence();
    ast.replace(node, empty)?;
    Ok(RewriteOutcome::EmptyResult(empty))
}
