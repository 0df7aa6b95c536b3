//! Index-kind specific rewrite hooks.
//!
//! [`crate::PathRewriteEngine`] owns the shared algorithm (path
//! reconstruction, candidate validation, all-or-nothing index resolution).
//! A strategy only decides:
//!
//! - how a predicate's path is peeled
//! - at which level a predicate applies on a resolved path
//! - which index covers a resolved path
//! - what the replacement node looks like

mod cas;
mod name;
mod path;

pub use cas::{CasIndexStrategy, ComparisonBound};
pub use name::NameIndexStrategy;
pub use path::PathIndexStrategy;

use crate::error::RewriteError;
use crate::reconstruct::{self, PathSegments};
use crate::root::DocumentTarget;
use crate::validate;
use arbor_dsl::{Ast, AstId, AstKind};
use arbor_pathdb::{IndexController, IndexDef, IndexType, Path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a strategy needs to build the replacement node.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeRequest<'a> {
    /// The navigation fragment being replaced.
    pub fragment: AstId,
    pub target: &'a DocumentTarget,
    pub paths_by_index: &'a BTreeMap<IndexDef, Vec<Path>>,
    /// Only filled when the rewrite carried a predicate.
    pub predicate_levels: &'a BTreeMap<IndexDef, u32>,
    pub array_indexes: &'a BTreeMap<String, Vec<i64>>,
}

pub trait IndexRewriteStrategy {
    fn index_type(&self) -> IndexType;

    /// Peel `predicate` into `segments`, returning the chain's root.
    fn predicate_path_step(
        &self,
        ast: &Ast,
        predicate: AstId,
        segments: &mut PathSegments,
    ) -> Option<AstId> {
        reconstruct::predicate_path_step(ast, predicate, segments)
    }

    fn predicate_level(&self, path: &Path, predicate_labels: &[String]) -> u32 {
        validate::predicate_level(path, predicate_labels)
    }

    fn find_index(&self, path: &Path, controller: &IndexController) -> Option<IndexDef>;

    /// Build a detached replacement node; the engine splices it in.
    fn materialize(
        &self,
        ast: &mut Ast,
        request: &MaterializeRequest<'_>,
    ) -> Result<AstId, RewriteError>;
}

// ============================================================================
// Index scan description
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "number")]
pub enum RevisionSelector {
    MostRecent,
    Fixed(u32),
}

impl From<Option<u32>> for RevisionSelector {
    fn from(value: Option<u32>) -> Self {
        value.map_or(RevisionSelector::MostRecent, RevisionSelector::Fixed)
    }
}

/// One index an [`IndexScanSpec`] reads, with the paths it was chosen for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBinding {
    pub index: IndexDef,
    pub paths: Vec<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate_level: Option<u32>,
}

/// What an `IndexExpr` node evaluates: stored as its `scan` property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexScanSpec {
    pub index_type: IndexType,
    pub database: String,
    pub resource: String,
    pub revision: RevisionSelector,
    pub indexes: Vec<IndexBinding>,
    #[serde(default)]
    pub array_indexes: BTreeMap<String, Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonBound>,
}

impl IndexScanSpec {
    pub const PROPERTY: &'static str = "scan";
    /// Rendering of the fragment the scan replaced, for diagnostics.
    pub const REPLACES_PROPERTY: &'static str = "replaces";

    pub fn from_request(index_type: IndexType, request: &MaterializeRequest<'_>) -> Self {
        let indexes = request
            .paths_by_index
            .iter()
            .map(|(index, paths)| IndexBinding {
                index: index.clone(),
                paths: paths.clone(),
                predicate_level: request.predicate_levels.get(index).copied(),
            })
            .collect();
        Self {
            index_type,
            database: request.target.database.clone(),
            resource: request.target.resource.clone(),
            revision: request.target.revision.into(),
            indexes,
            array_indexes: request.array_indexes.clone(),
            comparison: None,
        }
    }

    /// The scan an `IndexExpr` node carries, if `id` is one.
    pub fn read(ast: &Ast, id: AstId) -> Option<Self> {
        if ast.kind(id) != Some(AstKind::IndexExpr) {
            return None;
        }
        serde_json::from_value(ast.property(id, Self::PROPERTY)?.clone()).ok()
    }

    /// Allocate a detached `IndexExpr` node carrying this spec.
    pub fn into_node(self, ast: &mut Ast) -> Result<AstId, RewriteError> {
        let value = serde_json::to_value(&self)?;
        let node = ast.add_node(AstKind::IndexExpr, None);
        ast.set_property(node, Self::PROPERTY, value)?;
        Ok(node)
    }

    /// [`Self::into_node`], also recording what the node replaces.
    pub fn materialize(
        self,
        ast: &mut Ast,
        request: &MaterializeRequest<'_>,
    ) -> Result<AstId, RewriteError> {
        let replaces = ast.to_sexpr(request.fragment);
        let node = self.into_node(ast)?;
        ast.set_property(node, Self::REPLACES_PROPERTY, replaces.into())?;
        Ok(node)
    }

    pub fn index_ids(&self) -> Vec<u32> {
        self.indexes.iter().map(|b| b.index.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_spec_survives_the_property_map() {
        let target = DocumentTarget {
            database: "db".into(),
            resource: "r".into(),
            revision: Some(3),
        };
        let def = IndexDef::path(7, [Path::parse("/a/b").unwrap()]);
        let paths = BTreeMap::from([(def.clone(), vec![Path::parse("/a/b").unwrap()])]);
        let levels = BTreeMap::new();
        let arrays = BTreeMap::from([("a".to_string(), vec![1])]);
        let mut ast = Ast::new();
        let fragment = ast.empty_sequence();
        let request = MaterializeRequest {
            fragment,
            target: &target,
            paths_by_index: &paths,
            predicate_levels: &levels,
            array_indexes: &arrays,
        };

        let spec = IndexScanSpec::from_request(IndexType::Path, &request);
        let node = spec.clone().into_node(&mut ast).unwrap();
        let back = IndexScanSpec::read(&ast, node).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.revision, RevisionSelector::Fixed(3));
        assert_eq!(back.index_ids(), vec![7]);
        assert_eq!(back.indexes[0].predicate_level, None);
    }
}
