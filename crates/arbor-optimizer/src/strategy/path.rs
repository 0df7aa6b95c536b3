use super::{IndexRewriteStrategy, IndexScanSpec, MaterializeRequest};
use crate::error::RewriteError;
use arbor_dsl::{Ast, AstId};
use arbor_pathdb::{IndexController, IndexDef, IndexType, Path};

/// Rewrites navigation onto path indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathIndexStrategy;

impl IndexRewriteStrategy for PathIndexStrategy {
    fn index_type(&self) -> IndexType {
        IndexType::Path
    }

    fn find_index(&self, path: &Path, controller: &IndexController) -> Option<IndexDef> {
        controller.find_path_index(path).cloned()
    }

    fn materialize(
        &self,
        ast: &mut Ast,
        request: &MaterializeRequest<'_>,
    ) -> Result<AstId, RewriteError> {
        IndexScanSpec::from_request(IndexType::Path, request).materialize(ast, request)
    }
}
