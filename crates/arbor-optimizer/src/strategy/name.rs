use super::{IndexRewriteStrategy, IndexScanSpec, MaterializeRequest};
use crate::error::RewriteError;
use arbor_dsl::{Ast, AstId};
use arbor_pathdb::{IndexController, IndexDef, IndexType, Path};

/// Rewrites navigation onto name indexes, keyed by the terminal object-key
/// name of each resolved path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameIndexStrategy;

impl IndexRewriteStrategy for NameIndexStrategy {
    fn index_type(&self) -> IndexType {
        IndexType::Name
    }

    fn find_index(&self, path: &Path, controller: &IndexController) -> Option<IndexDef> {
        let name = path.leaf()?.label.as_ref()?;
        controller.find_name_index(name).cloned()
    }

    fn materialize(
        &self,
        ast: &mut Ast,
        request: &MaterializeRequest<'_>,
    ) -> Result<AstId, RewriteError> {
        IndexScanSpec::from_request(IndexType::Name, request).materialize(ast, request)
    }
}
