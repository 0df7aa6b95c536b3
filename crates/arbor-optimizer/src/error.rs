use arbor_dsl::AstError;
use arbor_pathdb::PathNodeKey;
use arbor_storage::StorageError;
use thiserror::Error;

/// Failures that abort query compilation.
///
/// "No rewrite" is not an error; see [`crate::RewriteOutcome`].
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Ast(#[from] AstError),
    #[error("path summary has no entry for key {0}")]
    MissingPathNode(PathNodeKey),
    #[error("failed to encode index scan: {0}")]
    Encode(#[from] serde_json::Error),
}
