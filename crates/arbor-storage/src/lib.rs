//! Arbor Storage Layer
//!
//! The query optimizer never touches pages or revision files directly. It
//! sees a store through four scoped handles, opened in this order:
//!
//! ```text
//! DocumentStore ──lookup(db)──► Collection ──open_resource_manager(res)──► ResourceManager
//!                                                                              │
//!                              ┌───────────────────────────────────────────────┤
//!                              ▼                                               ▼
//!              begin_node_read_only_trx(rev)                      open_path_summary(rev)
//!                     NodeReadOnlyTrx                               PathSummaryReader
//! ```
//!
//! Every handle is released when dropped. Revisions are immutable once
//! committed, so any number of handles may read the same revision from any
//! number of threads.
//!
//! [`memory::MemoryStore`] is the in-process implementation used by tools
//! and tests.

pub mod memory;


use arbor_pathdb::{IndexController, IndexError, PathSummaryReader, TreeError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use memory::{MemoryStore, RevisionSnapshot};

pub type RevisionNumber = u32;

/// A boxed path-summary handle.
pub type PathSummaryHandle = Box<dyn PathSummaryReader + Send>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("unknown database `{0}`")]
    UnknownDatabase(String),
    #[error("unknown resource `{resource}` in database `{database}`")]
    UnknownResource { database: String, resource: String },
    #[error("resource `{resource}` has no revision {revision}")]
    UnknownRevision {
        resource: String,
        revision: RevisionNumber,
    },
    #[error("resource `{0}` has no committed revisions")]
    NoRevisions(String),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Document(#[from] TreeError),
}

// ============================================================================
// Handle contracts
// ============================================================================

pub trait DocumentStore: Send + Sync {
    /// Open the named database.
    fn lookup(&self, database: &str) -> Result<Box<dyn Collection>, StorageError>;
}

/// An open database.
pub trait Collection: Send {
    fn name(&self) -> &str;

    fn open_resource_manager(
        &self,
        resource: &str,
    ) -> Result<Box<dyn ResourceManager>, StorageError>;
}

/// An open resource. `None` as a revision means the most recent one.
pub trait ResourceManager: Send {
    fn resource_name(&self) -> &str;

    fn begin_node_read_only_trx(
        &self,
        revision: Option<RevisionNumber>,
    ) -> Result<Box<dyn NodeReadOnlyTrx>, StorageError>;

    fn open_path_summary(
        &self,
        revision: Option<RevisionNumber>,
    ) -> Result<PathSummaryHandle, StorageError>;

    fn most_recent_revision_number(&self) -> Result<RevisionNumber, StorageError>;

    /// Index definitions visible in `revision`.
    fn rtx_index_controller(
        &self,
        revision: RevisionNumber,
    ) -> Result<Arc<IndexController>, StorageError>;
}

/// Read-only view of one revision's node tree.
pub trait NodeReadOnlyTrx: Send {
    fn revision_number(&self) -> RevisionNumber;

    /// Number of nodes below the document node.
    fn descendant_count(&self) -> u64;
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Keep at most this many revisions per resource; older ones are
    /// dropped on commit. `None` keeps everything.
    pub max_revisions_per_resource: Option<usize>,
}
