//! In-memory versioned store.
//!
//! Each commit produces a new immutable [`RevisionSnapshot`]; readers hold an
//! `Arc` to the snapshot they opened, so later commits never disturb them.

use crate::{
    Collection, DocumentStore, NodeReadOnlyTrx, PathSummaryHandle, ResourceManager,
    RevisionNumber, StorageError, StoreConfig,
};
use arbor_dsl::QName;
use arbor_pathdb::{
    shred, DocumentTree, IndexController, IndexDef, NodeKind, Path, PathNode, PathNodeKey,
    PathSummary, PathSummaryReader, SummaryCursor, DOCUMENT_NODE_KEY,
};
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One committed revision of a resource.
#[derive(Debug)]
pub struct RevisionSnapshot {
    pub revision: RevisionNumber,
    pub tree: DocumentTree,
    pub summary: Arc<PathSummary>,
    pub indexes: Arc<IndexController>,
}

#[derive(Debug, Default)]
struct ResourceState {
    revisions: RwLock<Vec<Arc<RevisionSnapshot>>>,
    next_revision: RwLock<RevisionNumber>,
}

impl ResourceState {
    fn latest(&self, name: &str) -> Result<Arc<RevisionSnapshot>, StorageError> {
        self.revisions
            .read()
            .last()
            .cloned()
            .ok_or_else(|| StorageError::NoRevisions(name.to_string()))
    }

    fn revision(
        &self,
        name: &str,
        revision: Option<RevisionNumber>,
    ) -> Result<Arc<RevisionSnapshot>, StorageError> {
        let Some(revision) = revision else {
            return self.latest(name);
        };
        self.revisions
            .read()
            .iter()
            .find(|snapshot| snapshot.revision == revision)
            .cloned()
            .ok_or_else(|| StorageError::UnknownRevision {
                resource: name.to_string(),
                revision,
            })
    }
}

#[derive(Debug, Default)]
struct DatabaseState {
    resources: RwLock<BTreeMap<String, Arc<ResourceState>>>,
}

// ============================================================================
// Handle accounting
// ============================================================================

/// Counts one open handle for as long as it lives.
#[derive(Debug)]
struct HandleGuard {
    open: Arc<AtomicUsize>,
    kind: &'static str,
}

impl HandleGuard {
    fn acquire(open: &Arc<AtomicUsize>, kind: &'static str) -> Self {
        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(handle = kind, open = now, "acquired store handle");
        Self {
            open: Arc::clone(open),
            kind,
        }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        let now = self.open.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        tracing::trace!(handle = self.kind, open = now, "released store handle");
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    config: StoreConfig,
    databases: Arc<RwLock<BTreeMap<String, Arc<DatabaseState>>>>,
    open: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Handles currently open against this store (all kinds).
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Create `database/resource` (and the database) if missing. A new
    /// resource has no revisions until the first commit.
    pub fn create_resource(&self, database: &str, resource: &str) {
        let db = Arc::clone(
            self.databases
                .write()
                .entry(database.to_string())
                .or_default(),
        );
        db.resources.write().entry(resource.to_string()).or_default();
    }

    fn resource_state(
        &self,
        database: &str,
        resource: &str,
    ) -> Result<Arc<ResourceState>, StorageError> {
        let db = self
            .databases
            .read()
            .get(database)
            .cloned()
            .ok_or_else(|| StorageError::UnknownDatabase(database.to_string()))?;
        let state = db.resources.read().get(resource).cloned();
        state.ok_or_else(|| StorageError::UnknownResource {
            database: database.to_string(),
            resource: resource.to_string(),
        })
    }

    /// Store `value` as the new most recent revision of `database/resource`,
    /// creating both if needed. Index definitions carry over from the
    /// previous revision.
    pub fn commit_json(
        &self,
        database: &str,
        resource: &str,
        value: &Value,
    ) -> Result<RevisionNumber, StorageError> {
        let (tree, summary) = shred(value)?;
        self.create_resource(database, resource);
        let state = self.resource_state(database, resource)?;
        let summary = Arc::new(summary);
        let revision = self.push_revision(&state, |revision, previous| {
            let indexes = previous.map_or_else(
                || Arc::new(IndexController::new()),
                |previous| Arc::clone(&previous.indexes),
            );
            Ok(RevisionSnapshot {
                revision,
                tree,
                summary,
                indexes,
            })
        })?;
        tracing::debug!(database, resource, revision, "committed document revision");
        Ok(revision)
    }

    /// Register `def` in a new revision that shares the previous revision's
    /// document.
    pub fn create_index(
        &self,
        database: &str,
        resource: &str,
        def: IndexDef,
    ) -> Result<RevisionNumber, StorageError> {
        let state = self.resource_state(database, resource)?;
        let index_id = def.id;
        let revision = self.push_revision(&state, |revision, previous| {
            let previous =
                previous.ok_or_else(|| StorageError::NoRevisions(resource.to_string()))?;
            let mut indexes = (*previous.indexes).clone();
            indexes.create_index(def)?;
            Ok(RevisionSnapshot {
                revision,
                tree: previous.tree.clone(),
                summary: Arc::clone(&previous.summary),
                indexes: Arc::new(indexes),
            })
        })?;
        tracing::debug!(database, resource, revision, index_id, "created index");
        Ok(revision)
    }

    /// Snapshot of `revision` (`None`: most recent).
    pub fn revision(
        &self,
        database: &str,
        resource: &str,
        revision: Option<RevisionNumber>,
    ) -> Result<Arc<RevisionSnapshot>, StorageError> {
        self.resource_state(database, resource)?
            .revision(resource, revision)
    }

    /// Append the snapshot `build` makes from the current head.
    ///
    /// The head is read and replaced under one write lock, so concurrent
    /// writers always build on each other's revisions.
    fn push_revision(
        &self,
        state: &ResourceState,
        build: impl FnOnce(
            RevisionNumber,
            Option<&RevisionSnapshot>,
        ) -> Result<RevisionSnapshot, StorageError>,
    ) -> Result<RevisionNumber, StorageError> {
        let mut next = state.next_revision.write();
        let mut revisions = state.revisions.write();
        let revision = *next;
        let snapshot = build(revision, revisions.last().map(Arc::as_ref))?;
        revisions.push(Arc::new(snapshot));
        *next += 1;

        if let Some(max) = self.config.max_revisions_per_resource {
            let max = max.max(1);
            if revisions.len() > max {
                let excess = revisions.len() - max;
                revisions.drain(..excess);
                tracing::debug!(dropped = excess, "pruned old revisions");
            }
        }
        Ok(revision)
    }
}

impl DocumentStore for MemoryStore {
    fn lookup(&self, database: &str) -> Result<Box<dyn Collection>, StorageError> {
        let db = self
            .databases
            .read()
            .get(database)
            .cloned()
            .ok_or_else(|| StorageError::UnknownDatabase(database.to_string()))?;
        Ok(Box::new(MemoryCollection {
            name: database.to_string(),
            db,
            open: Arc::clone(&self.open),
            _guard: HandleGuard::acquire(&self.open, "collection"),
        }))
    }
}

// ============================================================================
// Handles
// ============================================================================

pub struct MemoryCollection {
    name: String,
    db: Arc<DatabaseState>,
    open: Arc<AtomicUsize>,
    _guard: HandleGuard,
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_resource_manager(
        &self,
        resource: &str,
    ) -> Result<Box<dyn ResourceManager>, StorageError> {
        let state = self.db.resources.read().get(resource).cloned().ok_or_else(|| {
            StorageError::UnknownResource {
                database: self.name.clone(),
                resource: resource.to_string(),
            }
        })?;
        Ok(Box::new(MemoryResourceManager {
            name: resource.to_string(),
            state,
            open: Arc::clone(&self.open),
            _guard: HandleGuard::acquire(&self.open, "resource_manager"),
        }))
    }
}

pub struct MemoryResourceManager {
    name: String,
    state: Arc<ResourceState>,
    open: Arc<AtomicUsize>,
    _guard: HandleGuard,
}

impl ResourceManager for MemoryResourceManager {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn begin_node_read_only_trx(
        &self,
        revision: Option<RevisionNumber>,
    ) -> Result<Box<dyn NodeReadOnlyTrx>, StorageError> {
        let snapshot = self.state.revision(&self.name, revision)?;
        Ok(Box::new(MemoryNodeReadOnlyTrx {
            snapshot,
            _guard: HandleGuard::acquire(&self.open, "node_trx"),
        }))
    }

    fn open_path_summary(
        &self,
        revision: Option<RevisionNumber>,
    ) -> Result<PathSummaryHandle, StorageError> {
        let snapshot = self.state.revision(&self.name, revision)?;
        Ok(Box::new(MemoryPathSummary {
            cursor: SummaryCursor::new(Arc::clone(&snapshot.summary)),
            _guard: HandleGuard::acquire(&self.open, "path_summary"),
        }))
    }

    fn most_recent_revision_number(&self) -> Result<RevisionNumber, StorageError> {
        Ok(self.state.latest(&self.name)?.revision)
    }

    fn rtx_index_controller(
        &self,
        revision: RevisionNumber,
    ) -> Result<Arc<IndexController>, StorageError> {
        Ok(Arc::clone(
            &self.state.revision(&self.name, Some(revision))?.indexes,
        ))
    }
}

pub struct MemoryNodeReadOnlyTrx {
    snapshot: Arc<RevisionSnapshot>,
    _guard: HandleGuard,
}

impl NodeReadOnlyTrx for MemoryNodeReadOnlyTrx {
    fn revision_number(&self) -> RevisionNumber {
        self.snapshot.revision
    }

    fn descendant_count(&self) -> u64 {
        self.snapshot
            .tree
            .descendant_count(DOCUMENT_NODE_KEY)
            .unwrap_or(0)
    }
}

pub struct MemoryPathSummary {
    cursor: SummaryCursor,
    _guard: HandleGuard,
}

impl PathSummaryReader for MemoryPathSummary {
    fn match_label(&self, label: &QName, min_level: u32, kind: NodeKind) -> RoaringBitmap {
        self.cursor.match_label(label, min_level, kind)
    }

    fn move_to(&mut self, key: PathNodeKey) -> bool {
        self.cursor.move_to(key)
    }

    fn path(&self) -> Option<Path> {
        self.cursor.path()
    }

    fn path_node(&self, key: PathNodeKey) -> Option<&PathNode> {
        self.cursor.path_node(key)
    }

    fn path_of(&self, key: PathNodeKey) -> Option<Path> {
        self.cursor.path_of(key)
    }
}
