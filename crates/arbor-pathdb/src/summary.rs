//! Path summary: one entry per distinct root-to-label path of a revision.
//!
//! Entry `0` is the document root. Every other entry stores its parent key
//! and the single step that leads to it, so full paths are rebuilt by
//! walking parents. Many document nodes share one entry; `references`
//! counts them.

use crate::node::{NodeKind, PathNodeKey};
use crate::path::{Path, Step};
use arbor_dsl::QName;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const ROOT_PATH_NODE_KEY: PathNodeKey = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub key: PathNodeKey,
    pub parent: Option<PathNodeKey>,
    /// `None` only for the document root.
    pub step: Option<Step>,
    pub kind: NodeKind,
    /// Number of steps from the root (the root is level 0).
    pub level: u32,
    pub references: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSummary {
    nodes: Vec<PathNode>,
    #[serde(skip)]
    child_index: HashMap<(PathNodeKey, Step), PathNodeKey>,
}

impl Default for PathSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSummary {
    pub fn new() -> Self {
        Self {
            nodes: vec![PathNode {
                key: ROOT_PATH_NODE_KEY,
                parent: None,
                step: None,
                kind: NodeKind::Document,
                level: 0,
                references: 1,
            }],
            child_index: HashMap::new(),
        }
    }

    /// Number of entries, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Look up the entry for `parent/step`, creating it if needed, and count
    /// one more reference to it.
    ///
    /// Returns `None` if `parent` is not a known key.
    pub fn get_or_insert(
        &mut self,
        parent: PathNodeKey,
        step: Step,
        kind: NodeKind,
    ) -> Option<PathNodeKey> {
        let parent_level = self.nodes.get(parent as usize)?.level;
        if let Some(&key) = self.child_index.get(&(parent, step.clone())) {
            if let Some(node) = self.nodes.get_mut(key as usize) {
                node.references += 1;
            }
            return Some(key);
        }

        let key = self.nodes.len() as PathNodeKey;
        self.nodes.push(PathNode {
            key,
            parent: Some(parent),
            step: Some(step.clone()),
            kind,
            level: parent_level + 1,
            references: 1,
        });
        self.child_index.insert((parent, step), key);
        Some(key)
    }

    pub fn path_node(&self, key: PathNodeKey) -> Option<&PathNode> {
        self.nodes.get(key as usize)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes.iter().skip(1)
    }

    /// Keys of every entry whose own step carries `label`, whose kind is
    /// `kind` and whose level is at least `min_level`.
    pub fn match_label(&self, label: &QName, min_level: u32, kind: NodeKind) -> RoaringBitmap {
        self.nodes()
            .filter(|node| {
                node.kind == kind
                    && node.level >= min_level
                    && node.step.as_ref().and_then(|s| s.label.as_ref()) == Some(label)
            })
            .map(|node| node.key)
            .collect()
    }

    /// Root-to-leaf path of `key`.
    pub fn path_of(&self, key: PathNodeKey) -> Option<Path> {
        let mut steps = Vec::new();
        let mut current = self.path_node(key)?;
        while let Some(step) = &current.step {
            steps.push(step.clone());
            current = self.path_node(current.parent?)?;
        }
        steps.reverse();
        Some(Path::new(steps))
    }

    /// Rebuild the lookup table after deserialization.
    pub fn reindex(&mut self) {
        self.child_index = self
            .nodes
            .iter()
            .filter_map(|node| Some(((node.parent?, node.step.clone()?), node.key)))
            .collect();
    }
}

/// Read access to a path summary, with a cursor.
pub trait PathSummaryReader {
    /// See [`PathSummary::match_label`].
    fn match_label(&self, label: &QName, min_level: u32, kind: NodeKind) -> RoaringBitmap;

    /// Position the cursor; `false` if `key` is unknown (cursor unchanged).
    fn move_to(&mut self, key: PathNodeKey) -> bool;

    /// Path of the entry under the cursor.
    fn path(&self) -> Option<Path>;

    fn path_node(&self, key: PathNodeKey) -> Option<&PathNode>;

    fn path_of(&self, key: PathNodeKey) -> Option<Path>;
}

/// Cursor over a shared, immutable summary snapshot.
#[derive(Debug, Clone)]
pub struct SummaryCursor {
    summary: Arc<PathSummary>,
    current: PathNodeKey,
}

impl SummaryCursor {
    pub fn new(summary: Arc<PathSummary>) -> Self {
        Self {
            summary,
            current: ROOT_PATH_NODE_KEY,
        }
    }

    pub fn current(&self) -> PathNodeKey {
        self.current
    }
}

impl PathSummaryReader for SummaryCursor {
    fn match_label(&self, label: &QName, min_level: u32, kind: NodeKind) -> RoaringBitmap {
        self.summary.match_label(label, min_level, kind)
    }

    fn move_to(&mut self, key: PathNodeKey) -> bool {
        if self.summary.path_node(key).is_none() {
            return false;
        }
        self.current = key;
        true
    }

    fn path(&self) -> Option<Path> {
        self.summary.path_of(self.current)
    }

    fn path_node(&self, key: PathNodeKey) -> Option<&PathNode> {
        self.summary.path_node(key)
    }

    fn path_of(&self, key: PathNodeKey) -> Option<Path> {
        self.summary.path_of(key)
    }
}
