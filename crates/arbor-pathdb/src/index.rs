//! Index definitions and the per-revision controller that resolves them.
//!
//! Building or maintaining index contents is not done here; the controller
//! only answers "which existing index covers this path?".

use crate::path::Path;
use arbor_dsl::{AstValue, QName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub type IndexId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// Path index: node keys per concrete path.
    Path,
    /// Content-and-structure index: (path, typed value) -> node keys.
    Cas,
    /// Name index: object-key name -> node keys.
    Name,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexType::Path => "path",
            IndexType::Cas => "cas",
            IndexType::Name => "name",
        })
    }
}

/// Value type a CAS index is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    String,
    Number,
    Boolean,
}

impl ContentType {
    /// Content type of a literal, if it has one.
    pub fn of_literal(value: &AstValue) -> Option<Self> {
        match value {
            AstValue::Str(_) => Some(ContentType::String),
            AstValue::Int(_) => Some(ContentType::Number),
            AstValue::Bool(_) => Some(ContentType::Boolean),
            AstValue::QName(_) | AstValue::Comparator(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexDef {
    pub id: IndexId,
    pub index_type: IndexType,
    /// Path patterns covered (path and CAS indexes). Empty means every path.
    #[serde(default)]
    pub paths: BTreeSet<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    /// Names covered (name indexes). Empty means every name.
    #[serde(default)]
    pub included_names: BTreeSet<QName>,
}

impl IndexDef {
    pub fn path(id: IndexId, paths: impl IntoIterator<Item = Path>) -> Self {
        Self {
            id,
            index_type: IndexType::Path,
            paths: paths.into_iter().collect(),
            content_type: None,
            included_names: BTreeSet::new(),
        }
    }

    pub fn cas(
        id: IndexId,
        paths: impl IntoIterator<Item = Path>,
        content_type: ContentType,
    ) -> Self {
        Self {
            id,
            index_type: IndexType::Cas,
            paths: paths.into_iter().collect(),
            content_type: Some(content_type),
            included_names: BTreeSet::new(),
        }
    }

    pub fn name(id: IndexId, names: impl IntoIterator<Item = QName>) -> Self {
        Self {
            id,
            index_type: IndexType::Name,
            paths: BTreeSet::new(),
            content_type: None,
            included_names: names.into_iter().collect(),
        }
    }

    /// Does one of the path patterns cover the concrete `path`?
    pub fn covers_path(&self, path: &Path) -> bool {
        self.paths.is_empty() || self.paths.iter().any(|pattern| pattern.matches(path))
    }

    pub fn covers_name(&self, name: &QName) -> bool {
        self.included_names.is_empty() || self.included_names.contains(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("index {0} already exists")]
    DuplicateId(IndexId),
    #[error("CAS index {0} needs a content type")]
    MissingContentType(IndexId),
}

/// Index definitions visible in one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexController {
    defs: Vec<IndexDef>,
}

impl IndexController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_index(&mut self, def: IndexDef) -> Result<(), IndexError> {
        if self.defs.iter().any(|d| d.id == def.id) {
            return Err(IndexError::DuplicateId(def.id));
        }
        if def.index_type == IndexType::Cas && def.content_type.is_none() {
            return Err(IndexError::MissingContentType(def.id));
        }
        self.defs.push(def);
        Ok(())
    }

    /// One past the largest id in use; `None` once `IndexId::MAX` is taken.
    pub fn next_id(&self) -> Option<IndexId> {
        match self.defs.iter().map(|d| d.id).max() {
            Some(max) => max.checked_add(1),
            None => Some(0),
        }
    }

    pub fn index_defs(&self) -> &[IndexDef] {
        &self.defs
    }

    /// First path index (in creation order) covering `path`.
    pub fn find_path_index(&self, path: &Path) -> Option<&IndexDef> {
        self.defs
            .iter()
            .find(|d| d.index_type == IndexType::Path && d.covers_path(path))
    }

    pub fn find_cas_index(&self, path: &Path, content_type: ContentType) -> Option<&IndexDef> {
        self.defs.iter().find(|d| {
            d.index_type == IndexType::Cas
                && d.content_type == Some(content_type)
                && d.covers_path(path)
        })
    }

    pub fn find_name_index(&self, name: &QName) -> Option<&IndexDef> {
        self.defs
            .iter()
            .find(|d| d.index_type == IndexType::Name && d.covers_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn path_lookup_respects_patterns() {
        let mut controller = IndexController::new();
        controller.create_index(IndexDef::path(0, [p("/a/b")])).unwrap();
        controller.create_index(IndexDef::path(1, [p("//c")])).unwrap();

        assert_eq!(controller.find_path_index(&p("/a/b")).map(|d| d.id), Some(0));
        assert_eq!(controller.find_path_index(&p("/x/[]/c")).map(|d| d.id), Some(1));
        assert!(controller.find_path_index(&p("/a")).is_none());
    }

    #[test]
    fn cas_lookup_requires_content_type() {
        let mut controller = IndexController::new();
        controller
            .create_index(IndexDef::cas(3, [p("/a/b")], ContentType::Number))
            .unwrap();
        assert!(controller
            .find_cas_index(&p("/a/b"), ContentType::String)
            .is_none());
        assert_eq!(
            controller
                .find_cas_index(&p("/a/b"), ContentType::Number)
                .map(|d| d.id),
            Some(3)
        );
        assert!(controller.find_path_index(&p("/a/b")).is_none());
    }

    #[test]
    fn name_index_with_no_names_covers_everything() {
        let mut controller = IndexController::new();
        controller.create_index(IndexDef::name(0, Vec::<QName>::new())).unwrap();
        assert!(controller.find_name_index(&QName::local("anything")).is_some());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut controller = IndexController::new();
        controller.create_index(IndexDef::path(0, [p("/a")])).unwrap();
        assert_eq!(
            controller.create_index(IndexDef::path(0, [p("/b")])),
            Err(IndexError::DuplicateId(0))
        );
        assert_eq!(controller.next_id(), Some(1));
    }

    #[test]
    fn next_id_is_exhausted_at_the_largest_id() {
        let mut controller = IndexController::new();
        assert_eq!(controller.next_id(), Some(0));
        controller
            .create_index(IndexDef::path(IndexId::MAX, [p("/a")]))
            .unwrap();
        assert_eq!(controller.next_id(), None);
    }

    #[test]
    fn literal_content_types() {
        assert_eq!(
            ContentType::of_literal(&AstValue::Int(3)),
            Some(ContentType::Number)
        );
        assert_eq!(
            ContentType::of_literal(&AstValue::Str("x".into())),
            Some(ContentType::String)
        );
        assert_eq!(ContentType::of_literal(&AstValue::QName(QName::local("q"))), None);
    }
}
