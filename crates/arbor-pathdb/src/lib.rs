//! # Arbor PathDB
//!
//! The document side of the optimizer:
//!
//! - **Structural hashes**: 128-bit, order-sensitive, composed from node
//!   delegates and child hashes (`hash`, `node`)
//! - **Document trees**: nodes in document order with sibling links (`tree`)
//! - **Path summaries**: one entry per distinct label path, with label
//!   matching into Roaring bitmaps (`summary`)
//! - **Index definitions**: which path/CAS/name index covers a path (`index`)

pub mod hash;
pub mod index;
pub mod node;
pub mod path;
pub mod summary;
pub mod tree;

pub use hash::{fold_components, ComponentHasher, Hash128, WideHash};
pub use index::{ContentType, IndexController, IndexDef, IndexError, IndexId, IndexType};
pub use node::{
    ArrayNode, AtomicValue, DocumentNode, JsonNode, Node, NodeDelegate, NodeKey, NodeKind,
    ObjectKeyNode, ObjectNode, PathNodeKey, StructDelegate, ValueNode,
};
pub use path::{Axis, Path, PathError, Step};
pub use summary::{PathNode, PathSummary, PathSummaryReader, SummaryCursor, ROOT_PATH_NODE_KEY};
pub use tree::{shred, DocumentTree, TreeError, DOCUMENT_NODE_KEY};
