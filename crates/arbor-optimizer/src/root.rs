//! Resolution of the document call at the root of a navigation chain.

use crate::config::OptimizerConfig;
use arbor_dsl::{Ast, AstId, AstKind, JSON_NSURI};
use arbor_storage::RevisionNumber;
use serde::{Deserialize, Serialize};

/// The stored document a navigation chain starts from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentTarget {
    pub database: String,
    pub resource: String,
    /// `None` reads the most recent revision.
    pub revision: Option<RevisionNumber>,
}

impl DocumentTarget {
    /// Read `jn:doc(db, resource[, revision])` (or another configured
    /// document function) with literal arguments.
    ///
    /// A negative revision literal means the most recent revision, the same
    /// as omitting it. Anything else that does not fit returns `None`.
    pub fn resolve(ast: &Ast, call: AstId, config: &OptimizerConfig) -> Option<Self> {
        if ast.kind(call) != Some(AstKind::FunctionCall) {
            return None;
        }
        let name = ast.qname_value(call)?;
        if !name.is_in_namespace(JSON_NSURI) || !config.is_document_function(name.local_name()) {
            return None;
        }

        let args = ast.children(call);
        if !(2..=3).contains(&args.len()) {
            return None;
        }
        let database = ast.string_value(args[0])?.to_string();
        let resource = ast.string_value(args[1])?.to_string();
        let revision = match args.get(2) {
            None => None,
            Some(&arg) => match ast.int_value(arg)? {
                r if r < 0 => None,
                r => Some(RevisionNumber::try_from(r).ok()?),
            },
        };

        Some(Self {
            database,
            resource,
            revision,
        })
    }
}
