//! Qualified names.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Namespace URI of the JSON document functions (`jn:doc`, `jn:open`).
pub const JSON_NSURI: &str = "http://jsoniq.org/functions";

/// Conventional prefix bound to [`JSON_NSURI`].
pub const JSON_PREFIX: &str = "jn";

/// A qualified name: optional namespace URI and prefix plus a local part.
///
/// Equality ignores the prefix when both sides carry a namespace URI, the
/// same way XML names compare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    /// A name without namespace (object keys, path labels).
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            prefix: None,
            local: local.into(),
        }
    }

    pub fn new(
        namespace: impl Into<String>,
        prefix: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            prefix: Some(prefix.into()),
            local: local.into(),
        }
    }

    /// A name in the JSON function namespace.
    pub fn json_function(local: impl Into<String>) -> Self {
        Self::new(JSON_NSURI, JSON_PREFIX, local)
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn is_in_namespace(&self, uri: &str) -> bool {
        self.namespace.as_deref() == Some(uri)
    }

    /// The parts that take part in comparison: the prefix only counts for
    /// names without a namespace URI.
    fn identity(&self) -> (Option<&str>, Option<&str>, &str) {
        let prefix = match self.namespace {
            Some(_) => None,
            None => self.prefix.as_deref(),
        };
        (self.namespace.as_deref(), prefix, &self.local)
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

impl From<&str> for QName {
    fn from(value: &str) -> Self {
        Self::local(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_equality_ignores_prefix() {
        let a = QName::new(JSON_NSURI, "jn", "doc");
        let b = QName::new(JSON_NSURI, "json", "doc");
        assert_eq!(a, b);
        assert_ne!(a, QName::local("doc"));
    }

    #[test]
    fn display_uses_prefix() {
        assert_eq!(QName::json_function("open").to_string(), "jn:open");
        assert_eq!(QName::local("a").to_string(), "a");
    }
}
