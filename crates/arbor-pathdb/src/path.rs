//! Label paths.
//!
//! A [`Path`] is an ordered root-to-leaf list of [`Step`]s. Concrete paths
//! (from the path summary) only use `Child` and `ChildArray`; index
//! definitions may also use `Descendant` to cover a family of paths.
//!
//! Text form: `/a/[]/b` for concrete paths, `//b` for a descendant step.

use arbor_dsl::QName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Object key directly below the previous step.
    Child,
    /// Array directly below the previous step (no label).
    ChildArray,
    /// Object key anywhere below the previous step.
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Step {
    pub axis: Axis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<QName>,
}

impl Step {
    pub fn child(label: impl Into<QName>) -> Self {
        Self {
            axis: Axis::Child,
            label: Some(label.into()),
        }
    }

    pub fn child_array() -> Self {
        Self {
            axis: Axis::ChildArray,
            label: None,
        }
    }

    pub fn descendant(label: impl Into<QName>) -> Self {
        Self {
            axis: Axis::Descendant,
            label: Some(label.into()),
        }
    }

    /// `true` for a `Child` step whose label's local name is `name`.
    pub fn is_child_named(&self, name: &str) -> bool {
        self.axis == Axis::Child
            && self
                .label
                .as_ref()
                .is_some_and(|label| label.local_name() == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Path {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path must start with `/`: `{0}`")]
    MissingRoot(String),
    #[error("empty step in path `{0}`")]
    EmptyStep(String),
    #[error("array step cannot use the descendant axis in `{0}`")]
    DescendantArray(String),
}

impl Path {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn leaf(&self) -> Option<&Step> {
        self.steps.last()
    }

    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn parse(text: &str) -> Result<Self, PathError> {
        let mut rest = text
            .strip_prefix('/')
            .ok_or_else(|| PathError::MissingRoot(text.to_string()))?;
        let mut steps = Vec::new();
        if rest.is_empty() {
            return Ok(Self { steps });
        }

        loop {
            let descendant = match rest.strip_prefix('/') {
                Some(after) => {
                    rest = after;
                    true
                }
                None => false,
            };
            let end = rest.find('/').unwrap_or(rest.len());
            let segment = &rest[..end];
            if segment.is_empty() {
                return Err(PathError::EmptyStep(text.to_string()));
            }
            let step = match (segment, descendant) {
                ("[]", true) => return Err(PathError::DescendantArray(text.to_string())),
                ("[]", false) => Step::child_array(),
                (label, true) => Step::descendant(label),
                (label, false) => Step::child(label),
            };
            steps.push(step);

            if end == rest.len() {
                break;
            }
            rest = &rest[end + 1..];
        }

        Ok(Self { steps })
    }

    /// Does this (pattern) path cover the concrete path `concrete`?
    ///
    /// `Child`/`ChildArray` steps must match one-to-one; a `Descendant` step
    /// matches a `Child` step with the same label after any number of
    /// intermediate steps.
    pub fn matches(&self, concrete: &Path) -> bool {
        fn match_from(pattern: &[Step], concrete: &[Step]) -> bool {
            let Some((first, rest)) = pattern.split_first() else {
                return concrete.is_empty();
            };
            match first.axis {
                Axis::Descendant => (0..concrete.len()).any(|i| {
                    concrete[i].axis == Axis::Child
                        && concrete[i].label == first.label
                        && match_from(rest, &concrete[i + 1..])
                }),
                Axis::Child | Axis::ChildArray => {
                    concrete.first() == Some(first) && match_from(rest, &concrete[1..])
                }
            }
        }
        match_from(&self.steps, &concrete.steps)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            match (&step.axis, &step.label) {
                (Axis::ChildArray, _) => f.write_str("/[]")?,
                (Axis::Child, Some(label)) => write!(f, "/{label}")?,
                (Axis::Descendant, Some(label)) => write!(f, "//{label}")?,
                (_, None) => f.write_str("/?")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Path> for String {
    fn from(value: Path) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let p = Path::parse("/a/[]/b").unwrap();
        assert_eq!(
            p.steps(),
            &[Step::child("a"), Step::child_array(), Step::child("b")]
        );
        assert_eq!(p.to_string(), "/a/[]/b");

        let d = Path::parse("//b").unwrap();
        assert_eq!(d.steps(), &[Step::descendant("b")]);
        assert_eq!(d.to_string(), "//b");
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(Path::parse("a/b"), Err(PathError::MissingRoot(_))));
        assert!(matches!(Path::parse("/a/"), Err(PathError::EmptyStep(_))));
        assert!(matches!(Path::parse("/a///b"), Err(PathError::EmptyStep(_))));
        assert!(matches!(
            Path::parse("//[]"),
            Err(PathError::DescendantArray(_))
        ));
    }

    #[test]
    fn descendant_pattern_matching() {
        let concrete = Path::parse("/x/a/[]/b").unwrap();
        assert!(Path::parse("//b").unwrap().matches(&concrete));
        assert!(Path::parse("//a/[]/b").unwrap().matches(&concrete));
        assert!(Path::parse("/x//b").unwrap().matches(&concrete));
        assert!(!Path::parse("/a/[]/b").unwrap().matches(&concrete));
        assert!(!Path::parse("//a/b").unwrap().matches(&concrete));
        assert!(concrete.matches(&concrete));
    }
}
