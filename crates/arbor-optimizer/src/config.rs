//! Optimizer configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Index rewrite strategies the walker may try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Cas,
    Path,
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Skip rewriting documents with fewer nodes than this below the
    /// document node. `0` never skips.
    pub min_descendant_count: u64,
    /// Strategies in the order they are tried.
    pub strategies: Vec<StrategyKind>,
    /// Local names (in the JSON function namespace) of the functions that
    /// open a stored document.
    pub document_functions: Vec<String>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_descendant_count: 0,
            strategies: vec![StrategyKind::Cas, StrategyKind::Path, StrategyKind::Name],
            document_functions: vec!["doc".to_string(), "open".to_string()],
        }
    }
}

impl OptimizerConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid optimizer configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read optimizer config {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("failed to load optimizer config {}", path.display()))
    }

    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        self.strategies.contains(&kind)
    }

    pub fn is_document_function(&self, local_name: &str) -> bool {
        self.document_functions.iter().any(|f| f == local_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = OptimizerConfig::from_json_str(r#"{"strategies": ["path"]}"#).unwrap();
        assert_eq!(config.strategies, vec![StrategyKind::Path]);
        assert_eq!(config.min_descendant_count, 0);
        assert!(config.is_document_function("open"));
        assert!(!config.is_enabled(StrategyKind::Cas));
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"min_descendant_count": 5, "document_functions": ["doc"]}}"#).unwrap();
        let config = OptimizerConfig::load(file.path()).unwrap();
        assert_eq!(config.min_descendant_count, 5);
        assert!(!config.is_document_function("open"));
    }

    #[test]
    fn load_reports_missing_files_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let err = OptimizerConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read optimizer config"));
        assert!(OptimizerConfig::from_json_str(r#"{"strategies": ["bogus"]}"#).is_err());
    }
}
