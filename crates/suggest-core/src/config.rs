//! Engine configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bm25::BM25Params;
use crate::error::{Result, SuggestError};

/// Default table file
pub const DEFAULT_TABLE_PATH: &str = "suggestions.sgtb";

/// Default number of suggestions per query
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum score (inclusive)
pub const DEFAULT_MIN_SCORE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Table holding the corpus and the selection ledger
    pub table_path: PathBuf,
    pub k1: f64,
    pub b: f64,
    pub default_top_k: usize,
    pub default_min_score: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let params = BM25Params::default();
        Self {
            table_path: PathBuf::from(DEFAULT_TABLE_PATH),
            k1: params.k1,
            b: params.b,
            default_top_k: DEFAULT_TOP_K,
            default_min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| SuggestError::Config {
            reason: format!("cannot read {:?}: {}", path, e),
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a JSON config document
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| SuggestError::Config {
            reason: e.to_string(),
        })?;
        config.params().validate()?;
        Ok(config)
    }

    pub fn params(&self) -> BM25Params {
        BM25Params {
            k1: self.k1,
            b: self.b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.params(), BM25Params::default());
        assert_eq!(config.default_top_k, 5);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json(r#"{"k1": 1.2, "table_path": "data/s.sgtb"}"#).unwrap();
        assert_eq!(config.k1, 1.2);
        assert_eq!(config.b, 0.75);
        assert_eq!(config.table_path, PathBuf::from("data/s.sgtb"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let err = EngineConfig::from_json(r#"{"b": -0.5}"#).unwrap_err();
        assert!(matches!(err, SuggestError::InvalidParams { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = EngineConfig::from_json("{k1: ").unwrap_err();
        assert!(matches!(err, SuggestError::Config { .. }));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"default_top_k": 3}"#).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().default_top_k, 3);

        let err = EngineConfig::from_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SuggestError::Config { .. }));
    }
}
