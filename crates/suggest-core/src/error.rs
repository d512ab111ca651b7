//! Error types for the suggestion engine

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the engine, the ledger and the table codec
#[derive(Debug, Error)]
pub enum SuggestError {
    /// BM25 parameters outside their allowed range
    #[error("Invalid BM25 parameters: k1={k1}, b={b} (must be finite and non-negative)")]
    InvalidParams {
        /// Term frequency saturation
        k1: f64,
        /// Length normalization
        b: f64,
    },

    /// Document index past the end of the corpus
    #[error("Document index {index} out of range (corpus has {len} documents)")]
    DocumentOutOfRange {
        /// Requested index
        index: usize,
        /// Corpus size
        len: usize,
    },

    /// A required column is absent from the table
    #[error("Missing column: {name}")]
    MissingColumn {
        /// Column name
        name: String,
    },

    /// A column has a type the caller cannot use
    #[error("Column '{name}' has type {found}, expected {expected}")]
    ColumnType {
        /// Column name
        name: String,
        /// Type the caller needs
        expected: &'static str,
        /// Type stored in the table
        found: &'static str,
    },

    /// Table columns violate the table's structural rules
    #[error("Invalid table schema: {reason}")]
    Schema {
        /// What was wrong
        reason: String,
    },

    /// Table file bytes could not be decoded
    #[error("Corrupt table data: {reason}")]
    Corrupt {
        /// What was wrong
        reason: String,
    },

    /// Reading a table file failed
    #[error("Failed to read {path:?}: {source}")]
    Load {
        /// File being read
        path: PathBuf,
        /// Underlying I/O fault
        #[source]
        source: io::Error,
    },

    /// Writing the ledger to durable storage failed
    #[error("Failed to persist ledger to {path:?}: {source}")]
    Persistence {
        /// Destination being written
        path: PathBuf,
        /// Underlying I/O fault
        #[source]
        source: io::Error,
    },

    /// Configuration file could not be read or parsed
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },
}

impl SuggestError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    pub(crate) fn schema(reason: impl Into<String>) -> Self {
        Self::Schema {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SuggestError>;
