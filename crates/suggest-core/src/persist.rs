//! Persistence strategies for the selection ledger
//!
//! The ledger calls [`LedgerSink::flush`] after every mutation with the full
//! table. [`FileSink`] rewrites the whole file each time; other strategies
//! (batched, asynchronous) can be swapped in without touching scoring.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::table::SuggestionTable;

/// Destination for ledger state
pub trait LedgerSink: Send + Sync {
    /// Make the given ledger durable
    fn flush(&self, ledger: &SuggestionTable) -> Result<()>;
}

/// Rewrites the whole table file on every flush (last writer wins)
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerSink for FileSink {
    fn flush(&self, ledger: &SuggestionTable) -> Result<()> {
        ledger.save(&self.path)
    }
}

/// Keeps the ledger in memory only
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LedgerSink for NoopSink {
    fn flush(&self, _ledger: &SuggestionTable) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_writes_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sgtb");
        let sink = FileSink::new(&path);
        let table = SuggestionTable::from_suggestions(["a", "b"]);

        sink.flush(&table).unwrap();
        assert_eq!(sink.path(), path.as_path());
        assert_eq!(SuggestionTable::load(&path).unwrap(), table);
    }

    #[test]
    fn test_noop_sink() {
        let table = SuggestionTable::from_suggestions(["a"]);
        assert!(NoopSink.flush(&table).is_ok());
    }
}
