//! Selection ledger: per-suggestion counters stored in the table

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::persist::LedgerSink;
use crate::table::SuggestionTable;

/// Selection count of one corpus row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStat {
    pub text: String,
    pub count: u64,
}

/// Mutable selection counters, one per corpus row
///
/// Counts only ever grow. Every successful mutation is followed by a flush of
/// the full table through the configured sink.
pub struct SelectionLedger {
    table: SuggestionTable,
    sink: Box<dyn LedgerSink>,
}

impl SelectionLedger {
    /// Wrap a table, adding a zeroed `selection_count` column if it has none
    pub fn new(mut table: SuggestionTable, sink: Box<dyn LedgerSink>) -> Result<Self> {
        table.suggestions()?;
        table.ensure_selection_counts()?;
        Ok(Self { table, sink })
    }

    /// Count one selection of `text`
    ///
    /// Every row whose text matches exactly is incremented, so duplicate
    /// corpus entries move together. Returns `Ok(false)` without touching
    /// anything when no row matches.
    pub fn record(&mut self, text: &str) -> Result<bool> {
        let (texts, counts) = self.table.ledger_mut()?;
        let mut matched = 0usize;
        for (row, count) in texts.iter().zip(counts.iter_mut()) {
            if row == text {
                *count = count.saturating_add(1);
                matched += 1;
            }
        }

        if matched == 0 {
            tracing::warn!("Suggestion '{}' not found in ledger", text);
            return Ok(false);
        }
        tracing::debug!("Recorded selection of '{}' ({} rows)", text, matched);

        self.sink.flush(&self.table)?;
        Ok(true)
    }

    /// Count of the first row matching `text`
    pub fn count_of(&self, text: &str) -> Option<u64> {
        let texts = self.table.suggestions().ok()?;
        let counts = self.table.selection_counts().ok()?;
        texts
            .iter()
            .position(|t| t == text)
            .map(|row| counts[row])
    }

    /// All rows with their counts, most selected first
    pub fn statistics(&self) -> Result<Vec<SelectionStat>> {
        let texts = self.table.suggestions()?;
        let counts = self.table.selection_counts()?;
        let mut stats: Vec<SelectionStat> = texts
            .iter()
            .zip(counts)
            .map(|(text, &count)| SelectionStat {
                text: text.clone(),
                count,
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(stats)
    }

    /// Write the full table, extra columns included, to `path`
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        self.table.save(path)
    }

    pub fn table(&self) -> &SuggestionTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SuggestError;
    use crate::persist::{FileSink, NoopSink};
    use crate::table::{Column, ColumnData, SUGGESTION_COLUMN};
    use std::collections::HashSet;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);

    impl LedgerSink for CountingSink {
        fn flush(&self, _ledger: &SuggestionTable) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    impl LedgerSink for FailingSink {
        fn flush(&self, _ledger: &SuggestionTable) -> Result<()> {
            Err(SuggestError::Persistence {
                path: "/readonly/ledger.sgtb".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    fn ledger(docs: &[&str]) -> SelectionLedger {
        SelectionLedger::new(
            SuggestionTable::from_suggestions(docs.iter().copied()),
            Box::new(NoopSink),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_ledger_is_zeroed() {
        let table = SuggestionTable::new(vec![Column::new(
            SUGGESTION_COLUMN,
            ColumnData::Utf8(vec!["a".into(), "b".into()]),
        )])
        .unwrap();
        let ledger = SelectionLedger::new(table, Box::new(NoopSink)).unwrap();
        assert_eq!(ledger.table().selection_counts().unwrap(), [0, 0]);
    }

    #[test]
    fn test_missing_suggestion_column() {
        let table = SuggestionTable::new(vec![Column::new(
            "text",
            ColumnData::Utf8(vec!["a".into()]),
        )])
        .unwrap();
        let err = SelectionLedger::new(table, Box::new(NoopSink)).err().unwrap();
        assert!(matches!(err, SuggestError::MissingColumn { .. }));
    }

    #[test]
    fn test_record_twice() {
        let mut ledger = ledger(&["open account", "close account"]);
        assert!(ledger.record("open account").unwrap());
        assert!(ledger.record("open account").unwrap());
        assert_eq!(ledger.count_of("open account"), Some(2));
        assert_eq!(ledger.count_of("close account"), Some(0));
    }

    #[test]
    fn test_record_unknown() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let mut ledger = SelectionLedger::new(
            SuggestionTable::from_suggestions(["open account"]),
            Box::new(CountingSink(flushes.clone())),
        )
        .unwrap();

        assert!(!ledger.record("Open Account").unwrap());
        assert!(!ledger.record("missing").unwrap());
        assert_eq!(ledger.table().selection_counts().unwrap(), [0]);
        assert_eq!(flushes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_record_flushes_each_time() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let mut ledger = SelectionLedger::new(
            SuggestionTable::from_suggestions(["a", "b"]),
            Box::new(CountingSink(flushes.clone())),
        )
        .unwrap();

        ledger.record("a").unwrap();
        ledger.record("b").unwrap();
        assert_eq!(flushes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_duplicates_all_incremented() {
        let mut ledger = ledger(&["pay bill", "open account", "pay bill"]);
        assert!(ledger.record("pay bill").unwrap());
        assert_eq!(ledger.table().selection_counts().unwrap(), [1, 0, 1]);
    }

    #[test]
    fn test_persistence_failure_surfaces() {
        let mut ledger = SelectionLedger::new(
            SuggestionTable::from_suggestions(["a"]),
            Box::new(FailingSink),
        )
        .unwrap();
        let err = ledger.record("a").unwrap_err();
        assert!(matches!(err, SuggestError::Persistence { .. }));
    }

    #[test]
    fn test_file_sink_persists_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sgtb");
        let mut ledger = SelectionLedger::new(
            SuggestionTable::from_suggestions(["a", "b"]),
            Box::new(FileSink::new(&path)),
        )
        .unwrap();

        ledger.record("b").unwrap();
        let reloaded = SuggestionTable::load(&path).unwrap();
        assert_eq!(reloaded.selection_counts().unwrap(), [0, 1]);
    }

    #[test]
    fn test_statistics_sorted() {
        let mut ledger = ledger(&["a", "b", "c", "d"]);
        for text in ["c", "c", "c", "a", "d"] {
            ledger.record(text).unwrap();
        }

        let stats = ledger.statistics().unwrap();
        assert_eq!(stats.len(), 4);
        assert_eq!(stats[0], SelectionStat { text: "c".into(), count: 3 });
        assert!(stats.windows(2).all(|w| w[0].count >= w[1].count));

        let tied: HashSet<&str> = stats[1..3].iter().map(|s| s.text.as_str()).collect();
        assert_eq!(tied, HashSet::from(["a", "d"]));
        assert_eq!(stats[3], SelectionStat { text: "b".into(), count: 0 });
    }

    #[test]
    fn test_export_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&["a"]);
        let err = ledger
            .export(dir.path().join("missing").join("out.sgtb"))
            .unwrap_err();
        assert!(matches!(err, SuggestError::Persistence { .. }));
    }
}
