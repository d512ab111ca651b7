//! Suggestion engine: immutable BM25 index plus a locked selection ledger

use parking_lot::Mutex;
use std::path::Path;

use crate::bm25::{BM25Index, BM25Params, IndexStats, Suggestion};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::{SelectionLedger, SelectionStat};
use crate::persist::{FileSink, LedgerSink, NoopSink};
use crate::table::SuggestionTable;

/// Ranked suggestions and selection accounting over one corpus
///
/// Scoring reads only the index and takes no lock. Ledger mutation and the
/// flush that follows it run under a single mutex, so concurrent selections
/// never lose increments.
pub struct SuggestionEngine {
    index: BM25Index,
    ledger: Mutex<SelectionLedger>,
}

impl SuggestionEngine {
    /// Build from an in-memory table with a `suggestion` column
    pub fn new(table: SuggestionTable, params: BM25Params, sink: Box<dyn LedgerSink>) -> Result<Self> {
        let documents = table.suggestions()?.to_vec();
        let index = BM25Index::build(documents, params)?;
        let ledger = SelectionLedger::new(table, sink)?;
        Ok(Self {
            index,
            ledger: Mutex::new(ledger),
        })
    }

    /// Load a table file and persist selections back to it
    pub fn open(path: impl AsRef<Path>, params: BM25Params) -> Result<Self> {
        let path = path.as_ref();
        let table = SuggestionTable::load(path)?;
        Self::new(table, params, Box::new(FileSink::new(path)))
    }

    /// Open the table named by a config
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::open(&config.table_path, config.params())
    }

    /// Build over plain strings without any persistence
    pub fn in_memory<I, S>(suggestions: I, params: BM25Params) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            SuggestionTable::from_suggestions(suggestions),
            params,
            Box::new(NoopSink),
        )
    }

    /// Top `top_k` suggestions with score >= `min_score`
    pub fn suggest(&self, query: &str, top_k: usize, min_score: f64) -> Vec<Suggestion> {
        self.index.suggest(query, top_k, min_score)
    }

    /// BM25 score of one corpus entry
    pub fn score(&self, query: &str, doc_index: usize) -> Result<f64> {
        self.index.score(query, doc_index)
    }

    /// Count a user selection and persist the ledger
    ///
    /// `Ok(false)` means the text is not in the corpus.
    pub fn record_selection(&self, text: &str) -> Result<bool> {
        self.ledger.lock().record(text)
    }

    /// Selection counts, most selected first
    pub fn statistics(&self) -> Result<Vec<SelectionStat>> {
        self.ledger.lock().statistics()
    }

    /// Write a copy of the current table to `path`
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        self.ledger.lock().export(path)
    }

    /// Snapshot of the current table
    pub fn table(&self) -> SuggestionTable {
        self.ledger.lock().table().clone()
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    pub fn index(&self) -> &BM25Index {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SuggestError;
    use crate::table::{Column, ColumnData, SELECTION_COUNT_COLUMN, SUGGESTION_COLUMN};
    use std::sync::Arc;
    use std::thread;

    fn engine() -> SuggestionEngine {
        SuggestionEngine::in_memory(
            ["open account", "close account", "open savings account"],
            BM25Params::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SuggestionEngine>();
    }

    #[test]
    fn test_suggest_through_engine() {
        let engine = engine();
        let results = engine.suggest("open account", 2, 0.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "open account");
        assert!((results[0].score - 0.6450).abs() < 1e-4);
        assert_eq!(engine.stats().num_docs, 3);
    }

    #[test]
    fn test_missing_suggestion_column() {
        let table =
            SuggestionTable::new(vec![Column::new("text", ColumnData::Utf8(vec!["a".into()]))])
                .unwrap();
        let err = SuggestionEngine::new(table, BM25Params::default(), Box::new(NoopSink))
            .err()
            .unwrap();
        assert!(matches!(err, SuggestError::MissingColumn { .. }));
    }

    #[test]
    fn test_invalid_params() {
        let err = SuggestionEngine::in_memory(["a"], BM25Params { k1: -1.0, b: 0.75 })
            .err()
            .unwrap();
        assert!(matches!(err, SuggestError::InvalidParams { .. }));
    }

    #[test]
    fn test_record_and_statistics() {
        let engine = engine();
        assert!(engine.record_selection("close account").unwrap());
        assert!(engine.record_selection("close account").unwrap());
        assert!(!engine.record_selection("no such thing").unwrap());

        let stats = engine.statistics().unwrap();
        assert_eq!(stats[0].text, "close account");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats.iter().map(|s| s.count).sum::<u64>(), 2);
    }

    #[test]
    fn test_selections_do_not_change_scores() {
        let engine = engine();
        let before = engine.suggest("open account", 3, 0.0);
        engine.record_selection("close account").unwrap();
        assert_eq!(engine.suggest("open account", 3, 0.0), before);
    }

    #[test]
    fn test_existing_counts_kept() {
        let table = SuggestionTable::new(vec![
            Column::new(SUGGESTION_COLUMN, ColumnData::Utf8(vec!["a".into(), "b".into()])),
            Column::new(SELECTION_COUNT_COLUMN, ColumnData::UInt64(vec![5, 1])),
        ])
        .unwrap();
        let engine = SuggestionEngine::new(table, BM25Params::default(), Box::new(NoopSink)).unwrap();
        engine.record_selection("b").unwrap();
        assert_eq!(engine.table().selection_counts().unwrap(), [5, 2]);
    }

    #[test]
    fn test_concurrent_selections() {
        let engine = Arc::new(engine());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let text = if i % 2 == 0 { "open account" } else { "close account" };
                    for _ in 0..50 {
                        engine.record_selection(text).unwrap();
                        engine.suggest("open", 3, 0.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let table = engine.table();
        assert_eq!(table.selection_counts().unwrap(), [200, 200, 0]);
    }

    #[test]
    fn test_open_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suggestions.sgtb");
        SuggestionTable::from_suggestions(["open account", "close account"])
            .save(&path)
            .unwrap();

        let engine = SuggestionEngine::open(&path, BM25Params::default()).unwrap();
        engine.record_selection("open account").unwrap();
        drop(engine);

        let reopened = SuggestionEngine::open(&path, BM25Params::default()).unwrap();
        assert_eq!(reopened.table().selection_counts().unwrap(), [1, 0]);
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suggestions.sgtb");
        SuggestionTable::from_suggestions(["a b", "c"]).save(&path).unwrap();

        let config = EngineConfig {
            table_path: path,
            k1: 1.2,
            ..EngineConfig::default()
        };
        let engine = SuggestionEngine::from_config(&config).unwrap();
        assert_eq!(engine.index().params().k1, 1.2);
        assert_eq!(engine.stats().num_docs, 2);
    }
}
