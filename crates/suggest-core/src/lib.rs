//! Suggest Core - BM25 ranked suggestions with selection accounting
//!
//! This library ranks a fixed corpus of short suggestions against free-text
//! queries and keeps per-suggestion selection counts in a columnar table
//! file.

pub mod bm25;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod persist;
pub mod table;
pub mod tokenizer;
pub mod varint;

pub use bm25::{BM25Index, BM25Params, BM25Scorer, IndexStats, Suggestion};
pub use config::EngineConfig;
pub use engine::SuggestionEngine;
pub use error::{Result, SuggestError};
pub use ledger::{SelectionLedger, SelectionStat};
pub use persist::{FileSink, LedgerSink, NoopSink};
pub use table::{Column, ColumnData, SuggestionTable, TableFormat};
pub use tokenizer::Tokenizer;
