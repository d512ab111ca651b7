//! Python bindings for the suggestion engine

use pyo3::exceptions::{PyIOError, PyUserWarning, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use suggest_core::{
    BM25Params, FileSink, LedgerSink, NoopSink, SuggestError, Suggestion as CoreSuggestion,
    SuggestionEngine as CoreEngine, SuggestionTable,
};

fn to_py_err(err: SuggestError) -> PyErr {
    match err {
        SuggestError::Persistence { .. } | SuggestError::Load { .. } => {
            PyIOError::new_err(err.to_string())
        }
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python-exposed ranked suggestion
#[pyclass]
#[derive(Clone)]
pub struct Suggestion {
    #[pyo3(get)]
    pub text: String,
    #[pyo3(get)]
    pub score: f64,
}

impl From<CoreSuggestion> for Suggestion {
    fn from(result: CoreSuggestion) -> Self {
        Self {
            text: result.text,
            score: result.score,
        }
    }
}

#[pymethods]
impl Suggestion {
    fn __repr__(&self) -> String {
        format!("Suggestion(text='{}', score={:.4})", self.text, self.score)
    }

    fn to_dict(&self) -> HashMap<String, PyObject> {
        Python::with_gil(|py| {
            let mut map = HashMap::new();
            map.insert("text".to_string(), self.text.to_object(py));
            map.insert("score".to_string(), self.score.to_object(py));
            map
        })
    }
}

/// Python-exposed suggestion engine
#[pyclass]
pub struct SuggestionEngine {
    engine: CoreEngine,
}

#[pymethods]
impl SuggestionEngine {
    /// Open a suggestion table; selections are written back to it
    ///
    /// Args:
    ///     path: Table file with a `suggestion` column
    ///     k1: Term frequency saturation (default: 1.5)
    ///     b: Length normalization (default: 0.75)
    #[new]
    #[pyo3(signature = (path, k1=1.5, b=0.75))]
    fn new(path: PathBuf, k1: f64, b: f64) -> PyResult<Self> {
        let engine = CoreEngine::open(path, BM25Params { k1, b }).map_err(to_py_err)?;
        Ok(Self { engine })
    }

    /// Build from a list of suggestions
    ///
    /// Args:
    ///     suggestions: Suggestion texts, all counts start at zero
    ///     path: Where selections are persisted (default: nowhere)
    #[staticmethod]
    #[pyo3(signature = (suggestions, path=None, k1=1.5, b=0.75))]
    fn from_suggestions(
        suggestions: Vec<String>,
        path: Option<PathBuf>,
        k1: f64,
        b: f64,
    ) -> PyResult<Self> {
        let sink: Box<dyn LedgerSink> = match path {
            Some(path) => Box::new(FileSink::new(path)),
            None => Box::new(NoopSink),
        };
        let table = SuggestionTable::from_suggestions(suggestions);
        let engine = CoreEngine::new(table, BM25Params { k1, b }, sink).map_err(to_py_err)?;
        Ok(Self { engine })
    }

    /// Rank suggestions for a query
    ///
    /// Args:
    ///     query: Search text
    ///     top_k: Number of suggestions; negative values return nothing
    ///     min_score: Minimum score, inclusive (default: 0)
    ///
    /// Returns:
    ///     List of Suggestion objects, best first
    #[pyo3(signature = (query, top_k=5, min_score=0.0))]
    fn suggest(&self, py: Python<'_>, query: &str, top_k: i64, min_score: f64) -> Vec<Suggestion> {
        let top_k = usize::try_from(top_k).unwrap_or(0);
        py.allow_threads(|| self.engine.suggest(query, top_k, min_score))
            .into_iter()
            .map(Suggestion::from)
            .collect()
    }

    /// Score one corpus entry
    fn score(&self, query: &str, doc_index: usize) -> PyResult<f64> {
        self.engine.score(query, doc_index).map_err(to_py_err)
    }

    /// Count a selection and persist it
    ///
    /// Returns False if the suggestion is unknown. Raises IOError if the
    /// table cannot be written.
    fn record_selection(&self, py: Python<'_>, text: &str) -> PyResult<bool> {
        py.allow_threads(|| self.engine.record_selection(text))
            .map_err(to_py_err)
    }

    /// Selection counts as (text, count) tuples, most selected first
    fn statistics(&self) -> PyResult<Vec<(String, u64)>> {
        let stats = self.engine.statistics().map_err(to_py_err)?;
        Ok(stats.into_iter().map(|s| (s.text, s.count)).collect())
    }

    /// Selection counts as a JSON array of {text, count}
    fn statistics_json(&self) -> PyResult<String> {
        let stats = self.engine.statistics().map_err(to_py_err)?;
        serde_json::to_string(&stats).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Write the table to `path`
    ///
    /// Returns False instead of raising on failure; the cause is issued as
    /// a UserWarning.
    fn export(&self, py: Python<'_>, path: PathBuf) -> PyResult<bool> {
        match py.allow_threads(|| self.engine.export(&path)) {
            Ok(()) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Error writing table to {:?}: {}", path, message);
                let category = py.get_type_bound::<PyUserWarning>();
                PyErr::warn_bound(py, category.as_any(), &message, 1)?;
                Ok(false)
            }
        }
    }

    /// Get index statistics
    ///
    /// Returns:
    ///     Dictionary with num_docs, num_terms, avg_doc_len
    fn stats(&self) -> HashMap<String, PyObject> {
        let stats = self.engine.stats();
        Python::with_gil(|py| {
            let mut map = HashMap::new();
            map.insert("num_docs".to_string(), stats.num_docs.to_object(py));
            map.insert("num_terms".to_string(), stats.num_terms.to_object(py));
            map.insert("avg_doc_len".to_string(), stats.avg_doc_len.to_object(py));
            map
        })
    }

    fn __len__(&self) -> usize {
        self.engine.index().num_docs()
    }

    fn __repr__(&self) -> String {
        let stats = self.engine.stats();
        format!(
            "SuggestionEngine(num_docs={}, num_terms={}, avg_doc_len={:.2})",
            stats.num_docs, stats.num_terms, stats.avg_doc_len
        )
    }
}

/// Python module
#[pymodule]
fn suggest_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<SuggestionEngine>()?;
    m.add_class::<Suggestion>()?;
    Ok(())
}
