//! BM25 scoring and ranked retrieval over a fixed suggestion corpus

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SuggestError};
use crate::tokenizer::Tokenizer;

/// BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BM25Params {
    /// Term frequency saturation
    pub k1: f64,
    /// Length normalization strength, conventionally in [0, 1]
    pub b: f64,
}

impl Default for BM25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl BM25Params {
    /// Reject negative or non-finite parameters
    pub fn validate(&self) -> Result<()> {
        let ok = |v: f64| v.is_finite() && v >= 0.0;
        if ok(self.k1) && ok(self.b) {
            Ok(())
        } else {
            Err(SuggestError::InvalidParams {
                k1: self.k1,
                b: self.b,
            })
        }
    }
}

/// BM25 scorer for calculating relevance scores
#[derive(Debug, Clone)]
pub struct BM25Scorer {
    params: BM25Params,
    avg_doc_len: f64,
    doc_count: usize,
}

impl BM25Scorer {
    /// Create a new BM25 scorer
    pub fn new(params: BM25Params, avg_doc_len: f64, doc_count: usize) -> Self {
        Self {
            params,
            avg_doc_len,
            doc_count,
        }
    }

    /// Calculate IDF (inverse document frequency)
    ///
    /// The `+ 1.0` inside the log keeps the weight non-negative even for
    /// terms present in every document.
    pub fn idf(&self, doc_freq: usize) -> f64 {
        let n = self.doc_count as f64;
        let df = doc_freq as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score contribution of one term in one document
    ///
    /// Returns 0 when the average document length is 0, i.e. the corpus has
    /// no tokens at all.
    pub fn score_term(&self, idf: f64, term_freq: f64, doc_len: f64) -> f64 {
        if self.avg_doc_len == 0.0 || term_freq == 0.0 {
            return 0.0;
        }
        let BM25Params { k1, b } = self.params;
        let tf_component = (term_freq * (k1 + 1.0))
            / (term_freq + k1 * (1.0 - b + b * (doc_len / self.avg_doc_len)));
        idf * tf_component
    }

    pub fn params(&self) -> BM25Params {
        self.params
    }

    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }
}

/// A ranked suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub score: f64,
}

/// BM25 index over an immutable corpus
///
/// Documents are identified by their position in the corpus. Everything is
/// computed once in [`BM25Index::build`]; a different corpus needs a new
/// index.
#[derive(Debug, Clone)]
pub struct BM25Index {
    tokenizer: Tokenizer,
    scorer: BM25Scorer,

    documents: Vec<String>,
    doc_freqs: Vec<AHashMap<String, u32>>, // per document: term -> count
    doc_lens: Vec<u32>,
    idf: AHashMap<String, f64>,
}

impl BM25Index {
    /// Build an index with default parameters
    pub fn new(documents: Vec<String>) -> Self {
        Self::index(documents, BM25Params::default())
    }

    /// Build an index with custom parameters
    pub fn build(documents: Vec<String>, params: BM25Params) -> Result<Self> {
        params.validate()?;
        Ok(Self::index(documents, params))
    }

    fn index(documents: Vec<String>, params: BM25Params) -> Self {
        let tokenizer = Tokenizer::new();
        let mut doc_freqs = Vec::with_capacity(documents.len());
        let mut doc_lens = Vec::with_capacity(documents.len());
        let mut containing: AHashMap<String, usize> = AHashMap::new();
        let mut total_len: u64 = 0;

        for doc in &documents {
            let tokens = tokenizer.tokenize(doc);
            doc_lens.push(tokens.len() as u32);
            total_len += tokens.len() as u64;

            let mut freqs: AHashMap<String, u32> = AHashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *containing.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let avg_doc_len = if documents.is_empty() {
            0.0
        } else {
            total_len as f64 / documents.len() as f64
        };
        let scorer = BM25Scorer::new(params, avg_doc_len, documents.len());

        let idf: AHashMap<String, f64> = containing
            .into_iter()
            .map(|(term, df)| {
                let weight = scorer.idf(df);
                (term, weight)
            })
            .collect();

        tracing::debug!(
            "Built BM25 index: {} docs, {} terms, avg_doc_len={:.3}",
            documents.len(),
            idf.len(),
            avg_doc_len
        );

        Self {
            tokenizer,
            scorer,
            documents,
            doc_freqs,
            doc_lens,
            idf,
        }
    }

    /// Score a single document for a query
    pub fn score(&self, query: &str, doc_index: usize) -> Result<f64> {
        if doc_index >= self.documents.len() {
            return Err(SuggestError::DocumentOutOfRange {
                index: doc_index,
                len: self.documents.len(),
            });
        }
        let query_tokens = self.tokenizer.tokenize(query);
        Ok(self.score_document(doc_index, &query_tokens))
    }

    /// Score a document against already tokenized query terms
    fn score_document(&self, doc_index: usize, query_tokens: &[String]) -> f64 {
        let freqs = &self.doc_freqs[doc_index];
        let doc_len = self.doc_lens[doc_index] as f64;

        let mut score = 0.0;
        for token in query_tokens {
            // Tokens outside the vocabulary contribute nothing
            let Some(&idf) = self.idf.get(token) else {
                continue;
            };
            if let Some(&term_freq) = freqs.get(token) {
                score += self.scorer.score_term(idf, term_freq as f64, doc_len);
            }
        }
        score
    }

    /// Return up to `top_k` documents scoring at least `min_score`
    ///
    /// Results are sorted by descending score. Equal scores keep corpus order.
    pub fn suggest(&self, query: &str, top_k: usize, min_score: f64) -> Vec<Suggestion> {
        if top_k == 0 {
            return Vec::new();
        }
        let query_tokens = self.tokenizer.tokenize(query);

        let mut scores: Vec<Suggestion> = self
            .documents
            .iter()
            .enumerate()
            .filter_map(|(doc_index, text)| {
                let score = self.score_document(doc_index, &query_tokens);
                (score >= min_score).then(|| Suggestion {
                    text: text.clone(),
                    score,
                })
            })
            .collect();

        // Stable sort: ties stay in corpus order
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores.truncate(top_k);
        scores
    }

    /// IDF weight of a token, if it occurs anywhere in the corpus
    pub fn idf(&self, token: &str) -> Option<f64> {
        self.idf.get(token).copied()
    }

    /// Occurrences of `token` in document `doc_index`
    pub fn term_frequency(&self, doc_index: usize, token: &str) -> u32 {
        self.doc_freqs
            .get(doc_index)
            .and_then(|f| f.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Token count of document `doc_index`
    pub fn doc_len(&self, doc_index: usize) -> Option<u32> {
        self.doc_lens.get(doc_index).copied()
    }

    pub fn num_docs(&self) -> usize {
        self.documents.len()
    }

    pub fn avg_doc_len(&self) -> f64 {
        self.scorer.avg_doc_len()
    }

    pub fn params(&self) -> BM25Params {
        self.scorer.params()
    }

    /// Get index statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_docs: self.documents.len(),
            num_terms: self.idf.len(),
            avg_doc_len: self.scorer.avg_doc_len(),
        }
    }
}

/// Index statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub num_terms: usize,
    pub avg_doc_len: f64,
}
