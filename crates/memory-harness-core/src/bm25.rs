//! In-memory Okapi BM25 keyword index.
//!
//! The index is derived state: [`Bm25Search::index_documents`] always
//! replaces it wholesale, and nothing is persisted. After a restart the
//! caller re-indexes from the source of truth.
//!
//! # Scoring
//!
//! ```text
//! score(D, Q) = Σ_{t ∈ Q} IDF(t) · f(t,D)·(k1 + 1) / (f(t,D) + k1·(1 − b + b·|D|/avgdl))
//! IDF(t)      = ln((N − df(t) + 0.5) / (df(t) + 0.5) + 1)
//! ```
//!
//! Query terms are de-duplicated before scoring. Documents sharing no
//! term with the query are excluded. Ties keep insertion order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{Document, ScoredDocument};
use crate::tokenize::tokenize;

/// Tunable BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length normalization strength, in `[0, 1]`.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Index statistics for observability and tests.
#[derive(Debug, Clone, Serialize)]
pub struct Bm25Stats {
    pub document_count: usize,
    pub avg_doc_length: f64,
    pub k1: f64,
    pub b: f64,
}

struct IndexedDocument {
    document: Document,
    term_freqs: HashMap<String, u32>,
    length: usize,
}

/// BM25 search over an in-memory document set.
pub struct Bm25Search {
    params: Bm25Params,
    docs: Vec<IndexedDocument>,
    doc_freqs: HashMap<String, usize>,
    avg_doc_length: f64,
}

impl Default for Bm25Search {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}

impl Bm25Search {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            docs: Vec::new(),
            doc_freqs: HashMap::new(),
            avg_doc_length: 0.0,
        }
    }

    /// Replace the entire index with `documents`.
    pub fn index_documents(&mut self, documents: Vec<Document>) {
        let mut docs = Vec::with_capacity(documents.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0usize;

        for document in documents {
            let tokens = tokenize(&document.content);
            let length = tokens.len();
            total_length += length;

            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }

            docs.push(IndexedDocument {
                document,
                term_freqs,
                length,
            });
        }

        self.avg_doc_length = if docs.is_empty() {
            0.0
        } else {
            total_length as f64 / docs.len() as f64
        };
        self.docs = docs;
        self.doc_freqs = doc_freqs;
    }

    /// Rank indexed documents against `query`, returning at most `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredDocument> {
        if limit == 0 || self.docs.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let idfs: Vec<(&str, f64)> = terms
            .iter()
            .filter_map(|t| self.doc_freqs.get(t).map(|&df| (t.as_str(), self.idf(df))))
            .collect();
        if idfs.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .docs
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                let score = self.score(doc, &idfs);
                (score > 0.0).then_some((i, score))
            })
            .collect();

        // `sort_by` is stable, so equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(i, score)| ScoredDocument {
                document: self.docs[i].document.clone(),
                score,
            })
            .collect()
    }

    pub fn stats(&self) -> Bm25Stats {
        Bm25Stats {
            document_count: self.docs.len(),
            avg_doc_length: self.avg_doc_length,
            k1: self.params.k1,
            b: self.params.b,
        }
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn idf(&self, df: usize) -> f64 {
        let n = self.docs.len() as f64;
        let df = df as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score(&self, doc: &IndexedDocument, idfs: &[(&str, f64)]) -> f64 {
        let Bm25Params { k1, b } = self.params;
        let length_ratio = if self.avg_doc_length > 0.0 {
            doc.length as f64 / self.avg_doc_length
        } else {
            0.0
        };

        idfs.iter()
            .filter_map(|(term, idf)| {
                let tf = *doc.term_freqs.get(*term)? as f64;
                let denom = tf + k1 * (1.0 - b + b * length_ratio);
                Some(idf * tf * (k1 + 1.0) / denom)
            })
            .sum()
    }
}
