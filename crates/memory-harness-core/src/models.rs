//! Core data models shared by the keyword index, the fusion step, and
//! the vector retriever contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A unit of indexable content.
///
/// Documents are replaced wholesale on edit; the keyword index never
/// mutates one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable unique identifier.
    pub id: String,
    /// Raw text.
    pub content: String,
    /// Open key-value metadata (type, source path, section, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Builder-style helper for attaching a metadata entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A document with its BM25 score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

/// A candidate returned by a vector retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    /// Similarity as reported by the retriever. Fusion ignores it and
    /// only looks at rank position.
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl From<RetrievedDocument> for Document {
    fn from(r: RetrievedDocument) -> Self {
        Document {
            id: r.id,
            content: r.content,
            metadata: r.metadata,
        }
    }
}

/// Which retriever(s) surfaced a fused result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Bm25,
    Vector,
    Hybrid,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Bm25 => "bm25",
            ResultSource::Vector => "vector",
            ResultSource::Hybrid => "hybrid",
        }
    }
}

/// A single fused search result.
#[derive(Debug, Clone, Serialize)]
pub struct FusionResult {
    pub document: Document,
    /// Reciprocal-rank-fusion score.
    pub score: f64,
    pub source: ResultSource,
    /// 1-based rank in the BM25 list, if present there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_rank: Option<usize>,
    /// 1-based rank in the vector list, if present there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_rank: Option<usize>,
}

/// A chunk of a memory file's text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `"{source_path}#{chunk_index}"`.
    pub id: String,
    pub source_path: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}
