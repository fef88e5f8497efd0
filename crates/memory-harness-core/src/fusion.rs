//! Reciprocal Rank Fusion (RRF) of keyword and vector result lists.
//!
//! Raw BM25 scores and cosine similarities live on different scales, so
//! fusion looks only at each document's 1-based rank in each list:
//!
//! ```text
//! score(d) = text_weight / (rrf_k + rank_bm25(d)) + vector_weight / (rrf_k + rank_vector(d))
//! ```
//!
//! A document missing from a list contributes nothing for that list.
//! Every document from either list appears exactly once in the output.
//! Equal fused scores keep first-appearance order, scanning the BM25 list
//! before the vector list.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Document, FusionResult, ResultSource, RetrievedDocument, ScoredDocument};

/// Fusion weights and the RRF smoothing constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionWeights {
    pub vector_weight: f64,
    pub text_weight: f64,
    pub rrf_k: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector_weight: 0.6,
            text_weight: 0.4,
            rrf_k: 60.0,
        }
    }
}

struct Entry {
    document: Document,
    score: f64,
    bm25_rank: Option<usize>,
    vector_rank: Option<usize>,
}

/// Fuse BM25 and vector results. Both inputs must already be sorted
/// best-first; the output is sorted by fused score, descending.
pub fn rrf_fuse(
    bm25: &[ScoredDocument],
    vector: &[RetrievedDocument],
    weights: FusionWeights,
) -> Vec<FusionResult> {
    let mut entries: Vec<Entry> = Vec::with_capacity(bm25.len() + vector.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (i, hit) in bm25.iter().enumerate() {
        let rank = i + 1;
        let contribution = weights.text_weight / (weights.rrf_k + rank as f64);
        // A retriever may repeat an id; only the best rank counts.
        if positions.contains_key(&hit.document.id) {
            continue;
        }
        positions.insert(hit.document.id.clone(), entries.len());
        entries.push(Entry {
            document: hit.document.clone(),
            score: contribution,
            bm25_rank: Some(rank),
            vector_rank: None,
        });
    }

    for (i, hit) in vector.iter().enumerate() {
        let rank = i + 1;
        let contribution = weights.vector_weight / (weights.rrf_k + rank as f64);
        match positions.get(&hit.id) {
            Some(&pos) => {
                let entry = &mut entries[pos];
                if entry.vector_rank.is_none() {
                    entry.vector_rank = Some(rank);
                    entry.score += contribution;
                }
            }
            None => {
                positions.insert(hit.id.clone(), entries.len());
                entries.push(Entry {
                    document: hit.clone().into(),
                    score: contribution,
                    bm25_rank: None,
                    vector_rank: Some(rank),
                });
            }
        }
    }

    let mut results: Vec<FusionResult> = entries
        .into_iter()
        .map(|e| {
            let source = match (e.bm25_rank, e.vector_rank) {
                (Some(_), Some(_)) => ResultSource::Hybrid,
                (None, Some(_)) => ResultSource::Vector,
                _ => ResultSource::Bm25,
            };
            FusionResult {
                document: e.document,
                score: e.score,
                source,
                bm25_rank: e.bm25_rank,
                vector_rank: e.vector_rank,
            }
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results
}
