//! The embedding seam and the vector math shared by the indexer and the
//! vector retriever.
//!
//! Network-backed providers live in the app crate; this module only fixes
//! the contract and how vectors are stored (`embedding_cache.vector` is a
//! little-endian `f32` BLOB).

use anyhow::{anyhow, Result};
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stored with every cached vector; vectors from another model are ignored.
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;

    /// `false` means indexing skips embedding and vector search yields nothing.
    fn is_enabled(&self) -> bool {
        true
    }

    /// One vector per input, same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let mut vectors = provider.embed(&[text.to_string()]).await?;
    if vectors.is_empty() {
        return Err(anyhow!(
            "embedding provider '{}' returned no vector",
            provider.model_name()
        ));
    }
    Ok(vectors.swap_remove(0))
}

/// ```rust
/// use memory_harness_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let blob = vec_to_blob(&[0.5, -1.0]);
/// assert_eq!(blob.len(), 8);
/// assert_eq!(blob_to_vec(&blob), vec![0.5, -1.0]);
/// ```
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Trailing bytes that do not form a whole `f32` are dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .filter_map(|b| <[u8; 4]>::try_from(b).ok())
        .map(f32::from_le_bytes)
        .collect()
}

/// `0.0` when the lengths differ, either side is empty, or either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, aa, bb) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, aa, bb), (x, y)| {
            (dot + x * y, aa + x * x, bb + y * y)
        });

    let norm = (aa * bb).sqrt();
    if norm < f32::EPSILON {
        0.0
    } else {
        dot / norm
    }
}
