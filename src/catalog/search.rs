//! Similarity search over the in-memory index.
//!
//! Scores are cosine similarities: index rows are unit vectors and the query is
//! normalized here, so a single matrix-vector product gives every score.

use std::path::Path;
use std::sync::Arc;

use ndarray::ArrayView1;

use super::index::IndexSnapshot;
use super::store::CatalogStore;
use super::types::SearchHit;
use crate::embedding::{l2_normalize, ImageEmbedder};
use crate::error::{CapError, Result};

/// Rank every row of `snapshot` against `query` and return the `top_k` best.
///
/// Results are ordered by descending score; ties keep row order. An empty snapshot or
/// `top_k == 0` yields an empty result.
pub fn rank(snapshot: &IndexSnapshot, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
    if snapshot.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }
    if query.len() != snapshot.dimensions() {
        return Err(CapError::DimensionMismatch {
            expected: snapshot.dimensions(),
            actual: query.len(),
        });
    }

    // Callers may hand in raw vectors; only unit-norm operands make dot == cosine.
    let query = l2_normalize(query);
    let scores = snapshot.matrix().dot(&ArrayView1::from(query.as_slice()));

    let mut order: Vec<usize> = (0..scores.len()).collect();
    // stable: lower row index wins ties
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(top_k);

    let items = snapshot.items();
    Ok(order
        .into_iter()
        .map(|i| SearchHit {
            item: items[i].clone(),
            score: scores[i],
        })
        .collect())
}

/// Visual similarity search over the catalog.
pub struct SearchEngine {
    store: Arc<CatalogStore>,
    embedder: Arc<dyn ImageEmbedder>,
}

impl SearchEngine {
    pub fn new(store: Arc<CatalogStore>, embedder: Arc<dyn ImageEmbedder>) -> Self {
        Self { store, embedder }
    }

    /// Rank the catalog against an already computed query embedding.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let snapshot = self.store.index().ensure_loaded(&self.store)?;
        rank(&snapshot, query, top_k)
    }

    /// Embed `image` and rank the catalog against it.
    ///
    /// When no item has an embedding yet the query image is not embedded at all.
    pub fn search_by_image(&self, image: &Path, top_k: usize) -> Result<Vec<SearchHit>> {
        let snapshot = self.store.index().ensure_loaded(&self.store)?;
        if snapshot.is_empty() {
            tracing::debug!("index has no embedded items, skipping query embedding");
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(image)?;
        let hits = rank(&snapshot, &query, top_k)?;
        tracing::debug!(
            query = %image.display(),
            indexed = snapshot.len(),
            returned = hits.len(),
            "image search complete"
        );
        Ok(hits)
    }
}
