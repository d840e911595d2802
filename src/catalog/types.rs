//! Catalog record types.
//!
//! [`CatalogItem`] is a full metadata row; [`SearchHit`] pairs an item with its
//! similarity score so the two can never drift apart.

use serde::{Deserialize, Serialize};

/// One bottle cap in the catalog, matching the `caps` table minus the embedding blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable identity; upserts replace the row with the same id.
    pub id: i64,
    pub brand: String,
    /// Cap category (e.g. `"beer"`, `"soda"`).
    #[serde(rename = "type")]
    pub cap_type: String,
    /// Path or URI of the cap photo. Not guaranteed to exist on disk.
    #[serde(rename = "image")]
    pub image_ref: String,
}

impl CatalogItem {
    pub fn new(
        id: i64,
        brand: impl Into<String>,
        cap_type: impl Into<String>,
        image_ref: impl Into<String>,
    ) -> Self {
        Self {
            id,
            brand: brand.into(),
            cap_type: cap_type.into(),
            image_ref: image_ref.into(),
        }
    }
}

/// A similarity search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub item: CatalogItem,
    /// Cosine similarity in `[-1, 1]`; higher is more similar.
    pub score: f32,
}

/// Row counts reported by [`super::store::CatalogStore::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: u64,
    pub embedded: u64,
    pub missing_embedding: u64,
    /// Rows whose blob length does not match the configured dimension.
    pub corrupt_embedding: u64,
}
