//! Bottle-cap catalog: persistent metadata, the in-memory similarity index, and search.
//!
//! The pieces share one [`IndexCache`]: [`CatalogStore`] invalidates it on every write,
//! and [`SearchEngine`] rebuilds it on demand before ranking.

pub mod index;
pub mod search;
pub mod store;
pub mod types;

pub use index::{IndexCache, IndexSnapshot};
pub use search::SearchEngine;
pub use store::CatalogStore;
pub use types::{CatalogItem, CatalogStats, SearchHit};

use std::sync::Arc;

use crate::config::CapdexConfig;

/// Open the configured database and wire a store to a fresh, empty index cache.
pub fn open_store(config: &CapdexConfig) -> anyhow::Result<Arc<CatalogStore>> {
    let conn = crate::db::open_database(config.resolved_db_path())?;
    let index = Arc::new(IndexCache::new(config.embedding.dimensions));
    Ok(Arc::new(CatalogStore::new(conn, index)))
}
