use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use capdex::catalog::{open_store, SearchEngine};
use capdex::config::CapdexConfig;
use capdex::embedding::{create_provider, ImageEmbedder};

/// Find the caps most similar to `image` and print them.
pub async fn search(
    config: &CapdexConfig,
    image: PathBuf,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    anyhow::ensure!(image.is_file(), "query image not found: {}", image.display());

    let store = open_store(config)?;
    let embedder: Arc<dyn ImageEmbedder> = Arc::from(create_provider(&config.embedding)?);
    let engine = SearchEngine::new(store, embedder);
    let top_k = top_k.unwrap_or(config.search.default_top_k);

    let hits = tokio::task::spawn_blocking(move || engine.search_by_image(&image, top_k))
        .await?
        .context("search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "  {}. [{:.4}] #{} {} ({})",
            i + 1,
            hit.score,
            hit.item.id,
            hit.item.brand,
            hit.item.cap_type,
        );
        println!("     {}", hit.item.image_ref);
    }

    Ok(())
}
