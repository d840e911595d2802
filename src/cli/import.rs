//! CLI `import` command: load a JSON manifest into the catalog and embed new images.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use capdex::catalog::{open_store, CatalogItem, CatalogStore};
use capdex::config::CapdexConfig;
use capdex::embedding::{codec, create_provider, ImageEmbedder};

/// Per-run counters printed after an import.
#[derive(Debug, Default, PartialEq, Eq)]
struct ImportSummary {
    /// Items whose image was embedded in this run.
    embedded: usize,
    /// Items that took over an embedding already stored for the same image.
    reused: usize,
    /// Items skipped because their image file does not exist.
    missing: usize,
    /// Items stored without an embedding because their image could not be embedded.
    unembedded: usize,
}

/// Import caps from a manifest (the same shape `export` writes).
///
/// Items whose image file is missing are skipped. An image that already has a stored
/// embedding is not embedded again; its blob is copied onto every manifest row that
/// references it.
pub async fn import(config: &CapdexConfig, manifest: &Path) -> Result<()> {
    let json = std::fs::read_to_string(manifest)
        .with_context(|| format!("failed to read manifest: {}", manifest.display()))?;
    let items: Vec<CatalogItem> =
        serde_json::from_str(&json).context("failed to parse manifest JSON")?;

    let store = open_store(config)?;
    let embedder: Arc<dyn ImageEmbedder> = Arc::from(create_provider(&config.embedding)?);

    let summary = import_items(
        &store,
        embedder,
        items,
        &config.resolved_images_dir(),
        config.embedding.batch_size,
    )
    .await?;

    store.set_embedding_model(&config.embedding.model)?;

    println!("Import complete:");
    println!("  Embedded:                {}", summary.embedded);
    println!("  Reused embeddings:       {}", summary.reused);
    if summary.missing > 0 {
        println!("  Missing images:          {}", summary.missing);
    }
    if summary.unembedded > 0 {
        println!("  Stored without embedding: {}", summary.unembedded);
    }
    Ok(())
}

async fn import_items(
    store: &CatalogStore,
    embedder: Arc<dyn ImageEmbedder>,
    items: Vec<CatalogItem>,
    images_dir: &Path,
    batch_size: usize,
) -> Result<ImportSummary> {
    let stored = store.embeddings_by_image_ref(embedder.dimensions())?;
    let mut summary = ImportSummary::default();

    let mut reused = Vec::new();
    let mut to_embed = Vec::new();
    for item in items {
        let path = resolve_image(images_dir, &item.image_ref);
        if !path.is_file() {
            tracing::warn!(id = item.id, image = %path.display(), "image not found, skipping");
            summary.missing += 1;
        } else if let Some(blob) = stored.get(&item.image_ref) {
            reused.push((item, Some(blob.clone())));
        } else {
            to_embed.push((item, path));
        }
    }

    println!(
        "Importing {} caps ({} to embed)...",
        reused.len() + to_embed.len(),
        to_embed.len()
    );

    summary.reused = store.upsert_many(&reused)?;

    let batch_size = batch_size.max(1);
    let pb = ProgressBar::new(to_embed.len() as u64);
    while !to_embed.is_empty() {
        let rest = to_embed.split_off(batch_size.min(to_embed.len()));
        let batch = std::mem::replace(&mut to_embed, rest);
        let n = batch.len() as u64;

        let ep = Arc::clone(&embedder);
        let (rows, failed) =
            tokio::task::spawn_blocking(move || embed_batch(ep.as_ref(), batch)).await?;

        let stored_rows = store.upsert_many(&rows)?;
        summary.embedded += stored_rows - failed;
        summary.unembedded += failed;
        pb.inc(n);
    }
    pb.finish_and_clear();

    Ok(summary)
}

/// Image refs are taken as given when they exist, otherwise relative to `images_dir`.
fn resolve_image(images_dir: &Path, image_ref: &str) -> PathBuf {
    let path = Path::new(image_ref);
    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        images_dir.join(path)
    }
}

/// Embed one batch. If the batch fails as a whole, fall back to one image at a time so
/// a single bad file only loses its own embedding; that item is still stored, without
/// one. Returns the rows to store and how many of them carry no embedding.
fn embed_batch(
    embedder: &dyn ImageEmbedder,
    batch: Vec<(CatalogItem, PathBuf)>,
) -> (Vec<(CatalogItem, Option<Vec<u8>>)>, usize) {
    let paths: Vec<&Path> = batch.iter().map(|(_, p)| p.as_path()).collect();
    match embedder.embed_many(&paths) {
        Ok(matrix) => {
            let rows = batch
                .into_iter()
                .zip(matrix.rows())
                .map(|((item, _), row)| (item, Some(codec::encode(&row.to_vec()))))
                .collect();
            (rows, 0)
        }
        Err(e) => {
            tracing::warn!(error = %e, "batch embedding failed, retrying items one by one");
            let mut rows = Vec::with_capacity(batch.len());
            let mut failed = 0;
            for (item, path) in batch {
                match embedder.embed(&path) {
                    Ok(v) => rows.push((item, Some(codec::encode(&v)))),
                    Err(e) => {
                        tracing::warn!(id = item.id, error = %e, "failed to embed image, storing metadata only");
                        rows.push((item, None));
                        failed += 1;
                    }
                }
            }
            (rows, failed)
        }
    }
}
