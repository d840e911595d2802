#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use capdex::catalog::{CatalogItem, CatalogStore, IndexCache};
use capdex::embedding::{codec, ImageEmbedder};
use capdex::error::{CapError, Result};
use ndarray::Array2;

/// A store over a fresh in-memory database, indexing `dimensions`-wide embeddings.
pub fn test_store(dimensions: usize) -> Arc<CatalogStore> {
    let conn = capdex::db::open_memory_database().unwrap();
    let index = Arc::new(IndexCache::new(dimensions));
    Arc::new(CatalogStore::new(conn, index))
}

pub fn cap(id: i64, brand: &str) -> CatalogItem {
    CatalogItem::new(id, brand, "soda", format!("{id}.jpg"))
}

/// Deterministic unit vector with a spike at `seed % dimensions`.
pub fn spike(dimensions: usize, seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimensions];
    v[seed % dimensions] = 1.0;
    v
}

/// Encoded blob for `v`, ready for `CatalogStore::upsert`.
pub fn blob(v: &[f32]) -> Vec<u8> {
    codec::encode(v)
}

/// Write a solid-color PNG into `dir` and return its path.
pub fn write_png(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_pixel(32, 24, image::Rgb(rgb))
        .save(&path)
        .unwrap();
    path
}

/// Embedder that looks vectors up by file name and counts how many images it was asked for.
pub struct StubEmbedder {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, file_name: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(file_name.to_string(), vector);
        self
    }

    /// Number of images embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageEmbedder for StubEmbedder {
    fn embed_many(&self, images: &[&Path]) -> Result<Array2<f32>> {
        self.calls.fetch_add(images.len(), Ordering::SeqCst);
        let mut out = Array2::zeros((images.len(), self.dimensions));
        for (i, path) in images.iter().enumerate() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let v = self
                .vectors
                .get(name)
                .ok_or_else(|| CapError::Inference(format!("no stub vector for {name}")))?;
            for (j, x) in capdex::embedding::l2_normalize(v).into_iter().enumerate() {
                out[[i, j]] = x;
            }
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
