//! Image-to-vector embedding pipeline.
//!
//! Provides the [`ImageEmbedder`] trait, a local ONNX Runtime implementation over a
//! MobileNetV3-Small feature extractor (576 dimensions, L2-normalized), and the
//! half-precision [`codec`] used to store vectors compactly.

pub mod codec;
pub mod local;
pub mod preprocess;

use std::path::Path;

use ndarray::Array2;

use crate::error::Result;

/// Feature width of MobileNetV3-Small's last convolutional stage.
pub const EMBEDDING_DIM: usize = 576;

/// Trait for embedding images into vectors.
///
/// Implementations produce L2-normalized vectors of exactly [`ImageEmbedder::dimensions`]
/// elements (or the zero vector for a degenerate feature map). All methods are
/// synchronous; callers in async contexts should use `tokio::task::spawn_blocking`.
pub trait ImageEmbedder: Send + Sync {
    /// Embed a batch of images into an `(N, D)` matrix whose row `i` belongs to `images[i]`.
    ///
    /// Fails as a whole if any image cannot be decoded.
    fn embed_many(&self, images: &[&Path]) -> Result<Array2<f32>>;

    /// Embed a single image.
    fn embed(&self, image: &Path) -> Result<Vec<f32>> {
        let matrix = self.embed_many(&[image])?;
        Ok(matrix.row(0).to_vec())
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an image embedder from config.
///
/// Currently only `"local"` is supported (ONNX Runtime). The model itself is loaded on
/// first use, so this succeeds even before `capdex model download` has been run.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Box<dyn ImageEmbedder>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::LocalImageEmbedder::new(config))),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Cosine similarity computed explicitly from both norms. Zero when either side is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
