//! Local ONNX Runtime image embedder.
//!
//! Implements [`ImageEmbedder`] over a MobileNetV3-Small feature-extractor export via
//! `ort`. Handles preprocessing, batched inference, global average pooling, and L2
//! normalization. The session is created on first use and reused for the life of the
//! embedder.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::preprocess::{load_image, preprocess};
use super::ImageEmbedder;
use crate::config::EmbeddingConfig;
use crate::error::{CapError, Result};

pub struct LocalImageEmbedder {
    model_path: PathBuf,
    input_name: String,
    dimensions: usize,
    resize: u32,
    crop: u32,
    intra_threads: usize,
    /// Loaded lazily; the mutex also serializes `run()`, which needs `&mut Session`.
    session: Mutex<Option<Session>>,
}

impl LocalImageEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        Self {
            model_path: model_path(&cache_dir, &config.model),
            input_name: config.input_name.clone(),
            dimensions: config.dimensions,
            resize: config.resize,
            crop: config.crop,
            intra_threads: config.intra_threads.max(1),
            session: Mutex::new(None),
        }
    }

    /// Whether the session has been created yet.
    pub fn is_loaded(&self) -> bool {
        self.session.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    fn load_session(&self) -> Result<Session> {
        if !self.model_path.exists() {
            return Err(CapError::Model(format!(
                "ONNX model not found at {}. Run `capdex model download` first.",
                self.model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(model_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .with_intra_threads(self.intra_threads)
            .map_err(model_err)?
            .commit_from_file(&self.model_path)
            .map_err(model_err)?;

        tracing::info!(model = %self.model_path.display(), "ONNX model loaded");
        Ok(session)
    }
}

/// Location of the ONNX export for `model` inside the cache directory.
pub fn model_path(cache_dir: &Path, model: &str) -> PathBuf {
    cache_dir.join(format!("{model}.onnx"))
}

fn model_err(e: impl std::fmt::Display) -> CapError {
    CapError::Model(e.to_string())
}

fn inference_err(e: impl std::fmt::Display) -> CapError {
    CapError::Inference(e.to_string())
}

impl ImageEmbedder for LocalImageEmbedder {
    fn embed_many(&self, images: &[&Path]) -> Result<Array2<f32>> {
        if images.is_empty() {
            return Ok(Array2::zeros((0, self.dimensions)));
        }

        // Step 1: decode and preprocess everything before touching the model
        let side = self.crop as usize;
        let mut pixels = Vec::with_capacity(images.len() * 3 * side * side);
        for path in images {
            let image = load_image(path)?;
            pixels.extend(preprocess(&image, self.resize, self.crop).iter().copied());
        }

        let shape = vec![images.len() as i64, 3, side as i64, side as i64];
        let input = Tensor::from_array((shape, pixels.into_boxed_slice())).map_err(inference_err)?;

        // Step 2: lazily create the session, then run inference
        let mut guard = self.session.lock().map_err(|_| CapError::LockPoisoned)?;
        if guard.is_none() {
            *guard = Some(self.load_session()?);
        }
        let session = guard
            .as_mut()
            .ok_or_else(|| CapError::Model("session not loaded".into()))?;

        let outputs = session
            .run(ort::inputs! { self.input_name.as_str() => input })
            .map_err(inference_err)?;

        // Step 3: pool feature maps and normalize. Output is [batch, C] or [batch, C, H, W]
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_err)?;
        let dims: &[i64] = &shape;

        let pooled = pool_features(dims, data, self.dimensions)?;
        if pooled.nrows() != images.len() {
            return Err(CapError::Inference(format!(
                "model returned {} rows for {} images",
                pooled.nrows(),
                images.len()
            )));
        }

        tracing::debug!(batch = images.len(), dims = self.dimensions, "embedded image batch");
        Ok(pooled)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Global-average-pool a `[N, C, H, W]` (or `[N, C]`) feature tensor to `[N, C]` and
/// L2-normalize every row. Zero rows are left as zero.
pub(crate) fn pool_features(dims: &[i64], data: &[f32], dimensions: usize) -> Result<Array2<f32>> {
    let (n, c, spatial) = match *dims {
        [n, c] => (n as usize, c as usize, 1),
        [n, c, h, w] => (n as usize, c as usize, (h * w) as usize),
        _ => {
            return Err(CapError::Inference(format!(
                "unexpected feature shape {dims:?}, expected [batch, {dimensions}, h, w]"
            )))
        }
    };
    if c != dimensions {
        return Err(CapError::Inference(format!(
            "model produced {c} features, configured for {dimensions}"
        )));
    }
    if spatial == 0 || data.len() != n * c * spatial {
        return Err(CapError::Inference(format!(
            "feature tensor holds {} values, shape {dims:?}",
            data.len()
        )));
    }

    let mut pooled = Array2::<f32>::zeros((n, c));
    for b in 0..n {
        for ch in 0..c {
            let offset = (b * c + ch) * spatial;
            let sum: f32 = data[offset..offset + spatial].iter().sum();
            pooled[[b, ch]] = sum / spatial as f32;
        }
    }

    for mut row in pooled.rows_mut() {
        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|x| x / norm);
        }
    }

    Ok(pooled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn test_config(cache_dir: &Path) -> EmbeddingConfig {
        EmbeddingConfig {
            cache_dir: cache_dir.to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    fn row_norm(m: &Array2<f32>, i: usize) -> f32 {
        m.row(i).iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn pool_averages_spatial_positions() {
        // batch 1, 2 channels, 2x2 map
        let data = [1.0, 1.0, 1.0, 1.0, 3.0, 5.0, 3.0, 5.0];
        let pooled = pool_features(&[1, 2, 2, 2], &data, 2).unwrap();
        // means are [1, 4] → normalized [1/√17, 4/√17]
        let norm = 17.0f32.sqrt();
        assert!((pooled[[0, 0]] - 1.0 / norm).abs() < 1e-6);
        assert!((pooled[[0, 1]] - 4.0 / norm).abs() < 1e-6);
    }

    #[test]
    fn pool_accepts_pre_pooled_output() {
        let data = [3.0, 4.0, 0.0, 2.0];
        let pooled = pool_features(&[2, 2], &data, 2).unwrap();
        assert_eq!(pooled.shape(), &[2, 2]);
        assert!((row_norm(&pooled, 0) - 1.0).abs() < 1e-6);
        assert!((pooled[[1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn pool_keeps_degenerate_rows_zero() {
        let pooled = pool_features(&[1, 3, 1, 1], &[0.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(pooled.row(0).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn pool_rejects_wrong_width() {
        let err = pool_features(&[1, 4], &[1.0; 4], 576).unwrap_err();
        assert!(err.to_string().contains("configured for 576"));
    }

    #[test]
    fn pool_rejects_unexpected_rank() {
        assert!(pool_features(&[1, 2, 3], &[0.0; 6], 2).is_err());
    }

    #[test]
    fn empty_batch_skips_model_load() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = LocalImageEmbedder::new(&test_config(dir.path()));
        let matrix = embedder.embed_many(&[]).unwrap();
        assert_eq!(matrix.shape(), &[0, 576]);
        assert!(!embedder.is_loaded());
    }

    #[test]
    fn undecodable_image_fails_before_model_load() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("cap.jpg");
        std::fs::write(&bogus, b"not an image").unwrap();

        let embedder = LocalImageEmbedder::new(&test_config(dir.path()));
        let err = embedder.embed(&bogus).unwrap_err();
        assert!(matches!(err, CapError::Decode { .. }));
    }

    #[test]
    fn missing_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cap.png");
        RgbImage::from_pixel(32, 32, Rgb([200, 30, 30])).save(&path).unwrap();

        let embedder = LocalImageEmbedder::new(&test_config(dir.path()));
        let err = embedder.embed(&path).unwrap_err();
        assert!(matches!(err, CapError::Model(_)));
        assert!(err.to_string().contains("capdex model download"));
    }

    fn installed_config() -> EmbeddingConfig {
        EmbeddingConfig::default()
    }

    #[test]
    #[ignore] // Requires model files. Run with: cargo test -- --ignored
    fn test_embed_produces_unit_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let red = dir.path().join("red.png");
        let blue = dir.path().join("blue.png");
        RgbImage::from_pixel(300, 300, Rgb([220, 20, 20])).save(&red).unwrap();
        RgbImage::from_pixel(300, 300, Rgb([20, 20, 220])).save(&blue).unwrap();

        let embedder = LocalImageEmbedder::new(&installed_config());
        let matrix = embedder.embed_many(&[red.as_path(), blue.as_path()]).unwrap();
        assert_eq!(matrix.shape(), &[2, 576]);
        for i in 0..2 {
            assert!((row_norm(&matrix, i) - 1.0).abs() < 1e-4);
        }
        assert!(embedder.is_loaded());
    }

    #[test]
    #[ignore]
    fn test_embed_consistency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cap.png");
        RgbImage::from_pixel(256, 256, Rgb([90, 160, 40])).save(&path).unwrap();

        let embedder = LocalImageEmbedder::new(&installed_config());
        let single = embedder.embed(&path).unwrap();
        let batched = embedder.embed_many(&[path.as_path()]).unwrap();
        for (a, b) in single.iter().zip(batched.row(0).iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
