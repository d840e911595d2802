//! Error taxonomy for the catalog core.
//!
//! Library modules return [`Result`] over [`CapError`]; the CLI layer wraps these in
//! `anyhow` with additional context.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapError {
    /// The image could not be opened or decoded.
    #[error("failed to decode image {}: {}", .path.display(), .source)]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A stored embedding blob does not have `2 * D` bytes.
    #[error("corrupt embedding: expected {expected} bytes, got {actual}")]
    CorruptEmbedding { expected: usize, actual: usize },

    /// A query vector does not match the index width.
    #[error("query has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The feature extractor could not be loaded.
    #[error("embedding model unavailable: {0}")]
    Model(String),

    /// The feature extractor failed while running.
    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error("catalog lock poisoned")]
    LockPoisoned,
}

pub type Result<T, E = CapError> = std::result::Result<T, E>;
