//! Bottle-cap catalog with visual similarity search.
//!
//! capdex keeps a collection of caps (id, brand, type, photo) in SQLite together with a
//! compact image embedding per cap, and answers "which caps look like this photo?" by
//! cosine similarity against an in-memory matrix of those embeddings.
//!
//! # Architecture
//!
//! - **Storage**: SQLite via `rusqlite`; embeddings are half-precision little-endian blobs
//! - **Embeddings**: Local ONNX Runtime with MobileNetV3-Small features (576 dimensions)
//! - **Search**: Exhaustive dot product over L2-normalized rows, rebuilt lazily after writes
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files and environment variables
//! - [`db`] - SQLite database initialization, schema, and migrations
//! - [`embedding`] - Image-to-vector pipeline and the `f16` embedding codec
//! - [`catalog`] - Catalog store, in-memory index, and similarity search
//! - [`error`] - Library error type

pub mod catalog;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
