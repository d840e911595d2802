//! Half-precision storage encoding for embeddings.
//!
//! Vectors are computed in `f32` and stored as a flat little-endian buffer of `f16`
//! values, `2 * D` bytes per row. The round trip keeps roughly three significant
//! digits, enough for ranking but not for exact reproduction.

use half::f16;

use crate::error::{CapError, Result};

/// Bytes per stored element.
pub const BYTES_PER_DIM: usize = 2;

/// Encode a full-precision vector as little-endian `f16` bytes.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * BYTES_PER_DIM);
    for &x in vector {
        bytes.extend_from_slice(&f16::from_f32(x).to_le_bytes());
    }
    bytes
}

/// Decode `2 * dimensions` bytes back into an `f32` vector.
pub fn decode(bytes: &[u8], dimensions: usize) -> Result<Vec<f32>> {
    let expected = dimensions * BYTES_PER_DIM;
    if bytes.len() != expected {
        return Err(CapError::CorruptEmbedding {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_DIM)
        .map(|pair| f16::from_le_bytes([pair[0], pair[1]]).to_f32())
        .collect())
}
