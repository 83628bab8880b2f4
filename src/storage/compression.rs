/// Compression utility - JSON encoding + LZ4 (size-prepended block format)
///
/// `decompress(compress(x)) == x` for any JSON-serializable value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::types::InsightError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionStats {
    pub original_size: usize,
    pub compressed_size: usize,
    pub ratio: f64,
}

pub fn compress<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, InsightError> {
    compress_with_stats(value).map(|(bytes, _)| bytes)
}

/// Compresses and reports sizes.
pub fn compress_with_stats<T: Serialize + ?Sized>(value: &T) -> Result<(Vec<u8>, CompressionStats), InsightError> {
    let json = serde_json::to_vec(value)?;
    let bytes = lz4_flex::compress_prepend_size(&json);
    let stats = CompressionStats {
        original_size: json.len(),
        compressed_size: bytes.len(),
        ratio: compression_ratio(json.len(), bytes.len()),
    };
    Ok((bytes, stats))
}

pub fn decompress<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, InsightError> {
    let json = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| InsightError::Compression(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

/// `1 - compressed / original`; zero for empty input.
#[must_use]
pub fn compression_ratio(original_size: usize, compressed_size: usize) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    1.0 - compressed_size as f64 / original_size as f64
}
