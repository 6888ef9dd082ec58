//! Payload compression for cold storage.
//!
//! Uses gzip at the fastest level: compression runs inline in the offload
//! flush path, so CPU matters more than ratio.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::StoreError;

/// Compress a JSON payload for storage.
pub fn compress_payload(payload: &str) -> Result<Vec<u8>, StoreError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(payload.len() / 4), Compression::fast());
    encoder.write_all(payload.as_bytes())?;
    Ok(encoder.finish()?)
}

/// Decompress a stored payload back into its JSON string.
pub fn decompress_payload(data: &[u8]) -> Result<String, StoreError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = String::new();
    decoder.read_to_string(&mut out)?;
    Ok(out)
}
