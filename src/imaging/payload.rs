//! Base64 text encoding of image payloads.
//!
//! Image bytes cross every boundary as standard (padded) base64 text.

use super::backend::BackendError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn from_base64(text: &str) -> Result<Vec<u8>, BackendError> {
    STANDARD
        .decode(text)
        .map_err(|e| BackendError::Decode(format!("invalid base64: {e}")))
}

/// True when `text` decodes and re-encodes to exactly itself.
pub fn is_canonical_base64(text: &str) -> bool {
    match STANDARD.decode(text) {
        Ok(bytes) => STANDARD.encode(bytes) == text,
        Err(_) => false,
    }
}
