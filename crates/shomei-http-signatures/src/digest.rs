//!
//! `Digest` header handling
//!

use ring::digest::{digest, SHA256};

/// Compute the `Digest` header value for a request body
#[must_use]
pub fn body_digest(body: &[u8]) -> String {
    let hash = digest(&SHA256, body);
    format!("SHA-256={}", base64_simd::STANDARD.encode_to_string(hash))
}

/// Check a received `Digest` header against the received body
#[must_use]
pub fn matches_body(header_value: &str, body: &[u8]) -> bool {
    header_value == body_digest(body)
}
