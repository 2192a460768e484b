//! Content hashing and keyed signatures.
//!
//! The content hash is SHA-256 over the UTF-8 bytes of the final text. The
//! signature is SHA-256 over a fixed-order JSON payload describing the session
//! followed by the secret key. The signing time is part of the payload, so it
//! is persisted as `signedAt` and replayed on verification.
//!
//! The key ships inside the same archive format it protects; this detects
//! accidental corruption, not a forger who can read the key.

use crate::capture::types::BiometricMetadata;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash algorithm identifier recorded in manifests.
pub const HASH_ALGORITHM: &str = "sha256";

/// Built-in signing key used when the configuration does not override it.
pub const DEFAULT_SIGNING_KEY: &str = "humansign-local-integrity-key-v1";

/// Fields covered by the signature, in serialization order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningPayload<'a> {
    session_id: &'a str,
    content_hash: &'a str,
    event_count: usize,
    final_text_length: usize,
    timestamp: i64,
}

/// SHA-256 of raw bytes as lowercase hex.
pub fn compute_sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Content hash of the final text.
pub fn hash_text(text: &str) -> String {
    compute_sha256_bytes(text.as_bytes())
}

/// Everything the signature binds, gathered from finalized metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInput<'a> {
    pub session_id: &'a str,
    pub content_hash: &'a str,
    pub event_count: usize,
    pub final_text_length: usize,
    pub signed_at: i64,
}

impl<'a> SignatureInput<'a> {
    /// Signature input for `metadata` bound to `content_hash` at `signed_at`.
    pub fn for_metadata(
        metadata: &'a BiometricMetadata,
        content_hash: &'a str,
        signed_at: i64,
    ) -> Self {
        Self {
            session_id: &metadata.session_id,
            content_hash,
            event_count: metadata.events.len(),
            final_text_length: metadata.final_text.chars().count(),
            signed_at,
        }
    }
}

/// Compute the keyed signature.
pub fn sign(input: &SignatureInput<'_>, key: &str) -> String {
    let payload = SigningPayload {
        session_id: input.session_id,
        content_hash: input.content_hash,
        event_count: input.event_count,
        final_text_length: input.final_text_length,
        timestamp: input.signed_at,
    };
    // Serializing a struct of plain strings and integers cannot fail.
    let canonical = serde_json::to_string(&payload).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Re-derive the signature with the persisted signing time and compare.
pub fn verify(input: &SignatureInput<'_>, signature: &str, key: &str) -> bool {
    sign(input, key) == signature
}
