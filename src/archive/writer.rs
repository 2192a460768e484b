//! Packaging: sign the session and write the archive.
//!
//! This is the only place the content hash and signature are computed and
//! written into the metadata.

use crate::archive::manifest::Manifest;
use crate::archive::proof::render_proof;
use crate::archive::{
    ArchiveError, CONTENT_MEMBER, MANIFEST_MEMBER, METADATA_MEMBER, PROOF_MEMBER,
};
use crate::capture::types::BiometricMetadata;
use crate::core::features::extract_features;
use crate::core::scoring::score_behavior;
use crate::signature::{hash_text, sign, SignatureInput};
use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;

/// A packaged archive together with the values written into it.
#[derive(Debug, Clone)]
pub struct PackagedArchive {
    pub bytes: Vec<u8>,
    pub metadata: BiometricMetadata,
    pub manifest: Manifest,
}

/// Package `text` and `metadata` into archive bytes, signing now.
pub fn create_archive(
    text: &str,
    metadata: &BiometricMetadata,
    key: &str,
) -> Result<Vec<u8>, ArchiveError> {
    package(text, metadata, key, Utc::now()).map(|packaged| packaged.bytes)
}

/// Package with an explicit signing time.
pub fn package(
    text: &str,
    metadata: &BiometricMetadata,
    key: &str,
    signed_at: DateTime<Utc>,
) -> Result<PackagedArchive, ArchiveError> {
    let signed_at_ms = signed_at.timestamp_millis();
    let signed = sign_metadata(text, metadata, key, signed_at_ms);

    let report = score_behavior(&extract_features(&signed));
    // Round-trip through millis so created_at matches the persisted signing time.
    let created_at = Utc
        .timestamp_millis_opt(signed_at_ms)
        .single()
        .unwrap_or(signed_at);
    let manifest = Manifest::derive(&signed, &report, created_at);
    let proof = render_proof(&manifest);

    let metadata_json = serde_json::to_vec_pretty(&signed)
        .map_err(|e| ArchiveError::Write(format!("Failed to serialize metadata: {e}")))?;
    let manifest_json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| ArchiveError::Write(format!("Failed to serialize manifest: {e}")))?;

    let bytes = write_members(&[
        (CONTENT_MEMBER, text.as_bytes()),
        (METADATA_MEMBER, metadata_json.as_slice()),
        (MANIFEST_MEMBER, manifest_json.as_slice()),
        (PROOF_MEMBER, proof.as_bytes()),
    ])?;

    tracing::info!(
        session_id = %signed.session_id,
        events = signed.events.len(),
        size = bytes.len(),
        score = report.score,
        "archive packaged"
    );

    Ok(PackagedArchive {
        bytes,
        metadata: signed,
        manifest,
    })
}

/// Fill in final text, content hash, signature and signing time.
fn sign_metadata(
    text: &str,
    metadata: &BiometricMetadata,
    key: &str,
    signed_at: i64,
) -> BiometricMetadata {
    let mut signed = metadata.clone();
    signed.final_text = text.to_string();

    let content_hash = hash_text(text);
    let signature = sign(
        &SignatureInput::for_metadata(&signed, &content_hash, signed_at),
        key,
    );

    signed.content_hash = Some(content_hash);
    signed.signature = Some(signature);
    signed.signed_at = Some(signed_at);
    signed
}

/// Write named members into a deflated zip.
pub(crate) fn write_members(members: &[(&str, &[u8])]) -> Result<Vec<u8>, ArchiveError> {
    let mut zip_buffer = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut zip_buffer));
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(6));

        for (name, data) in members {
            zip.start_file(*name, options)
                .map_err(|e| ArchiveError::Write(format!("Failed to create {name}: {e}")))?;
            zip.write_all(data)
                .map_err(|e| ArchiveError::Write(format!("Failed to write {name}: {e}")))?;
        }

        zip.finish()
            .map_err(|e| ArchiveError::Write(format!("Failed to finalize archive: {e}")))?;
    }
    Ok(zip_buffer)
}
