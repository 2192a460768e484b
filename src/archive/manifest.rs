//! Manifest: the derived summary stored as `manifest.json`.
//!
//! A manifest is always recomputed from metadata at packaging time. When an
//! archive is read back it is untrusted input, so every field defaults when
//! missing and the verifier re-derives what it compares.

use crate::capture::types::{BiometricMetadata, FORMAT_VERSION};
use crate::core::features::SessionFeatures;
use crate::core::scoring::BehavioralReport;
use serde::{Deserialize, Serialize};

/// Format tag identifying HumanSign manifests.
pub const FORMAT_TAG: &str = "humansign";

/// Analysis embedded at packaging time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestAnalysis {
    pub human_score: f64,
    pub verdict: String,
    pub anomalies: Vec<String>,
    pub metrics: SessionFeatures,
    /// RFC3339
    pub analyzed_at: String,
}

/// Summary of the packaged content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileInfo {
    pub text_length: usize,
    pub word_count: usize,
    pub event_count: usize,
    pub session_duration_ms: u64,
}

impl FileInfo {
    pub fn derive(metadata: &BiometricMetadata) -> Self {
        Self {
            text_length: metadata.final_text.chars().count(),
            word_count: metadata.final_text.split_whitespace().count(),
            event_count: metadata.events.len(),
            session_duration_ms: metadata.duration_ms().round() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    pub version: String,
    pub format: String,
    /// RFC3339
    pub created_at: String,
    pub session_id: String,
    pub hash_algorithm: String,
    pub content_hash: String,
    pub signature: String,
    /// Signing time replayed during verification, epoch millis.
    pub signed_at: i64,
    pub analysis: ManifestAnalysis,
    pub file_info: FileInfo,
}

impl Manifest {
    /// Derive a manifest from signed metadata and its behavioral report.
    pub fn derive(
        metadata: &BiometricMetadata,
        report: &BehavioralReport,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let created = created_at.to_rfc3339();
        Self {
            version: FORMAT_VERSION.to_string(),
            format: FORMAT_TAG.to_string(),
            created_at: created.clone(),
            session_id: metadata.session_id.clone(),
            hash_algorithm: crate::signature::HASH_ALGORITHM.to_string(),
            content_hash: metadata.content_hash.clone().unwrap_or_default(),
            signature: metadata.signature.clone().unwrap_or_default(),
            signed_at: metadata.signed_at.unwrap_or_default(),
            analysis: ManifestAnalysis {
                human_score: report.score,
                verdict: report.verdict.to_string(),
                anomalies: report.anomalies.clone(),
                metrics: report.metrics.clone(),
                analyzed_at: created,
            },
            file_info: FileInfo::derive(metadata),
        }
    }
}
