//! Forensic verification of a parsed archive.
//!
//! Verification is a stateless pipeline. Crypto integrity, tamper detection
//! and the two heuristic scorers all run on every archive that parses, and
//! their findings are combined into one `AnalysisResult`. Nothing here
//! returns an error: structural failures are caught earlier by the reader.

use crate::archive::{read_archive, ArchiveError, ParsedArchive, ReadPolicy};
use crate::capture::types::BiometricMetadata;
use crate::core::features::{extract_features, SessionFeatures};
use crate::core::scoring::{score_ai_likelihood, score_behavior, AiReport, BehavioralReport};
use crate::core::stats::coefficient_of_variation;
use crate::signature::{hash_text, verify, SignatureInput};
use serde::{Deserialize, Serialize};

const MIN_PLAUSIBLE_DURATION_MS: f64 = 1000.0;
const MAX_EVENTS_IN_SHORT_SESSION: usize = 50;
const MAX_EVENT_GAP_MS: f64 = 30_000.0;
const SUPERHUMAN_INTERVAL_MS: f64 = 10.0;
const MAX_SUPERHUMAN_INTERVALS: usize = 5;
const PERFECT_RHYTHM_CV: f64 = 0.1;
const PERFECT_RHYTHM_MIN_SAMPLES: usize = 10;

/// Final authorship verdict, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalVerdict {
    Invalid,
    AiDetected,
    PasteDetected,
    MixedContent,
    VerifiedHuman,
}

impl FinalVerdict {
    /// Threshold an adjusted combined score.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            FinalVerdict::VerifiedHuman
        } else if score >= 50.0 {
            FinalVerdict::MixedContent
        } else if score >= 25.0 {
            FinalVerdict::PasteDetected
        } else {
            FinalVerdict::AiDetected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinalVerdict::VerifiedHuman => "verified-human",
            FinalVerdict::MixedContent => "mixed-content",
            FinalVerdict::PasteDetected => "paste-detected",
            FinalVerdict::AiDetected => "ai-detected",
            FinalVerdict::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for FinalVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crypto and tamper findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForensicReport {
    pub hash_matches: bool,
    pub signature_valid: bool,
    /// Disagreements between `metadata.json` and `manifest.json` crypto fields.
    pub crypto_issues: Vec<String>,
    pub tamper_indicators: Vec<String>,
}

impl ForensicReport {
    pub fn is_crypto_valid(&self) -> bool {
        self.hash_matches && self.signature_valid && self.crypto_issues.is_empty()
    }

    pub fn is_tampered(&self) -> bool {
        !self.tamper_indicators.is_empty()
    }
}

/// Outcome of verifying one archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_valid: bool,
    pub is_tampered: bool,
    /// Combined human score, 0-100.
    pub human_score: f64,
    pub verdict: FinalVerdict,
    /// Forensic findings, then behavioral anomalies, then AI red flags.
    pub anomalies: Vec<String>,
    pub session_id: String,
    /// Recovered text, escaped for display.
    pub content: String,
    pub forensic: ForensicReport,
    pub behavioral: BehavioralReport,
    pub ai: AiReport,
}

/// Read, verify and score archive bytes.
pub fn analyze_archive(
    data: &[u8],
    policy: &ReadPolicy,
    key: &str,
    now_ms: i64,
) -> Result<AnalysisResult, ArchiveError> {
    let parsed = read_archive(data, policy, now_ms)?;
    Ok(verify_parsed(&parsed, key))
}

/// Verify an archive that passed structural validation.
pub fn verify_parsed(parsed: &ParsedArchive, key: &str) -> AnalysisResult {
    let metadata = &parsed.metadata;
    let raw_text = parsed.raw_text();

    let features = extract_features(metadata);
    let mut forensic = check_crypto(parsed, key);
    forensic.tamper_indicators = tamper_indicators(parsed, &features);

    let behavioral = score_behavior(&features);
    let ai = score_ai_likelihood(&features);

    let is_valid = forensic.is_crypto_valid();
    let is_tampered = forensic.is_tampered();
    let (human_score, verdict) = combine(&behavioral, &ai, is_valid, is_tampered);

    let mut anomalies = Vec::new();
    if !forensic.hash_matches {
        anomalies.push("Content hash does not match".to_string());
    }
    if !forensic.signature_valid {
        anomalies.push("Invalid signature".to_string());
    }
    anomalies.extend(forensic.crypto_issues.iter().cloned());
    anomalies.extend(forensic.tamper_indicators.iter().cloned());
    anomalies.extend(behavioral.anomalies.iter().cloned());
    anomalies.extend(ai.red_flags.iter().cloned());

    tracing::info!(
        session_id = %metadata.session_id,
        verdict = %verdict,
        score = human_score,
        valid = is_valid,
        tampered = is_tampered,
        text_length = raw_text.chars().count(),
        "archive verified"
    );

    AnalysisResult {
        is_valid,
        is_tampered,
        human_score,
        verdict,
        anomalies,
        session_id: metadata.session_id.clone(),
        content: parsed.content.clone(),
        forensic,
        behavioral,
        ai,
    }
}

/// Combine scorer outputs into a score and final verdict.
///
/// For archives that pass integrity the returned score is the AI-adjusted
/// one the verdict is banded from. Invalid archives keep the unadjusted
/// combined score.
pub fn combine(
    behavioral: &BehavioralReport,
    ai: &AiReport,
    is_valid: bool,
    is_tampered: bool,
) -> (f64, FinalVerdict) {
    let combined = (behavioral.score - ai.ai_probability).max(0.0);
    if !is_valid || is_tampered {
        return (combined, FinalVerdict::Invalid);
    }

    let adjusted = if ai.ai_probability > 70.0 {
        combined - 30.0
    } else if ai.ai_probability > 50.0 {
        combined - 15.0
    } else {
        combined
    };
    let adjusted = adjusted.max(0.0);
    (adjusted, FinalVerdict::from_score(adjusted))
}

fn check_crypto(parsed: &ParsedArchive, key: &str) -> ForensicReport {
    let metadata = &parsed.metadata;
    let manifest = &parsed.manifest;
    let raw_text = parsed.raw_text();

    let hash_matches =
        !manifest.content_hash.is_empty() && hash_text(raw_text) == manifest.content_hash;

    let input = SignatureInput {
        session_id: &metadata.session_id,
        content_hash: &manifest.content_hash,
        event_count: metadata.events.len(),
        final_text_length: raw_text.chars().count(),
        signed_at: manifest.signed_at,
    };
    let signature_valid =
        !manifest.signature.is_empty() && verify(&input, &manifest.signature, key);

    let mut crypto_issues = Vec::new();
    if !metadata.is_signed() {
        crypto_issues.push("Metadata is not signed".to_string());
    }
    if let Some(hash) = &metadata.content_hash {
        if *hash != manifest.content_hash {
            crypto_issues.push("Metadata content hash differs from manifest".to_string());
        }
    }
    if let Some(signature) = &metadata.signature {
        if *signature != manifest.signature {
            crypto_issues.push("Metadata signature differs from manifest".to_string());
        }
    }
    if let Some(signed_at) = metadata.signed_at {
        if signed_at != manifest.signed_at {
            crypto_issues.push("Metadata signing time differs from manifest".to_string());
        }
    }

    ForensicReport {
        hash_matches,
        signature_valid,
        crypto_issues,
        tamper_indicators: Vec::new(),
    }
}

/// Every tamper check that fires, in a fixed order.
fn tamper_indicators(parsed: &ParsedArchive, features: &SessionFeatures) -> Vec<String> {
    let metadata = &parsed.metadata;
    let raw_text = parsed.raw_text();
    let events = &metadata.events;
    let mut indicators = Vec::new();

    if events.is_empty() {
        indicators.push("Empty event log".to_string());
    }

    let duration = metadata.duration_ms();
    if duration < MIN_PLAUSIBLE_DURATION_MS && events.len() > MAX_EVENTS_IN_SHORT_SESSION {
        indicators.push(format!(
            "Implausible session: {} events in {duration:.0} ms",
            events.len()
        ));
    }

    let gaps: Vec<usize> = events
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1].timestamp - pair[0].timestamp > MAX_EVENT_GAP_MS)
        .map(|(i, _)| i + 1)
        .collect();
    if let Some(first) = gaps.first() {
        indicators.push(format!(
            "Suspicious pause longer than 30s between events ({} found, first at index {first})",
            gaps.len()
        ));
    }

    if reconstruct_text(metadata) != raw_text {
        indicators.push("Keystrokes do not reconstruct the stored text".to_string());
    }

    let duplicates = duplicate_timestamps(metadata);
    if duplicates > 0 {
        indicators.push(format!("Duplicate event timestamps ({duplicates})"));
    }

    let superhuman = features
        .raw_intervals
        .iter()
        .filter(|&&i| i < SUPERHUMAN_INTERVAL_MS)
        .count();
    if superhuman > MAX_SUPERHUMAN_INTERVALS {
        indicators.push(format!(
            "Superhuman keystroke intervals ({superhuman} under 10 ms)"
        ));
    }

    if features.intervals.len() > PERFECT_RHYTHM_MIN_SAMPLES {
        if let Some(cv) = coefficient_of_variation(&features.intervals) {
            if cv < PERFECT_RHYTHM_CV {
                indicators.push(format!("Suspiciously perfect typing rhythm (CV {cv:.3})"));
            }
        }
    }

    if let Some(index) = parsed.out_of_order_at {
        indicators.push(format!("Event sequence out of order at index {index}"));
    }

    let manifest = &parsed.manifest;
    if manifest.session_id != metadata.session_id {
        indicators.push("Manifest session id does not match metadata".to_string());
    }
    if manifest.file_info.event_count != events.len() {
        indicators.push(format!(
            "Manifest event count {} does not match {} recorded events",
            manifest.file_info.event_count,
            events.len()
        ));
    }
    if manifest.file_info.text_length != raw_text.chars().count() {
        indicators.push("Manifest text length does not match content".to_string());
    }

    indicators
}

/// Concatenate the keys of single-character key-downs.
pub fn reconstruct_text(metadata: &BiometricMetadata) -> String {
    metadata
        .events
        .iter()
        .filter(|e| e.is_printable_key_down())
        .filter_map(|e| e.key())
        .collect()
}

/// Number of events sharing a timestamp with another event.
fn duplicate_timestamps(metadata: &BiometricMetadata) -> usize {
    let mut timestamps: Vec<f64> = metadata.events.iter().map(|e| e.timestamp).collect();
    timestamps.sort_by(|a, b| a.total_cmp(b));
    timestamps.windows(2).filter(|w| w[0] == w[1]).count()
}
