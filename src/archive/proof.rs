//! Human-readable `PROOF.md` summary.
//!
//! Generated from the manifest for manual inspection. It is never parsed back.

use crate::archive::manifest::Manifest;

/// Render the proof summary for a manifest.
pub fn render_proof(manifest: &Manifest) -> String {
    let mut out = format!(
        "# HumanSign Proof of Authorship\n\
         \n\
         | Field | Value |\n\
         |---|---|\n\
         | Session | `{}` |\n\
         | Created | {} |\n\
         | Format | {} v{} |\n\
         | Content hash ({}) | `{}` |\n\
         | Signature | `{}` |\n\
         | Signed at (epoch ms) | {} |\n\
         \n\
         ## Content\n\
         \n\
         - Characters: {}\n\
         - Words: {}\n\
         - Recorded events: {}\n\
         - Session duration: {:.1}s\n\
         \n\
         ## Behavioral analysis\n\
         \n\
         - Human score: {:.0}/100\n\
         - Verdict: {}\n\
         - Typing speed: {:.1} keys/sec\n\
         - Backspace ratio: {:.3}\n\
         - Paste events: {}\n",
        manifest.session_id,
        manifest.created_at,
        manifest.format,
        manifest.version,
        manifest.hash_algorithm,
        manifest.content_hash,
        manifest.signature,
        manifest.signed_at,
        manifest.file_info.text_length,
        manifest.file_info.word_count,
        manifest.file_info.event_count,
        manifest.file_info.session_duration_ms as f64 / 1000.0,
        manifest.analysis.human_score,
        manifest.analysis.verdict,
        manifest.analysis.metrics.keys_per_second,
        manifest.analysis.metrics.backspace_ratio,
        manifest.analysis.metrics.paste_count,
    );

    out.push_str("\n### Anomalies\n\n");
    if manifest.analysis.anomalies.is_empty() {
        out.push_str("None detected.\n");
    } else {
        for anomaly in &manifest.analysis.anomalies {
            out.push_str(&format!("- {anomaly}\n"));
        }
    }

    out.push_str(
        "\n---\n\
         \n\
         Verify this file with `humansign verify <file>.humansign`. The signature\n\
         detects accidental corruption; it is not a third-party attestation.\n",
    );
    out
}
