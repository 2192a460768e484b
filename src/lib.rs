//! HumanSign - keystroke-timing authorship notarization.
//!
//! This library records how a document was typed, packages the text together
//! with its keystroke log into a signed `.humansign` archive, and later
//! verifies such an archive to judge whether the text was typed by a human.
//!
//! # Trust Model
//!
//! - **Local only**: No network access; everything is computed in-process
//! - **Integrity, not attestation**: The signing key is shipped with the
//!   verifier, so signatures catch corruption but not a determined forger
//! - **Heuristic verdicts**: Scores come from fixed rules, not a trained model
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          HumanSign                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Capture   │──▶│  Metadata   │──▶│  Packager   │        │
//! │  │  Session    │   │ (finalize)  │   │ (sign, zip) │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐        │
//! │  │ Live Stats  │                     │  .humansign │        │
//! │  └─────────────┘                     └─────────────┘        │
//! │                                              │              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Verdict   │◀──│  Forensic   │◀──│   Reader    │        │
//! │  │             │   │  Verifier   │   │ (validate)  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use humansign::{analyze_archive, create_archive, CaptureSession, KeyInput, ReadPolicy};
//!
//! let mut session = CaptureSession::new();
//! session.start();
//! session.handle_key_down(KeyInput::from_char('h'));
//! session.handle_key_down(KeyInput::from_char('i'));
//! session.set_text("hi");
//! session.stop();
//!
//! let metadata = session.finalize_metadata();
//! let bytes = create_archive("hi", &metadata, humansign::DEFAULT_SIGNING_KEY).unwrap();
//!
//! let now = chrono::Utc::now().timestamp_millis();
//! let policy = ReadPolicy::default();
//! let result = analyze_archive(&bytes, &policy, humansign::DEFAULT_SIGNING_KEY, now).unwrap();
//! println!("{}: {:.0}", result.verdict, result.human_score);
//! ```

pub mod archive;
pub mod capture;
pub mod config;
pub mod core;
pub mod service;
pub mod signature;
pub mod verify;

// Re-export key types at crate root for convenience
pub use archive::{
    create_archive, read_archive, ArchiveError, Manifest, ParsedArchive, ReadPolicy,
};
pub use capture::{BiometricMetadata, CaptureSession, KeyInput, KeystrokeEvent, LiveStats};
pub use config::{Config, ConfigError};
pub use crate::core::{extract_features, score_ai_likelihood, score_behavior, SessionFeatures};
pub use service::{ArchiveService, ServiceError, TaskStatus};
pub use signature::{hash_text, DEFAULT_SIGNING_KEY};
pub use verify::{analyze_archive, verify_parsed, AnalysisResult, FinalVerdict};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trust-model declaration that can be displayed to users.
pub const TRUST_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              HUMANSIGN - TRUST MODEL DECLARATION                 ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  A .humansign file bundles your text with a log of how it was    ║
║  typed: key timings, pastes, copies and cuts.                    ║
║                                                                  ║
║  ✓ WHAT A VALID FILE SHOWS:                                      ║
║    • The text has not changed since it was packaged              ║
║    • The keystroke log matches what the packager recorded        ║
║    • Heuristic scores for how human the typing looked            ║
║                                                                  ║
║  ✗ WHAT IT DOES NOT PROVE:                                       ║
║    • Who typed it (there is no identity binding)                 ║
║    • That nobody forged it: the signing key ships with the       ║
║      verifier, so it detects corruption, not a motivated forger  ║
║    • Anything beyond fixed rules (no trained model is used)      ║
║                                                                  ║
║  All analysis runs locally. Nothing is uploaded.                 ║
║                                                                  ║
║  Verify a file anytime with:                                     ║
║    humansign verify <file>.humansign                             ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_declaration_contents() {
        assert!(TRUST_DECLARATION.contains("TRUST MODEL"));
        assert!(TRUST_DECLARATION.contains("DOES NOT PROVE"));
        assert!(TRUST_DECLARATION.contains("signing key ships with"));
    }
}
