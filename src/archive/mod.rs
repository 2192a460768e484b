//! The `.humansign` archive: a deflated zip with four members.
//!
//! - `content.txt`: the exact final text
//! - `metadata.json`: the signed `BiometricMetadata`
//! - `manifest.json`: derived `Manifest`
//! - `PROOF.md`: human-readable summary, never read back

pub mod manifest;
pub mod proof;
pub mod reader;
pub mod writer;

pub use manifest::{FileInfo, Manifest, ManifestAnalysis};
pub use proof::render_proof;
pub use reader::{read_archive, sanitize_for_display, ParsedArchive, ReadPolicy};
pub use writer::{create_archive, package, PackagedArchive};

/// File extension for archives.
pub const ARCHIVE_EXTENSION: &str = "humansign";

pub const CONTENT_MEMBER: &str = "content.txt";
pub const METADATA_MEMBER: &str = "metadata.json";
pub const MANIFEST_MEMBER: &str = "manifest.json";
pub const PROOF_MEMBER: &str = "PROOF.md";

/// Generic message shown for any structural failure.
pub const USER_FACING_ERROR: &str = "Could not analyze file: invalid or malicious file";

/// Structural archive errors.
///
/// These abort before any scoring runs. Integrity and heuristic findings are
/// never errors; they are reported in the analysis result.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveError {
    /// File exceeds the read ceiling.
    TooLarge { size: usize, max: usize },
    /// The container could not be opened or read.
    Container(String),
    /// A member name, count, or size violates the safety policy.
    UnsafeMember(String),
    /// A member's JSON could not be parsed.
    MalformedJson { member: &'static str, reason: String },
    /// An event is missing a required field or has the wrong type.
    InvalidEvent { index: usize, reason: String },
    /// An event's wall-clock time is beyond the allowed clock skew.
    FutureTimestamp { index: usize, absolute_time: i64 },
    /// The session started before the replay window.
    ReplayWindowExceeded { session_start: i64 },
    /// Failed to produce an archive.
    Write(String),
}

impl ArchiveError {
    /// Message safe to show to users.
    pub fn user_message(&self) -> &'static str {
        match self {
            ArchiveError::Write(_) => "Could not create the HumanSign file",
            _ => USER_FACING_ERROR,
        }
    }
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::TooLarge { size, max } => {
                write!(f, "Archive too large: {size} bytes (max: {max})")
            }
            ArchiveError::Container(e) => write!(f, "Invalid archive container: {e}"),
            ArchiveError::UnsafeMember(e) => write!(f, "Unsafe archive member: {e}"),
            ArchiveError::MalformedJson { member, reason } => {
                write!(f, "Malformed {member}: {reason}")
            }
            ArchiveError::InvalidEvent { index, reason } => {
                write!(f, "Invalid event at index {index}: {reason}")
            }
            ArchiveError::FutureTimestamp {
                index,
                absolute_time,
            } => write!(
                f,
                "Event {index} has a timestamp in the future ({absolute_time})"
            ),
            ArchiveError::ReplayWindowExceeded { session_start } => write!(
                f,
                "Session start {session_start} is outside the replay window"
            ),
            ArchiveError::Write(e) => write!(f, "Failed to write archive: {e}"),
        }
    }
}

impl std::error::Error for ArchiveError {}
