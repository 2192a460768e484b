//! Reading archives back, with structural validation.
//!
//! Checks run in a fixed order and the first failure aborts the read:
//! 1. size ceiling, before the container is opened
//! 2. container safety (member names, counts, uncompressed sizes)
//! 3. member parsing (missing members default to empty)
//! 4. event shape
//! 5. wall-clock timestamps against the allowed clock skew
//! 6. session start against the replay window
//!
//! Capture-order regressions are not rejected here. They are recorded on the
//! parsed archive and reported by the verifier as tampering.

use crate::archive::manifest::Manifest;
use crate::archive::{
    ArchiveError, CONTENT_MEMBER, MANIFEST_MEMBER, METADATA_MEMBER, PROOF_MEMBER,
};
use crate::capture::types::BiometricMetadata;
use serde_json::Value;
use std::io::Read;

/// Limits applied when reading an archive.
#[derive(Debug, Clone)]
pub struct ReadPolicy {
    /// Largest accepted archive, in bytes.
    pub max_archive_bytes: usize,
    pub max_entries: usize,
    /// Largest accepted uncompressed member.
    pub max_member_bytes: usize,
    pub max_total_uncompressed: usize,
    /// How far an event's wall-clock time may sit in the future.
    pub clock_skew_ms: i64,
    /// Oldest accepted session start, relative to now.
    pub replay_window_ms: i64,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            max_archive_bytes: 10 * 1024 * 1024, // 10 MiB
            max_entries: 16,
            max_member_bytes: 25 * 1024 * 1024,
            max_total_uncompressed: 50 * 1024 * 1024,
            clock_skew_ms: 60 * 1000,
            replay_window_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// A structurally valid archive.
#[derive(Debug, Clone)]
pub struct ParsedArchive {
    /// Recovered text, escaped for display.
    pub content: String,
    pub metadata: BiometricMetadata,
    pub manifest: Manifest,
    pub proof: String,
    /// Index of the first event whose timestamp is lower than its predecessor's.
    pub out_of_order_at: Option<usize>,
    raw_text: String,
}

impl ParsedArchive {
    /// The exact recovered text; used for hash re-derivation.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// Read and validate archive bytes at wall-clock time `now_ms`.
pub fn read_archive(
    data: &[u8],
    policy: &ReadPolicy,
    now_ms: i64,
) -> Result<ParsedArchive, ArchiveError> {
    let result = read_archive_inner(data, policy, now_ms);
    if let Err(ref e) = result {
        tracing::warn!(size = data.len(), "archive rejected: {e}");
    }
    result
}

fn read_archive_inner(
    data: &[u8],
    policy: &ReadPolicy,
    now_ms: i64,
) -> Result<ParsedArchive, ArchiveError> {
    if data.len() > policy.max_archive_bytes {
        return Err(ArchiveError::TooLarge {
            size: data.len(),
            max: policy.max_archive_bytes,
        });
    }

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data))
        .map_err(|e| ArchiveError::Container(e.to_string()))?;
    validate_container(&mut archive, policy)?;

    let mut budget = policy.max_total_uncompressed;
    let raw_text = read_member(&mut archive, CONTENT_MEMBER, policy, &mut budget)?;
    let metadata_json = read_member(&mut archive, METADATA_MEMBER, policy, &mut budget)?;
    let manifest_json = read_member(&mut archive, MANIFEST_MEMBER, policy, &mut budget)?;
    let proof = read_member(&mut archive, PROOF_MEMBER, policy, &mut budget)?;

    let metadata_value = parse_json(METADATA_MEMBER, &metadata_json)?;
    validate_event_shapes(&metadata_value)?;
    let metadata: BiometricMetadata =
        serde_json::from_value(metadata_value).map_err(|e| ArchiveError::MalformedJson {
            member: METADATA_MEMBER,
            reason: e.to_string(),
        })?;

    let manifest: Manifest = serde_json::from_value(parse_json(MANIFEST_MEMBER, &manifest_json)?)
        .map_err(|e| ArchiveError::MalformedJson {
            member: MANIFEST_MEMBER,
            reason: e.to_string(),
        })?;

    let out_of_order_at = first_out_of_order(&metadata);
    if let Some(index) = out_of_order_at {
        tracing::debug!(index, "event sequence out of capture order");
    }
    check_future_timestamps(&metadata, policy, now_ms)?;
    check_replay_window(&metadata, policy, now_ms)?;

    Ok(ParsedArchive {
        content: sanitize_for_display(&raw_text),
        metadata,
        manifest,
        proof,
        out_of_order_at,
        raw_text,
    })
}

fn validate_container<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    policy: &ReadPolicy,
) -> Result<(), ArchiveError> {
    if archive.len() > policy.max_entries {
        return Err(ArchiveError::UnsafeMember(format!(
            "too many entries: {} (max: {})",
            archive.len(),
            policy.max_entries
        )));
    }

    let mut total_uncompressed = 0usize;
    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Container(format!("entry {i}: {e}")))?;
        let name = file.name();

        if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
            return Err(ArchiveError::UnsafeMember(format!(
                "path traversal: {name}"
            )));
        }

        let size = file.size() as usize;
        if size > policy.max_member_bytes {
            return Err(ArchiveError::UnsafeMember(format!(
                "{name} is {size} bytes (max: {})",
                policy.max_member_bytes
            )));
        }
        total_uncompressed += size;
    }

    if total_uncompressed > policy.max_total_uncompressed {
        return Err(ArchiveError::UnsafeMember(format!(
            "total uncompressed size {total_uncompressed} bytes (max: {})",
            policy.max_total_uncompressed
        )));
    }
    Ok(())
}

/// Read a member as UTF-8, or an empty string when it is absent.
///
/// Declared sizes are not trusted: decompression stops one byte past the
/// per-member cap or the remaining total `budget`, whichever is smaller.
fn read_member<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
    policy: &ReadPolicy,
    budget: &mut usize,
) -> Result<String, ArchiveError> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            tracing::debug!(member = name, "archive member missing, using empty");
            return Ok(String::new());
        }
        Err(e) => return Err(ArchiveError::Container(format!("{name}: {e}"))),
    };

    let cap = policy.max_member_bytes.min(*budget);
    let mut content = Vec::new();
    file.take(cap as u64 + 1)
        .read_to_end(&mut content)
        .map_err(|e| ArchiveError::Container(format!("Failed to read {name}: {e}")))?;

    if content.len() > policy.max_member_bytes {
        return Err(ArchiveError::UnsafeMember(format!(
            "{name} inflates past {} bytes",
            policy.max_member_bytes
        )));
    }
    if content.len() > *budget {
        return Err(ArchiveError::UnsafeMember(format!(
            "total uncompressed size exceeds {} bytes",
            policy.max_total_uncompressed
        )));
    }
    *budget -= content.len();

    String::from_utf8(content)
        .map_err(|e| ArchiveError::Container(format!("{name} is not UTF-8: {e}")))
}

fn parse_json(member: &'static str, content: &str) -> Result<Value, ArchiveError> {
    if content.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(content).map_err(|e| ArchiveError::MalformedJson {
        member,
        reason: e.to_string(),
    })
}

/// Every event needs an id, numeric `timestamp` and `absoluteTime`, a type,
/// a session id, and an object payload.
fn validate_event_shapes(metadata: &Value) -> Result<(), ArchiveError> {
    let events = match metadata.get("events") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Array(events)) => events,
        Some(_) => {
            return Err(ArchiveError::MalformedJson {
                member: METADATA_MEMBER,
                reason: "`events` is not an array".to_string(),
            })
        }
    };

    for (index, event) in events.iter().enumerate() {
        let invalid = |reason: &str| ArchiveError::InvalidEvent {
            index,
            reason: reason.to_string(),
        };
        let obj = event.as_object().ok_or_else(|| invalid("not an object"))?;

        match obj.get("id") {
            Some(Value::String(s)) if !s.is_empty() => {}
            _ => return Err(invalid("id is not a non-empty string")),
        }
        if !obj.get("timestamp").map(Value::is_number).unwrap_or(false) {
            return Err(invalid("timestamp is not numeric"));
        }
        if !obj.get("absoluteTime").map(Value::is_number).unwrap_or(false) {
            return Err(invalid("absoluteTime is not numeric"));
        }
        if !obj.get("type").map(Value::is_string).unwrap_or(false) {
            return Err(invalid("missing type"));
        }
        if !obj.get("sessionId").map(Value::is_string).unwrap_or(false) {
            return Err(invalid("missing sessionId"));
        }
        if !obj.get("data").map(Value::is_object).unwrap_or(false) {
            return Err(invalid("missing data payload"));
        }
    }
    Ok(())
}

fn first_out_of_order(metadata: &BiometricMetadata) -> Option<usize> {
    metadata
        .events
        .windows(2)
        .position(|pair| pair[1].timestamp < pair[0].timestamp)
        .map(|i| i + 1)
}

fn check_future_timestamps(
    metadata: &BiometricMetadata,
    policy: &ReadPolicy,
    now_ms: i64,
) -> Result<(), ArchiveError> {
    let limit = now_ms.saturating_add(policy.clock_skew_ms);
    if let Some((index, event)) = metadata
        .events
        .iter()
        .enumerate()
        .find(|(_, e)| e.absolute_time > limit)
    {
        return Err(ArchiveError::FutureTimestamp {
            index,
            absolute_time: event.absolute_time,
        });
    }
    Ok(())
}

fn check_replay_window(
    metadata: &BiometricMetadata,
    policy: &ReadPolicy,
    now_ms: i64,
) -> Result<(), ArchiveError> {
    let start = metadata.session_start;
    if start < now_ms.saturating_sub(policy.replay_window_ms)
        || start > now_ms.saturating_add(policy.clock_skew_ms)
    {
        return Err(ArchiveError::ReplayWindowExceeded {
            session_start: start,
        });
    }
    Ok(())
}

/// Escape markup-significant characters for display.
pub fn sanitize_for_display(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
