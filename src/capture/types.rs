//! Event and metadata types for HumanSign capture sessions.
//!
//! These are the persisted shapes: they serialize with camelCase field names
//! into `metadata.json` inside a `.humansign` archive.

use serde::{Deserialize, Serialize};

/// Current format version written into metadata and manifests.
pub const FORMAT_VERSION: &str = "1.0";

/// Kind of input action an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    KeyDown,
    KeyUp,
    Paste,
    Copy,
    Cut,
    Focus,
    Blur,
}

/// Modifier keys held while a key event fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// A selection range in the editor, in character offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A collapsed selection (plain caret) at `offset`.
    pub fn caret(offset: usize) -> Self {
        Self::new(offset, offset)
    }
}

/// Variant-dependent payload of an event.
///
/// Key events fill `key`/`code`/`modifiers`; paste fills the clipboard fields;
/// copy, cut and paste carry the selection they acted on. Absent fields are
/// omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Modifiers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

/// One recorded input action.
///
/// `timestamp` is a monotonic reading in milliseconds, only comparable
/// within the same session. `absolute_time` is wall-clock epoch millis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystrokeEvent {
    pub id: String,
    pub timestamp: f64,
    pub absolute_time: i64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub session_id: String,
    pub data: EventData,
}

impl KeystrokeEvent {
    pub fn is_key_down(&self) -> bool {
        self.kind == EventKind::KeyDown
    }

    /// The key name for key events, if any.
    pub fn key(&self) -> Option<&str> {
        self.data.key.as_deref()
    }

    /// True for a key-down of exactly one character (a printable key).
    pub fn is_printable_key_down(&self) -> bool {
        self.is_key_down() && self.key().map(is_printable_key).unwrap_or(false)
    }

    pub fn is_backspace_down(&self) -> bool {
        self.is_key_down() && self.key() == Some("Backspace")
    }

    /// Number of characters carried by a paste event.
    pub fn pasted_chars(&self) -> usize {
        if self.kind != EventKind::Paste {
            return 0;
        }
        self.data.clipboard_length.unwrap_or_else(|| {
            self.data
                .clipboard_text
                .as_deref()
                .map(|t| t.chars().count())
                .unwrap_or(0)
        })
    }
}

/// A key name that produces a single character.
pub fn is_printable_key(key: &str) -> bool {
    key.chars().count() == 1
}

/// Immutable snapshot of a finished capture session.
///
/// `content_hash`, `signature` and `signed_at` are `None` until the session is
/// packaged; after that they are all present together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricMetadata {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub events: Vec<KeystrokeEvent>,
    /// Session start, epoch millis.
    #[serde(default)]
    pub session_start: i64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    /// Wall-clock millis used as the signing timestamp.
    #[serde(default)]
    pub signed_at: Option<i64>,
    #[serde(default)]
    pub final_text: String,
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

impl BiometricMetadata {
    pub fn is_signed(&self) -> bool {
        self.content_hash.is_some() && self.signature.is_some() && self.signed_at.is_some()
    }

    /// Span between the first and last event, in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).max(0.0),
            _ => 0.0,
        }
    }

    pub fn key_down_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_key_down()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_down(key: &str) -> KeystrokeEvent {
        KeystrokeEvent {
            id: "e1".to_string(),
            timestamp: 10.0,
            absolute_time: 1_700_000_000_000,
            kind: EventKind::KeyDown,
            session_id: "s1".to_string(),
            data: EventData {
                key: Some(key.to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let json = serde_json::to_value(key_down("a")).unwrap();
        assert_eq!(json["type"], "key-down");
        assert_eq!(json["absoluteTime"], 1_700_000_000_000i64);
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["data"]["key"], "a");
        assert!(json["data"].get("clipboardText").is_none());
    }

    #[test]
    fn test_printable_classification() {
        assert!(key_down("a").is_printable_key_down());
        assert!(key_down("é").is_printable_key_down());
        assert!(!key_down("Shift").is_printable_key_down());
        assert!(key_down("Backspace").is_backspace_down());
    }

    #[test]
    fn test_pasted_chars_falls_back_to_text() {
        let mut event = key_down("v");
        event.kind = EventKind::Paste;
        event.data.clipboard_text = Some("héllo".to_string());
        assert_eq!(event.pasted_chars(), 5);

        event.data.clipboard_length = Some(3);
        assert_eq!(event.pasted_chars(), 3);
    }

    #[test]
    fn test_metadata_defaults_when_fields_missing() {
        let meta: BiometricMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.version, FORMAT_VERSION);
        assert!(meta.events.is_empty());
        assert!(!meta.is_signed());
        assert_eq!(meta.duration_ms(), 0.0);
    }
}
