//! Feature extraction from a completed event log.
//!
//! Both scorers and the verifier read the same `SessionFeatures`. Interval
//! statistics use key-down events only; idle gaps (>= 5 s) are excluded.

use crate::capture::types::{BiometricMetadata, EventKind};
use crate::core::stats::{
    coefficient_of_variation, count_thinking_pauses, intervals_of, mean, ratio,
    rhythm_intervals, std_dev,
};
use serde::{Deserialize, Serialize};

/// Timing and editing features of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionFeatures {
    pub event_count: usize,
    pub key_down_count: usize,
    pub backspace_count: usize,
    pub paste_count: usize,
    /// Characters inserted by paste events.
    pub pasted_chars: usize,
    pub final_text_length: usize,
    /// Key-down intervals with idle gaps removed.
    #[serde(skip)]
    pub intervals: Vec<f64>,
    /// Key-down intervals before filtering, in capture order.
    #[serde(skip)]
    pub raw_intervals: Vec<f64>,
    pub mean_interval_ms: f64,
    pub interval_std_dev_ms: f64,
    /// `stddev / mean` of filtered intervals; `None` with fewer than two.
    pub consistency: Option<f64>,
    /// Span from the first to the last key-down, in seconds.
    pub typing_duration_secs: f64,
    pub keys_per_second: f64,
    pub backspace_ratio: f64,
    pub thinking_pauses: usize,
    pub burst_count: usize,
    pub burst_ratio: f64,
}

impl SessionFeatures {
    /// Rhythm variance in the live-stats sense (`consistency * 100`).
    pub fn rhythm_variance(&self) -> Option<f64> {
        self.consistency.map(|c| c * 100.0)
    }

    /// Pasted characters relative to the final text.
    pub fn paste_ratio(&self) -> f64 {
        ratio(self.pasted_chars as f64, self.final_text_length as f64)
    }

    /// Key-downs per surviving character.
    pub fn keystroke_density(&self) -> f64 {
        ratio(self.key_down_count as f64, self.final_text_length as f64)
    }
}

/// A burst is two fast intervals followed by a long one.
const BURST_FAST_MS: f64 = 100.0;
const BURST_PAUSE_MS: f64 = 500.0;

/// Extract features from a metadata snapshot.
pub fn extract_features(metadata: &BiometricMetadata) -> SessionFeatures {
    let key_down_times: Vec<f64> = metadata
        .events
        .iter()
        .filter(|e| e.is_key_down())
        .map(|e| e.timestamp)
        .collect();

    let key_down_count = key_down_times.len();
    let backspace_count = metadata
        .events
        .iter()
        .filter(|e| e.is_backspace_down())
        .count();
    let paste_events: Vec<_> = metadata
        .events
        .iter()
        .filter(|e| e.kind == EventKind::Paste)
        .collect();
    let paste_count = paste_events.len();
    let pasted_chars = paste_events.iter().map(|e| e.pasted_chars()).sum();

    let raw_intervals = intervals_of(&key_down_times);
    let intervals = rhythm_intervals(&raw_intervals);

    let typing_duration_secs = match (key_down_times.first(), key_down_times.last()) {
        (Some(first), Some(last)) => ((last - first) / 1000.0).max(0.0),
        _ => 0.0,
    };

    let (burst_count, burst_ratio) = bursts(&intervals);

    SessionFeatures {
        event_count: metadata.events.len(),
        key_down_count,
        backspace_count,
        paste_count,
        pasted_chars,
        final_text_length: metadata.final_text.chars().count(),
        mean_interval_ms: mean(&intervals),
        interval_std_dev_ms: std_dev(&intervals),
        consistency: coefficient_of_variation(&intervals),
        typing_duration_secs,
        keys_per_second: ratio(key_down_count as f64, typing_duration_secs),
        backspace_ratio: ratio(backspace_count as f64, key_down_count as f64),
        thinking_pauses: count_thinking_pauses(&intervals),
        burst_count,
        burst_ratio,
        intervals,
        raw_intervals,
    }
}

fn bursts(intervals: &[f64]) -> (usize, f64) {
    if intervals.len() < 3 {
        return (0, 0.0);
    }
    let count = intervals
        .windows(3)
        .filter(|w| w[0] < BURST_FAST_MS && w[1] < BURST_FAST_MS && w[2] > BURST_PAUSE_MS)
        .count();
    (count, ratio(count as f64, (intervals.len() - 2) as f64))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::capture::types::{BiometricMetadata, EventData, EventKind, KeystrokeEvent};

    pub const EPOCH: i64 = 1_700_000_000_000;

    pub fn event(kind: EventKind, timestamp: f64, key: Option<&str>) -> KeystrokeEvent {
        KeystrokeEvent {
            id: format!("e-{timestamp}-{kind:?}"),
            timestamp,
            absolute_time: EPOCH + timestamp as i64,
            kind,
            session_id: "session".to_string(),
            data: EventData {
                key: key.map(str::to_string),
                ..Default::default()
            },
        }
    }

    pub fn paste(timestamp: f64, text: &str) -> KeystrokeEvent {
        let mut e = event(EventKind::Paste, timestamp, None);
        e.data.clipboard_text = Some(text.to_string());
        e.data.clipboard_length = Some(text.chars().count());
        e
    }

    /// Key-downs at the given offsets, typing `keys` in order.
    pub fn typed(keys: &[&str], times: &[f64]) -> Vec<KeystrokeEvent> {
        keys.iter()
            .zip(times)
            .map(|(k, &t)| event(EventKind::KeyDown, t, Some(k)))
            .collect()
    }

    pub fn metadata(events: Vec<KeystrokeEvent>, final_text: &str) -> BiometricMetadata {
        BiometricMetadata {
            version: "1.0".to_string(),
            events,
            session_start: EPOCH,
            session_id: "session".to_string(),
            content_hash: None,
            signature: None,
            signed_at: None,
            final_text: final_text.to_string(),
        }
    }

    /// `count` key-downs spaced evenly by `step` ms.
    pub fn even_typing(count: usize, step: f64, key: &str) -> Vec<KeystrokeEvent> {
        (0..count)
            .map(|i| event(EventKind::KeyDown, i as f64 * step, Some(key)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_empty_log() {
        let features = extract_features(&metadata(vec![], ""));
        assert_eq!(features.key_down_count, 0);
        assert_eq!(features.keys_per_second, 0.0);
        assert_eq!(features.backspace_ratio, 0.0);
        assert_eq!(features.consistency, None);
        assert_eq!(features.paste_ratio(), 0.0);
    }

    #[test]
    fn test_basic_counts() {
        let mut events = typed(&["h", "i", "Backspace", "i"], &[0.0, 200.0, 450.0, 600.0]);
        events.push(event(EventKind::KeyUp, 610.0, Some("i")));
        events.push(paste(900.0, "there"));
        let features = extract_features(&metadata(events, "hi there"));

        assert_eq!(features.event_count, 6);
        assert_eq!(features.key_down_count, 4);
        assert_eq!(features.backspace_count, 1);
        assert_eq!(features.paste_count, 1);
        assert_eq!(features.pasted_chars, 5);
        assert_eq!(features.final_text_length, 8);
        assert_eq!(features.intervals, vec![200.0, 250.0, 150.0]);
        assert!((features.typing_duration_secs - 0.6).abs() < 1e-9);
        assert!((features.backspace_ratio - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_idle_gaps_excluded() {
        let events = typed(&["a", "b", "c"], &[0.0, 100.0, 9100.0]);
        let features = extract_features(&metadata(events, "abc"));
        assert_eq!(features.raw_intervals.len(), 2);
        assert_eq!(features.intervals, vec![100.0]);
    }

    #[test]
    fn test_burst_detection() {
        // fast, fast, long pause -> one burst out of (5 - 2) windows
        let times = [0.0, 50.0, 100.0, 700.0, 900.0, 1100.0];
        let events = typed(&["a"; 6], &times);
        let features = extract_features(&metadata(events, "aaaaaa"));
        assert_eq!(features.burst_count, 1);
        assert!((features.burst_ratio - 1.0 / 3.0).abs() < 1e-9);
    }
}
