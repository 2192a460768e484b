//! Live capture session.
//!
//! A `CaptureSession` is owned by one editing surface. The host feeds it raw
//! input callbacks; while capturing, each callback becomes a `KeystrokeEvent`
//! and the rolling statistics are recomputed before the next input is taken.

use crate::capture::types::{
    is_printable_key, BiometricMetadata, EventData, EventKind, KeystrokeEvent, Modifiers,
    Selection, FORMAT_VERSION,
};
use crate::core::stats::{
    coefficient_of_variation, count_thinking_pauses, ratio, IDLE_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

/// Number of recent inter-keystroke intervals kept for rhythm analysis.
pub const RHYTHM_CAPACITY: usize = 100;

/// Source of the two clocks sampled for each event.
pub trait Clock: Send {
    /// Monotonic milliseconds; only differences are meaningful.
    fn monotonic_ms(&self) -> f64;
    /// Wall-clock epoch milliseconds.
    fn epoch_ms(&self) -> i64;
}

/// Clock backed by `Instant` and the system wall clock.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn epoch_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug)]
struct ManualTime {
    monotonic_ms: f64,
    epoch_ms: i64,
}

/// A clock that only moves when told to. Clones share the same time, so a
/// caller can keep a handle and advance it while a session owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualTime>>,
}

impl ManualClock {
    /// Start at monotonic 0 and the given wall-clock time.
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualTime {
                monotonic_ms: 0.0,
                epoch_ms,
            })),
        }
    }

    /// Move both clocks forward by `ms`.
    pub fn advance(&self, ms: f64) {
        if let Ok(mut time) = self.inner.lock() {
            time.monotonic_ms += ms;
            time.epoch_ms += ms.round() as i64;
        }
    }
}

impl Clock for ManualClock {
    fn monotonic_ms(&self) -> f64 {
        self.inner.lock().map(|t| t.monotonic_ms).unwrap_or(0.0)
    }

    fn epoch_ms(&self) -> i64 {
        self.inner.lock().map(|t| t.epoch_ms).unwrap_or(0)
    }
}

/// A key as reported by the host editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    /// Logical key, e.g. `"a"`, `"Backspace"`, `"Enter"`.
    pub key: String,
    /// Physical key code, e.g. `"KeyA"`.
    pub code: String,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            modifiers: Modifiers::default(),
        }
    }

    /// Build a key input from a typed character.
    pub fn from_char(c: char) -> Self {
        let code = if c.is_ascii_alphabetic() {
            format!("Key{}", c.to_ascii_uppercase())
        } else if c.is_ascii_digit() {
            format!("Digit{c}")
        } else if c == ' ' {
            "Space".to_string()
        } else {
            String::new()
        };
        let mut input = Self::new(c.to_string(), code);
        input.modifiers.shift = c.is_uppercase();
        input
    }

    /// Keys whose timing feeds the rhythm ring.
    fn is_rhythm_key(&self) -> bool {
        is_printable_key(&self.key) || self.key == "Backspace" || self.key == "Enter"
    }
}

/// Rolling statistics for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub words_per_minute: f64,
    /// `stddev / mean * 100` of recent rhythm intervals.
    pub rhythm_variance: f64,
    pub thinking_pauses: usize,
    pub backspace_count: usize,
    pub paste_count: usize,
    pub key_down_count: usize,
    pub event_count: usize,
    pub elapsed_secs: f64,
    pub human_confidence: f64,
}

/// Inputs to the human-confidence heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceInputs {
    pub paste_count: usize,
    pub backspace_count: usize,
    pub key_down_count: usize,
    /// `None` when there are too few intervals to measure rhythm.
    pub rhythm_variance: Option<f64>,
    pub thinking_pauses: usize,
}

/// Score how human the live session looks, 0-100.
///
/// Rules that need a denominator (backspace ratio, rhythm variance) are
/// skipped when it is missing, so an empty session gets no adjustments.
pub fn human_confidence(inputs: &ConfidenceInputs) -> f64 {
    let mut score = 100.0;

    score -= 15.0 * inputs.paste_count as f64;

    if inputs.key_down_count > 0 {
        let backspace_ratio = ratio(
            inputs.backspace_count as f64,
            inputs.key_down_count as f64,
        );
        if backspace_ratio > 0.05 && backspace_ratio < 0.20 {
            score += 10.0;
        } else if backspace_ratio == 0.0 {
            score -= 20.0;
        }
    }

    if let Some(variance) = inputs.rhythm_variance {
        if variance > 20.0 && variance < 80.0 {
            score += 15.0;
        } else if variance <= 5.0 {
            score -= 25.0;
        }
    }

    if inputs.thinking_pauses > 2 {
        score += 10.0;
    }

    f64::clamp(score, 0.0, 100.0)
}

/// Per-editor capture state.
pub struct CaptureSession {
    clock: Box<dyn Clock>,
    capturing: bool,
    session_id: String,
    /// Session start, epoch millis.
    session_start: i64,
    /// Monotonic reading at `start()`.
    started_at_ms: f64,
    events: Vec<KeystrokeEvent>,
    rhythm: VecDeque<f64>,
    last_rhythm_key_ms: Option<f64>,
    backspace_count: usize,
    paste_count: usize,
    key_down_count: usize,
    text: String,
    latest_stats: LiveStats,
}

impl CaptureSession {
    /// Create an idle session on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock::new()))
    }

    /// Create an idle session on a custom clock.
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        let session_start = clock.epoch_ms();
        let started_at_ms = clock.monotonic_ms();
        Self {
            clock,
            capturing: false,
            session_id: Uuid::new_v4().to_string(),
            session_start,
            started_at_ms,
            events: Vec::new(),
            rhythm: VecDeque::with_capacity(RHYTHM_CAPACITY),
            last_rhythm_key_ms: None,
            backspace_count: 0,
            paste_count: 0,
            key_down_count: 0,
            text: String::new(),
            latest_stats: LiveStats::default(),
        }
    }

    /// Reset everything and begin capturing under a fresh session id.
    pub fn start(&mut self) {
        self.session_id = Uuid::new_v4().to_string();
        self.session_start = self.clock.epoch_ms();
        self.started_at_ms = self.clock.monotonic_ms();
        self.events.clear();
        self.rhythm.clear();
        self.last_rhythm_key_ms = None;
        self.backspace_count = 0;
        self.paste_count = 0;
        self.key_down_count = 0;
        self.latest_stats = LiveStats::default();
        self.capturing = true;
        tracing::debug!(session_id = %self.session_id, "capture started");
    }

    /// Stop capturing. Recorded data stays available.
    pub fn stop(&mut self) {
        if self.capturing {
            tracing::debug!(
                session_id = %self.session_id,
                events = self.events.len(),
                "capture stopped"
            );
        }
        self.capturing = false;
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn events(&self) -> &[KeystrokeEvent] {
        &self.events
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the editor's current full text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Recent rhythm intervals, oldest first.
    pub fn rhythm_intervals(&self) -> impl Iterator<Item = f64> + '_ {
        self.rhythm.iter().copied()
    }

    pub fn handle_key_down(&mut self, input: KeyInput) {
        if !self.capturing {
            return;
        }
        let now = self.clock.monotonic_ms();

        self.key_down_count += 1;
        if input.key == "Backspace" {
            self.backspace_count += 1;
        }
        if input.is_rhythm_key() {
            if let Some(last) = self.last_rhythm_key_ms {
                self.push_interval(now - last);
            }
            self.last_rhythm_key_ms = Some(now);
        }

        let data = key_data(&input);
        self.append(EventKind::KeyDown, now, data);
    }

    pub fn handle_key_up(&mut self, input: KeyInput) {
        if !self.capturing {
            return;
        }
        let now = self.clock.monotonic_ms();
        let data = key_data(&input);
        self.append(EventKind::KeyUp, now, data);
    }

    pub fn handle_paste(&mut self, text: &str, selection: Selection) {
        if !self.capturing {
            return;
        }
        let now = self.clock.monotonic_ms();
        self.paste_count += 1;
        let data = EventData {
            clipboard_text: Some(text.to_string()),
            clipboard_length: Some(text.chars().count()),
            selection: Some(selection),
            ..Default::default()
        };
        self.append(EventKind::Paste, now, data);
    }

    pub fn handle_copy(&mut self, selection: Selection) {
        self.handle_selection(EventKind::Copy, selection);
    }

    pub fn handle_cut(&mut self, selection: Selection) {
        self.handle_selection(EventKind::Cut, selection);
    }

    pub fn handle_focus(&mut self) {
        self.handle_plain(EventKind::Focus);
    }

    pub fn handle_blur(&mut self) {
        self.handle_plain(EventKind::Blur);
    }

    fn handle_selection(&mut self, kind: EventKind, selection: Selection) {
        if !self.capturing {
            return;
        }
        let now = self.clock.monotonic_ms();
        let data = EventData {
            selection: Some(selection),
            ..Default::default()
        };
        self.append(kind, now, data);
    }

    fn handle_plain(&mut self, kind: EventKind) {
        if !self.capturing {
            return;
        }
        let now = self.clock.monotonic_ms();
        self.append(kind, now, EventData::default());
    }

    fn push_interval(&mut self, interval: f64) {
        if self.rhythm.len() == RHYTHM_CAPACITY {
            self.rhythm.pop_front();
        }
        self.rhythm.push_back(interval);
    }

    fn append(&mut self, kind: EventKind, timestamp: f64, data: EventData) {
        // Clamp so the sequence stays non-decreasing even if a custom clock steps back.
        let timestamp = match self.events.last() {
            Some(prev) if prev.timestamp > timestamp => prev.timestamp,
            _ => timestamp,
        };
        self.events.push(KeystrokeEvent {
            id: Uuid::new_v4().to_string(),
            timestamp,
            absolute_time: self.clock.epoch_ms(),
            kind,
            session_id: self.session_id.clone(),
            data,
        });
        self.latest_stats = self.live_stats();
    }

    /// Statistics as of the most recently appended event.
    pub fn latest_stats(&self) -> &LiveStats {
        &self.latest_stats
    }

    /// Recompute live statistics from the rhythm ring and counters.
    pub fn live_stats(&self) -> LiveStats {
        let elapsed_secs = ((self.clock.monotonic_ms() - self.started_at_ms) / 1000.0).max(0.0);
        let words = self.text.split_whitespace().count();
        let words_per_minute = ratio(words as f64, elapsed_secs / 60.0);

        let valid: Vec<f64> = self
            .rhythm
            .iter()
            .copied()
            .filter(|&i| i > 0.0 && i < IDLE_INTERVAL_MS)
            .collect();
        let variance = coefficient_of_variation(&valid).map(|cv| cv * 100.0);
        let thinking_pauses = count_thinking_pauses(&valid);

        let human_confidence = human_confidence(&ConfidenceInputs {
            paste_count: self.paste_count,
            backspace_count: self.backspace_count,
            key_down_count: self.key_down_count,
            rhythm_variance: variance,
            thinking_pauses,
        });

        LiveStats {
            words_per_minute,
            rhythm_variance: variance.unwrap_or(0.0),
            thinking_pauses,
            backspace_count: self.backspace_count,
            paste_count: self.paste_count,
            key_down_count: self.key_down_count,
            event_count: self.events.len(),
            elapsed_secs,
            human_confidence,
        }
    }

    /// Freeze the session into an unsigned metadata snapshot.
    pub fn finalize_metadata(&self) -> BiometricMetadata {
        BiometricMetadata {
            version: FORMAT_VERSION.to_string(),
            events: self.events.clone(),
            session_start: self.session_start,
            session_id: self.session_id.clone(),
            content_hash: None,
            signature: None,
            signed_at: None,
            final_text: self.text.clone(),
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

fn key_data(input: &KeyInput) -> EventData {
    EventData {
        key: Some(input.key.clone()),
        code: Some(input.code.clone()),
        modifiers: Some(input.modifiers),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: i64 = 1_700_000_000_000;

    fn session() -> (CaptureSession, ManualClock) {
        let clock = ManualClock::starting_at(EPOCH);
        let mut session = CaptureSession::with_clock(Box::new(clock.clone()));
        session.start();
        (session, clock)
    }

    fn type_key(session: &mut CaptureSession, clock: &ManualClock, key: &str, after_ms: f64) {
        clock.advance(after_ms);
        session.handle_key_down(KeyInput::new(key, ""));
    }

    #[test]
    fn test_handlers_are_noops_when_idle() {
        let clock = ManualClock::starting_at(EPOCH);
        let mut session = CaptureSession::with_clock(Box::new(clock));
        session.handle_key_down(KeyInput::from_char('a'));
        session.handle_paste("hi", Selection::caret(0));
        assert!(session.events().is_empty());
    }

    #[test]
    fn test_events_carry_both_clocks() {
        let (mut session, clock) = session();
        type_key(&mut session, &clock, "a", 120.0);
        type_key(&mut session, &clock, "b", 80.0);

        let events = session.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, 120.0);
        assert_eq!(events[1].timestamp, 200.0);
        assert_eq!(events[1].absolute_time, EPOCH + 200);
        assert_eq!(events[0].session_id, session.session_id());
        assert_ne!(events[0].id, events[1].id);
    }

    #[test]
    fn test_rhythm_ring_is_bounded() {
        let (mut session, clock) = session();
        for i in 0..150 {
            type_key(&mut session, &clock, "a", 100.0 + i as f64);
        }
        let intervals: Vec<f64> = session.rhythm_intervals().collect();
        assert_eq!(intervals.len(), RHYTHM_CAPACITY);
        // Oldest evicted first: the earliest surviving interval is the 50th.
        assert_eq!(intervals[0], 150.0);
        assert_eq!(session.events().len(), 150);
    }

    #[test]
    fn test_modifier_keys_skip_rhythm() {
        let (mut session, clock) = session();
        type_key(&mut session, &clock, "a", 100.0);
        type_key(&mut session, &clock, "Shift", 100.0);
        type_key(&mut session, &clock, "Enter", 100.0);
        let intervals: Vec<f64> = session.rhythm_intervals().collect();
        assert_eq!(intervals, vec![200.0]);
    }

    #[test]
    fn test_counters_and_stop_keeps_data() {
        let (mut session, clock) = session();
        type_key(&mut session, &clock, "a", 100.0);
        type_key(&mut session, &clock, "Backspace", 100.0);
        clock.advance(50.0);
        session.handle_paste("pasted", Selection::caret(0));
        session.stop();
        session.handle_key_down(KeyInput::from_char('x'));

        let stats = session.live_stats();
        assert_eq!(stats.backspace_count, 1);
        assert_eq!(stats.paste_count, 1);
        assert_eq!(stats.event_count, 3);
        assert!(!session.is_capturing());
    }

    #[test]
    fn test_start_resets_everything() {
        let (mut session, clock) = session();
        let first_id = session.session_id().to_string();
        type_key(&mut session, &clock, "Backspace", 100.0);
        type_key(&mut session, &clock, "a", 100.0);
        session.start();

        assert_ne!(session.session_id(), first_id);
        assert!(session.events().is_empty());
        assert_eq!(session.rhythm_intervals().count(), 0);
        assert_eq!(session.live_stats().backspace_count, 0);
    }

    #[test]
    fn test_stats_follow_latest_event() {
        let (mut session, clock) = session();
        type_key(&mut session, &clock, "a", 100.0);
        assert_eq!(session.latest_stats().event_count, 1);
        clock.advance(10.0);
        session.handle_paste("x", Selection::caret(1));
        assert_eq!(session.latest_stats().paste_count, 1);
        assert_eq!(session.latest_stats().event_count, 2);
    }

    #[test]
    fn test_words_per_minute() {
        let (mut session, clock) = session();
        session.set_text("one two three four five six");
        clock.advance(60_000.0);
        let stats = session.live_stats();
        assert!((stats.words_per_minute - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_session_confidence_has_no_adjustments() {
        let (session, _clock) = session();
        let stats = session.live_stats();
        assert_eq!(stats.human_confidence, 100.0);
        assert_eq!(stats.rhythm_variance, 0.0);
        assert_eq!(stats.words_per_minute, 0.0);
    }

    #[test]
    fn test_human_confidence_rules() {
        // Robotic: perfectly even, no corrections.
        let robotic = human_confidence(&ConfidenceInputs {
            paste_count: 0,
            backspace_count: 0,
            key_down_count: 100,
            rhythm_variance: Some(1.0),
            thinking_pauses: 0,
        });
        assert_eq!(robotic, 55.0);

        // Natural: some corrections, varied rhythm, a few pauses.
        let natural = human_confidence(&ConfidenceInputs {
            paste_count: 0,
            backspace_count: 10,
            key_down_count: 100,
            rhythm_variance: Some(45.0),
            thinking_pauses: 3,
        });
        assert_eq!(natural, 100.0);

        let pasted = human_confidence(&ConfidenceInputs {
            paste_count: 8,
            ..Default::default()
        });
        assert_eq!(pasted, 0.0);
    }

    #[test]
    fn test_idle_gaps_excluded_from_variance() {
        let (mut session, clock) = session();
        for _ in 0..10 {
            type_key(&mut session, &clock, "a", 150.0);
        }
        type_key(&mut session, &clock, "a", 60_000.0);
        let stats = session.live_stats();
        assert!(stats.rhythm_variance < 1e-6);
        assert_eq!(stats.thinking_pauses, 0);
    }

    #[test]
    fn test_finalize_is_unsigned_snapshot() {
        let (mut session, clock) = session();
        type_key(&mut session, &clock, "h", 100.0);
        type_key(&mut session, &clock, "i", 100.0);
        session.set_text("hi");

        let meta = session.finalize_metadata();
        assert_eq!(meta.events, session.events());
        assert_eq!(meta.final_text, "hi");
        assert_eq!(meta.session_start, EPOCH);
        assert!(meta.content_hash.is_none());
        assert!(meta.signature.is_none());
    }
}
