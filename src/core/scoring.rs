//! Heuristic scorers.
//!
//! Two independent, rule-based scorers read the same `SessionFeatures`:
//! - the behavioral scorer starts at 100 and subtracts for inhuman patterns;
//! - the AI-likelihood scorer starts at 0 and adds for machine-like patterns.
//!
//! Neither is a trained model. Each triggered rule contributes one line of
//! explanatory text.

use crate::core::features::SessionFeatures;
use serde::{Deserialize, Serialize};

/// Label for the behavioral score alone (the final verdict is separate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BehavioralVerdict {
    Verified,
    Suspicious,
    LikelyAutomated,
    Automated,
    Rejected,
}

impl BehavioralVerdict {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            BehavioralVerdict::Verified
        } else if score >= 60.0 {
            BehavioralVerdict::Suspicious
        } else if score >= 40.0 {
            BehavioralVerdict::LikelyAutomated
        } else if score >= 20.0 {
            BehavioralVerdict::Automated
        } else {
            BehavioralVerdict::Rejected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BehavioralVerdict::Verified => "VERIFIED",
            BehavioralVerdict::Suspicious => "SUSPICIOUS",
            BehavioralVerdict::LikelyAutomated => "LIKELY_AUTOMATED",
            BehavioralVerdict::Automated => "AUTOMATED",
            BehavioralVerdict::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for BehavioralVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the behavioral scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralReport {
    /// Human-likeness, 0-100.
    pub score: f64,
    pub verdict: BehavioralVerdict,
    pub anomalies: Vec<String>,
    pub metrics: SessionFeatures,
}

/// Output of the AI-likelihood scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReport {
    /// Likelihood of machine-generated input, 0-100.
    pub ai_probability: f64,
    /// Distance from a coin flip, 0-100.
    pub confidence: f64,
    pub red_flags: Vec<String>,
}

const PASTE_PENALTY: f64 = 10.0;
const LOW_VARIANCE_THRESHOLD: f64 = 10.0;
const LOW_VARIANCE_MIN_EVENTS: usize = 20;
const SUPERHUMAN_KEYS_PER_SEC: f64 = 15.0;
const FEW_CORRECTIONS_RATIO: f64 = 0.02;
const FEW_CORRECTIONS_MIN_EVENTS: usize = 50;

/// Score how human the session's behavior looks.
pub fn score_behavior(features: &SessionFeatures) -> BehavioralReport {
    let mut score = 100.0;
    let mut anomalies = Vec::new();

    if features.paste_count > 0 {
        score -= PASTE_PENALTY * features.paste_count as f64;
        anomalies.push(format!(
            "Paste operations detected ({} paste events)",
            features.paste_count
        ));
    }

    if features.key_down_count > LOW_VARIANCE_MIN_EVENTS {
        if let Some(variance) = features.rhythm_variance() {
            if variance < LOW_VARIANCE_THRESHOLD {
                score -= 30.0;
                anomalies.push(format!(
                    "Typing rhythm too consistent (variance {variance:.1})"
                ));
            }
        }
    }

    if features.keys_per_second > SUPERHUMAN_KEYS_PER_SEC {
        score -= 20.0;
        anomalies.push(format!(
            "Superhuman typing speed ({:.1} keys/sec)",
            features.keys_per_second
        ));
    }

    if features.key_down_count > FEW_CORRECTIONS_MIN_EVENTS
        && features.backspace_ratio < FEW_CORRECTIONS_RATIO
    {
        score -= 15.0;
        anomalies.push(format!(
            "Too few corrections (backspace ratio {:.3})",
            features.backspace_ratio
        ));
    }

    let score = f64::clamp(score, 0.0, 100.0);
    BehavioralReport {
        score,
        verdict: BehavioralVerdict::from_score(score),
        anomalies,
        metrics: features.clone(),
    }
}

/// Score how likely the session is machine-generated.
pub fn score_ai_likelihood(features: &SessionFeatures) -> AiReport {
    let mut probability = 0.0;
    let mut red_flags = Vec::new();

    if let Some(consistency) = features.consistency {
        if consistency < 0.3 {
            probability += 25.0;
            red_flags.push(format!(
                "Highly consistent typing rhythm (consistency {consistency:.2})"
            ));
        } else if consistency < 0.5 {
            probability += 15.0;
            red_flags.push(format!(
                "Unusually consistent typing rhythm (consistency {consistency:.2})"
            ));
        }
    }

    if features.burst_ratio > 0.1 {
        probability += 20.0;
        red_flags.push(format!(
            "Burst-and-pause typing pattern ({:.0}% of intervals)",
            features.burst_ratio * 100.0
        ));
    }

    if features.backspace_ratio < FEW_CORRECTIONS_RATIO {
        probability += 15.0;
        red_flags.push(format!(
            "Very few corrections (backspace ratio {:.3})",
            features.backspace_ratio
        ));
    }

    let paste_ratio = features.paste_ratio();
    if paste_ratio > 0.1 {
        probability += 20.0;
        red_flags.push(format!(
            "Significant paste operations detected ({:.0}% of final text)",
            paste_ratio * 100.0
        ));
    }

    let density = features.keystroke_density();
    if density > 2.0 {
        probability += 10.0;
        red_flags.push(format!(
            "Unnaturally dense editing ({density:.1} keystrokes per character)"
        ));
    }

    if !features.intervals.is_empty()
        && features.thinking_pauses < 2
        && features.mean_interval_ms < 200.0
    {
        probability += 10.0;
        red_flags.push(format!(
            "Rapid typing without thinking pauses (mean interval {:.0}ms)",
            features.mean_interval_ms
        ));
    }

    let ai_probability = f64::min(probability, 100.0);
    AiReport {
        ai_probability,
        confidence: (ai_probability - 50.0).abs() * 2.0,
        red_flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::extract_features;
    use crate::core::features::test_support::*;

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(BehavioralVerdict::from_score(100.0), BehavioralVerdict::Verified);
        assert_eq!(BehavioralVerdict::from_score(80.0), BehavioralVerdict::Verified);
        assert_eq!(BehavioralVerdict::from_score(70.0), BehavioralVerdict::Suspicious);
        assert_eq!(BehavioralVerdict::from_score(40.0), BehavioralVerdict::LikelyAutomated);
        assert_eq!(BehavioralVerdict::from_score(20.0), BehavioralVerdict::Automated);
        assert_eq!(BehavioralVerdict::from_score(19.9), BehavioralVerdict::Rejected);
    }

    #[test]
    fn test_even_typing_with_corrections_is_suspicious() {
        // 200 key-downs 150ms apart, 8 of them backspaces, no pastes.
        let mut events = even_typing(200, 150.0, "a");
        for i in (10..200).step_by(24).take(8) {
            events[i].data.key = Some("Backspace".to_string());
        }
        let features = extract_features(&metadata(events, &"a".repeat(184)));
        assert_eq!(features.backspace_count, 8);

        let report = score_behavior(&features);
        assert_eq!(report.score, 70.0);
        assert_eq!(report.verdict, BehavioralVerdict::Suspicious);
        assert!(report
            .anomalies
            .iter()
            .any(|a| a.starts_with("Typing rhythm too consistent")));
        assert_eq!(report.anomalies.len(), 1);
    }

    #[test]
    fn test_superhuman_speed_and_no_corrections() {
        let events = even_typing(60, 40.0, "a");
        let report = score_behavior(&extract_features(&metadata(events, &"a".repeat(60))));
        // low variance -30, speed -20, no corrections -15
        assert_eq!(report.score, 35.0);
        assert_eq!(report.verdict, BehavioralVerdict::Automated);
        assert_eq!(report.anomalies.len(), 3);
    }

    #[test]
    fn test_paste_penalty() {
        let events = vec![paste(0.0, "hello"), paste(100.0, "world")];
        let report = score_behavior(&extract_features(&metadata(events, "helloworld")));
        assert_eq!(report.score, 80.0);
    }

    #[test]
    fn test_single_large_paste_flags_ai() {
        let text = "x".repeat(500);
        let events = vec![paste(0.0, &text)];
        let report = score_ai_likelihood(&extract_features(&metadata(events, &text)));
        assert!(report
            .red_flags
            .iter()
            .any(|f| f.starts_with("Significant paste operations detected")));
        // paste + no corrections
        assert_eq!(report.ai_probability, 35.0);
        assert_eq!(report.confidence, 30.0);
    }

    #[test]
    fn test_robotic_typing_maxes_out_rules() {
        let events = even_typing(100, 50.0, "a");
        let report = score_ai_likelihood(&extract_features(&metadata(events, "aa")));
        // consistency 25 + corrections 15 + density 10 + no pauses 10
        assert_eq!(report.ai_probability, 60.0);
        assert_eq!(report.red_flags.len(), 4);
    }

    #[test]
    fn test_ai_probability_is_clamped() {
        let features = SessionFeatures {
            consistency: Some(0.1),
            burst_ratio: 0.5,
            pasted_chars: 100,
            final_text_length: 10,
            key_down_count: 100,
            intervals: vec![50.0, 60.0],
            mean_interval_ms: 55.0,
            ..Default::default()
        };
        let report = score_ai_likelihood(&features);
        assert_eq!(report.ai_probability, 100.0);
        assert_eq!(report.confidence, 100.0);
    }

    #[test]
    fn test_natural_typing_scores_clean() {
        let times = [
            0.0, 180.0, 310.0, 620.0, 700.0, 1900.0, 2050.0, 2300.0, 2380.0, 3700.0, 3950.0,
            4100.0,
        ];
        let keys = ["h", "e", "l", "l", "o", " ", "w", "o", "r", "Backspace", "r", "d"];
        let events = typed(&keys, &times);
        let features = extract_features(&metadata(events, "hello word"));
        let behavior = score_behavior(&features);
        let ai = score_ai_likelihood(&features);
        assert_eq!(behavior.score, 100.0);
        assert!(ai.ai_probability <= 15.0, "ai = {}", ai.ai_probability);
    }
}
