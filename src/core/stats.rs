//! Small numeric helpers shared by live stats, scorers and the verifier.
//!
//! Every helper returns a neutral value instead of dividing by zero.

use statrs::statistics::Statistics;

/// Intervals at or above this are treated as idle time, not rhythm.
pub const IDLE_INTERVAL_MS: f64 = 5000.0;

/// Intervals above this count as a thinking pause.
pub const THINKING_PAUSE_MS: f64 = 1000.0;

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    Statistics::mean(values.iter())
}

/// Population standard deviation, 0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().population_std_dev()
}

/// `std_dev / mean`, or `None` when it is undefined.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    if m <= 0.0 {
        return None;
    }
    Some(std_dev(values) / m)
}

/// `numerator / denominator`, 0 when the denominator is 0.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Keep intervals that belong to the typing rhythm (drop idle gaps and
/// negative values from out-of-order input).
pub fn rhythm_intervals(intervals: &[f64]) -> Vec<f64> {
    intervals
        .iter()
        .copied()
        .filter(|&i| (0.0..IDLE_INTERVAL_MS).contains(&i))
        .collect()
}

/// Consecutive differences of a timestamp series.
pub fn intervals_of(timestamps: &[f64]) -> Vec<f64> {
    timestamps.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

pub fn count_thinking_pauses(intervals: &[f64]) -> usize {
    intervals.iter().filter(|&&i| i > THINKING_PAUSE_MS).count()
}
