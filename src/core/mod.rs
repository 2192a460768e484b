//! Core analysis for HumanSign.
//!
//! This module contains:
//! - Numeric helpers shared by live stats and the scorers
//! - Feature extraction from a finished event log
//! - The behavioral and AI-likelihood scorers

pub mod features;
pub mod scoring;
pub mod stats;

// Re-export commonly used types
pub use features::{extract_features, SessionFeatures};
pub use scoring::{
    score_ai_likelihood, score_behavior, AiReport, BehavioralReport, BehavioralVerdict,
};
