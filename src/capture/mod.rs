//! Keystroke capture for one editing surface.
//!
//! The host editor forwards raw input callbacks to a `CaptureSession`, which
//! records timestamped events and keeps rolling statistics.

pub mod session;
pub mod types;

// Re-export commonly used types
pub use session::{
    human_confidence, CaptureSession, Clock, ConfidenceInputs, KeyInput, LiveStats, ManualClock,
    SystemClock, RHYTHM_CAPACITY,
};
pub use types::{
    BiometricMetadata, EventData, EventKind, KeystrokeEvent, Modifiers, Selection,
    FORMAT_VERSION,
};
