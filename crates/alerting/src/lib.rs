//! Alert escalation
//!
//! Turns the per-frame driver state and DMS metrics into a two-level
//! alert (warning, emergency) with repeating tones.

mod config;
mod engine;
mod reason;
mod tone;

pub use config::AlertConfig;
pub use engine::{AlertEngine, AlertInfo, AlertLevel, AlertMetrics, AlertOutcome, AlertTransition};
pub use reason::{AlertDetails, AlertReason, Trigger, TriggerKind, TriggerSet};
pub use tone::{AudioOutput, LogToneSink, TonePattern, ToneSink};

use thiserror::Error;

/// Alerting error types
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio unavailable: {0}")]
    AudioUnavailable(String),
}
