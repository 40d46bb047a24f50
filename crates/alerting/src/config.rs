//! Alert engine configuration

use serde::{Deserialize, Serialize};
use crate::tone::TonePattern;
use crate::AlertError;

/// Alert configuration
///
/// Times are in seconds, PERCLOS in percent, blink rate in blinks/min.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Continuous symptom time before Level 1 fires
    pub level1_duration_secs: f64,
    /// Level 1 age at which a persisting symptom escalates to Level 2
    pub level2_duration_secs: f64,
    /// Minimum Level 1 age before a symptom-free frame resets the engine
    pub level1_reset_quiet_secs: f64,

    /// Trailing window for yawn frequency
    pub yawn_alert_window_secs: f64,
    /// Yawn trigger fires when yawns in the window exceed this
    pub yawn_alert_threshold: usize,
    /// Window for the "yawned recently" check
    pub yawn_recent_window_secs: f64,

    /// Blink rate at or above this fires the blink-rate trigger
    pub blink_rate_level1_threshold: f64,
    /// Whether a microsleep fires Level 1 immediately
    pub microsleep_level1_trigger: bool,
    /// PERCLOS range (inclusive) for the PERCLOS trigger
    pub perclos_level1_min: f64,
    pub perclos_level1_max: f64,
    /// EAR below this counts as an eye issue for yawn escalation
    pub ear_closed_threshold: f64,

    /// Trailing window for Level 1 recurrence
    pub level1_frequency_window_secs: f64,
    /// Level 1 activations within the window that force Level 2
    pub level1_frequency_threshold: usize,

    /// Level 1 warning tone
    pub level1_tone: TonePattern,
    /// Level 2 emergency tone
    pub level2_tone: TonePattern,
    /// How long the Level 2 task waits for the Level 1 task to finish
    pub handoff_grace_secs: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            level1_duration_secs: 3.0,
            level2_duration_secs: 10.0,
            level1_reset_quiet_secs: 5.0,
            yawn_alert_window_secs: 30.0,
            yawn_alert_threshold: 2,
            yawn_recent_window_secs: 20.0,
            blink_rate_level1_threshold: 30.0,
            microsleep_level1_trigger: true,
            perclos_level1_min: 15.0,
            perclos_level1_max: 40.0,
            ear_closed_threshold: 0.16,
            level1_frequency_window_secs: 300.0,
            level1_frequency_threshold: 3,
            level1_tone: TonePattern::warning(),
            level2_tone: TonePattern::emergency(),
            handoff_grace_secs: 0.5,
        }
    }
}

impl AlertConfig {
    /// Reject configurations that would misbehave mid-session
    pub fn validate(&self) -> Result<(), AlertError> {
        let non_negative = [
            ("level1_duration_secs", self.level1_duration_secs),
            ("level2_duration_secs", self.level2_duration_secs),
            ("level1_reset_quiet_secs", self.level1_reset_quiet_secs),
            ("handoff_grace_secs", self.handoff_grace_secs),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(AlertError::Config(format!("{name} must be a finite non-negative number, got {value}")));
            }
        }

        let windows = [
            ("yawn_alert_window_secs", self.yawn_alert_window_secs),
            ("yawn_recent_window_secs", self.yawn_recent_window_secs),
            ("level1_frequency_window_secs", self.level1_frequency_window_secs),
        ];
        for (name, value) in windows {
            if !(value > 0.0) {
                return Err(AlertError::Config(format!("{name} must be positive, got {value}")));
            }
        }

        if !(self.perclos_level1_min <= self.perclos_level1_max) {
            return Err(AlertError::Config(format!(
                "perclos_level1_min ({}) must not exceed perclos_level1_max ({})",
                self.perclos_level1_min, self.perclos_level1_max
            )));
        }
        if self.level1_frequency_threshold == 0 {
            return Err(AlertError::Config("level1_frequency_threshold must be at least 1".into()));
        }

        self.level1_tone.validate("level1_tone")?;
        self.level2_tone.validate("level2_tone")?;
        Ok(())
    }
}
