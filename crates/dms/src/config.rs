//! DMS configuration

use serde::{Deserialize, Serialize};
use crate::DmsError;

/// Thresholds and window sizes for the per-frame analyzers
///
/// Times are in seconds, PERCLOS in percent, blink rate in blinks/min.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// EAR below this value counts as eyes closed
    pub ear_closed_threshold: f64,
    /// EAR at or above this value contributes nothing to the score
    pub ear_open_threshold: f64,

    /// Smoothed LAR above this value counts as mouth open
    pub lar_threshold: f64,
    /// Number of frames averaged when smoothing LAR
    pub lar_smoothing_window: usize,
    /// Consecutive above-threshold frames required before a yawn is confirmed
    pub lar_consecutive_frames: u32,
    /// Minimum sustained mouth opening for a yawn
    pub yawn_duration_secs: f64,
    /// Trailing window for yawn counting
    pub yawn_count_window_secs: f64,

    /// Continuous closure that counts as fully drowsy in the score
    pub eye_closed_drowsy_secs: f64,
    /// Closures at least this long are microsleeps, not blinks
    pub microsleep_secs: f64,
    /// Trailing window for microsleep counting
    pub microsleep_window_secs: f64,

    /// Shortest closure that counts as a blink (shorter is noise)
    pub blink_min_secs: f64,
    /// Longest closure that counts as a blink
    pub blink_max_secs: f64,
    /// A blink starting sooner than this after the previous one is ignored
    pub blink_min_interval_secs: f64,
    /// Trailing window for blink rate and mean blink duration
    pub blink_rate_window_secs: f64,

    /// Trailing window for PERCLOS
    pub perclos_window_secs: f64,
    /// PERCLOS up to this value is considered alert
    pub perclos_alert_max: f64,
    /// PERCLOS at which the score contribution saturates
    pub perclos_high_drowsy_min: f64,

    /// Blink rate up to this value is considered alert
    pub blink_rate_alert_max: f64,
    /// Blink rate at which the score contribution saturates
    pub blink_rate_drowsy_min: f64,
    /// Mean blink duration up to this value is considered alert
    pub blink_duration_alert_max: f64,
    /// Mean blink duration at which the score contribution saturates
    pub blink_duration_drowsy_min: f64,

    /// Scores below this are ALERT
    pub score_alert: f64,
    /// Scores below this are SLIGHTLY_DROWSY
    pub score_slightly_drowsy: f64,
    /// Scores below this are DROWSY, above are VERY_DROWSY
    pub score_drowsy: f64,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_closed_threshold: 0.16,
            ear_open_threshold: 0.25,
            lar_threshold: 0.65,
            lar_smoothing_window: 5,
            lar_consecutive_frames: 3,
            yawn_duration_secs: 2.0,
            yawn_count_window_secs: 60.0,
            eye_closed_drowsy_secs: 0.6,
            microsleep_secs: 0.45,
            microsleep_window_secs: 60.0,
            blink_min_secs: 0.08,
            blink_max_secs: 0.80,
            blink_min_interval_secs: 0.10,
            blink_rate_window_secs: 60.0,
            perclos_window_secs: 10.0,
            perclos_alert_max: 10.0,
            perclos_high_drowsy_min: 40.0,
            blink_rate_alert_max: 18.0,
            blink_rate_drowsy_min: 28.0,
            blink_duration_alert_max: 0.18,
            blink_duration_drowsy_min: 0.28,
            score_alert: 25.0,
            score_slightly_drowsy: 55.0,
            score_drowsy: 80.0,
        }
    }
}

impl DmsConfig {
    /// Create strict config (earlier classification)
    pub fn strict() -> Self {
        Self {
            microsleep_secs: 0.40,
            score_alert: 20.0,
            score_slightly_drowsy: 45.0,
            score_drowsy: 70.0,
            ..Default::default()
        }
    }

    /// Create lenient config (later classification)
    pub fn lenient() -> Self {
        Self {
            microsleep_secs: 0.50,
            score_alert: 30.0,
            score_slightly_drowsy: 60.0,
            score_drowsy: 85.0,
            ..Default::default()
        }
    }

    /// Reject configurations that would misbehave mid-session
    pub fn validate(&self) -> Result<(), DmsError> {
        let windows = [
            ("yawn_count_window_secs", self.yawn_count_window_secs),
            ("microsleep_window_secs", self.microsleep_window_secs),
            ("blink_rate_window_secs", self.blink_rate_window_secs),
            ("perclos_window_secs", self.perclos_window_secs),
        ];
        for (name, value) in windows {
            if !(value > 0.0) {
                return Err(DmsError::Config(format!("{name} must be positive, got {value}")));
            }
        }

        ordered("ear_closed_threshold", self.ear_closed_threshold, "ear_open_threshold", self.ear_open_threshold)?;
        ordered("blink_min_secs", self.blink_min_secs, "blink_max_secs", self.blink_max_secs)?;
        ordered("blink_min_secs", self.blink_min_secs, "microsleep_secs", self.microsleep_secs)?;
        ordered("perclos_alert_max", self.perclos_alert_max, "perclos_high_drowsy_min", self.perclos_high_drowsy_min)?;
        ordered("blink_rate_alert_max", self.blink_rate_alert_max, "blink_rate_drowsy_min", self.blink_rate_drowsy_min)?;
        ordered(
            "blink_duration_alert_max",
            self.blink_duration_alert_max,
            "blink_duration_drowsy_min",
            self.blink_duration_drowsy_min,
        )?;
        ordered("score_alert", self.score_alert, "score_slightly_drowsy", self.score_slightly_drowsy)?;
        ordered("score_slightly_drowsy", self.score_slightly_drowsy, "score_drowsy", self.score_drowsy)?;

        if self.lar_smoothing_window == 0 {
            return Err(DmsError::Config("lar_smoothing_window must be at least 1".into()));
        }
        if self.lar_consecutive_frames == 0 {
            return Err(DmsError::Config("lar_consecutive_frames must be at least 1".into()));
        }
        if self.blink_min_secs < 0.0 || self.yawn_duration_secs < 0.0 || self.blink_min_interval_secs < 0.0 {
            return Err(DmsError::Config("durations must not be negative".into()));
        }

        Ok(())
    }
}

fn ordered(low_name: &str, low: f64, high_name: &str, high: f64) -> Result<(), DmsError> {
    if low < high {
        Ok(())
    } else {
        Err(DmsError::Config(format!(
            "{low_name} ({low}) must be below {high_name} ({high})"
        )))
    }
}
