//! Drowsiness score fusion
//!
//! Each metric is mapped linearly from its "alert" boundary (contributes 0)
//! to its "drowsy" boundary (contributes fully), then weighted. Weights sum
//! to 100 so the fused score is already on a 0-100 scale.
//!
//! | metric               | weight |
//! |----------------------|--------|
//! | PERCLOS              | 25     |
//! | current closure      | 20     |
//! | microsleeps          | 15     |
//! | blink rate           | 10     |
//! | mean blink duration  | 10     |
//! | eye openness (EAR)   | 10     |
//! | yawn count           | 5      |
//! | current yawn length  | 5      |

use serde::{Deserialize, Serialize};
use crate::{DmsConfig, DriverState, HeadPose};

/// Microsleep count at which that contribution saturates
const MICROSLEEP_SATURATION: f64 = 2.0;
/// Yawn count at which that contribution saturates
const YAWN_COUNT_SATURATION: f64 = 3.0;

#[derive(Debug, Clone, Copy)]
struct Weights {
    perclos: f64,
    closed_duration: f64,
    microsleep: f64,
    blink_rate: f64,
    blink_duration: f64,
    eye_openness: f64,
    yawn_count: f64,
    yawn_duration: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            perclos: 25.0,
            closed_duration: 20.0,
            microsleep: 15.0,
            blink_rate: 10.0,
            blink_duration: 10.0,
            eye_openness: 10.0,
            yawn_count: 5.0,
            yawn_duration: 5.0,
        }
    }
}

/// Current-frame metrics fed into the score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub perclos: f64,
    pub blink_rate: f64,
    /// `None` when unmeasured; a measured 0.0 is fully closed
    pub eye_openness: Option<f64>,
    pub closed_duration: f64,
    pub avg_blink_duration: f64,
    pub microsleep_count: u32,
    pub yawn_count: usize,
    pub current_yawn_duration: f64,
}

/// Stateless scorer and state classifier
pub struct ScoreFusion {
    weights: Weights,
    perclos_range: (f64, f64),
    blink_rate_range: (f64, f64),
    ear_range: (f64, f64),
    closed_range: (f64, f64),
    blink_duration_range: (f64, f64),
    yawn_duration_secs: f64,
    thresholds: [f64; 3],
}

impl ScoreFusion {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            weights: Weights::default(),
            perclos_range: (config.perclos_alert_max, config.perclos_high_drowsy_min),
            blink_rate_range: (config.blink_rate_alert_max, config.blink_rate_drowsy_min),
            ear_range: (config.ear_open_threshold, config.ear_closed_threshold),
            closed_range: (config.blink_duration_alert_max, config.eye_closed_drowsy_secs),
            blink_duration_range: (config.blink_duration_alert_max, config.blink_duration_drowsy_min),
            yawn_duration_secs: config.yawn_duration_secs,
            thresholds: [config.score_alert, config.score_slightly_drowsy, config.score_drowsy],
        }
    }

    /// Fused drowsiness score in [0, 100]
    pub fn calculate_score(&self, inputs: &ScoreInputs) -> f64 {
        let w = &self.weights;

        let eye_openness = inputs.eye_openness.map_or(0.0, |ear| ramp(ear, self.ear_range));

        let score = w.perclos * ramp(inputs.perclos, self.perclos_range)
            + w.closed_duration * ramp(inputs.closed_duration, self.closed_range)
            + w.microsleep * ramp(inputs.microsleep_count as f64, (0.0, MICROSLEEP_SATURATION))
            + w.blink_rate * ramp(inputs.blink_rate, self.blink_rate_range)
            + w.blink_duration * ramp(inputs.avg_blink_duration, self.blink_duration_range)
            + w.eye_openness * eye_openness
            + w.yawn_count * ramp(inputs.yawn_count as f64, (0.0, YAWN_COUNT_SATURATION))
            + w.yawn_duration * ramp(inputs.current_yawn_duration, (0.0, self.yawn_duration_secs));

        score.clamp(0.0, 100.0)
    }

    /// Map a score onto the drowsiness scale
    pub fn classify_state(&self, score: f64) -> DriverState {
        let [alert, slightly, drowsy] = self.thresholds;
        if !(score >= alert) {
            DriverState::Alert
        } else if score < slightly {
            DriverState::SlightlyDrowsy
        } else if score < drowsy {
            DriverState::Drowsy
        } else {
            DriverState::VeryDrowsy
        }
    }

    /// Classify with the head-pose override: looking away wins over any score
    pub fn classify(&self, score: f64, pose: Option<&HeadPose>) -> DriverState {
        match pose {
            Some(pose) if !pose.looking => DriverState::Inattentive,
            _ => self.classify_state(score),
        }
    }
}

/// Fraction of the way from `from` (0) to `to` (1), clamped; works for
/// descending ranges too. Non-finite input contributes nothing.
fn ramp(value: f64, (from, to): (f64, f64)) -> f64 {
    if !value.is_finite() || from == to {
        return 0.0;
    }
    ((value - from) / (to - from)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fusion() -> ScoreFusion {
        ScoreFusion::new(&DmsConfig::default())
    }

    fn alert_inputs() -> ScoreInputs {
        ScoreInputs {
            perclos: 2.0,
            blink_rate: 15.0,
            eye_openness: Some(0.30),
            closed_duration: 0.0,
            avg_blink_duration: 0.12,
            microsleep_count: 0,
            yawn_count: 0,
            current_yawn_duration: 0.0,
        }
    }

    #[test]
    fn test_alert_driver_scores_zero() {
        let f = fusion();
        assert_eq!(f.calculate_score(&alert_inputs()), 0.0);
        assert_eq!(f.classify_state(0.0), DriverState::Alert);
    }

    #[test]
    fn test_absent_input_is_alert() {
        let f = fusion();
        let score = f.calculate_score(&ScoreInputs::default());
        assert_eq!(score, 0.0);
        assert_eq!(f.classify(score, None), DriverState::Alert);
    }

    #[test]
    fn test_everything_saturated_scores_hundred() {
        let f = fusion();
        let inputs = ScoreInputs {
            perclos: 80.0,
            blink_rate: 40.0,
            eye_openness: Some(0.05),
            closed_duration: 3.0,
            avg_blink_duration: 0.5,
            microsleep_count: 5,
            yawn_count: 6,
            current_yawn_duration: 4.0,
        };
        assert_eq!(f.calculate_score(&inputs), 100.0);
        assert_eq!(f.classify_state(100.0), DriverState::VeryDrowsy);
    }

    #[test]
    fn test_perclos_contributes_proportionally() {
        let f = fusion();
        let inputs = ScoreInputs {
            perclos: 25.0, // halfway between 10 and 40
            ..alert_inputs()
        };
        assert!((f.calculate_score(&inputs) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_fully_closed_ear_counts() {
        let f = fusion();
        let inputs = ScoreInputs {
            eye_openness: Some(0.0),
            ..alert_inputs()
        };
        assert_eq!(f.calculate_score(&inputs), 10.0);
    }

    #[test]
    fn test_thresholds_ascending() {
        let f = fusion();
        assert_eq!(f.classify_state(24.9), DriverState::Alert);
        assert_eq!(f.classify_state(25.0), DriverState::SlightlyDrowsy);
        assert_eq!(f.classify_state(60.0), DriverState::Drowsy);
        assert_eq!(f.classify_state(80.0), DriverState::VeryDrowsy);
    }

    #[test]
    fn test_not_looking_overrides_score() {
        let f = fusion();
        let pose = HeadPose {
            yaw: 45.0,
            looking: false,
            ..Default::default()
        };
        assert_eq!(f.classify(0.0, Some(&pose)), DriverState::Inattentive);
        assert_eq!(f.classify(95.0, Some(&pose)), DriverState::Inattentive);
        assert_eq!(f.classify(95.0, Some(&HeadPose::default())), DriverState::VeryDrowsy);
    }

    #[test]
    fn test_nan_metric_ignored() {
        let f = fusion();
        let inputs = ScoreInputs {
            perclos: f64::NAN,
            ..alert_inputs()
        };
        assert_eq!(f.calculate_score(&inputs), 0.0);
    }
}
