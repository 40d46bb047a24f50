//! Driver Monitoring System (DMS)
//!
//! Turns per-frame facial geometry signals into drowsiness metrics:
//! - PERCLOS over a trailing window
//! - Blink rate, blink duration, and microsleep detection
//! - Yawn detection from smoothed mouth openness
//! - Weighted drowsiness score and driver state classification

pub mod analysis;
pub mod blink;
pub mod config;
pub mod perclos;
pub mod score;
pub mod state;
pub mod yawn;

pub use analysis::{DmsAnalysis, FrameInput, FrameMetrics};
pub use blink::{BlinkAnalyzer, ClosureEvent};
pub use config::DmsConfig;
pub use perclos::ClosureWindow;
pub use score::{ScoreFusion, ScoreInputs};
pub use state::{DriverState, HeadPose};
pub use yawn::YawnDetector;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Frames without a face before a warning is logged (~1s at 30fps)
const FACE_ABSENT_WARN_FRAMES: u32 = 30;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Driver monitoring module
pub struct DmsModule {
    config: DmsConfig,
    closure_window: ClosureWindow,
    blink_analyzer: BlinkAnalyzer,
    yawn_detector: YawnDetector,
    fusion: ScoreFusion,
    face_absent_frames: u32,
}

impl DmsModule {
    /// Create a new DMS module, rejecting invalid configuration
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        info!("DMS module created: EAR closed < {}, LAR open > {}",
            config.ear_closed_threshold, config.lar_threshold);

        Ok(Self {
            closure_window: ClosureWindow::new(config.perclos_window_secs),
            blink_analyzer: BlinkAnalyzer::new(&config),
            yawn_detector: YawnDetector::new(&config),
            fusion: ScoreFusion::new(&config),
            face_absent_frames: 0,
            config,
        })
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Analyze a single frame's signals
    pub fn analyze(&mut self, frame: &FrameInput) -> DmsAnalysis {
        let now = frame.timestamp;

        let ear = match frame.eye_openness {
            Some(ear) if ear.is_finite() => ear,
            _ => {
                self.closure_window.interrupt();
                self.blink_analyzer.interrupt();
                self.face_absent_frames = self.face_absent_frames.saturating_add(1);
                if self.face_absent_frames == FACE_ABSENT_WARN_FRAMES {
                    warn!("No face for {} consecutive frames", FACE_ABSENT_WARN_FRAMES);
                }
                return DmsAnalysis::no_face(now);
            }
        };
        self.face_absent_frames = 0;

        let closed = ear < self.config.ear_closed_threshold;
        self.closure_window.update(closed, now);
        self.blink_analyzer.update(closed, now);

        if let Some(lar) = frame.mouth_openness.filter(|lar| lar.is_finite()) {
            self.yawn_detector.update(lar, now);
        }

        let metrics = FrameMetrics {
            eye_openness: Some(ear),
            mouth_openness: self.yawn_detector.current_lar(),
            perclos: self.closure_window.calculate(now),
            blink_rate: self.blink_analyzer.blink_rate(now),
            avg_blink_duration: self.blink_analyzer.avg_blink_duration(now),
            closed_duration: self.blink_analyzer.current_closed_duration(now),
            microsleep_count: self.blink_analyzer.microsleep_count(now),
            yawn_count: self.yawn_detector.yawn_count(now),
            current_yawn_duration: self.yawn_detector.current_yawn_duration(now),
            is_yawning: self.yawn_detector.is_yawning(),
            yawn_timestamps: self
                .yawn_detector
                .recent_yawn_timestamps(now, self.config.yawn_count_window_secs),
        };

        let score = self.fusion.calculate_score(&ScoreInputs {
            perclos: metrics.perclos,
            blink_rate: metrics.blink_rate,
            eye_openness: Some(ear),
            closed_duration: metrics.closed_duration,
            avg_blink_duration: metrics.avg_blink_duration,
            microsleep_count: metrics.microsleep_count,
            yawn_count: metrics.yawn_count,
            current_yawn_duration: metrics.current_yawn_duration,
        });
        let state = self.fusion.classify(score, frame.head_pose.as_ref());

        debug!(
            "t={:.2} score={:.1} state={} perclos={:.1} blinks/min={:.1}",
            now, score, state, metrics.perclos, metrics.blink_rate
        );

        DmsAnalysis {
            timestamp: now,
            face_detected: true,
            score,
            state,
            metrics,
            head_pose: frame.head_pose,
        }
    }

    /// Reset analyzer state (on driver change)
    pub fn reset_state(&mut self) {
        self.closure_window.reset();
        self.blink_analyzer.reset();
        self.yawn_detector.reset();
        self.face_absent_frames = 0;
    }
}
