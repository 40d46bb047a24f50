//! Per-frame DMS input and analysis results

use serde::{Deserialize, Serialize};
use crate::state::{DriverState, HeadPose};

/// Geometry signals for one frame, as supplied by the perception layer
///
/// A frame without `eye_openness` is treated as "no face".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Capture time in seconds
    pub timestamp: f64,

    /// Eye aspect ratio (lower = more closed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_openness: Option<f64>,

    /// Mouth aspect ratio (higher = more open)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouth_openness: Option<f64>,

    /// Head pose (yaw, pitch, roll, looking)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_pose: Option<HeadPose>,
}

impl FrameInput {
    /// Whether the frame carries a usable face signal
    pub fn has_face(&self) -> bool {
        self.eye_openness.map(f64::is_finite).unwrap_or(false)
    }
}

/// Metrics gathered from the analyzers for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub eye_openness: Option<f64>,
    /// Smoothed mouth openness
    pub mouth_openness: Option<f64>,
    pub perclos: f64,
    pub blink_rate: f64,
    pub avg_blink_duration: f64,
    pub closed_duration: f64,
    pub microsleep_count: u32,
    pub yawn_count: usize,
    pub current_yawn_duration: f64,
    pub is_yawning: bool,
    /// Start times of recent confirmed yawns, oldest first
    pub yawn_timestamps: Vec<f64>,
}

/// Complete DMS analysis result for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmsAnalysis {
    pub timestamp: f64,

    /// Whether a face was detected
    pub face_detected: bool,

    /// Fused drowsiness score (0-100)
    pub score: f64,

    /// Classified driver state
    pub state: DriverState,

    /// Analyzer metrics (neutral when no face)
    pub metrics: FrameMetrics,

    /// Head pose (yaw, pitch, roll)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_pose: Option<HeadPose>,
}

impl DmsAnalysis {
    /// Analysis for a frame without a usable face
    pub fn no_face(timestamp: f64) -> Self {
        Self {
            timestamp,
            face_detected: false,
            state: DriverState::NoFace,
            ..Default::default()
        }
    }
}
