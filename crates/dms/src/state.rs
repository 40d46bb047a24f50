//! Driver state classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal driver state derived from the drowsiness score and head pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverState {
    #[default]
    Alert,
    SlightlyDrowsy,
    Drowsy,
    VeryDrowsy,
    /// Head pose says the driver is not looking at the road
    Inattentive,
    /// No usable face signal this frame
    NoFace,
}

impl DriverState {
    /// States that count as drowsiness symptoms for alerting
    pub fn is_symptomatic(self) -> bool {
        matches!(
            self,
            DriverState::SlightlyDrowsy
                | DriverState::Drowsy
                | DriverState::VeryDrowsy
                | DriverState::Inattentive
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DriverState::Alert => "ALERT",
            DriverState::SlightlyDrowsy => "SLIGHTLY_DROWSY",
            DriverState::Drowsy => "DROWSY",
            DriverState::VeryDrowsy => "VERY_DROWSY",
            DriverState::Inattentive => "INATTENTIVE",
            DriverState::NoFace => "NO_FACE",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Head pose (Euler angles) as supplied by the perception layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Yaw (left-right rotation) in degrees
    pub yaw: f64,
    /// Pitch (up-down tilt) in degrees
    pub pitch: f64,
    /// Roll (side tilt) in degrees
    pub roll: f64,
    /// Whether gaze is on the road
    pub looking: bool,
}

impl Default for HeadPose {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            looking: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symptomatic_states() {
        assert!(!DriverState::Alert.is_symptomatic());
        assert!(!DriverState::NoFace.is_symptomatic());
        assert!(DriverState::SlightlyDrowsy.is_symptomatic());
        assert!(DriverState::VeryDrowsy.is_symptomatic());
        assert!(DriverState::Inattentive.is_symptomatic());
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&DriverState::SlightlyDrowsy).unwrap();
        assert_eq!(json, "\"SLIGHTLY_DROWSY\"");
        assert_eq!(DriverState::NoFace.to_string(), "NO_FACE");
    }
}
