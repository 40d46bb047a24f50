//! Yawn detection from the mouth-openness ratio (LAR)
//!
//! The raw LAR is smoothed with a short moving average. A candidate opens on
//! the first smoothed sample above threshold and is confirmed only after it
//! has held for both a minimum frame count and a minimum duration. Dropping
//! below threshold before that discards the candidate.

use std::collections::VecDeque;
use sliding_window::{Span, TimeWindow};
use tracing::debug;
use crate::DmsConfig;

/// A mouth-open run that has not been confirmed (or has just been)
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: f64,
    frames: u32,
    confirmed: bool,
}

/// Smooths LAR and confirms sustained openings as yawns
pub struct YawnDetector {
    threshold: f64,
    min_frames: u32,
    min_duration_secs: f64,
    smoothing_window: usize,
    lar_history: VecDeque<f64>,
    current_lar: Option<f64>,
    candidate: Option<Candidate>,
    /// Start timestamps of confirmed yawns
    yawns: TimeWindow<f64>,
}

impl YawnDetector {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            threshold: config.lar_threshold,
            min_frames: config.lar_consecutive_frames,
            min_duration_secs: config.yawn_duration_secs,
            smoothing_window: config.lar_smoothing_window.max(1),
            lar_history: VecDeque::with_capacity(config.lar_smoothing_window.max(1)),
            current_lar: None,
            candidate: None,
            yawns: TimeWindow::new(config.yawn_count_window_secs),
        }
    }

    /// Feed one frame's LAR; returns the yawn confirmed by this frame
    pub fn update(&mut self, lar: f64, timestamp: f64) -> Option<Span> {
        if self.lar_history.len() >= self.smoothing_window {
            self.lar_history.pop_front();
        }
        self.lar_history.push_back(lar);

        let smoothed = self.lar_history.iter().sum::<f64>() / self.lar_history.len() as f64;
        self.current_lar = Some(smoothed);

        if smoothed <= self.threshold {
            if let Some(candidate) = self.candidate.take() {
                if !candidate.confirmed {
                    debug!(
                        "Yawn candidate discarded after {:.2}s ({} frames)",
                        timestamp - candidate.start,
                        candidate.frames
                    );
                }
            }
            return None;
        }

        let candidate = self.candidate.get_or_insert(Candidate {
            start: timestamp,
            frames: 0,
            confirmed: false,
        });
        candidate.frames += 1;

        if candidate.confirmed
            || candidate.frames < self.min_frames
            || timestamp - candidate.start < self.min_duration_secs
        {
            return None;
        }

        candidate.confirmed = true;
        let start = candidate.start;
        self.yawns.push(start);
        debug!("Yawn confirmed: started at {:.2}s", start);
        Some(Span::new(start, timestamp))
    }

    /// Confirmed yawns in the trailing yawn-count window
    pub fn yawn_count(&mut self, now: f64) -> usize {
        self.yawns.count(now)
    }

    /// Start timestamps of yawns within `window_secs` of `now`, oldest first
    pub fn recent_yawn_timestamps(&mut self, now: f64, window_secs: f64) -> Vec<f64> {
        let cutoff = now - window_secs;
        self.yawns
            .iter_at(now)
            .copied()
            .filter(|ts| *ts >= cutoff)
            .collect()
    }

    /// How long the unconfirmed candidate has been open (0 otherwise)
    pub fn current_yawn_duration(&self, now: f64) -> f64 {
        match self.candidate {
            Some(candidate) if !candidate.confirmed => (now - candidate.start).max(0.0),
            _ => 0.0,
        }
    }

    /// Latest smoothed LAR
    pub fn current_lar(&self) -> Option<f64> {
        self.current_lar
    }

    /// True from confirmation until the mouth closes again
    pub fn is_yawning(&self) -> bool {
        self.candidate.map(|c| c.confirmed).unwrap_or(false)
    }

    pub fn reset(&mut self) {
        self.lar_history.clear();
        self.current_lar = None;
        self.candidate = None;
        self.yawns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed a constant LAR at 10fps over `[from, to)`
    fn feed(detector: &mut YawnDetector, from: f64, to: f64, lar: f64) -> Vec<Span> {
        let mut events = Vec::new();
        let mut i = 0;
        loop {
            let t = from + i as f64 * 0.1;
            if t >= to {
                break;
            }
            events.extend(detector.update(lar, t));
            i += 1;
        }
        events
    }

    #[test]
    fn test_sustained_opening_is_one_yawn() {
        let mut detector = YawnDetector::new(&DmsConfig::default());
        feed(&mut detector, 0.0, 1.0, 0.2);
        let events = feed(&mut detector, 1.0, 5.0, 0.9);

        assert_eq!(events.len(), 1);
        assert!(detector.is_yawning());
        assert_eq!(detector.yawn_count(5.0), 1);
    }

    #[test]
    fn test_short_opening_discarded() {
        let mut detector = YawnDetector::new(&DmsConfig::default());
        feed(&mut detector, 0.0, 1.0, 0.2);
        assert!(feed(&mut detector, 1.0, 2.0, 0.9).is_empty());
        assert!(detector.current_yawn_duration(2.0) > 0.0);

        feed(&mut detector, 2.0, 3.0, 0.1);
        assert_eq!(detector.current_yawn_duration(3.0), 0.0);
        assert_eq!(detector.yawn_count(3.0), 0);
        assert!(!detector.is_yawning());
    }

    #[test]
    fn test_single_frame_spike_smoothed_out() {
        let mut detector = YawnDetector::new(&DmsConfig::default());
        feed(&mut detector, 0.0, 1.0, 0.3);
        detector.update(1.5, 1.0);

        // (4 * 0.3 + 1.5) / 5 = 0.54, below 0.65
        assert!(detector.current_lar().unwrap() < 0.65);
        assert_eq!(detector.current_yawn_duration(1.0), 0.0);
    }

    #[test]
    fn test_recent_timestamps_filtered_by_window() {
        let mut detector = YawnDetector::new(&DmsConfig::default());
        feed(&mut detector, 0.0, 4.0, 0.9);
        feed(&mut detector, 4.0, 6.0, 0.1);
        feed(&mut detector, 20.0, 24.0, 0.9);

        let all = detector.recent_yawn_timestamps(24.0, 60.0);
        assert_eq!(all.len(), 2);
        let last_ten = detector.recent_yawn_timestamps(24.0, 10.0);
        assert_eq!(last_ten.len(), 1);
    }

    #[test]
    fn test_confirmation_needs_frames_and_duration() {
        let config = DmsConfig {
            lar_smoothing_window: 1,
            ..Default::default()
        };
        let mut detector = YawnDetector::new(&config);

        // Two frames, far apart: duration met, frame count not
        assert!(detector.update(0.9, 0.0).is_none());
        assert!(detector.update(0.9, 3.0).is_none());
        // Third frame satisfies both
        assert!(detector.update(0.9, 3.1).is_some());
    }
}
