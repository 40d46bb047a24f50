//! Blink and microsleep detection
//!
//! Closures are classified when the eyes reopen:
//! - shorter than `blink_min_secs`: noise, dropped
//! - at least `microsleep_secs`: microsleep (never a blink)
//! - otherwise, up to `blink_max_secs`: blink

use sliding_window::{Span, TimeWindow};
use tracing::debug;
use crate::DmsConfig;

/// Outcome of a finished closure
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClosureEvent {
    Blink(Span),
    Microsleep(Span),
}

/// Debounces the eye-closed signal into blink and microsleep events
pub struct BlinkAnalyzer {
    blink_min_secs: f64,
    blink_max_secs: f64,
    blink_min_interval_secs: f64,
    microsleep_secs: f64,
    /// Start of the closure in progress
    closed_since: Option<f64>,
    /// End of the last counted blink
    last_blink_end: Option<f64>,
    blinks: TimeWindow<Span>,
    microsleeps: TimeWindow<Span>,
    /// Whole seconds of the current closure already reported
    logged_seconds: u64,
}

impl BlinkAnalyzer {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            blink_min_secs: config.blink_min_secs,
            blink_max_secs: config.blink_max_secs,
            blink_min_interval_secs: config.blink_min_interval_secs,
            microsleep_secs: config.microsleep_secs,
            closed_since: None,
            last_blink_end: None,
            blinks: TimeWindow::new(config.blink_rate_window_secs),
            microsleeps: TimeWindow::new(config.microsleep_window_secs),
            logged_seconds: 0,
        }
    }

    /// Feed one frame's eye state; returns the event finalized by this frame
    pub fn update(&mut self, closed: bool, timestamp: f64) -> Option<ClosureEvent> {
        if closed {
            match self.closed_since {
                None => self.closed_since = Some(timestamp),
                Some(start) => self.log_long_closure(timestamp - start),
            }
            return None;
        }

        let start = self.closed_since.take()?;
        self.logged_seconds = 0;
        self.classify(Span::new(start, timestamp))
    }

    /// Drop the closure in progress without classifying it
    ///
    /// Called when the eye signal is lost; its true length is unknown.
    pub fn interrupt(&mut self) {
        if let Some(start) = self.closed_since.take() {
            debug!("Closure from {:.2}s dropped: eye signal lost", start);
        }
        self.logged_seconds = 0;
    }

    fn classify(&mut self, closure: Span) -> Option<ClosureEvent> {
        let duration = closure.duration();

        if duration >= self.microsleep_secs {
            debug!("Microsleep: eyes closed for {:.2}s", duration);
            self.microsleeps.push(closure);
            return Some(ClosureEvent::Microsleep(closure));
        }

        if duration < self.blink_min_secs || duration > self.blink_max_secs {
            return None;
        }

        if let Some(last_end) = self.last_blink_end {
            if closure.start - last_end < self.blink_min_interval_secs {
                debug!("Blink at {:.2}s ignored: too close to previous", closure.start);
                return None;
            }
        }

        self.last_blink_end = Some(closure.end);
        self.blinks.push(closure);
        Some(ClosureEvent::Blink(closure))
    }

    /// At most one debug line per whole second of continuous closure
    fn log_long_closure(&mut self, elapsed: f64) {
        let whole = elapsed.max(0.0).floor() as u64;
        if whole > self.logged_seconds {
            self.logged_seconds = whole;
            debug!("Eyes closed for {:.2}s...", elapsed);
        }
    }

    /// Blinks per minute over the trailing blink-rate window
    pub fn blink_rate(&mut self, now: f64) -> f64 {
        let window = self.blinks.window_secs();
        self.blinks.count(now) as f64 * 60.0 / window
    }

    /// Mean duration of blinks in the trailing window (0 when there are none)
    pub fn avg_blink_duration(&mut self, now: f64) -> f64 {
        let (total, count) = self
            .blinks
            .iter_at(now)
            .fold((0.0, 0usize), |(total, count), span| (total + span.duration(), count + 1));

        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    /// Length of the closure in progress (0 when the eyes are open)
    pub fn current_closed_duration(&self, now: f64) -> f64 {
        self.closed_since
            .map(|start| (now - start).max(0.0))
            .unwrap_or(0.0)
    }

    /// Microsleeps in the trailing microsleep window
    pub fn microsleep_count(&mut self, now: f64) -> u32 {
        self.microsleeps.count(now) as u32
    }

    pub fn reset(&mut self) {
        self.closed_since = None;
        self.last_blink_end = None;
        self.blinks.clear();
        self.microsleeps.clear();
        self.logged_seconds = 0;
    }
}
