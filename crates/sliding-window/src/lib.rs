//! Time-Pruned Sliding Windows
//!
//! Provides the trailing-window history used by every per-frame detector.
//! Entries are kept in arrival order and dropped once they fall out of
//! `now - window` on the next query.

mod window;

pub use window::TimeWindow;

use serde::{Deserialize, Serialize};

/// Anything that can be placed in a [`TimeWindow`]
pub trait Timestamped {
    /// Timestamp (seconds) that decides when the entry expires
    fn timestamp(&self) -> f64;
}

impl Timestamped for f64 {
    fn timestamp(&self) -> f64 {
        *self
    }
}

/// A closed time interval `[start, end]` in seconds
///
/// Expires on its end time, so an interval that started before the window but
/// ended inside it is still counted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: f64,
    pub end: f64,
}

impl Span {
    /// Create a span, clamping `end` so the duration is never negative
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Length of the span in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Length of the part of the span that lies at or after `from`
    pub fn duration_since(&self, from: f64) -> f64 {
        (self.end - self.start.max(from)).max(0.0)
    }
}

impl Timestamped for Span {
    fn timestamp(&self) -> f64 {
        self.end
    }
}
