//! Sliding Window Implementation

use crate::Timestamped;
use std::collections::VecDeque;

/// Default pre-allocated capacity (~10s of 30fps frames)
pub const DEFAULT_CAPACITY: usize = 300;

/// Ordered history that forgets entries older than `now - window_secs`
#[derive(Debug, Clone)]
pub struct TimeWindow<T> {
    /// Entries in arrival order (oldest at the front)
    entries: VecDeque<T>,
    /// Window length in seconds
    window_secs: f64,
}

impl<T: Timestamped> TimeWindow<T> {
    /// Create a new window of the given length in seconds
    pub fn new(window_secs: f64) -> Self {
        Self::with_capacity(window_secs, DEFAULT_CAPACITY)
    }

    /// Create a window with a capacity hint for its expected occupancy
    pub fn with_capacity(window_secs: f64, capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            window_secs,
        }
    }

    /// Window length in seconds
    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Append an entry (entries are expected in non-decreasing time order)
    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
    }

    /// Drop every entry whose timestamp is before `now - window_secs`
    pub fn prune(&mut self, now: f64) {
        let cutoff = now - self.window_secs;
        while let Some(front) = self.entries.front() {
            if front.timestamp() < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Prune, then return the number of entries still inside the window
    pub fn count(&mut self, now: f64) -> usize {
        self.prune(now);
        self.entries.len()
    }

    /// Prune, then iterate over the entries still inside the window
    pub fn iter_at(&mut self, now: f64) -> impl Iterator<Item = &T> {
        self.prune(now);
        self.entries.iter()
    }

    /// Iterate without pruning
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// True if any entry matches the predicate (no pruning)
    pub fn contains_by(&self, pred: impl FnMut(&T) -> bool) -> bool {
        self.entries.iter().any(pred)
    }

    /// Most recent entry
    pub fn back(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Number of entries currently held (no pruning)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the window holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Span;
    use proptest::prelude::*;

    #[test]
    fn test_prune_drops_old_entries() {
        let mut window = TimeWindow::new(10.0);
        for t in [0.0, 2.0, 5.0, 11.0, 14.0] {
            window.push(t);
        }

        assert_eq!(window.count(14.0), 4); // 0.0 < 4.0 is gone
        assert_eq!(window.count(16.0), 2); // 11.0, 14.0
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![11.0, 14.0]);
    }

    #[test]
    fn test_boundary_entry_is_kept() {
        let mut window = TimeWindow::new(30.0);
        window.push(0.0);

        // Exactly on the cutoff still counts
        assert_eq!(window.count(30.0), 1);
        assert_eq!(window.count(30.001), 0);
    }

    #[test]
    fn test_spans_expire_on_end() {
        let mut window = TimeWindow::new(10.0);
        window.push(Span::new(0.0, 1.0));
        window.push(Span::new(8.0, 12.0));

        assert_eq!(window.count(12.0), 1);
        assert_eq!(window.back().map(|s| s.start), Some(8.0));
    }

    #[test]
    fn test_span_never_negative() {
        let span = Span::new(5.0, 3.0);
        assert_eq!(span.duration(), 0.0);
        assert_eq!(Span::new(2.0, 6.0).duration_since(4.0), 2.0);
        assert_eq!(Span::new(2.0, 6.0).duration_since(7.0), 0.0);
    }

    proptest! {
        #[test]
        fn no_stale_entry_survives_query(
            mut stamps in proptest::collection::vec(0.0f64..1000.0, 0..64),
            window_secs in 1.0f64..120.0,
            now in 0.0f64..1200.0,
        ) {
            stamps.sort_by(|a, b| a.total_cmp(b));
            let mut window = TimeWindow::new(window_secs);
            for t in &stamps {
                window.push(*t);
            }

            for t in window.iter_at(now) {
                prop_assert!(*t >= now - window_secs);
            }
        }
    }
}
