//! PERCLOS (percentage of eye closure) over a trailing time window

use sliding_window::{Span, TimeWindow};

/// Sliding window of eye-closed intervals
pub struct ClosureWindow {
    /// Finalized closures, expiring on their end time
    closures: TimeWindow<Span>,
    /// Start of the closure in progress, if the eyes are closed now
    closed_since: Option<f64>,
    /// Timestamp of the latest observed frame
    last_seen: Option<f64>,
}

impl ClosureWindow {
    /// Create a calculator over a `window_secs` trailing window
    pub fn new(window_secs: f64) -> Self {
        Self {
            closures: TimeWindow::new(window_secs),
            closed_since: None,
            last_seen: None,
        }
    }

    /// Feed one frame's eye state
    pub fn update(&mut self, closed: bool, timestamp: f64) {
        match (closed, self.closed_since) {
            (true, None) => self.closed_since = Some(timestamp),
            (false, Some(start)) => {
                self.closures.push(Span::new(start, timestamp));
                self.closed_since = None;
            }
            _ => {}
        }
        self.last_seen = Some(timestamp);
    }

    /// End any closure in progress at the last observed frame
    ///
    /// Unobserved time after signal loss is never counted as closed.
    pub fn interrupt(&mut self) {
        if let (Some(start), Some(end)) = (self.closed_since.take(), self.last_seen) {
            self.closures.push(Span::new(start, end));
        }
    }

    /// Percent of the trailing window (0-100) during which the eyes were closed
    pub fn calculate(&mut self, now: f64) -> f64 {
        let window = self.closures.window_secs();
        let window_start = now - window;

        let mut closed: f64 = self
            .closures
            .iter_at(now)
            .map(|span| span.duration_since(window_start))
            .sum();

        if let Some(start) = self.closed_since {
            closed += Span::new(start, now).duration_since(window_start);
        }

        (closed / window * 100.0).clamp(0.0, 100.0)
    }

    /// Whether a closure is in progress
    pub fn is_closed(&self) -> bool {
        self.closed_since.is_some()
    }

    pub fn reset(&mut self) {
        self.closures.clear();
        self.closed_since = None;
        self.last_seen = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(window: &mut ClosureWindow, from: f64, to: f64, closed: bool) {
        let mut t = from;
        while t < to {
            window.update(closed, t);
            t += 0.1;
        }
    }

    #[test]
    fn test_no_input_is_zero() {
        let mut window = ClosureWindow::new(10.0);
        assert_eq!(window.calculate(100.0), 0.0);
    }

    #[test]
    fn test_completed_closure_counts() {
        let mut window = ClosureWindow::new(10.0);
        window.update(false, 0.0);
        window.update(true, 1.0);
        window.update(false, 3.0);

        // 2s closed out of 10s
        assert!((window.calculate(5.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_closure_included() {
        let mut window = ClosureWindow::new(10.0);
        window.update(true, 2.0);

        assert!(window.is_closed());
        assert!((window.calculate(7.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_stale_closures_dropped() {
        let mut window = ClosureWindow::new(10.0);
        window.update(true, 0.0);
        window.update(false, 1.0);

        assert!(window.calculate(5.0) > 0.0);
        // Ended at 1.0, window starts at 11.5
        assert_eq!(window.calculate(21.5), 0.0);
    }

    #[test]
    fn test_partially_expired_closure_clipped() {
        let mut window = ClosureWindow::new(10.0);
        window.update(true, 0.0);
        window.update(false, 4.0);

        // Window [2, 12] only sees 2s of the [0, 4] closure
        assert!((window.calculate(12.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_interrupt_stops_counting_at_last_frame() {
        let mut window = ClosureWindow::new(10.0);
        window.update(true, 1.0);
        window.update(true, 2.0);
        window.interrupt();

        assert!(!window.is_closed());
        // Only the observed 1s closure counts, not the gap up to now
        assert!((window.calculate(8.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_saturates_at_hundred() {
        let mut window = ClosureWindow::new(10.0);
        feed(&mut window, 0.0, 30.0, true);
        assert!((window.calculate(30.0) - 100.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn perclos_bounded_and_forgets_old_closures(
            states in proptest::collection::vec(any::<bool>(), 1..200),
            gap in 1.0f64..50.0,
        ) {
            let mut window = ClosureWindow::new(10.0);
            let mut t = 0.0;
            for closed in &states {
                window.update(*closed, t);
                t += 0.1;
            }
            let value = window.calculate(t);
            prop_assert!((0.0..=100.0).contains(&value));

            // Reopen, then look far enough ahead that every closure is stale
            window.update(false, t);
            prop_assert_eq!(window.calculate(t + 10.0 + gap), 0.0);
        }
    }
}
