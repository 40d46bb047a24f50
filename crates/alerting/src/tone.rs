//! Repeating alert tones
//!
//! Each active alert level owns one background task that emits its tone
//! pattern until asked to stop. Stop requests are a flag plus a wakeup, so
//! the caller never waits on the audio path. A new task awaits its
//! predecessor (bounded by a grace period) before its first tone, which
//! keeps two patterns from overlapping.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::AlertError;

/// One repeating beep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TonePattern {
    pub frequency_hz: u32,
    pub duration_secs: f64,
    /// Time between the starts of consecutive beeps
    pub interval_secs: f64,
}

impl TonePattern {
    /// Level 1: 800 Hz, 0.2 s, every 2 s
    pub fn warning() -> Self {
        Self { frequency_hz: 800, duration_secs: 0.2, interval_secs: 2.0 }
    }

    /// Level 2: 1000 Hz, 0.3 s, every 0.5 s
    pub fn emergency() -> Self {
        Self { frequency_hz: 1000, duration_secs: 0.3, interval_secs: 0.5 }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), AlertError> {
        if self.frequency_hz == 0 {
            return Err(AlertError::Config(format!("{name}.frequency_hz must be positive")));
        }
        if !(self.duration_secs > 0.0) || !self.duration_secs.is_finite() {
            return Err(AlertError::Config(format!("{name}.duration_secs must be positive")));
        }
        if !(self.interval_secs > 0.0) || !self.interval_secs.is_finite() {
            return Err(AlertError::Config(format!("{name}.interval_secs must be positive")));
        }
        Ok(())
    }
}

/// Audio backend for alert tones
///
/// Implementations should hand the tone to the device and return promptly.
pub trait ToneSink: Send + Sync {
    fn emit_tone(&self, frequency_hz: u32, duration: Duration) -> Result<(), AlertError>;
}

/// Tone sink that only logs, for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToneSink;

impl ToneSink for LogToneSink {
    fn emit_tone(&self, frequency_hz: u32, duration: Duration) -> Result<(), AlertError> {
        info!(target: "alert_tone", frequency_hz, duration_ms = duration.as_millis() as u64, "beep");
        Ok(())
    }
}

/// Tone sink plus the runtime its tasks run on
///
/// An engine built without one runs silently.
#[derive(Clone)]
pub struct AudioOutput {
    sink: Arc<dyn ToneSink>,
    runtime: Handle,
}

impl AudioOutput {
    /// Bind a sink to the current tokio runtime
    pub fn new(sink: impl ToneSink + 'static) -> Result<Self, AlertError> {
        let runtime = Handle::try_current()
            .map_err(|e| AlertError::AudioUnavailable(format!("no tokio runtime: {e}")))?;
        Ok(Self::with_runtime(Arc::new(sink), runtime))
    }

    pub fn with_runtime(sink: Arc<dyn ToneSink>, runtime: Handle) -> Self {
        Self { sink, runtime }
    }
}

impl std::fmt::Debug for AudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOutput").finish_non_exhaustive()
    }
}

/// A running tone loop
///
/// Dropping the task requests a stop.
pub(crate) struct ToneTask {
    label: &'static str,
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ToneTask {
    pub(crate) fn spawn(
        output: &AudioOutput,
        label: &'static str,
        pattern: TonePattern,
        predecessor: Option<JoinHandle<()>>,
        grace: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let handle = output.runtime.spawn(run_tone_loop(
            output.sink.clone(),
            label,
            pattern,
            stop.clone(),
            wake.clone(),
            predecessor,
            grace,
        ));
        debug!("{} tone started", label);

        Self { label, stop, wake, handle: Some(handle) }
    }

    /// Ask the loop to exit after its current tone
    pub(crate) fn request_stop(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            debug!("{} tone stop requested", self.label);
        }
        self.wake.notify_one();
    }

    /// Stop the loop and hand back its join handle
    pub(crate) fn stop(mut self) -> Option<JoinHandle<()>> {
        self.request_stop();
        self.handle.take()
    }
}

impl Drop for ToneTask {
    fn drop(&mut self) {
        self.request_stop();
    }
}

async fn run_tone_loop(
    sink: Arc<dyn ToneSink>,
    label: &'static str,
    pattern: TonePattern,
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    predecessor: Option<JoinHandle<()>>,
    grace: Duration,
) {
    if let Some(previous) = predecessor {
        if tokio::time::timeout(grace, previous).await.is_err() {
            warn!("Previous tone still running after {:?}, starting {} tone anyway", grace, label);
        }
    }

    while !stop.load(Ordering::Acquire) {
        if let Err(e) = sink.emit_tone(pattern.frequency_hz, pattern.duration()) {
            warn!("{} tone failed: {}", label, e);
        }

        tokio::select! {
            _ = tokio::time::sleep(pattern.interval()) => {}
            _ = wake.notified() => {}
        }
    }
    debug!("{} tone stopped", label);
}
