//! Monitoring Session
//!
//! Per-frame pipeline for one driver session:
//! - DMS analysis (PERCLOS, blinks, yawns, score, state)
//! - Alert escalation
//! - Alert edge, emergency, and driver state logging to an event sink
//! - Session statistics and summary

mod settings;

pub use settings::{SessionConfig, Settings};

use alerting::{AlertEngine, AlertError, AlertLevel, AlertMetrics, AlertOutcome, AlertTransition, AudioOutput};
use cloud_sync::{AlertRecord, CloudError, DriverStatus, EventSink, SessionSummary};
use dms::{DmsAnalysis, DmsError, DmsModule, FrameInput};
use metrics::{counter, gauge};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("DMS error: {0}")]
    Dms(#[from] DmsError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("Event sink error: {0}")]
    Sink(#[from] CloudError),
}

impl From<config::ConfigError> for MonitorError {
    fn from(e: config::ConfigError) -> Self {
        MonitorError::Settings(e.to_string())
    }
}

/// Result of one frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub analysis: DmsAnalysis,
    pub alert: AlertOutcome,
}

/// Running session statistics
#[derive(Debug, Clone, Default)]
struct SessionStats {
    frames: u64,
    face_frames: u64,
    score_sum: f64,
    max_score: f64,
    alert_count: u32,
    first_timestamp: Option<f64>,
    last_timestamp: Option<f64>,
}

impl SessionStats {
    fn summary(&self) -> SessionSummary {
        let avg_score = if self.face_frames > 0 {
            self.score_sum / self.face_frames as f64
        } else {
            0.0
        };
        let duration_secs = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => (last - first).max(0.0),
            _ => 0.0,
        };

        SessionSummary {
            avg_score,
            max_score: self.max_score,
            alert_count: self.alert_count,
            duration_secs,
            frames: self.frames,
        }
    }
}

/// One monitoring session
pub struct MonitorSession {
    dms: DmsModule,
    engine: AlertEngine,
    sink: Box<dyn EventSink>,
    state_log_interval_secs: f64,
    last_state_log: Option<f64>,
    stats: SessionStats,
}

impl MonitorSession {
    /// Build the pipeline; `audio` enables alert tones
    pub fn new(
        settings: &Settings,
        sink: Box<dyn EventSink>,
        audio: Option<AudioOutput>,
    ) -> Result<Self, MonitorError> {
        settings.validate()?;

        let dms = DmsModule::new(settings.dms.clone())?;
        let engine = AlertEngine::new(settings.alert.clone(), audio)?;
        info!("Monitoring session started");

        Ok(Self {
            dms,
            engine,
            sink,
            state_log_interval_secs: settings.session.state_log_interval_secs,
            last_state_log: None,
            stats: SessionStats::default(),
        })
    }

    /// Analyze one frame, advance the alert engine, and log what changed
    pub fn process_frame(&mut self, frame: &FrameInput) -> FrameReport {
        let now = frame.timestamp;
        let analysis = self.dms.analyze(frame);

        let metrics = if analysis.face_detected {
            AlertMetrics {
                yawn_timestamps: analysis.metrics.yawn_timestamps.clone(),
                perclos: Some(analysis.metrics.perclos),
                blink_rate: Some(analysis.metrics.blink_rate),
                microsleep_count: analysis.metrics.microsleep_count,
                ear: analysis.metrics.eye_openness,
            }
        } else {
            AlertMetrics::default()
        };
        let alert = self.engine.process(analysis.state, now, &metrics);

        self.record_frame(&analysis);
        self.log_transitions(&alert.transitions);
        self.log_driver_state(&analysis, alert.level);

        counter!("dms_frames_total").increment(1);
        gauge!("dms_alert_level").set(alert.level.as_u8() as f64);

        FrameReport { analysis, alert }
    }

    /// Driver acknowledged the alert
    pub fn manual_reset(&mut self, timestamp: f64) {
        if self.engine.manual_reset() {
            info!("Alerts manually reset at t={:.2}", timestamp);
        }
        gauge!("dms_alert_level").set(0.0);
    }

    pub fn alert_level(&self) -> AlertLevel {
        self.engine.alert_level()
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    pub fn alert_count(&self) -> u32 {
        self.stats.alert_count
    }

    pub fn frames(&self) -> u64 {
        self.stats.frames
    }

    /// Log the session summary and end the session
    ///
    /// Dropping the engine here stops any tone still playing.
    pub fn finish(mut self) -> SessionSummary {
        let summary = self.stats.summary();
        if let Err(e) = self.sink.log_session_summary(&summary) {
            warn!("Failed to log session summary: {}", e);
        }
        info!(
            "Session summary: duration={:.1}s avg_score={:.1} max_score={:.1} alerts={}",
            summary.duration_secs, summary.avg_score, summary.max_score, summary.alert_count
        );
        summary
    }

    fn record_frame(&mut self, analysis: &DmsAnalysis) {
        let stats = &mut self.stats;
        stats.frames += 1;
        stats.first_timestamp.get_or_insert(analysis.timestamp);
        stats.last_timestamp = Some(analysis.timestamp);

        if analysis.face_detected {
            stats.face_frames += 1;
            stats.score_sum += analysis.score;
            stats.max_score = stats.max_score.max(analysis.score);
            gauge!("dms_score").set(analysis.score);
        }
    }

    fn log_transitions(&mut self, transitions: &[AlertTransition]) {
        for transition in transitions {
            match transition {
                AlertTransition::Raised(info) => {
                    self.stats.alert_count += 1;
                    counter!("dms_alerts_total", "level" => info.level.as_str()).increment(1);

                    if let Err(e) = self.sink.log_alert(&AlertRecord::from(info)) {
                        warn!("Failed to log {} alert: {}", info.level, e);
                    }
                    if info.level == AlertLevel::Level2 {
                        if let Err(e) = self.sink.send_emergency(info.timestamp) {
                            warn!("Failed to send emergency: {}", e);
                        }
                    }
                }
                AlertTransition::Cleared { timestamp, manual } => {
                    debug!("Alert cleared at t={:.2} (manual: {})", timestamp, manual);
                }
            }
        }
    }

    /// First face frame logs at once, then every `state_log_interval_secs`
    fn log_driver_state(&mut self, analysis: &DmsAnalysis, level: AlertLevel) {
        if !analysis.face_detected {
            return;
        }
        let now = analysis.timestamp;
        if self
            .last_state_log
            .is_some_and(|last| now - last < self.state_log_interval_secs)
        {
            return;
        }
        self.last_state_log = Some(now);

        let status = DriverStatus {
            timestamp: now,
            state: analysis.state,
            score: analysis.score,
            eye_openness: analysis.metrics.eye_openness,
            perclos: analysis.metrics.perclos,
            blink_rate: analysis.metrics.blink_rate,
            alert_level: level.as_u8(),
        };
        if let Err(e) = self.sink.update_driver_state(&status) {
            warn!("Failed to log driver state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_sync::{MemorySink, SinkEvent};
    use dms::HeadPose;

    fn open_frame(t: f64) -> FrameInput {
        FrameInput {
            timestamp: t,
            eye_openness: Some(0.30),
            mouth_openness: Some(0.30),
            head_pose: Some(HeadPose::default()),
        }
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn log_alert(&mut self, _: &AlertRecord) -> Result<(), CloudError> {
            Err(CloudError::Unavailable("offline".into()))
        }
        fn send_emergency(&mut self, _: f64) -> Result<(), CloudError> {
            Err(CloudError::Unavailable("offline".into()))
        }
        fn update_driver_state(&mut self, _: &DriverStatus) -> Result<(), CloudError> {
            Err(CloudError::Unavailable("offline".into()))
        }
        fn log_session_summary(&mut self, _: &SessionSummary) -> Result<(), CloudError> {
            Err(CloudError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = Settings::default();
        settings.session.state_log_interval_secs = 0.0;
        let result = MonitorSession::new(&settings, Box::new(MemorySink::new()), None);
        assert!(matches!(result, Err(MonitorError::Settings(_))));
    }

    #[test]
    fn test_driver_state_logged_on_interval() {
        let sink = MemorySink::new();
        let mut session = MonitorSession::new(&Settings::default(), Box::new(sink.clone()), None).unwrap();

        for i in 0..600 {
            session.process_frame(&open_frame(i as f64 / 30.0));
        }

        let snapshots: Vec<f64> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::DriverState(status) => Some(status.timestamp),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots, vec![0.0, 5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_first_snapshot_waits_for_face() {
        let sink = MemorySink::new();
        let mut session = MonitorSession::new(&Settings::default(), Box::new(sink.clone()), None).unwrap();

        for i in 0..60 {
            session.process_frame(&FrameInput {
                timestamp: i as f64 / 30.0,
                ..Default::default()
            });
        }
        session.process_frame(&open_frame(2.0));
        session.process_frame(&open_frame(3.0));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SinkEvent::DriverState(status) if status.timestamp == 2.0));
    }

    #[test]
    fn test_no_face_frames_skip_snapshots_and_stats() {
        let sink = MemorySink::new();
        let mut session = MonitorSession::new(&Settings::default(), Box::new(sink.clone()), None).unwrap();

        for i in 0..300 {
            let report = session.process_frame(&FrameInput {
                timestamp: i as f64 / 30.0,
                ..Default::default()
            });
            assert_eq!(report.alert.level, AlertLevel::Idle);
        }

        assert!(sink.events().is_empty());
        let summary = session.finish();
        assert_eq!(summary.frames, 300);
        assert_eq!(summary.avg_score, 0.0);
        assert_eq!(summary.alert_count, 0);
    }

    #[test]
    fn test_sink_failures_do_not_interrupt_frames() {
        let mut session = MonitorSession::new(&Settings::default(), Box::new(FailingSink), None).unwrap();

        for i in 0..900 {
            let ear = if i < 150 { 0.30 } else { 0.05 };
            session.process_frame(&FrameInput {
                eye_openness: Some(ear),
                ..open_frame(i as f64 / 30.0)
            });
        }

        assert!(session.alert_count() >= 1);
        let summary = session.finish();
        assert_eq!(summary.frames, 900);
    }
}
