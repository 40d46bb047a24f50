//! Event Sink
//!
//! Outbound logging for a monitoring session:
//! - Alert edges (LEVEL1 / LEVEL2) with reason and details
//! - Emergency notifications
//! - Periodic driver state snapshots
//! - Session summary
//!
//! [`OfflineLog`] appends every record to a local JSON-lines file;
//! [`MemorySink`] keeps them in memory.

mod offline;

pub use offline::{LogEntry, OfflineLog};

use alerting::{AlertDetails, AlertInfo, AlertLevel};
use dms::DriverState;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Sink error types
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// A raised alert, as logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// "LEVEL1" or "LEVEL2"
    pub level: String,
    pub timestamp: f64,
    pub reason: String,
    pub details: AlertDetails,
}

impl From<&AlertInfo> for AlertRecord {
    fn from(info: &AlertInfo) -> Self {
        Self {
            level: info.level.as_str().to_string(),
            timestamp: info.timestamp,
            reason: info.reason.to_string(),
            details: info.details.clone(),
        }
    }
}

/// Periodic driver state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub timestamp: f64,
    pub state: DriverState,
    pub score: f64,
    pub eye_openness: Option<f64>,
    pub perclos: f64,
    pub blink_rate: f64,
    pub alert_level: u8,
}

/// End-of-session statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Mean score over frames with a face
    pub avg_score: f64,
    pub max_score: f64,
    /// LEVEL1 entries plus LEVEL2 entries
    pub alert_count: u32,
    pub duration_secs: f64,
    pub frames: u64,
}

/// One call made on a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkEvent {
    Alert(AlertRecord),
    Emergency { timestamp: f64 },
    DriverState(DriverStatus),
    SessionSummary(SessionSummary),
}

/// Outbound logging capability
pub trait EventSink: Send {
    fn log_alert(&mut self, record: &AlertRecord) -> Result<(), CloudError>;

    fn send_emergency(&mut self, timestamp: f64) -> Result<(), CloudError>;

    fn update_driver_state(&mut self, status: &DriverStatus) -> Result<(), CloudError>;

    fn log_session_summary(&mut self, summary: &SessionSummary) -> Result<(), CloudError>;
}

/// In-memory sink; clones share the same record list
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call so far
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Logged alerts at `level` ("LEVEL1" / "LEVEL2")
    pub fn alerts(&self, level: AlertLevel) -> Vec<AlertRecord> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Alert(record) if record.level == level.as_str() => Some(record),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) -> Result<(), CloudError> {
        self.events
            .lock()
            .map_err(|_| CloudError::Unavailable("memory sink poisoned".into()))?
            .push(event);
        Ok(())
    }
}

impl EventSink for MemorySink {
    fn log_alert(&mut self, record: &AlertRecord) -> Result<(), CloudError> {
        self.push(SinkEvent::Alert(record.clone()))
    }

    fn send_emergency(&mut self, timestamp: f64) -> Result<(), CloudError> {
        self.push(SinkEvent::Emergency { timestamp })
    }

    fn update_driver_state(&mut self, status: &DriverStatus) -> Result<(), CloudError> {
        self.push(SinkEvent::DriverState(status.clone()))
    }

    fn log_session_summary(&mut self, summary: &SessionSummary) -> Result<(), CloudError> {
        self.push(SinkEvent::SessionSummary(summary.clone()))
    }
}
