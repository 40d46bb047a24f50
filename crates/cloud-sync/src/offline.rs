//! Local JSON-lines event log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::{AlertRecord, CloudError, DriverStatus, EventSink, SessionSummary, SinkEvent};

/// One line of the offline log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SinkEvent,
}

/// Append-only JSON-lines sink
///
/// Each record is flushed as it is written so a crash loses at most the
/// line in flight.
pub struct OfflineLog {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl OfflineLog {
    /// Open (or create) the log at `path` for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CloudError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Offline event log: {}", path.display());

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written by this handle
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Read every entry back, skipping lines that do not parse
    pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<LogEntry>, CloudError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed log line {}: {}", index + 1, e),
            }
        }
        Ok(entries)
    }

    fn append(&mut self, event: SinkEvent) -> Result<(), CloudError> {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            event,
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| CloudError::Serialization(e.to_string()))?;

        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        debug!("Logged {} to {}", entry.id, self.path.display());
        Ok(())
    }
}

impl EventSink for OfflineLog {
    fn log_alert(&mut self, record: &AlertRecord) -> Result<(), CloudError> {
        self.append(SinkEvent::Alert(record.clone()))
    }

    fn send_emergency(&mut self, timestamp: f64) -> Result<(), CloudError> {
        warn!("EMERGENCY at t={:.2}: driver unresponsive", timestamp);
        self.append(SinkEvent::Emergency { timestamp })
    }

    fn update_driver_state(&mut self, status: &DriverStatus) -> Result<(), CloudError> {
        self.append(SinkEvent::DriverState(status.clone()))
    }

    fn log_session_summary(&mut self, summary: &SessionSummary) -> Result<(), CloudError> {
        self.append(SinkEvent::SessionSummary(summary.clone()))
    }
}
