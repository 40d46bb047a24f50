//! Frame Stream Replay
//!
//! Feeds a recorded JSON-lines stream of `FrameInput` records through a
//! monitoring session, as a camera loop would in the vehicle.

use alerting::{AudioOutput, LogToneSink};
use anyhow::{Context, Result};
use clap::Parser;
use cloud_sync::{EventSink, MemorySink, OfflineLog, SessionSummary};
use dms::FrameInput;
use monitor::{MonitorSession, Settings};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Frames between progress lines
const PROGRESS_EVERY: u64 = 300;

/// Replay a recorded frame stream through the drowsiness monitor
#[derive(Debug, Clone, Parser)]
#[command(name = "dms-replay", version, about)]
pub struct Args {
    /// JSON-lines file of frames
    pub frames: PathBuf,

    /// Settings file (TOML, YAML, or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Offline event log; overrides `session.log_path`
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Play alert tones (logged) while replaying
    #[arg(long)]
    pub tones: bool,

    /// Pace frames by their timestamps instead of replaying at full speed
    #[arg(long)]
    pub realtime: bool,

    /// Manually reset alerts at these timestamps (seconds)
    #[arg(long = "reset-at", value_name = "SECONDS")]
    pub reset_at: Vec<f64>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// JSON log output
    #[arg(long)]
    pub json: bool,
}

/// Initialize logging
pub fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to set tracing subscriber")
}

/// Parse a JSON-lines frame file, skipping blank lines
pub fn read_frames(path: &Path) -> Result<Vec<FrameInput>> {
    let file = File::open(path).with_context(|| format!("opening frames file {}", path.display()))?;
    let mut frames = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: FrameInput = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid frame", path.display(), index + 1))?;
        frames.push(frame);
    }

    Ok(frames)
}

/// Run a replay to completion and return the session summary
pub async fn run(args: &Args) -> Result<SessionSummary> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(log) = &args.log {
        settings.session.log_path = Some(log.clone());
    }

    let frames = read_frames(&args.frames)?;
    info!("Replaying {} frames from {}", frames.len(), args.frames.display());

    let sink: Box<dyn EventSink> = match &settings.session.log_path {
        Some(path) => Box::new(OfflineLog::open(path)?),
        None => Box::new(MemorySink::new()),
    };
    let audio = if args.tones {
        Some(AudioOutput::new(LogToneSink)?)
    } else {
        None
    };

    let mut session = MonitorSession::new(&settings, sink, audio)?;
    let mut resets: Vec<f64> = args.reset_at.clone();
    resets.sort_by(f64::total_cmp);
    let mut resets = resets.into_iter().peekable();
    let mut previous: Option<f64> = None;

    for frame in &frames {
        if args.realtime {
            if let Some(prev) = previous {
                let gap = frame.timestamp - prev;
                if gap > 0.0 && gap.is_finite() {
                    tokio::time::sleep(Duration::from_secs_f64(gap)).await;
                }
            }
            previous = Some(frame.timestamp);
        }

        while let Some(at) = resets.next_if(|at| *at <= frame.timestamp) {
            session.manual_reset(at);
        }

        let report = session.process_frame(frame);
        if session.frames() % PROGRESS_EVERY == 0 {
            info!(
                "t={:.1}s state={} score={:.1} perclos={:.1}% blinks/min={:.1} alert={}",
                frame.timestamp,
                report.analysis.state,
                report.analysis.score,
                report.analysis.metrics.perclos,
                report.analysis.metrics.blink_rate,
                report.alert.level,
            );
        }
    }

    Ok(session.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_frames(lines: &[String]) -> PathBuf {
        let dir = std::env::temp_dir().join("dms-replay-tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.jsonl", uuid::Uuid::new_v4()));
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    fn args(frames: PathBuf) -> Args {
        Args::parse_from(["dms-replay", frames.to_str().unwrap()])
    }

    #[test]
    fn test_read_frames_skips_blank_lines() {
        let path = write_frames(&[
            r#"{"timestamp": 0.0, "eye_openness": 0.3}"#.to_string(),
            String::new(),
            r#"{"timestamp": 0.1}"#.to_string(),
        ]);

        let frames = read_frames(&path).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].has_face());
        assert!(!frames[1].has_face());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_bad_line_reports_position() {
        let path = write_frames(&[r#"{"timestamp": 0.0}"#.to_string(), "nope".to_string()]);

        let err = read_frames(&path).unwrap_err();
        assert!(format!("{err:#}").contains(":2: invalid frame"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_cli_flags() {
        let args = Args::parse_from([
            "dms-replay",
            "frames.jsonl",
            "--config",
            "dms.toml",
            "--reset-at",
            "12.5",
            "--reset-at",
            "40",
            "--tones",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("dms.toml")));
        assert_eq!(args.reset_at, vec![12.5, 40.0]);
        assert!(args.tones);
        assert!(!args.realtime);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_closed_eyes_raises_alerts() {
        let lines: Vec<String> = (0..(30 * 30))
            .map(|i| {
                let t = i as f64 / 30.0;
                let ear = if t >= 5.0 { 0.05 } else { 0.30 };
                format!(r#"{{"timestamp": {t}, "eye_openness": {ear}, "mouth_openness": 0.3}}"#)
            })
            .collect();
        let path = write_frames(&lines);

        let mut args = args(path.clone());
        args.tones = true;
        args.realtime = true;
        let summary = run(&args).await.unwrap();

        assert_eq!(summary.frames, 900);
        assert_eq!(summary.alert_count, 2);
        assert!(summary.max_score >= 55.0);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_manual_reset_flag_clears_alert() {
        let lines: Vec<String> = (0..(20 * 30))
            .map(|i| {
                let t = i as f64 / 30.0;
                let ear = if t >= 5.0 { 0.05 } else { 0.30 };
                format!(r#"{{"timestamp": {t}, "eye_openness": {ear}}}"#)
            })
            .collect();
        let path = write_frames(&lines);

        let mut args = args(path.clone());
        args.reset_at = vec![10.0];
        let summary = run(&args).await.unwrap();

        // Level 1 near t=8.5, reset at 10, symptoms persist so it fires again
        assert_eq!(summary.alert_count, 2);

        std::fs::remove_file(&path).ok();
    }
}
