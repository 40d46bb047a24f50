//! Drowsiness Monitor Replay - Main Entry Point

use clap::Parser;
use replay::{init_logging, run, Args};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json)?;

    info!("=== Drowsiness Monitor Replay v{} ===", env!("CARGO_PKG_VERSION"));

    let summary = run(&args).await?;

    println!(
        "Session Summary: Duration={:.1}s, Frames={}, Avg Score={:.1}, Max Score={:.1}, Alerts={}",
        summary.duration_secs, summary.frames, summary.avg_score, summary.max_score, summary.alert_count
    );
    Ok(())
}
