//! theft_watch - replay recorded provider detections through the pipeline
//!
//! Each input file is one camera stream (JSON lines, one frame payload per
//! line). Streams run in parallel, each with its own tracker and alert
//! history, sharing one zone registry. The combined report is written as
//! JSON to `--report` or stdout.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use theft_watch::{
    AlertReport, DetectionProvider, FrameStats, PipelineConfig, PipelineError, ReplayProvider,
    ZoneRegistry,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detection payload files (JSON lines), one stream each.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Configuration file (JSON, or TOML by extension). Falls back to THEFT_WATCH_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto")]
    ui: String,
}

#[derive(Debug, Serialize)]
struct StreamReport {
    stream: String,
    provider: &'static str,
    /// Lines the provider could not parse into a frame.
    unreadable_frames: u64,
    stats: FrameStats,
    alerts: AlertReport,
}

#[derive(Debug, Serialize)]
struct RunReport {
    zones: usize,
    streams: Vec<StreamReport>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let (cfg, zones) = {
        let _stage = ui.stage("Load configuration");
        let cfg = match &args.config {
            Some(path) => PipelineConfig::from_path(path)?,
            None => PipelineConfig::load()?,
        };
        let zones = Arc::new(cfg.build_registry()?);
        (cfg, zones)
    };
    log::info!(
        "{} zone(s), fps={}, alert policy {}",
        zones.len(),
        cfg.settings.fps,
        cfg.settings.alert_policy.as_str()
    );

    let streams = {
        let _stage = ui.stage("Analyze streams");
        std::thread::scope(|scope| {
            let workers: Vec<_> = args
                .inputs
                .iter()
                .map(|input| {
                    let zones = Arc::clone(&zones);
                    let cfg = &cfg;
                    let progress = ui.stream(&input.display().to_string());
                    scope.spawn(move || run_stream(cfg, zones, input, progress))
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| {
                    worker
                        .join()
                        .map_err(|_| anyhow!("stream worker panicked"))?
                })
                .collect::<Result<Vec<_>>>()
        })?
    };

    let report = RunReport {
        zones: zones.len(),
        streams,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match &args.report {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write report {}", path.display()))?;
            log::info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_stream(
    cfg: &PipelineConfig,
    zones: Arc<ZoneRegistry>,
    input: &Path,
    mut progress: ui::StreamProgress,
) -> Result<StreamReport> {
    let stream = input.display().to_string();
    let mut provider = ReplayProvider::open(input)?;
    provider.warm_up()?;
    let mut orchestrator = cfg.orchestrator(zones)?;
    let mut unreadable_frames = 0u64;

    loop {
        let frame = match provider.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => match err.downcast_ref::<PipelineError>() {
                Some(PipelineError::MalformedInput(msg)) => {
                    unreadable_frames += 1;
                    log::warn!("{stream}:{}: skipping frame: {msg}", provider.line_no());
                    continue;
                }
                _ => return Err(err.context(format!("reading {stream}"))),
            },
        };

        match orchestrator.analyze_payload(&frame) {
            Ok(alerts) => progress.frame(alerts.len()),
            // rejected frames leave no alerts; counted and logged by the orchestrator
            Err(_) => continue,
        }
    }

    let stats = orchestrator.stats();
    log::info!(
        "{stream}: {} frame(s) processed, {} rejected, {} alert(s)",
        stats.frames_processed,
        stats.frames_rejected,
        stats.alerts_emitted
    );
    Ok(StreamReport {
        stream,
        provider: provider.name(),
        unreadable_frames,
        stats,
        alerts: orchestrator.synthesizer().report(),
    })
}
