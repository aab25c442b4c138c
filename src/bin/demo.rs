//! demo - synthetic end-to-end run of the theft watch pipeline
//!
//! Scripts a single stream over the default store layout: a shopper who
//! lingers at the electronics display, an intruder in employee storage, a
//! concealment pattern, a runner, and a laptop carried into the exit zone.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;

use theft_watch::config::default_zones;
use theft_watch::{
    BoundingBox, Detection, DetectionProvider, FramePayload, PipelineConfig, ScriptedProvider,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames.
    #[arg(long, default_value_t = 200)]
    frames: u64,
    /// Frames per second of the synthetic stream.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
    /// Loiter limit applied to every loiter-alerting zone.
    #[arg(long, default_value_t = 5)]
    loiter_seconds: u32,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }

    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let mut cfg = PipelineConfig::load()?;
    cfg.settings.fps = args.fps;
    cfg.zones = default_zones();
    for zone in cfg.zones.iter_mut() {
        if zone.policy.alert_on_loitering {
            zone.policy.max_loiter_seconds = args.loiter_seconds;
        }
    }
    let zones = Arc::new(cfg.build_registry()?);
    let mut orchestrator = cfg.orchestrator(Arc::clone(&zones))?;

    let mut provider = {
        let _stage = ui.stage("Script synthetic frames");
        ScriptedProvider::new((1..=args.frames).map(scripted_frame))
    };

    {
        let _stage = ui.stage("Analyze frames");
        let mut progress = ui.stream("demo");
        while let Some(frame) = provider.next_frame()? {
            let alerts = orchestrator.analyze_payload(&frame)?;
            for alert in &alerts {
                println!("{}", serde_json::to_string(alert)?);
            }
            progress.frame(alerts.len());
        }
    }

    let report = orchestrator.synthesizer().report();
    let stats = orchestrator.stats();
    log::info!(
        "demo complete: {} frame(s), {} alert(s) {:?}",
        stats.frames_processed,
        report.total_alerts,
        report.by_type
    );
    Ok(())
}

fn person(x: f64, y: f64, tags: &[&str]) -> Detection {
    Detection::person(BoundingBox::new(x, y, 40.0, 80.0), 0.9).with_tags(tags.iter().copied())
}

fn scripted_frame(frame_number: u64) -> FramePayload {
    let mut detections = vec![person(400.0, 100.0, &["person"])];

    if (10..=12).contains(&frame_number) {
        detections.push(person(50.0, 450.0, &["person"]));
    }
    if frame_number == 20 {
        detections.push(person(650.0, 500.0, &["person", "open jacket"]));
        detections.push(Detection::object(
            "backpack",
            BoundingBox::new(670.0, 540.0, 30.0, 30.0),
            0.8,
        ));
    }
    if (40..=50).contains(&frame_number) {
        let step = (frame_number - 40) as f64;
        detections.push(person(650.0 + 40.0 * step, 350.0, &["person"]));
    }
    if frame_number == 60 {
        detections.push(Detection::object(
            "laptop",
            BoundingBox::new(800.0, 50.0, 40.0, 30.0),
            0.85,
        ));
    }

    FramePayload {
        frame_ref: format!("demo/{frame_number:06}.jpg"),
        frame_number,
        detections,
    }
}
