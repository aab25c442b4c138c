//! Theft Watch
//!
//! Per-frame analysis core for retail loss-prevention cameras. A vision
//! provider turns imagery into detections; this crate turns detections into
//! alerts.
//!
//! # Architecture
//!
//! Each frame flows through a fixed sequence:
//!
//! 1. **Intake**: provider payloads are parsed and structurally checked
//!    (`detect`). A malformed frame is rejected whole.
//! 2. **Tracking**: person detections are linked to persistent tracks with
//!    greedy nearest-neighbour matching, and zone dwell is accounted
//!    (`tracker`).
//! 3. **Rules**: independent, stateless rules report which conditions hold
//!    this frame (`behavior`).
//! 4. **Alerts**: outcomes become validated, immutable alerts in a fixed
//!    priority order, with repeat suppression per the configured policy
//!    (`pipeline`, `alert`).
//!
//! Time is the stream clock `frame_number / fps`, so a replay of the same
//! detections always yields the same alerts.
//!
//! # Module Structure
//!
//! - `geometry`: point-in-polygon, centers, distances, speed
//! - `zones`: zone policies and the shared read-only registry
//! - `detect`: detection model, provider trait, payload parser, replay
//! - `tracker`: per-stream identity tracker
//! - `behavior`: rule functions over a frame snapshot
//! - `alert`: alert types, severities, synthesizer and report
//! - `pipeline`: per-stream frame orchestrator
//! - `config`: file + environment configuration

use std::sync::OnceLock;

pub mod alert;
pub mod behavior;
pub mod config;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod tracker;
pub mod zones;

pub use alert::{AlertLocation, AlertReport, AlertSynthesizer, AlertType, Severity, TheftAlert};
pub use behavior::{BehaviorSettings, ConcealmentPattern, RuleOutcome};
pub use config::PipelineConfig;
pub use detect::{
    DetectionProvider, Detection, DetectionKind, FramePayload, ReplayProvider, ScriptedProvider,
};
pub use error::{PipelineError, Result};
pub use geometry::{BoundingBox, Point};
pub use pipeline::{AlertPolicy, FrameClock, FrameOrchestrator, FrameStats, PipelineSettings};
pub use tracker::{IdentityTracker, TrackId, TrackedPerson, TrackerSettings};
pub use zones::{DetectionZone, ZonePolicy, ZoneRegistry};

// -------------------- Zone Name Discipline --------------------

/// Zone names: 1..64 of `[A-Za-z0-9 _:.-]`, starting alphanumeric.
pub fn validate_zone_name(name: &str) -> Result<()> {
    // Compile once for hot paths.
    static ZONE_NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ZONE_NAME_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _:.-]{0,63}$").unwrap());

    if !re.is_match(name) {
        return Err(PipelineError::configuration(format!(
            "zone name '{name}' must match ^[A-Za-z0-9][A-Za-z0-9 _:.-]{{0,63}}$"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_names_follow_allowlist() {
        for ok in ["Employee_Only", "Exit", "aisle 7", "zone:front-door", "A"] {
            assert!(validate_zone_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", " leading", "_x", "semi;colon", "tab\tname"] {
            assert!(matches!(
                validate_zone_name(bad),
                Err(PipelineError::Configuration(_))
            ));
        }
        assert!(validate_zone_name(&"a".repeat(65)).is_err());
    }
}
