//! Frame Orchestrator.
//!
//! One `FrameOrchestrator` per stream. It owns that stream's tracker and
//! alert history, shares the read-only zone registry, and runs each frame
//! through validation, tracking, rule evaluation and alert synthesis in a
//! fixed order. A frame either completes or fails without emitting alerts.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::alert::{
    AlertLocation, AlertOrigin, AlertSynthesizer, AlertType, Severity, TheftAlert,
};
use crate::behavior::{self, BehaviorSettings, FrameSnapshot, PersonObservation, RuleOutcome};
use crate::detect::{Detection, FramePayload};
use crate::error::{PipelineError, Result};
use crate::tracker::{IdentityTracker, TrackId, TrackerSettings};
use crate::zones::ZoneRegistry;

pub const DEFAULT_FPS: f64 = 30.0;
/// Alerts retained per stream unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Derives stream time from frame numbers: `t = frame_number / fps`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    pub fn new(fps: f64) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(PipelineError::configuration(format!(
                "fps must be a positive number, got {fps}"
            )));
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn seconds(&self, frame_number: u64) -> f64 {
        frame_number as f64 / self.fps
    }
}

/// How persistent conditions turn into alerts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertPolicy {
    /// Alert when a condition becomes true; stay quiet while it holds.
    #[default]
    OncePerEpisode,
    /// Alert on every frame the condition is reported.
    EveryFrame,
}

impl AlertPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertPolicy::OncePerEpisode => "once-per-episode",
            AlertPolicy::EveryFrame => "every-frame",
        }
    }
}

impl FromStr for AlertPolicy {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "once-per-episode" | "once_per_episode" | "episode" => Ok(Self::OncePerEpisode),
            "every-frame" | "every_frame" | "frame" => Ok(Self::EveryFrame),
            other => Err(PipelineError::configuration(format!(
                "unsupported alert policy '{other}'; expected 'once-per-episode' or 'every-frame'"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    pub fps: f64,
    pub tracker: TrackerSettings,
    pub behavior: BehaviorSettings,
    pub alert_policy: AlertPolicy,
    /// Oldest alerts beyond this are dropped. `None` keeps every alert.
    pub history_capacity: Option<usize>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            tracker: TrackerSettings::default(),
            behavior: BehaviorSettings::default(),
            alert_policy: AlertPolicy::default(),
            history_capacity: Some(DEFAULT_HISTORY_CAPACITY),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        FrameClock::new(self.fps)?;
        self.tracker.validate()?;
        self.behavior.validate()?;
        if self.history_capacity == Some(0) {
            return Err(PipelineError::configuration(
                "alert history capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Per-stream counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub detections_dropped: u64,
    pub alerts_emitted: u64,
}

/// Identity of a condition across frames, for repeat suppression.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ConditionKey {
    TrackInZone(AlertType, TrackId, String),
    Pattern(AlertType, String),
    Track(AlertType, TrackId),
    ItemInZone(AlertType, String, String),
}

fn condition_key(outcome: &RuleOutcome) -> Option<ConditionKey> {
    let alert_type = outcome.alert_type()?;
    Some(match outcome {
        RuleOutcome::RestrictedAreaViolation { track_id, zone, .. }
        | RuleOutcome::Loitering { track_id, zone, .. } => {
            ConditionKey::TrackInZone(alert_type, *track_id, zone.clone())
        }
        RuleOutcome::ConcealmentPattern { description, .. } => {
            ConditionKey::Pattern(alert_type, description.to_lowercase())
        }
        RuleOutcome::RapidMovement { track_id, .. } => ConditionKey::Track(alert_type, *track_id),
        RuleOutcome::UnpaidItemAtExit { zone, label, .. } => {
            ConditionKey::ItemInZone(alert_type, zone.clone(), label.to_lowercase())
        }
        RuleOutcome::HighValueSighting { .. } => return None,
    })
}

/// Location and details an alert-worthy outcome is reported with.
fn alert_payload(outcome: &RuleOutcome) -> Option<(AlertLocation, BTreeMap<String, Value>)> {
    let mut details = BTreeMap::new();
    let location = match outcome {
        RuleOutcome::RestrictedAreaViolation {
            track_id,
            zone,
            bounding_box,
            ..
        } => {
            details.insert("track_id".into(), json!(track_id));
            details.insert("bounding_box".into(), json!(bounding_box));
            AlertLocation::zone(zone)
        }
        RuleOutcome::Loitering {
            track_id,
            zone,
            dwell_seconds,
            max_loiter_seconds,
            ..
        } => {
            details.insert("track_id".into(), json!(track_id));
            details.insert("dwell_seconds".into(), json!(dwell_seconds));
            details.insert("max_loiter_seconds".into(), json!(max_loiter_seconds));
            AlertLocation::zone(zone)
        }
        RuleOutcome::ConcealmentPattern {
            description,
            position,
            matched_tags,
            ..
        } => {
            details.insert("description".into(), json!(description));
            details.insert("matched_tags".into(), json!(matched_tags));
            AlertLocation::point(*position)
        }
        RuleOutcome::RapidMovement {
            track_id,
            position,
            speed,
            ..
        } => {
            details.insert("track_id".into(), json!(track_id));
            details.insert("speed_px_per_s".into(), json!(speed));
            AlertLocation::point(*position)
        }
        RuleOutcome::UnpaidItemAtExit {
            zone,
            label,
            bounding_box,
            ..
        } => {
            details.insert("label".into(), json!(label));
            details.insert("bounding_box".into(), json!(bounding_box));
            AlertLocation::zone(zone)
        }
        RuleOutcome::HighValueSighting { .. } => return None,
    };
    Some((location, details))
}

/// An alert that passed validation but is not recorded yet.
struct PendingAlert {
    alert_type: AlertType,
    severity: Severity,
    location: AlertLocation,
    confidence: f64,
    details: BTreeMap<String, Value>,
}

#[derive(Debug)]
pub struct FrameOrchestrator {
    zones: Arc<ZoneRegistry>,
    settings: PipelineSettings,
    clock: FrameClock,
    tracker: IdentityTracker,
    synthesizer: AlertSynthesizer,
    active_conditions: BTreeSet<ConditionKey>,
    stats: FrameStats,
}

impl FrameOrchestrator {
    pub fn new(zones: Arc<ZoneRegistry>, settings: PipelineSettings) -> Result<Self> {
        settings.validate()?;
        let clock = FrameClock::new(settings.fps)?;
        let tracker = IdentityTracker::new(settings.tracker.clone())?;
        let synthesizer = AlertSynthesizer::new(Arc::clone(&zones))
            .with_capacity_limit(settings.history_capacity)?;
        Ok(Self {
            zones,
            settings,
            clock,
            tracker,
            synthesizer,
            active_conditions: BTreeSet::new(),
            stats: FrameStats::default(),
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    pub fn synthesizer(&self) -> &AlertSynthesizer {
        &self.synthesizer
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Full alert history of this stream, in creation order.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &TheftAlert> {
        self.synthesizer.history()
    }

    pub fn analyze_payload(&mut self, payload: &FramePayload) -> Result<Vec<TheftAlert>> {
        self.analyze_frame(&payload.frame_ref, payload.frame_number, &payload.detections)
    }

    /// Analyse one frame and return its alerts in priority order.
    pub fn analyze_frame(
        &mut self,
        frame_ref: &str,
        frame_number: u64,
        detections: &[Detection],
    ) -> Result<Vec<TheftAlert>> {
        if let Err(err) = self.admit(frame_number, detections) {
            self.stats.frames_rejected += 1;
            log::warn!("frame {frame_number} ({frame_ref}) rejected: {err}");
            return Err(err);
        }

        let mut persons = Vec::new();
        let mut objects = Vec::new();
        for (idx, det) in detections.iter().enumerate() {
            if let Err(err) = det.check_confidence() {
                self.stats.detections_dropped += 1;
                log::warn!("frame {frame_number}: dropping detection {idx}: {err}");
                continue;
            }
            if det.is_person() {
                persons.push(det);
            } else if det.confidence >= self.settings.behavior.min_object_confidence {
                objects.push(det);
            }
        }

        let now_s = self.clock.seconds(frame_number);
        let update = self
            .tracker
            .update(frame_number, now_s, &persons, &self.zones)?;

        let mut outcomes = {
            let people = update
                .assignments
                .iter()
                .filter_map(|a| {
                    Some(PersonObservation {
                        detection: persons.get(a.detection_index).copied()?,
                        track: self.tracker.get(a.track_id)?,
                    })
                })
                .collect();
            let snapshot = FrameSnapshot {
                frame_number,
                now_s,
                fps: self.clock.fps(),
                people,
                objects,
                zones: &self.zones,
            };
            behavior::evaluate(&snapshot, &self.settings.behavior)
        };

        for outcome in outcomes.iter().filter(|o| o.is_informational()) {
            if let RuleOutcome::HighValueSighting {
                zone,
                label,
                confidence,
            } = outcome
            {
                log::info!(
                    "frame {frame_number}: high-value item '{label}' in {} (confidence {:.2})",
                    zone.as_deref().unwrap_or("no zone"),
                    confidence
                );
            }
        }
        outcomes.retain(|o| !o.is_informational());
        outcomes.sort_by_key(|o| o.alert_type().map(AlertType::priority));

        let pending = match self.pending_alerts(&outcomes) {
            Ok(pending) => pending,
            Err(err) => {
                self.stats.frames_rejected += 1;
                log::warn!("frame {frame_number} ({frame_ref}) produced an invalid alert: {err}");
                return Err(err);
            }
        };

        let origin = AlertOrigin {
            frame_ref,
            frame_number,
            timestamp: now_s,
        };
        let alerts = pending
            .into_iter()
            .map(|p| {
                self.synthesizer.create_alert(
                    p.alert_type,
                    p.severity,
                    p.location,
                    p.confidence,
                    p.details,
                    origin,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        self.active_conditions = outcomes.iter().filter_map(condition_key).collect();
        self.stats.frames_processed += 1;
        self.stats.alerts_emitted += alerts.len() as u64;
        Ok(alerts)
    }

    /// Alerts this frame should emit, each already checked, so that recording
    /// them cannot fail halfway through the frame.
    fn pending_alerts(&self, outcomes: &[RuleOutcome]) -> Result<Vec<PendingAlert>> {
        let mut pending = Vec::new();
        for outcome in outcomes {
            let (Some(alert_type), Some(key), Some((location, details))) =
                (outcome.alert_type(), condition_key(outcome), alert_payload(outcome))
            else {
                continue;
            };
            if self.settings.alert_policy == AlertPolicy::OncePerEpisode
                && self.active_conditions.contains(&key)
            {
                continue;
            }
            self.synthesizer.check_alert(outcome.confidence(), &location)?;
            pending.push(PendingAlert {
                alert_type,
                severity: outcome.severity(),
                location,
                confidence: outcome.confidence(),
                details,
            });
        }
        Ok(pending)
    }

    /// Whole-frame checks that run before any state changes.
    fn admit(&self, frame_number: u64, detections: &[Detection]) -> Result<()> {
        for (idx, det) in detections.iter().enumerate() {
            det.check_structure().map_err(|err| match err {
                PipelineError::MalformedInput(msg) => {
                    PipelineError::malformed(format!("detections[{idx}]: {msg}"))
                }
                other => other,
            })?;
        }
        self.tracker.check_frame_order(frame_number)
    }
}
