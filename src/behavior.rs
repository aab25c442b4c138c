//! Behavior rules.
//!
//! Each rule is a pure function over an immutable [`FrameSnapshot`] and
//! reports whether its condition holds *in this frame*. Rules are
//! independent of each other and of evaluation order. Turning outcomes into
//! alerts, ordering them and suppressing repeats is the orchestrator's job.

use serde::{Deserialize, Serialize};

use crate::alert::{AlertType, Severity};
use crate::detect::Detection;
use crate::error::{PipelineError, Result};
use crate::geometry::{speed, BoundingBox, Point};
use crate::tracker::{TrackId, TrackedPerson};
use crate::zones::ZoneRegistry;

pub const DEFAULT_RAPID_MOVEMENT_THRESHOLD: f64 = 500.0;
pub const DEFAULT_RAPID_WINDOW: usize = 5;
pub const DEFAULT_MIN_TAG_CONFIDENCE: f64 = 0.6;
pub const DEFAULT_MIN_OBJECT_CONFIDENCE: f64 = 0.6;
pub const DEFAULT_EXIT_CONFIDENCE_FACTOR: f64 = 0.9;

pub const DEFAULT_HIGH_VALUE_ITEMS: &[&str] = &[
    "laptop",
    "phone",
    "tablet",
    "camera",
    "jewelry",
    "watch",
    "electronics",
];
pub const DEFAULT_PERSON_TAGS: &[&str] = &["person", "people", "man", "woman"];
pub const DEFAULT_CONTAINER_TAGS: &[&str] =
    &["bag", "backpack", "handbag", "purse", "luggage", "tote"];
pub const DEFAULT_CLOTHING_TAGS: &[&str] =
    &["open jacket", "jacket", "coat", "hoodie", "clothing"];
pub const DEFAULT_PURCHASE_TAGS: &[&str] = &["receipt", "purchase", "paid"];

/// Description of the person + container + clothing pattern.
pub const PRIMARY_CONCEALMENT_DESCRIPTION: &str = "Person with bag near clothing";

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// A tag combination read as concealment.
///
/// Every pattern is anchored on a person tag. Each group must in addition
/// match at least one frame tag; keywords within a group are alternatives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConcealmentPattern {
    pub description: String,
    pub groups: Vec<Vec<String>>,
}

impl ConcealmentPattern {
    pub fn new(description: &str, groups: &[&[&str]]) -> Self {
        Self {
            description: description.to_string(),
            groups: groups.iter().map(|g| owned(g)).collect(),
        }
    }
}

fn default_extra_patterns() -> Vec<ConcealmentPattern> {
    vec![
        ConcealmentPattern::new(
            "Person with backpack near electronics",
            &[&["backpack"], &["electronics"]],
        ),
        ConcealmentPattern::new("Person reaching for items", &[&["reaching"]]),
    ]
}

#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorSettings {
    /// Pixels per second above which a track is moving rapidly.
    pub rapid_movement_threshold: f64,
    /// Number of recent positions the speed is measured over.
    pub rapid_window: usize,
    /// Tags from detections below this confidence are ignored for patterns.
    pub min_tag_confidence: f64,
    /// Objects below this confidence are ignored.
    pub min_object_confidence: f64,
    /// Applied to the object confidence for unpaid-item alerts.
    pub exit_confidence_factor: f64,
    pub high_value_items: Vec<String>,
    pub person_tags: Vec<String>,
    pub container_tags: Vec<String>,
    pub clothing_tags: Vec<String>,
    pub purchase_tags: Vec<String>,
    /// Checked after the person + container + clothing pattern, in order.
    pub extra_concealment_patterns: Vec<ConcealmentPattern>,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            rapid_movement_threshold: DEFAULT_RAPID_MOVEMENT_THRESHOLD,
            rapid_window: DEFAULT_RAPID_WINDOW,
            min_tag_confidence: DEFAULT_MIN_TAG_CONFIDENCE,
            min_object_confidence: DEFAULT_MIN_OBJECT_CONFIDENCE,
            exit_confidence_factor: DEFAULT_EXIT_CONFIDENCE_FACTOR,
            high_value_items: owned(DEFAULT_HIGH_VALUE_ITEMS),
            person_tags: owned(DEFAULT_PERSON_TAGS),
            container_tags: owned(DEFAULT_CONTAINER_TAGS),
            clothing_tags: owned(DEFAULT_CLOTHING_TAGS),
            purchase_tags: owned(DEFAULT_PURCHASE_TAGS),
            extra_concealment_patterns: default_extra_patterns(),
        }
    }
}

impl BehaviorSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.rapid_movement_threshold.is_finite() && self.rapid_movement_threshold > 0.0) {
            return Err(PipelineError::configuration(
                "rapid_movement_threshold must be a positive number",
            ));
        }
        if self.rapid_window < 2 {
            return Err(PipelineError::configuration("rapid_window must be >= 2"));
        }
        for (name, value) in [
            ("min_tag_confidence", self.min_tag_confidence),
            ("min_object_confidence", self.min_object_confidence),
            ("exit_confidence_factor", self.exit_confidence_factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::configuration(format!(
                    "{name} must be within 0..=1"
                )));
            }
        }
        for (name, set) in [
            ("person_tags", &self.person_tags),
            ("container_tags", &self.container_tags),
            ("clothing_tags", &self.clothing_tags),
        ] {
            if set.iter().all(|t| t.trim().is_empty()) {
                return Err(PipelineError::configuration(format!("{name} must not be empty")));
            }
        }

        let mut seen = Vec::new();
        for pattern in self.concealment_patterns() {
            let description = pattern.description.trim().to_lowercase();
            if description.is_empty() {
                return Err(PipelineError::configuration(
                    "concealment pattern needs a description",
                ));
            }
            if pattern.groups.is_empty()
                || pattern
                    .groups
                    .iter()
                    .any(|g| g.iter().all(|kw| kw.trim().is_empty()))
            {
                return Err(PipelineError::configuration(format!(
                    "concealment pattern '{}' needs non-empty tag groups",
                    pattern.description
                )));
            }
            if seen.contains(&description) {
                return Err(PipelineError::configuration(format!(
                    "duplicate concealment pattern '{}'",
                    pattern.description
                )));
            }
            seen.push(description);
        }
        Ok(())
    }

    /// All concealment patterns, person + container + clothing first.
    pub fn concealment_patterns(&self) -> Vec<ConcealmentPattern> {
        let mut patterns = vec![ConcealmentPattern {
            description: PRIMARY_CONCEALMENT_DESCRIPTION.to_string(),
            groups: vec![self.container_tags.clone(), self.clothing_tags.clone()],
        }];
        patterns.extend(self.extra_concealment_patterns.iter().cloned());
        patterns
    }
}

/// A person detection together with the track it was assigned to.
#[derive(Clone, Copy, Debug)]
pub struct PersonObservation<'a> {
    pub detection: &'a Detection,
    pub track: &'a TrackedPerson,
}

/// Read-only view of one frame after tracking.
#[derive(Clone, Debug)]
pub struct FrameSnapshot<'a> {
    pub frame_number: u64,
    /// Stream time of this frame, in seconds.
    pub now_s: f64,
    pub fps: f64,
    pub people: Vec<PersonObservation<'a>>,
    pub objects: Vec<&'a Detection>,
    pub zones: &'a ZoneRegistry,
}

/// A tag seen in the frame and the confidence of the detection carrying it.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameTag {
    pub name: String,
    pub confidence: f64,
    /// Center of the detection carrying the tag.
    pub at: Point,
}

impl<'a> FrameSnapshot<'a> {
    /// Tag set of the frame: provider tags, object labels, and an implicit
    /// "person" for every person detection. Lower-cased.
    pub fn tags(&self, min_confidence: f64) -> Vec<FrameTag> {
        let mut tags = Vec::new();
        let mut push = |name: &str, det: &Detection| {
            if det.confidence >= min_confidence && !name.trim().is_empty() {
                tags.push(FrameTag {
                    name: name.trim().to_lowercase(),
                    confidence: det.confidence,
                    at: det.center(),
                });
            }
        };
        for obs in &self.people {
            push("person", obs.detection);
            for tag in &obs.detection.tags {
                push(tag, obs.detection);
            }
        }
        for &det in &self.objects {
            if let Some(label) = &det.label {
                push(label, det);
            }
            for tag in &det.tags {
                push(tag, det);
            }
        }
        tags
    }
}

/// Whole-word, case-insensitive keyword match ("open jacket" matches
/// "man in open jacket"; "bag" does not match "baggage").
pub fn tag_matches(tag: &str, keyword: &str) -> bool {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    let tag = tag.trim().to_lowercase();
    let padded_tag = format!(" {} ", tag.split_whitespace().collect::<Vec<_>>().join(" "));
    let padded_kw = format!(" {} ", keyword.split_whitespace().collect::<Vec<_>>().join(" "));
    padded_tag.contains(&padded_kw)
}

fn matches_any(tag: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|kw| tag_matches(tag, kw))
}

/// Highest-confidence tag matching any keyword; the earliest wins ties.
fn best_match<'t>(tags: &'t [FrameTag], keywords: &[String]) -> Option<&'t FrameTag> {
    let mut best: Option<&FrameTag> = None;
    for tag in tags.iter().filter(|t| matches_any(&t.name, keywords)) {
        if best.map_or(true, |b| tag.confidence > b.confidence) {
            best = Some(tag);
        }
    }
    best
}

/// Outcome of one rule for one subject in one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleOutcome {
    RestrictedAreaViolation {
        track_id: TrackId,
        zone: String,
        bounding_box: BoundingBox,
        confidence: f64,
    },
    Loitering {
        track_id: TrackId,
        zone: String,
        dwell_seconds: f64,
        max_loiter_seconds: u32,
        confidence: f64,
    },
    ConcealmentPattern {
        description: String,
        /// Where the contributing person tag was seen.
        position: Point,
        matched_tags: Vec<String>,
        confidence: f64,
    },
    RapidMovement {
        track_id: TrackId,
        position: Point,
        speed: f64,
        confidence: f64,
    },
    UnpaidItemAtExit {
        zone: String,
        label: String,
        bounding_box: BoundingBox,
        confidence: f64,
    },
    /// High-value item seen with no alert-worthy context. Logged only.
    HighValueSighting {
        zone: Option<String>,
        label: String,
        confidence: f64,
    },
}

impl RuleOutcome {
    /// Alert type this outcome materialises as, if any.
    pub fn alert_type(&self) -> Option<AlertType> {
        match self {
            RuleOutcome::RestrictedAreaViolation { .. } => {
                Some(AlertType::RestrictedAreaViolation)
            }
            RuleOutcome::Loitering { .. } => Some(AlertType::Loitering),
            RuleOutcome::ConcealmentPattern { .. } => Some(AlertType::ConcealmentPattern),
            RuleOutcome::RapidMovement { .. } => Some(AlertType::RapidMovement),
            RuleOutcome::UnpaidItemAtExit { .. } => Some(AlertType::UnpaidItemAtExit),
            RuleOutcome::HighValueSighting { .. } => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RuleOutcome::RestrictedAreaViolation { .. } => Severity::High,
            RuleOutcome::Loitering { .. } => Severity::Medium,
            RuleOutcome::ConcealmentPattern { .. } => Severity::Medium,
            RuleOutcome::RapidMovement { .. } => Severity::Low,
            RuleOutcome::UnpaidItemAtExit { .. } => Severity::High,
            RuleOutcome::HighValueSighting { .. } => Severity::Low,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            RuleOutcome::RestrictedAreaViolation { confidence, .. }
            | RuleOutcome::Loitering { confidence, .. }
            | RuleOutcome::ConcealmentPattern { confidence, .. }
            | RuleOutcome::RapidMovement { confidence, .. }
            | RuleOutcome::UnpaidItemAtExit { confidence, .. }
            | RuleOutcome::HighValueSighting { confidence, .. } => *confidence,
        }
    }

    pub fn is_informational(&self) -> bool {
        self.alert_type().is_none()
    }
}

/// Person detections whose center lies in a restricted zone.
pub fn restricted_area(snapshot: &FrameSnapshot<'_>) -> Vec<RuleOutcome> {
    snapshot
        .people
        .iter()
        .filter_map(|obs| {
            let zone = snapshot.zones.zone_containing(obs.detection.center())?;
            zone.is_restricted()
                .then(|| RuleOutcome::RestrictedAreaViolation {
                    track_id: obs.track.id,
                    zone: zone.name().to_string(),
                    bounding_box: obs.detection.bounding_box,
                    confidence: obs.detection.confidence,
                })
        })
        .collect()
}

/// Tracks observed this frame whose stay in a loiter-alerting zone exceeds its limit.
pub fn loitering(snapshot: &FrameSnapshot<'_>) -> Vec<RuleOutcome> {
    snapshot
        .people
        .iter()
        .filter_map(|obs| {
            let zone_name = obs.track.current_zone.as_deref()?;
            let zone = snapshot.zones.get(zone_name)?;
            if !zone.alert_on_loitering() {
                return None;
            }
            let dwell = obs.track.dwell_seconds(zone_name, snapshot.now_s);
            (dwell > f64::from(zone.max_loiter_seconds())).then(|| RuleOutcome::Loitering {
                track_id: obs.track.id,
                zone: zone.name().to_string(),
                dwell_seconds: dwell,
                max_loiter_seconds: zone.max_loiter_seconds(),
                confidence: obs.detection.confidence,
            })
        })
        .collect()
}

/// Concealment patterns whose tags all co-occur in the frame, one outcome
/// per matched pattern, in pattern order.
pub fn concealment(snapshot: &FrameSnapshot<'_>, settings: &BehaviorSettings) -> Vec<RuleOutcome> {
    let tags = snapshot.tags(settings.min_tag_confidence);
    let Some(person) = best_match(&tags, &settings.person_tags) else {
        return Vec::new();
    };

    settings
        .concealment_patterns()
        .into_iter()
        .filter_map(|pattern| {
            let mut matched = vec![person];
            for group in &pattern.groups {
                matched.push(best_match(&tags, group)?);
            }
            let confidence = matched
                .iter()
                .map(|t| t.confidence)
                .fold(f64::INFINITY, f64::min);
            Some(RuleOutcome::ConcealmentPattern {
                description: pattern.description,
                position: person.at,
                matched_tags: matched.iter().map(|t| t.name.clone()).collect(),
                confidence,
            })
        })
        .collect()
}

/// Tracks whose speed over the last `rapid_window` positions exceeds the threshold.
pub fn rapid_movement(
    snapshot: &FrameSnapshot<'_>,
    settings: &BehaviorSettings,
) -> Vec<RuleOutcome> {
    if snapshot.fps <= 0.0 {
        return Vec::new();
    }
    snapshot
        .people
        .iter()
        .filter_map(|obs| {
            let window = obs.track.recent_positions(settings.rapid_window);
            let (first, last) = (window.first()?, window.last()?);
            let elapsed = last.frame.saturating_sub(first.frame) as f64 / snapshot.fps;
            let centers: Vec<Point> = window.iter().map(|p| p.center).collect();
            let px_per_s = speed(&centers, elapsed);
            (px_per_s > settings.rapid_movement_threshold).then(|| RuleOutcome::RapidMovement {
                track_id: obs.track.id,
                position: last.center,
                speed: px_per_s,
                confidence: obs.detection.confidence,
            })
        })
        .collect()
}

/// High-value objects: alert at an exit without a purchase signal, otherwise
/// informational when outside restricted zones.
pub fn high_value_objects(
    snapshot: &FrameSnapshot<'_>,
    settings: &BehaviorSettings,
) -> Vec<RuleOutcome> {
    let purchase_seen = snapshot
        .tags(settings.min_tag_confidence)
        .iter()
        .any(|t| matches_any(&t.name, &settings.purchase_tags));

    snapshot
        .objects
        .iter()
        .filter(|det| det.confidence >= settings.min_object_confidence)
        .filter_map(|det| {
            let label = det.label.as_deref()?;
            if !matches_any(label, &settings.high_value_items) {
                return None;
            }
            let zone = snapshot.zones.zone_containing(det.center());
            match zone {
                Some(z) if z.is_restricted() => None,
                Some(z) if z.is_exit() && !purchase_seen => {
                    let confidence = det.confidence * settings.exit_confidence_factor;
                    Some(RuleOutcome::UnpaidItemAtExit {
                        zone: z.name().to_string(),
                        label: label.to_string(),
                        bounding_box: det.bounding_box,
                        confidence: confidence.clamp(0.0, 1.0),
                    })
                }
                _ => Some(RuleOutcome::HighValueSighting {
                    zone: zone.map(|z| z.name().to_string()),
                    label: label.to_string(),
                    confidence: det.confidence,
                }),
            }
        })
        .collect()
}

/// Run every rule. The result is unordered in meaning.
pub fn evaluate(snapshot: &FrameSnapshot<'_>, settings: &BehaviorSettings) -> Vec<RuleOutcome> {
    let mut outcomes = restricted_area(snapshot);
    outcomes.extend(loitering(snapshot));
    outcomes.extend(concealment(snapshot, settings));
    outcomes.extend(rapid_movement(snapshot, settings));
    outcomes.extend(high_value_objects(snapshot, settings));
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{IdentityTracker, TrackerSettings};
    use crate::zones::{DetectionZone, ZonePolicy};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    fn store() -> ZoneRegistry {
        ZoneRegistry::from_zones([
            DetectionZone::new(
                "Aisle",
                rect(0.0, 0.0, 300.0, 300.0),
                ZonePolicy::loitering(10),
            )
            .unwrap(),
            DetectionZone::new("Exit", rect(700.0, 0.0, 1000.0, 200.0), ZonePolicy::exit())
                .unwrap(),
            DetectionZone::new(
                "Storage",
                rect(0.0, 400.0, 200.0, 600.0),
                ZonePolicy::restricted(),
            )
            .unwrap(),
        ])
        .unwrap()
    }

    fn person(x: f64, y: f64) -> Detection {
        Detection::person(BoundingBox::new(x, y, 40.0, 80.0), 0.9)
    }

    /// Track `dets` through the tracker one frame each and return the tracker.
    fn tracked(zones: &ZoneRegistry, frames: &[(u64, Detection)]) -> IdentityTracker {
        let mut tracker = IdentityTracker::new(TrackerSettings::default()).unwrap();
        for (frame, det) in frames {
            tracker.update(*frame, *frame as f64, &[det], zones).unwrap();
        }
        tracker
    }

    fn snapshot<'a>(
        zones: &'a ZoneRegistry,
        tracker: &'a IdentityTracker,
        det: &'a Detection,
        objects: Vec<&'a Detection>,
        frame: u64,
    ) -> FrameSnapshot<'a> {
        let track = tracker.observed_in(frame).next().unwrap();
        FrameSnapshot {
            frame_number: frame,
            now_s: frame as f64,
            fps: 1.0,
            people: vec![PersonObservation {
                detection: det,
                track,
            }],
            objects,
            zones,
        }
    }

    #[test]
    fn restricted_area_fires_for_person_inside() {
        let zones = store();
        let det = person(50.0, 450.0);
        let tracker = tracked(&zones, &[(1, det.clone())]);
        let snap = snapshot(&zones, &tracker, &det, vec![], 1);

        let outcomes = restricted_area(&snap);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].severity(), Severity::High);
        assert!(matches!(
            &outcomes[0],
            RuleOutcome::RestrictedAreaViolation { zone, .. } if zone == "Storage"
        ));
    }

    #[test]
    fn loitering_requires_dwell_beyond_limit() {
        let zones = store();
        let det = person(100.0, 100.0);
        let tracker = tracked(&zones, &[(1, det.clone()), (11, det.clone())]);
        // dwell 10s == limit: not yet loitering
        assert!(loitering(&snapshot(&zones, &tracker, &det, vec![], 11)).is_empty());

        let tracker = tracked(&zones, &[(1, det.clone()), (12, det.clone())]);
        let outcomes = loitering(&snapshot(&zones, &tracker, &det, vec![], 12));
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            RuleOutcome::Loitering { dwell_seconds, .. } if dwell_seconds == 11.0
        ));
    }

    fn descriptions(outcomes: &[RuleOutcome]) -> Vec<&str> {
        outcomes
            .iter()
            .filter_map(|o| match o {
                RuleOutcome::ConcealmentPattern { description, .. } => Some(description.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn concealment_needs_all_three_categories() {
        let zones = store();
        let settings = BehaviorSettings::default();
        let det = person(400.0, 300.0).with_tags(["open jacket"]);
        let bag = Detection::object("backpack", BoundingBox::new(420.0, 350.0, 30.0, 30.0), 0.75);
        let tracker = tracked(&zones, &[(1, det.clone())]);

        let outcomes = concealment(&snapshot(&zones, &tracker, &det, vec![&bag], 1), &settings);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].confidence(), 0.75);
        let expected = vec![
            "person".to_string(),
            "backpack".to_string(),
            "open jacket".to_string(),
        ];
        assert!(matches!(
            &outcomes[0],
            RuleOutcome::ConcealmentPattern { matched_tags, description, .. }
                if matched_tags == &expected && description == PRIMARY_CONCEALMENT_DESCRIPTION
        ));

        let plain = person(400.0, 300.0);
        let tracker = tracked(&zones, &[(1, plain.clone())]);
        let snap = snapshot(&zones, &tracker, &plain, vec![&bag], 1);
        assert!(concealment(&snap, &settings).is_empty());
    }

    #[test]
    fn backpack_near_electronics_is_its_own_pattern() {
        let zones = store();
        let det = person(400.0, 300.0);
        let backpack =
            Detection::object("backpack", BoundingBox::new(420.0, 350.0, 30.0, 30.0), 0.8);
        let shelf =
            Detection::object("electronics", BoundingBox::new(460.0, 300.0, 60.0, 40.0), 0.7);
        let tracker = tracked(&zones, &[(1, det.clone())]);
        let snap = snapshot(&zones, &tracker, &det, vec![&backpack, &shelf], 1);

        let outcomes = concealment(&snap, &BehaviorSettings::default());
        assert_eq!(descriptions(&outcomes), vec!["Person with backpack near electronics"]);
        assert!((outcomes[0].confidence() - 0.7).abs() < 1e-9);

        // with a clothing tag as well, both patterns report, primary first
        let jacketed = person(400.0, 300.0).with_tags(["jacket"]);
        let tracker = tracked(&zones, &[(1, jacketed.clone())]);
        let snap = snapshot(&zones, &tracker, &jacketed, vec![&backpack, &shelf], 1);
        assert_eq!(
            descriptions(&concealment(&snap, &BehaviorSettings::default())),
            vec![
                PRIMARY_CONCEALMENT_DESCRIPTION,
                "Person with backpack near electronics"
            ]
        );
    }

    #[test]
    fn reaching_person_matches_without_container() {
        let zones = store();
        let det = person(400.0, 300.0).with_tags(["person reaching"]);
        let tracker = tracked(&zones, &[(1, det.clone())]);
        let snap = snapshot(&zones, &tracker, &det, vec![], 1);

        let outcomes = concealment(&snap, &BehaviorSettings::default());
        assert_eq!(descriptions(&outcomes), vec!["Person reaching for items"]);

        let primary_only = BehaviorSettings {
            extra_concealment_patterns: Vec::new(),
            ..BehaviorSettings::default()
        };
        assert!(concealment(&snap, &primary_only).is_empty());
    }

    #[test]
    fn low_confidence_tags_do_not_count() {
        let zones = store();
        let det = person(400.0, 300.0).with_tags(["coat"]);
        let bag = Detection::object("bag", BoundingBox::new(420.0, 350.0, 30.0, 30.0), 0.4);
        let tracker = tracked(&zones, &[(1, det.clone())]);
        let snap = snapshot(&zones, &tracker, &det, vec![&bag], 1);
        assert!(concealment(&snap, &BehaviorSettings::default()).is_empty());
    }

    #[test]
    fn rapid_movement_uses_frame_elapsed_time() {
        let zones = ZoneRegistry::new();
        let a = person(100.0, 100.0);
        let b = person(150.0, 100.0);
        let tracker = tracked(&zones, &[(1, a), (2, b.clone())]);
        let snap = snapshot(&zones, &tracker, &b, vec![], 2);

        let slow = BehaviorSettings {
            rapid_movement_threshold: 60.0,
            ..BehaviorSettings::default()
        };
        assert!(rapid_movement(&snap, &slow).is_empty());

        let fast = BehaviorSettings {
            rapid_movement_threshold: 40.0,
            ..BehaviorSettings::default()
        };
        let outcomes = rapid_movement(&snap, &fast);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].severity(), Severity::Low);
    }

    #[test]
    fn high_value_at_exit_without_purchase_alerts() {
        let zones = store();
        let det = person(400.0, 300.0);
        let laptop = Detection::object("Laptop", BoundingBox::new(800.0, 50.0, 40.0, 30.0), 0.8);
        let tracker = tracked(&zones, &[(1, det.clone())]);

        let snap = snapshot(&zones, &tracker, &det, vec![&laptop], 1);
        let outcomes = high_value_objects(&snap, &BehaviorSettings::default());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].alert_type(), Some(AlertType::UnpaidItemAtExit));
        assert!((outcomes[0].confidence() - 0.72).abs() < 1e-9);

        let receipt = Detection::object("receipt", BoundingBox::new(820.0, 60.0, 5.0, 5.0), 0.9);
        let snap = snapshot(&zones, &tracker, &det, vec![&laptop, &receipt], 1);
        let outcomes = high_value_objects(&snap, &BehaviorSettings::default());
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_informational());
    }

    #[test]
    fn tag_matching_is_whole_word() {
        assert!(tag_matches("Open  Jacket", "open jacket"));
        assert!(tag_matches("man in open jacket", "jacket"));
        assert!(!tag_matches("baggage", "bag"));
        assert!(!tag_matches("mannequin", "man"));
        assert!(!tag_matches("anything", " "));
    }

    #[test]
    fn default_settings_validate() {
        assert!(BehaviorSettings::default().validate().is_ok());
        let bad = BehaviorSettings {
            rapid_window: 1,
            ..BehaviorSettings::default()
        };
        assert!(bad.validate().is_err());

        let unnamed = BehaviorSettings {
            extra_concealment_patterns: vec![ConcealmentPattern::new(" ", &[&["bag"]])],
            ..BehaviorSettings::default()
        };
        assert!(unnamed.validate().is_err());
        let duplicate = BehaviorSettings {
            extra_concealment_patterns: vec![ConcealmentPattern::new(
                "person with bag near clothing",
                &[&["tote"]],
            )],
            ..BehaviorSettings::default()
        };
        assert!(duplicate.validate().is_err());
        let hollow = BehaviorSettings {
            extra_concealment_patterns: vec![ConcealmentPattern::new("Crouching", &[&[""]])],
            ..BehaviorSettings::default()
        };
        assert!(hollow.validate().is_err());
    }
}
