//! Identity tracker.
//!
//! Links person detections across frames with greedy nearest-neighbour
//! matching on box centers, and keeps per-track zone dwell accounting.
//!
//! # Matching
//!
//! Detections are processed in the order received. Each one claims the
//! closest unclaimed track whose last center is within
//! `max_tracking_distance`; ties go to the lowest track id. A track may be
//! claimed by at most one detection per frame, and a track created in the
//! current frame is not eligible for later detections of that frame. This
//! is first-claimed-wins, not an assignment-optimal matching: in crowded
//! scenes a later detection can lose its best match to an earlier one.
//!
//! # Lifecycle
//!
//! `New` (created this frame) -> `Active` -> `Expired`. A track unmatched
//! for more than `expiry_frames` frame numbers is removed before matching
//! and its id is never reused.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::detect::Detection;
use crate::error::{PipelineError, Result};
use crate::geometry::{distance, BoundingBox, Point};
use crate::zones::ZoneRegistry;

pub type TrackId = u64;

pub const DEFAULT_MAX_TRACKING_DISTANCE: f64 = 100.0;
pub const DEFAULT_EXPIRY_FRAMES: u64 = 300;
pub const DEFAULT_HISTORY_LEN: usize = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerSettings {
    /// Maximum center displacement, in pixels, for a detection to continue a track.
    pub max_tracking_distance: f64,
    /// Frames a track may go unmatched before it expires.
    pub expiry_frames: u64,
    /// Center positions retained per track.
    pub history_len: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            max_tracking_distance: DEFAULT_MAX_TRACKING_DISTANCE,
            expiry_frames: DEFAULT_EXPIRY_FRAMES,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

impl TrackerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_tracking_distance.is_finite() && self.max_tracking_distance > 0.0) {
            return Err(PipelineError::configuration(
                "max_tracking_distance must be a positive number",
            ));
        }
        if self.expiry_frames == 0 {
            return Err(PipelineError::configuration("expiry_frames must be > 0"));
        }
        if self.history_len < 2 {
            return Err(PipelineError::configuration("history_len must be >= 2"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    New,
    Active,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrackPoint {
    pub frame: u64,
    pub center: Point,
}

/// One person followed across frames.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackedPerson {
    pub id: TrackId,
    pub state: TrackState,
    pub last_bounding_box: BoundingBox,
    pub last_confidence: f64,
    pub first_seen_frame: u64,
    pub last_seen_frame: u64,
    /// Most recent centers, ordered by frame number.
    pub position_history: Vec<TrackPoint>,
    /// Zone the latest center falls in.
    pub current_zone: Option<String>,
    /// Zone name -> stream time (seconds) the current stay began.
    pub zone_entry_times: BTreeMap<String, f64>,
}

impl TrackedPerson {
    pub fn last_center(&self) -> Point {
        self.position_history
            .last()
            .map(|p| p.center)
            .unwrap_or_else(|| self.last_bounding_box.center())
    }

    /// Seconds spent continuously in `zone` as of `now`, zero if not there.
    pub fn dwell_seconds(&self, zone: &str, now: f64) -> f64 {
        self.zone_entry_times
            .get(zone)
            .map(|entered| (now - entered).max(0.0))
            .unwrap_or(0.0)
    }

    /// The last `k` recorded positions.
    pub fn recent_positions(&self, k: usize) -> &[TrackPoint] {
        let start = self.position_history.len().saturating_sub(k);
        &self.position_history[start..]
    }

    pub fn seen_in(&self, frame: u64) -> bool {
        self.last_seen_frame == frame
    }
}

/// How one person detection of the frame was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackAssignment {
    /// Index into the frame's person detections.
    pub detection_index: usize,
    pub track_id: TrackId,
    pub created: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackUpdate {
    pub assignments: Vec<TrackAssignment>,
    pub expired: Vec<TrackId>,
}

/// Per-stream tracker. Not shared between streams.
#[derive(Debug)]
pub struct IdentityTracker {
    settings: TrackerSettings,
    tracks: BTreeMap<TrackId, TrackedPerson>,
    next_id: TrackId,
    last_frame: Option<u64>,
    now_s: f64,
}

impl IdentityTracker {
    pub fn new(settings: TrackerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            tracks: BTreeMap::new(),
            next_id: 1,
            last_frame: None,
            now_s: 0.0,
        })
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Rejects a frame number that does not follow the last one processed.
    pub fn check_frame_order(&self, frame_number: u64) -> Result<()> {
        match self.last_frame {
            Some(last) if frame_number <= last => Err(PipelineError::TrackingState {
                last,
                got: frame_number,
            }),
            _ => Ok(()),
        }
    }

    /// Advance the tracker by one frame.
    ///
    /// `persons` must contain only person detections, in provider order.
    /// On error nothing is mutated.
    pub fn update(
        &mut self,
        frame_number: u64,
        now_s: f64,
        persons: &[&Detection],
        zones: &ZoneRegistry,
    ) -> Result<TrackUpdate> {
        self.check_frame_order(frame_number)?;

        self.last_frame = Some(frame_number);
        self.now_s = now_s;

        let expired = self.expire(frame_number);
        for track in self.tracks.values_mut() {
            if track.state == TrackState::New {
                track.state = TrackState::Active;
            }
        }

        let mut claimed: BTreeSet<TrackId> = BTreeSet::new();
        let mut assignments = Vec::with_capacity(persons.len());
        for (detection_index, det) in persons.iter().enumerate() {
            let center = det.center();
            let (track_id, created) = match self.nearest_unclaimed(center, &claimed) {
                Some(id) => {
                    self.observe(id, det, frame_number, now_s, zones);
                    (id, false)
                }
                None => (self.create(det, frame_number, now_s, zones), true),
            };
            claimed.insert(track_id);
            assignments.push(TrackAssignment {
                detection_index,
                track_id,
                created,
            });
        }

        Ok(TrackUpdate {
            assignments,
            expired,
        })
    }

    fn expire(&mut self, frame_number: u64) -> Vec<TrackId> {
        let expiry = self.settings.expiry_frames;
        let stale: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| frame_number.saturating_sub(t.last_seen_frame) > expiry)
            .map(|t| t.id)
            .collect();
        for id in &stale {
            if let Some(mut track) = self.tracks.remove(id) {
                track.state = TrackState::Expired;
                log::debug!(
                    "track {} expired (last seen frame {}, now frame {})",
                    track.id,
                    track.last_seen_frame,
                    frame_number
                );
            }
        }
        stale
    }

    fn nearest_unclaimed(&self, center: Point, claimed: &BTreeSet<TrackId>) -> Option<TrackId> {
        let mut best: Option<(TrackId, f64)> = None;
        // BTreeMap iterates in ascending id order; strict `<` keeps the lowest id on ties.
        for track in self.tracks.values() {
            if claimed.contains(&track.id) {
                continue;
            }
            let d = distance(center, track.last_center());
            if d > self.settings.max_tracking_distance {
                continue;
            }
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((track.id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    fn create(
        &mut self,
        det: &Detection,
        frame_number: u64,
        now_s: f64,
        zones: &ZoneRegistry,
    ) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;

        let center = det.center();
        let mut track = TrackedPerson {
            id,
            state: TrackState::New,
            last_bounding_box: det.bounding_box,
            last_confidence: det.confidence,
            first_seen_frame: frame_number,
            last_seen_frame: frame_number,
            position_history: vec![TrackPoint {
                frame: frame_number,
                center,
            }],
            current_zone: None,
            zone_entry_times: BTreeMap::new(),
        };
        update_zone_membership(&mut track, center, now_s, zones);
        log::debug!(
            "track {} created at ({:.1}, {:.1}) frame {} zone={:?}",
            id,
            center.x,
            center.y,
            frame_number,
            track.current_zone
        );
        self.tracks.insert(id, track);
        id
    }

    fn observe(
        &mut self,
        id: TrackId,
        det: &Detection,
        frame_number: u64,
        now_s: f64,
        zones: &ZoneRegistry,
    ) {
        let history_len = self.settings.history_len;
        let Some(track) = self.tracks.get_mut(&id) else {
            return;
        };
        let center = det.center();
        track.position_history.push(TrackPoint {
            frame: frame_number,
            center,
        });
        if track.position_history.len() > history_len {
            let excess = track.position_history.len() - history_len;
            track.position_history.drain(..excess);
        }
        track.last_bounding_box = det.bounding_box;
        track.last_confidence = det.confidence;
        track.last_seen_frame = frame_number;
        update_zone_membership(track, center, now_s, zones);
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackedPerson> {
        self.tracks.get(&id)
    }

    /// All live tracks in ascending id order.
    pub fn tracks(&self) -> impl Iterator<Item = &TrackedPerson> {
        self.tracks.values()
    }

    /// Tracks matched or created in `frame`.
    pub fn observed_in(&self, frame: u64) -> impl Iterator<Item = &TrackedPerson> {
        self.tracks.values().filter(move |t| t.seen_in(frame))
    }

    pub fn active_count(&self) -> usize {
        self.tracks.len()
    }

    /// Dwell of a live track in `zone` at the tracker's current time.
    pub fn dwell_seconds(&self, id: TrackId, zone: &str) -> f64 {
        self.tracks
            .get(&id)
            .map(|t| t.dwell_seconds(zone, self.now_s))
            .unwrap_or(0.0)
    }
}

/// Re-entry resets the entry time; leaving a zone forgets it.
fn update_zone_membership(
    track: &mut TrackedPerson,
    center: Point,
    now_s: f64,
    zones: &ZoneRegistry,
) {
    let zone = zones.zone_containing(center).map(|z| z.name().to_string());
    if zone == track.current_zone {
        return;
    }
    track.zone_entry_times.clear();
    if let Some(name) = &zone {
        track.zone_entry_times.insert(name.clone(), now_s);
    }
    track.current_zone = zone;
}
