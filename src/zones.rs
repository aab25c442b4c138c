//! Zone registry.
//!
//! Zones are polygons in camera pixel space with policy flags. They are
//! built once from configuration and never mutated; the registry is shared
//! read-only (behind an `Arc`) by every stream worker.

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::geometry::{point_in_polygon, BoundingBox, Point, MIN_POLYGON_VERTICES};
use crate::validate_zone_name;

/// Default dwell limit for loiter-alerting zones.
pub const DEFAULT_MAX_LOITER_SECONDS: u32 = 180;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ZonePolicy {
    pub is_restricted: bool,
    pub alert_on_loitering: bool,
    pub max_loiter_seconds: u32,
    /// Store exit; high-value items seen here without a purchase signal alert.
    pub is_exit: bool,
}

impl Default for ZonePolicy {
    fn default() -> Self {
        Self {
            is_restricted: false,
            alert_on_loitering: false,
            max_loiter_seconds: DEFAULT_MAX_LOITER_SECONDS,
            is_exit: false,
        }
    }
}

impl ZonePolicy {
    pub fn restricted() -> Self {
        Self {
            is_restricted: true,
            ..Self::default()
        }
    }

    pub fn loitering(max_loiter_seconds: u32) -> Self {
        Self {
            alert_on_loitering: true,
            max_loiter_seconds,
            ..Self::default()
        }
    }

    pub fn exit() -> Self {
        Self {
            is_exit: true,
            ..Self::default()
        }
    }
}

/// A named polygonal region. Only constructible with a valid polygon.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionZone {
    name: String,
    polygon: Vec<Point>,
    policy: ZonePolicy,
}

impl DetectionZone {
    pub fn new(name: &str, polygon: Vec<Point>, policy: ZonePolicy) -> Result<Self> {
        validate_zone_name(name)?;
        if polygon.len() < MIN_POLYGON_VERTICES {
            return Err(PipelineError::configuration(format!(
                "zone '{}' has {} vertices, need at least {}",
                name,
                polygon.len(),
                MIN_POLYGON_VERTICES
            )));
        }
        if polygon.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(PipelineError::configuration(format!(
                "zone '{}' has a non-finite vertex",
                name
            )));
        }
        if policy.max_loiter_seconds == 0 {
            return Err(PipelineError::configuration(format!(
                "zone '{}' max_loiter_seconds must be > 0",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            polygon,
            policy,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn polygon(&self) -> &[Point] {
        &self.polygon
    }

    pub fn policy(&self) -> ZonePolicy {
        self.policy
    }

    pub fn is_restricted(&self) -> bool {
        self.policy.is_restricted
    }

    pub fn alert_on_loitering(&self) -> bool {
        self.policy.alert_on_loitering
    }

    pub fn max_loiter_seconds(&self) -> u32 {
        self.policy.max_loiter_seconds
    }

    pub fn is_exit(&self) -> bool {
        self.policy.is_exit
    }

    pub fn contains(&self, point: Point) -> bool {
        // The polygon was validated at construction, so the kernel cannot reject it.
        matches!(point_in_polygon(point, &self.polygon), Ok(true))
    }

    pub fn contains_box(&self, bbox: &BoundingBox) -> bool {
        self.contains(bbox.center())
    }
}

/// Ordered set of zones. Registration order is the overlap tie-break.
#[derive(Clone, Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<DetectionZone>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_zones(zones: impl IntoIterator<Item = DetectionZone>) -> Result<Self> {
        let mut registry = Self::new();
        for zone in zones {
            registry.register(zone)?;
        }
        log::info!("zone registry ready with {} zone(s)", registry.len());
        Ok(registry)
    }

    /// Add a zone. Names are unique, compared case-insensitively.
    pub fn register(&mut self, zone: DetectionZone) -> Result<()> {
        if zone.polygon.len() < MIN_POLYGON_VERTICES {
            return Err(PipelineError::configuration(format!(
                "zone '{}' has fewer than {} vertices",
                zone.name, MIN_POLYGON_VERTICES
            )));
        }
        if self.get(&zone.name).is_some() {
            return Err(PipelineError::configuration(format!(
                "zone '{}' is already registered",
                zone.name
            )));
        }
        self.zones.push(zone);
        Ok(())
    }

    /// First zone, in registration order, whose polygon contains `point`.
    pub fn zone_containing(&self, point: Point) -> Option<&DetectionZone> {
        self.zones.iter().find(|zone| zone.contains(point))
    }

    pub fn is_restricted(&self, point: Point) -> bool {
        self.zone_containing(point)
            .is_some_and(DetectionZone::is_restricted)
    }

    pub fn get(&self, name: &str) -> Option<&DetectionZone> {
        self.zones
            .iter()
            .find(|zone| zone.name.eq_ignore_ascii_case(name))
    }

    pub fn zones(&self) -> &[DetectionZone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
