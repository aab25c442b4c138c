use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::behavior::{BehaviorSettings, ConcealmentPattern};
use crate::geometry::Point;
use crate::pipeline::{
    AlertPolicy, FrameOrchestrator, PipelineSettings, DEFAULT_HISTORY_CAPACITY,
};
use crate::tracker::TrackerSettings;
use crate::zones::{DetectionZone, ZonePolicy, ZoneRegistry, DEFAULT_MAX_LOITER_SECONDS};

pub const CONFIG_ENV: &str = "THEFT_WATCH_CONFIG";

const HIGH_VALUE_LOITER_SECONDS: u32 = 120;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    fps: Option<f64>,
    tracking: Option<TrackingConfigFile>,
    behavior: Option<BehaviorConfigFile>,
    alerts: Option<AlertsConfigFile>,
    zones: Option<Vec<ZoneConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackingConfigFile {
    max_tracking_distance: Option<f64>,
    expiry_frames: Option<u64>,
    history_len: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BehaviorConfigFile {
    rapid_movement_threshold: Option<f64>,
    rapid_window: Option<usize>,
    min_tag_confidence: Option<f64>,
    min_object_confidence: Option<f64>,
    exit_confidence_factor: Option<f64>,
    high_value_items: Option<Vec<String>>,
    person_tags: Option<Vec<String>>,
    container_tags: Option<Vec<String>>,
    clothing_tags: Option<Vec<String>>,
    purchase_tags: Option<Vec<String>>,
    /// Replaces the patterns checked after person + container + clothing.
    concealment_patterns: Option<Vec<ConcealmentPattern>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlertsConfigFile {
    policy: Option<String>,
    history_capacity: Option<usize>,
    #[serde(default)]
    unbounded_history: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ZoneConfigFile {
    name: String,
    polygon: Vec<[f64; 2]>,
    #[serde(default)]
    restricted: bool,
    #[serde(default)]
    alert_on_loitering: bool,
    max_loiter_seconds: Option<u32>,
    #[serde(default)]
    exit: bool,
}

/// A zone as configured, before registry validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSpec {
    pub name: String,
    pub polygon: Vec<Point>,
    pub policy: ZonePolicy,
}

impl ZoneSpec {
    fn new(name: &str, polygon: &[(f64, f64)], policy: ZonePolicy) -> Self {
        Self {
            name: name.to_string(),
            polygon: polygon.iter().copied().map(Point::from).collect(),
            policy,
        }
    }
}

/// Store layout used when the configuration names no zones.
pub fn default_zones() -> Vec<ZoneSpec> {
    vec![
        ZoneSpec::new(
            "Checkout_Counter",
            &[(0.0, 0.0), (300.0, 0.0), (300.0, 200.0), (0.0, 200.0)],
            ZonePolicy::loitering(DEFAULT_MAX_LOITER_SECONDS),
        ),
        ZoneSpec::new(
            "Electronics_Display",
            &[(300.0, 0.0), (600.0, 0.0), (600.0, 300.0), (300.0, 300.0)],
            ZonePolicy::loitering(HIGH_VALUE_LOITER_SECONDS),
        ),
        ZoneSpec::new(
            "Exit_Zone",
            &[(700.0, 0.0), (1000.0, 0.0), (1000.0, 200.0), (700.0, 200.0)],
            ZonePolicy::exit(),
        ),
        ZoneSpec::new(
            "Employee_Storage",
            &[(0.0, 400.0), (200.0, 400.0), (200.0, 600.0), (0.0, 600.0)],
            ZonePolicy::restricted(),
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub settings: PipelineSettings,
    pub zones: Vec<ZoneSpec>,
}

impl PipelineConfig {
    /// Defaults, then the file named by `THEFT_WATCH_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        Self::finish(file_cfg.unwrap_or_default())
    }

    /// Like `load`, with an explicit file instead of `THEFT_WATCH_CONFIG`.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::finish(read_config_file(path)?)
    }

    fn finish(file: PipelineConfigFile) -> Result<Self> {
        let mut cfg = Self::from_file(file)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Result<Self> {
        let defaults = BehaviorSettings::default();
        let tracking = file.tracking.unwrap_or_default();
        let tracker_defaults = TrackerSettings::default();
        let tracker = TrackerSettings {
            max_tracking_distance: tracking
                .max_tracking_distance
                .unwrap_or(tracker_defaults.max_tracking_distance),
            expiry_frames: tracking
                .expiry_frames
                .unwrap_or(tracker_defaults.expiry_frames),
            history_len: tracking.history_len.unwrap_or(tracker_defaults.history_len),
        };

        let behavior_file = file.behavior.unwrap_or_default();
        let behavior = BehaviorSettings {
            rapid_movement_threshold: behavior_file
                .rapid_movement_threshold
                .unwrap_or(defaults.rapid_movement_threshold),
            rapid_window: behavior_file.rapid_window.unwrap_or(defaults.rapid_window),
            min_tag_confidence: behavior_file
                .min_tag_confidence
                .unwrap_or(defaults.min_tag_confidence),
            min_object_confidence: behavior_file
                .min_object_confidence
                .unwrap_or(defaults.min_object_confidence),
            exit_confidence_factor: behavior_file
                .exit_confidence_factor
                .unwrap_or(defaults.exit_confidence_factor),
            high_value_items: behavior_file
                .high_value_items
                .unwrap_or(defaults.high_value_items),
            person_tags: behavior_file.person_tags.unwrap_or(defaults.person_tags),
            container_tags: behavior_file
                .container_tags
                .unwrap_or(defaults.container_tags),
            clothing_tags: behavior_file
                .clothing_tags
                .unwrap_or(defaults.clothing_tags),
            purchase_tags: behavior_file
                .purchase_tags
                .unwrap_or(defaults.purchase_tags),
            extra_concealment_patterns: behavior_file
                .concealment_patterns
                .unwrap_or(defaults.extra_concealment_patterns),
        };

        let alerts = file.alerts.unwrap_or_default();
        let alert_policy = match alerts.policy.as_deref() {
            Some(raw) => raw.parse::<AlertPolicy>()?,
            None => AlertPolicy::default(),
        };
        let history_capacity = match (alerts.unbounded_history, alerts.history_capacity) {
            (true, Some(_)) => {
                return Err(anyhow!(
                    "alerts.history_capacity and alerts.unbounded_history are mutually exclusive"
                ))
            }
            (true, None) => None,
            (false, capacity) => Some(capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY)),
        };

        let zones = match file.zones {
            Some(zones) => zones
                .into_iter()
                .map(|zone| ZoneSpec {
                    polygon: zone.polygon.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
                    policy: ZonePolicy {
                        is_restricted: zone.restricted,
                        alert_on_loitering: zone.alert_on_loitering,
                        max_loiter_seconds: zone
                            .max_loiter_seconds
                            .unwrap_or(DEFAULT_MAX_LOITER_SECONDS),
                        is_exit: zone.exit,
                    },
                    name: zone.name,
                })
                .collect(),
            None => default_zones(),
        };

        Ok(Self {
            settings: PipelineSettings {
                fps: file.fps.unwrap_or(crate::pipeline::DEFAULT_FPS),
                tracker,
                behavior,
                alert_policy,
                history_capacity,
            },
            zones,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(fps) = env_number::<f64>("THEFT_WATCH_FPS")? {
            self.settings.fps = fps;
        }
        if let Some(distance) = env_number::<f64>("THEFT_WATCH_MAX_TRACKING_DISTANCE")? {
            self.settings.tracker.max_tracking_distance = distance;
        }
        if let Some(frames) = env_number::<u64>("THEFT_WATCH_EXPIRY_FRAMES")? {
            self.settings.tracker.expiry_frames = frames;
        }
        if let Some(threshold) = env_number::<f64>("THEFT_WATCH_RAPID_MOVEMENT_THRESHOLD")? {
            self.settings.behavior.rapid_movement_threshold = threshold;
        }
        if let Ok(policy) = std::env::var("THEFT_WATCH_ALERT_POLICY") {
            if !policy.trim().is_empty() {
                self.settings.alert_policy = policy.parse()?;
            }
        }
        if let Ok(items) = std::env::var("THEFT_WATCH_HIGH_VALUE_ITEMS") {
            let parsed = split_csv(&items);
            if !parsed.is_empty() {
                self.settings.behavior.high_value_items = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.build_registry()?;
        Ok(())
    }

    /// Validated zone registry. An empty zone list is valid.
    pub fn build_registry(&self) -> Result<ZoneRegistry> {
        let zones = self
            .zones
            .iter()
            .map(|spec| DetectionZone::new(&spec.name, spec.polygon.clone(), spec.policy))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(ZoneRegistry::from_zones(zones)?)
    }

    /// A fresh orchestrator for one stream.
    pub fn orchestrator(&self, zones: Arc<ZoneRegistry>) -> Result<FrameOrchestrator> {
        FrameOrchestrator::new(zones, self.settings.clone())
            .context("failed to build frame orchestrator")
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{key} must be a number, got '{raw}'")),
        _ => Ok(None),
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_builds() {
        let cfg = PipelineConfig::from_file(PipelineConfigFile::default()).unwrap();
        let registry = cfg.build_registry().unwrap();
        assert_eq!(registry.len(), 4);
        assert!(registry.is_restricted(Point::new(70.0, 490.0)));
        assert_eq!(
            registry.get("Electronics_Display").map(|z| z.max_loiter_seconds()),
            Some(HIGH_VALUE_LOITER_SECONDS)
        );
    }

    #[test]
    fn explicit_empty_zone_list_is_valid() {
        let file: PipelineConfigFile = serde_json::from_str(r#"{ "zones": [] }"#).unwrap();
        let cfg = PipelineConfig::from_file(file).unwrap();
        cfg.validate().unwrap();
        assert!(cfg.build_registry().unwrap().is_empty());
    }

    #[test]
    fn two_vertex_zone_fails_validation() {
        let file: PipelineConfigFile = serde_json::from_str(
            r#"{ "zones": [ { "name": "Line", "polygon": [[0, 0], [10, 0]] } ] }"#,
        )
        .unwrap();
        let cfg = PipelineConfig::from_file(file).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err}").contains("vertices"));
    }

    #[test]
    fn history_is_capped_unless_unbounded() {
        let cfg = PipelineConfig::from_file(PipelineConfigFile::default()).unwrap();
        assert_eq!(cfg.settings.history_capacity, Some(DEFAULT_HISTORY_CAPACITY));

        let file: PipelineConfigFile =
            serde_json::from_str(r#"{ "alerts": { "unbounded_history": true } }"#).unwrap();
        let cfg = PipelineConfig::from_file(file).unwrap();
        assert_eq!(cfg.settings.history_capacity, None);

        let file: PipelineConfigFile = serde_json::from_str(
            r#"{ "alerts": { "unbounded_history": true, "history_capacity": 10 } }"#,
        )
        .unwrap();
        assert!(PipelineConfig::from_file(file).is_err());
    }

    #[test]
    fn concealment_patterns_replace_the_extra_defaults() {
        let cfg = PipelineConfig::from_file(PipelineConfigFile::default()).unwrap();
        assert_eq!(cfg.settings.behavior.concealment_patterns().len(), 3);

        let file: PipelineConfigFile = serde_json::from_str(
            r#"{ "behavior": { "concealment_patterns": [
                { "description": "Tag removal", "groups": [["scissors", "pliers"]] }
            ] } }"#,
        )
        .unwrap();
        let cfg = PipelineConfig::from_file(file).unwrap();
        cfg.validate().unwrap();
        let descriptions: Vec<String> = cfg
            .settings
            .behavior
            .concealment_patterns()
            .into_iter()
            .map(|p| p.description)
            .collect();
        assert_eq!(
            descriptions,
            vec!["Person with bag near clothing", "Tag removal"]
        );
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" laptop, ,phone ,"), vec!["laptop", "phone"]);
    }
}
