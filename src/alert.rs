//! Alert Synthesizer.
//!
//! Materialises validated, immutable `TheftAlert`s and keeps them in an
//! insertion-ordered history. Repeat suppression is not done here.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::geometry::Point;
use crate::zones::ZoneRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    RestrictedAreaViolation,
    Loitering,
    ConcealmentPattern,
    RapidMovement,
    UnpaidItemAtExit,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        AlertType::RestrictedAreaViolation,
        AlertType::Loitering,
        AlertType::ConcealmentPattern,
        AlertType::RapidMovement,
        AlertType::UnpaidItemAtExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::RestrictedAreaViolation => "RESTRICTED_AREA_VIOLATION",
            AlertType::Loitering => "LOITERING",
            AlertType::ConcealmentPattern => "CONCEALMENT_PATTERN",
            AlertType::RapidMovement => "RAPID_MOVEMENT",
            AlertType::UnpaidItemAtExit => "UNPAID_ITEM_AT_EXIT",
        }
    }

    /// Position in a frame's returned alerts; lower comes first.
    pub fn priority(self) -> u8 {
        match self {
            AlertType::RestrictedAreaViolation => 0,
            AlertType::Loitering => 1,
            AlertType::ConcealmentPattern => 2,
            AlertType::RapidMovement => 3,
            AlertType::UnpaidItemAtExit => 4,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        AlertType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| PipelineError::validation(format!("unknown alert type '{}'", s.trim())))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(PipelineError::validation(format!(
                "unknown severity '{other}'; expected LOW, MEDIUM, HIGH or CRITICAL"
            ))),
        }
    }
}

/// Where an alert happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertLocation {
    Zone { name: String },
    Point { x: f64, y: f64 },
}

impl AlertLocation {
    pub fn zone(name: &str) -> Self {
        AlertLocation::Zone {
            name: name.to_string(),
        }
    }

    pub fn point(p: Point) -> Self {
        AlertLocation::Point { x: p.x, y: p.y }
    }
}

impl fmt::Display for AlertLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLocation::Zone { name } => write!(f, "{name}"),
            AlertLocation::Point { x, y } => write!(f, "({x:.1}, {y:.1})"),
        }
    }
}

/// Frame an alert is attached to.
#[derive(Clone, Copy, Debug)]
pub struct AlertOrigin<'a> {
    pub frame_ref: &'a str,
    pub frame_number: u64,
    /// Stream time in seconds.
    pub timestamp: f64,
}

/// An emitted alert. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TheftAlert {
    id: u64,
    alert_type: AlertType,
    severity: Severity,
    timestamp: f64,
    frame_ref: String,
    frame_number: u64,
    location: AlertLocation,
    confidence: f64,
    details: BTreeMap<String, Value>,
}

impl TheftAlert {
    /// Sequence number within the synthesizer that created it, from 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn frame_ref(&self) -> &str {
        &self.frame_ref
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn location(&self) -> &AlertLocation {
        &self.location
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn details(&self) -> &BTreeMap<String, Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

/// Summary of the retained history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlertReport {
    pub total_alerts: usize,
    /// Alerts dropped from the history by the capacity bound.
    pub evicted: u64,
    pub by_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub alerts: Vec<TheftAlert>,
}

#[derive(Debug)]
pub struct AlertSynthesizer {
    zones: Arc<ZoneRegistry>,
    history: VecDeque<TheftAlert>,
    capacity: Option<usize>,
    next_id: u64,
    evicted: u64,
}

impl AlertSynthesizer {
    pub fn new(zones: Arc<ZoneRegistry>) -> Self {
        Self {
            zones,
            history: VecDeque::new(),
            capacity: None,
            next_id: 1,
            evicted: 0,
        }
    }

    /// Bound the history; the oldest alerts are dropped first.
    pub fn with_capacity_limit(mut self, capacity: Option<usize>) -> Result<Self> {
        if capacity == Some(0) {
            return Err(PipelineError::configuration(
                "alert history capacity must be at least 1",
            ));
        }
        self.capacity = capacity;
        Ok(self)
    }

    /// The checks `create_alert` applies, without recording anything.
    pub fn check_alert(&self, confidence: f64, location: &AlertLocation) -> Result<()> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(PipelineError::validation(format!(
                "alert confidence {confidence} out of bounds"
            )));
        }
        match location {
            AlertLocation::Zone { name } => {
                if self.zones.get(name).is_none() {
                    return Err(PipelineError::validation(format!("unknown zone '{name}'")));
                }
            }
            AlertLocation::Point { x, y } => {
                if !(x.is_finite() && y.is_finite()) {
                    return Err(PipelineError::validation("alert point must be finite"));
                }
            }
        }
        Ok(())
    }

    /// Validate and record a new alert.
    pub fn create_alert(
        &mut self,
        alert_type: AlertType,
        severity: Severity,
        location: AlertLocation,
        confidence: f64,
        details: BTreeMap<String, Value>,
        origin: AlertOrigin<'_>,
    ) -> Result<TheftAlert> {
        self.check_alert(confidence, &location)?;

        let alert = TheftAlert {
            id: self.next_id,
            alert_type,
            severity,
            timestamp: origin.timestamp,
            frame_ref: origin.frame_ref.to_string(),
            frame_number: origin.frame_number,
            location,
            confidence,
            details,
        };
        self.next_id += 1;

        log::info!(
            "alert {} severity={} location={} confidence={:.2} frame={}",
            alert.alert_type,
            alert.severity,
            alert.location,
            alert.confidence,
            alert.frame_number
        );

        self.history.push_back(alert.clone());
        if let Some(cap) = self.capacity {
            while self.history.len() > cap {
                self.history.pop_front();
                self.evicted += 1;
            }
        }
        Ok(alert)
    }

    /// String-typed entry point for callers outside the crate's enums.
    pub fn create_alert_from_names(
        &mut self,
        alert_type: &str,
        severity: &str,
        location: AlertLocation,
        confidence: f64,
        details: BTreeMap<String, Value>,
        origin: AlertOrigin<'_>,
    ) -> Result<TheftAlert> {
        let alert_type: AlertType = alert_type.parse()?;
        let severity: Severity = severity.parse()?;
        self.create_alert(alert_type, severity, location, confidence, details, origin)
    }

    /// Retained alerts in creation order.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &TheftAlert> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn report(&self) -> AlertReport {
        let mut by_type = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for alert in &self.history {
            *by_type.entry(alert.alert_type.to_string()).or_insert(0) += 1;
            *by_severity.entry(alert.severity.to_string()).or_insert(0) += 1;
        }
        AlertReport {
            total_alerts: self.history.len(),
            evicted: self.evicted,
            by_type,
            by_severity,
            alerts: self.history.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::{DetectionZone, ZonePolicy};

    fn registry() -> Arc<ZoneRegistry> {
        let square = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        Arc::new(
            ZoneRegistry::from_zones([
                DetectionZone::new("Vault", square, ZonePolicy::restricted()).unwrap()
            ])
            .unwrap(),
        )
    }

    fn origin(frame_number: u64) -> AlertOrigin<'static> {
        AlertOrigin {
            frame_ref: "cam/0001.jpg",
            frame_number,
            timestamp: frame_number as f64 / 30.0,
        }
    }

    #[test]
    fn parses_known_names_only() {
        assert_eq!("loitering".parse::<AlertType>().unwrap(), AlertType::Loitering);
        assert_eq!(
            "unpaid-item-at-exit".parse::<AlertType>().unwrap(),
            AlertType::UnpaidItemAtExit
        );
        assert_eq!(" critical ".parse::<Severity>().unwrap(), Severity::Critical);
        assert!(matches!(
            "SHOPLIFTING".parse::<AlertType>(),
            Err(PipelineError::Validation(_))
        ));
        assert!(matches!(
            "SEVERE".parse::<Severity>(),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn history_keeps_insertion_order() {
        let mut synth = AlertSynthesizer::new(registry());
        synth
            .create_alert(
                AlertType::RapidMovement,
                Severity::Low,
                AlertLocation::point(Point::new(5.0, 5.0)),
                0.5,
                BTreeMap::new(),
                origin(1),
            )
            .unwrap();
        synth
            .create_alert_from_names(
                "RESTRICTED_AREA_VIOLATION",
                "HIGH",
                AlertLocation::zone("Vault"),
                0.9,
                BTreeMap::new(),
                origin(2),
            )
            .unwrap();

        let ids: Vec<u64> = synth.history().map(TheftAlert::id).collect();
        assert_eq!(ids, vec![1, 2]);
        let types: Vec<AlertType> = synth.history().map(|a| a.alert_type()).collect();
        assert_eq!(
            types,
            vec![AlertType::RapidMovement, AlertType::RestrictedAreaViolation]
        );
    }

    #[test]
    fn rejects_bad_confidence_unknown_zone_and_names() {
        let mut synth = AlertSynthesizer::new(registry());
        let bad_conf = synth.create_alert(
            AlertType::Loitering,
            Severity::Medium,
            AlertLocation::zone("Vault"),
            1.01,
            BTreeMap::new(),
            origin(1),
        );
        assert!(matches!(bad_conf, Err(PipelineError::Validation(_))));

        let unknown_zone = synth.create_alert(
            AlertType::Loitering,
            Severity::Medium,
            AlertLocation::zone("Basement"),
            0.8,
            BTreeMap::new(),
            origin(1),
        );
        assert!(matches!(unknown_zone, Err(PipelineError::Validation(_))));

        let bad_name = synth.create_alert_from_names(
            "LOITERING",
            "URGENT",
            AlertLocation::zone("Vault"),
            0.8,
            BTreeMap::new(),
            origin(1),
        );
        assert!(bad_name.is_err());
        assert!(synth.is_empty());
    }

    #[test]
    fn check_alert_records_nothing() {
        let synth = AlertSynthesizer::new(registry());
        let far = AlertLocation::Point {
            x: f64::INFINITY,
            y: 1.0,
        };
        assert!(matches!(
            synth.check_alert(0.5, &far),
            Err(PipelineError::Validation(_))
        ));
        assert!(synth
            .check_alert(0.5, &AlertLocation::zone("Vault"))
            .is_ok());
        assert!(synth.is_empty());
    }

    #[test]
    fn capacity_drops_oldest_and_report_counts() {
        let mut synth = AlertSynthesizer::new(registry())
            .with_capacity_limit(Some(2))
            .unwrap();
        for frame in 1..=3 {
            synth
                .create_alert(
                    AlertType::Loitering,
                    Severity::Medium,
                    AlertLocation::zone("Vault"),
                    0.7,
                    BTreeMap::from([("track_id".to_string(), Value::from(frame))]),
                    origin(frame),
                )
                .unwrap();
        }
        let report = synth.report();
        assert_eq!(report.total_alerts, 2);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.by_type.get("LOITERING"), Some(&2));
        assert_eq!(report.by_severity.get("MEDIUM"), Some(&2));
        assert_eq!(report.alerts[0].frame_number(), 2);

        assert!(AlertSynthesizer::new(registry())
            .with_capacity_limit(Some(0))
            .is_err());
    }

    #[test]
    fn alert_serializes_with_wire_names() {
        let mut synth = AlertSynthesizer::new(registry());
        let alert = synth
            .create_alert(
                AlertType::ConcealmentPattern,
                Severity::Medium,
                AlertLocation::point(Point::new(1.0, 2.0)),
                0.6,
                BTreeMap::new(),
                origin(3),
            )
            .unwrap();
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["alert_type"], "CONCEALMENT_PATTERN");
        assert_eq!(json["severity"], "MEDIUM");
        assert_eq!(json["location"]["kind"], "point");
        assert_eq!(json["frame_ref"], "cam/0001.jpg");
    }
}
