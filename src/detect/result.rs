use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::geometry::{BoundingBox, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Person,
    Object,
}

/// One provider-reported entity in a single frame.
///
/// Detections carry no identity of their own; the tracker links person
/// detections across frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub kind: DetectionKind,
    pub bounding_box: BoundingBox,
    /// Provider confidence, expected in 0..=1.
    pub confidence: f64,
    /// Ordered provider tags (e.g. "bag", "open jacket").
    #[serde(default)]
    pub tags: Vec<String>,
    /// Object class label. Required for objects.
    #[serde(default)]
    pub label: Option<String>,
}

impl Detection {
    pub fn person(bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            kind: DetectionKind::Person,
            bounding_box,
            confidence,
            tags: Vec::new(),
            label: None,
        }
    }

    pub fn object(label: &str, bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            kind: DetectionKind::Object,
            bounding_box,
            confidence,
            tags: Vec::new(),
            label: Some(label.to_string()),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_person(&self) -> bool {
        self.kind == DetectionKind::Person
    }

    pub fn center(&self) -> Point {
        self.bounding_box.center()
    }

    /// Structural faults abort the whole frame.
    pub fn check_structure(&self) -> Result<()> {
        self.bounding_box.validate()?;
        if self.kind == DetectionKind::Object
            && self.label.as_deref().map_or(true, |l| l.trim().is_empty())
        {
            return Err(PipelineError::malformed("object detection without a label"));
        }
        Ok(())
    }

    /// Range faults reject only this detection.
    pub fn check_confidence(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(PipelineError::validation(format!(
                "confidence {} out of bounds",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Everything the provider reports for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    /// Opaque image reference (path, URI, capture id).
    pub frame_ref: String,
    pub frame_number: u64,
    pub detections: Vec<Detection>,
}
