//! Provider payload parsing.
//!
//! Payloads are checked field by field so that a missing or ill-typed field
//! is reported by name. Any fault here is `MalformedInput`: the frame is
//! dropped whole. Confidence range is deliberately not checked here; that is
//! a per-detection `Validation` concern handled by the orchestrator.

use serde_json::{Map, Value};

use crate::detect::result::{Detection, DetectionKind, FramePayload};
use crate::error::{PipelineError, Result};
use crate::geometry::BoundingBox;

fn field<'a>(context: &str, obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| PipelineError::malformed(format!("{context}.{key} is required")))
}

fn number(context: &str, obj: &Map<String, Value>, key: &str) -> Result<f64> {
    field(context, obj, key)?
        .as_f64()
        .ok_or_else(|| PipelineError::malformed(format!("{context}.{key} must be a number")))
}

fn parse_kind(value: &Value) -> Result<DetectionKind> {
    let raw = value
        .as_str()
        .ok_or_else(|| PipelineError::malformed("detection.kind must be a string"))?;
    match raw.trim().to_lowercase().as_str() {
        "person" | "people" => Ok(DetectionKind::Person),
        "object" => Ok(DetectionKind::Object),
        other => Err(PipelineError::malformed(format!(
            "detection.kind '{other}' is not person or object"
        ))),
    }
}

fn parse_bounding_box(value: &Value) -> Result<BoundingBox> {
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::malformed("bounding_box must be an object"))?;
    let bbox = BoundingBox {
        x: number("bounding_box", obj, "x")?,
        y: number("bounding_box", obj, "y")?,
        width: number("bounding_box", obj, "width")?,
        height: number("bounding_box", obj, "height")?,
    };
    bbox.validate()?;
    Ok(bbox)
}

fn parse_tags(value: Option<&Value>) -> Result<Vec<String>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| PipelineError::malformed("detection.tags must be an array"))?;
    items
        .iter()
        .map(|tag| {
            tag.as_str()
                .map(str::to_string)
                .ok_or_else(|| PipelineError::malformed("detection.tags must contain strings"))
        })
        .collect()
}

/// Parse one detection record.
pub fn parse_detection(value: &Value) -> Result<Detection> {
    let obj = value
        .as_object()
        .ok_or_else(|| PipelineError::malformed("detection must be a JSON object"))?;

    let kind = parse_kind(field("detection", obj, "kind")?)?;
    let bounding_box = parse_bounding_box(field("detection", obj, "bounding_box")?)?;
    let confidence = number("detection", obj, "confidence")?;
    let tags = parse_tags(obj.get("tags"))?;
    let label = match obj.get("label") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(PipelineError::malformed("detection.label must be a string")),
    };

    let detection = Detection {
        kind,
        bounding_box,
        confidence,
        tags,
        label,
    };
    detection.check_structure()?;
    Ok(detection)
}

/// Parse a whole frame. One bad detection rejects the frame.
pub fn parse_frame_payload(payload: &Value) -> Result<FramePayload> {
    let obj = payload
        .as_object()
        .ok_or_else(|| PipelineError::malformed("frame payload must be a JSON object"))?;

    let frame_ref = field("frame", obj, "frame_ref")?
        .as_str()
        .ok_or_else(|| PipelineError::malformed("frame.frame_ref must be a string"))?
        .to_string();
    let frame_number = field("frame", obj, "frame_number")?
        .as_u64()
        .ok_or_else(|| PipelineError::malformed("frame.frame_number must be a u64"))?;
    let detections = field("frame", obj, "detections")?
        .as_array()
        .ok_or_else(|| PipelineError::malformed("frame.detections must be an array"))?
        .iter()
        .enumerate()
        .map(|(idx, det)| {
            parse_detection(det).map_err(|e| match e {
                PipelineError::MalformedInput(msg) => {
                    PipelineError::malformed(format!("detections[{idx}]: {msg}"))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FramePayload {
        frame_ref,
        frame_number,
        detections,
    })
}

/// Parse a frame from raw JSON text.
pub fn parse_frame_json(raw: &str) -> Result<FramePayload> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| PipelineError::malformed(format!("invalid JSON: {e}")))?;
    parse_frame_payload(&value)
}
