use anyhow::Result;

use crate::detect::result::FramePayload;

/// Source of per-frame detections.
///
/// # Boundary
///
/// The pipeline never sees pixels. A provider wraps whatever vision service
/// turns imagery into boxes, confidences and tags, and hands over one
/// `FramePayload` per analysed frame, in capture order. Retries and backoff
/// against the remote service belong in the provider, not in the pipeline.
pub trait DetectionProvider: Send {
    /// Provider identifier.
    fn name(&self) -> &'static str;

    /// Next frame, or `None` when the source is exhausted.
    ///
    /// A `PipelineError::MalformedInput` (downcastable from the returned
    /// error) means only the current frame was unusable; callers may keep
    /// pulling frames.
    fn next_frame(&mut self) -> Result<Option<FramePayload>>;

    /// Checks the source before the first frame. Does nothing by default.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
