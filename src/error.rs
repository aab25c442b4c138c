//! Error taxonomy for the frame analysis pipeline.
//!
//! Every error is local to one operation or one frame. Only
//! `MalformedInput` aborts a whole frame; `Validation` rejects the single
//! offending item; `TrackingState` rejects a frame before any tracker state
//! is touched; `Configuration` is fatal and surfaces before the first frame.

/// Pipeline result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Invalid zone, polygon or threshold at setup.
    #[error("configuration: {0}")]
    Configuration(String),

    /// Out-of-range confidence, unknown alert type/severity, unknown zone.
    #[error("validation: {0}")]
    Validation(String),

    /// Structurally invalid detection payload.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Frame numbers for one stream must be strictly increasing.
    #[error("tracking state: frame {got} does not follow last processed frame {last}")]
    TrackingState { last: u64, got: u64 },
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// True when the error aborts the whole frame rather than one item.
    pub fn is_frame_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedInput(_) | PipelineError::TrackingState { .. }
        )
    }
}
