/// Result alias used across the crate.
pub type DomeWarpResult<T> = Result<T, DomeWarpError>;

/// Error taxonomy for calibration loading, GPU setup, frame transforms and I/O.
///
/// The variants mirror the recovery policy applied by the pipeline driver:
///
/// - `CalibrationNotFound` falls back to pass-through for the node.
/// - `CalibrationParse` drops the affected projector (or the node when none remain).
/// - `GpuInitialization` and `Transform` abort the current node only.
/// - `FrameValidation` skips the frame and keeps going.
#[derive(thiserror::Error, Debug)]
pub enum DomeWarpError {
    /// No calibration descriptor exists for a hostname.
    #[error("calibration not found: {0}")]
    CalibrationNotFound(String),

    /// Malformed descriptor or undersized/corrupt warp-map data.
    #[error("calibration parse error: {0}")]
    CalibrationParse(String),

    /// Raster context, shader or render-target setup failed.
    #[error("gpu initialization error: {0}")]
    GpuInitialization(String),

    /// A per-frame transform failed.
    #[error("transform error: {0}")]
    Transform(String),

    /// A decoded frame has unusable dimensions.
    #[error("frame validation error: {0}")]
    FrameValidation(String),

    /// Invalid arguments or API misuse.
    #[error("validation error: {0}")]
    Validation(String),

    /// Cluster configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// ffmpeg decode/encode process failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other error, with context.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DomeWarpError {
    /// Build a [`DomeWarpError::CalibrationNotFound`].
    pub fn calibration_not_found(msg: impl Into<String>) -> Self {
        Self::CalibrationNotFound(msg.into())
    }

    /// Build a [`DomeWarpError::CalibrationParse`].
    pub fn calibration_parse(msg: impl Into<String>) -> Self {
        Self::CalibrationParse(msg.into())
    }

    /// Build a [`DomeWarpError::GpuInitialization`].
    pub fn gpu_init(msg: impl Into<String>) -> Self {
        Self::GpuInitialization(msg.into())
    }

    /// Build a [`DomeWarpError::Transform`].
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Build a [`DomeWarpError::FrameValidation`].
    pub fn frame_validation(msg: impl Into<String>) -> Self {
        Self::FrameValidation(msg.into())
    }

    /// Build a [`DomeWarpError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`DomeWarpError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`DomeWarpError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// `true` when the error must abort the current node's processing.
    pub fn is_node_fatal(&self) -> bool {
        matches!(self, Self::GpuInitialization(_) | Self::Transform(_))
    }

    /// `true` when the offending frame can be skipped and processing continued.
    pub fn is_frame_skippable(&self) -> bool {
        matches!(self, Self::FrameValidation(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
