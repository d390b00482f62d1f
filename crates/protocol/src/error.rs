//! Error types for the frame codec.

/// Errors produced while building frames or metadata.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("transfer needs {needed} frames (max {max})")]
    TooManyFrames { needed: usize, max: usize },

    #[error("frame index {index} out of range for {total} frames")]
    IndexOutOfRange { index: usize, total: usize },
}
