//! Sending and receiving files as a loop of QR frames.
//!
//! [`FrameEncoder`] turns a payload into its ordered frame list.
//! [`ScanSession`] accepts scanned frame texts in any order, from any
//! thread, and rebuilds the file in the background once every frame has
//! been seen. [`reconstruct`] is the verification step on its own.

mod encoder;
mod progress;
mod reconstruct;
mod session;
mod state;

pub use encoder::{EncoderConfig, FrameEncoder, PreparedTransfer};
pub use progress::ScanProgress;
pub use reconstruct::{Reconstructed, reconstruct};
pub use session::ScanSession;
pub use state::{IngestOutcome, ScanConfig, ScanMachine, ScanState};

use pixelbeam_protocol::ProtocolError;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("inconsistent frame count: expected {expected}, found {found}")]
    InconsistentTotal { expected: usize, found: usize },

    #[error("checksum mismatch in frame {index}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] base64::DecodeError),

    #[error("file digest mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("no metadata frame in transfer")]
    MissingMetadata,

    #[error("missing data frames: {missing:?}")]
    IncompleteTransfer { missing: Vec<usize> },
}

impl TransferError {
    /// The frame index the error is attributed to, if any.
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            Self::ChecksumMismatch { index, .. } => Some(*index),
            _ => None,
        }
    }
}
