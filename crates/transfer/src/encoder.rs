use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::debug;

use pixelbeam_protocol::constants::{DEFAULT_CHUNK_SIZE, MAX_TOTAL_FRAMES};
use pixelbeam_protocol::{
    Frame, MetadataDraft, ProtocolError, TransferMetadata, checksum, file_digest,
};

use crate::TransferError;

/// Sender-side tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Maximum base64 characters per data frame.
    pub chunk_size: usize,
    /// Leave `fileDigest` empty, disabling whole-file verification.
    pub skip_digest: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_digest: false,
        }
    }
}

/// The ordered frame list for one transfer, ready for display.
///
/// Read-only once built, so the rendered texts always match the frames.
#[derive(Debug, Clone)]
pub struct PreparedTransfer {
    metadata: TransferMetadata,
    frames: Vec<Frame>,
    texts: Vec<String>,
}

impl PreparedTransfer {
    /// The manifest carried by both metadata frames.
    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    /// Frames in index order: metadata, data..., metadata.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Rendered frame texts, parallel to `frames`.
    pub fn frame_texts(&self) -> &[String] {
        &self.texts
    }

    /// Number of frames carrying file data.
    pub fn data_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_metadata()).count()
    }

    /// Cycles through the frame texts forever, in the order a display
    /// replays them.
    pub fn looped(&self) -> impl Iterator<Item = &str> {
        self.texts.iter().map(String::as_str).cycle()
    }
}

/// Splits a payload into QR-sized frames.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    config: EncoderConfig,
}

impl FrameEncoder {
    /// Creates an encoder. A zero chunk size is rejected.
    pub fn new(config: EncoderConfig) -> Result<Self, ProtocolError> {
        if config.chunk_size == 0 {
            return Err(ProtocolError::InvalidChunkSize);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Builds every frame of a transfer.
    ///
    /// Index 0 and the last index both carry the manifest with identical
    /// payload and checksum; data slices occupy the indices in between. An
    /// empty payload yields just the two metadata frames.
    pub fn prepare(
        &self,
        file_bytes: &[u8],
        draft: MetadataDraft,
    ) -> Result<PreparedTransfer, TransferError> {
        let body = STANDARD.encode(file_bytes);
        let slices = split_body(&body, self.config.chunk_size);

        let total_frames = slices.len() + 2;
        if total_frames > MAX_TOTAL_FRAMES {
            return Err(ProtocolError::TooManyFrames {
                needed: total_frames,
                max: MAX_TOTAL_FRAMES,
            }
            .into());
        }

        let digest = if self.config.skip_digest {
            String::new()
        } else {
            file_digest(file_bytes)
        };
        let metadata = draft.finalize(file_bytes.len() as u64, total_frames, digest);
        let json = metadata.to_json()?;
        let meta_checksum = checksum(&json);

        let mut frames = Vec::with_capacity(total_frames);
        frames.push(Frame::metadata(
            0,
            metadata.clone(),
            json.clone(),
            meta_checksum.clone(),
        ));
        for (i, slice) in slices.iter().enumerate() {
            frames.push(Frame::data(i + 1, total_frames, (*slice).to_string()));
        }
        frames.push(Frame::metadata(
            total_frames - 1,
            metadata.clone(),
            json,
            meta_checksum,
        ));

        let texts = frames
            .iter()
            .map(Frame::to_text)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            filename = %metadata.filename,
            bytes = file_bytes.len(),
            data_frames = slices.len(),
            total_frames,
            chunk_size = self.config.chunk_size,
            "prepared transfer"
        );

        Ok(PreparedTransfer {
            metadata,
            frames,
            texts,
        })
    }
}

/// Cuts the base64 body into contiguous slices of at most `chunk_size`.
///
/// Base64 is ASCII, so byte offsets are always char boundaries.
fn split_body(body: &str, chunk_size: usize) -> Vec<&str> {
    let mut slices = Vec::with_capacity(body.len().div_ceil(chunk_size));
    let mut start = 0;
    while start < body.len() {
        let end = (start + chunk_size).min(body.len());
        slices.push(&body[start..end]);
        start = end;
    }
    slices
}
