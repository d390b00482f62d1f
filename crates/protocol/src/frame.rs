//! Frame wire format.
//!
//! # Wire format
//!
//! ```text
//! IMG|<totalFrames:3 digits>|<index:3 digits>|<checksum:8 hex>|<payloadText>
//! ```
//!
//! `payloadText` is either a slice of the base64 file body or the compact
//! JSON of a [`TransferMetadata`]. Base64 never contains `{` or `|`, so a
//! payload opening with `{` marks a metadata frame, and splitting stops at
//! the fifth field so JSON may contain `|`.

use crate::checksum::{checksum, verify_checksum};
use crate::constants::{
    COUNTER_WIDTH, FIELD_DELIMITER, FRAME_FIELD_COUNT, FRAME_HEADER_LEN, FRAME_MAGIC,
    MAX_TOTAL_FRAMES,
};
use crate::error::ProtocolError;
use crate::metadata::TransferMetadata;

/// One wire-format record, carried by a single QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: usize,
    pub total_frames: usize,
    /// Checksum of `payload_text` as carried on the wire.
    pub checksum: String,
    pub payload_text: String,
    /// Parsed manifest when this is a metadata frame.
    pub metadata: Option<TransferMetadata>,
}

impl Frame {
    /// Builds a data frame, computing the checksum of `payload_text`.
    pub fn data(index: usize, total_frames: usize, payload_text: String) -> Self {
        Self {
            index,
            total_frames,
            checksum: checksum(&payload_text),
            payload_text,
            metadata: None,
        }
    }

    /// Builds a metadata frame from an already serialized manifest.
    ///
    /// The JSON and its checksum are passed in so both metadata copies of a
    /// transfer share them byte for byte.
    pub fn metadata(
        index: usize,
        metadata: TransferMetadata,
        json: String,
        checksum: String,
    ) -> Self {
        Self {
            index,
            total_frames: metadata.total_frames,
            checksum,
            payload_text: json,
            metadata: Some(metadata),
        }
    }

    /// Whether this frame carries the transfer manifest.
    pub fn is_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// Whether the stored checksum matches the payload.
    pub fn checksum_valid(&self) -> bool {
        verify_checksum(&self.payload_text, &self.checksum)
    }

    /// Renders the frame text for QR encoding.
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        encode_frame(
            self.index,
            self.total_frames,
            &self.checksum,
            &self.payload_text,
        )
    }
}

/// Renders a frame record.
///
/// Fails if `total_frames` exceeds the 3-digit field or `index` is not
/// below it.
pub fn encode_frame(
    index: usize,
    total_frames: usize,
    checksum: &str,
    payload_text: &str,
) -> Result<String, ProtocolError> {
    if total_frames > MAX_TOTAL_FRAMES {
        return Err(ProtocolError::TooManyFrames {
            needed: total_frames,
            max: MAX_TOTAL_FRAMES,
        });
    }
    if index >= total_frames {
        return Err(ProtocolError::IndexOutOfRange {
            index,
            total: total_frames,
        });
    }

    let mut out = String::with_capacity(FRAME_HEADER_LEN + payload_text.len());
    out.push_str(FRAME_MAGIC);
    out.push(FIELD_DELIMITER);
    out.push_str(&format!("{total_frames:0width$}", width = COUNTER_WIDTH));
    out.push(FIELD_DELIMITER);
    out.push_str(&format!("{index:0width$}", width = COUNTER_WIDTH));
    out.push(FIELD_DELIMITER);
    out.push_str(checksum);
    out.push(FIELD_DELIMITER);
    out.push_str(payload_text);
    Ok(out)
}

/// Parses one frame record.
///
/// Returns `None` for anything that is not a well-formed frame: wrong
/// magic, too few fields, non-numeric counters, an index outside the
/// declared total, or a metadata payload that does not deserialize or
/// disagrees with its header. Never panics on arbitrary input.
pub fn decode_frame(text: &str) -> Option<Frame> {
    let mut fields = text.splitn(FRAME_FIELD_COUNT, FIELD_DELIMITER);
    let magic = fields.next()?;
    if magic != FRAME_MAGIC {
        return None;
    }
    let total_frames = parse_counter(fields.next()?)?;
    let index = parse_counter(fields.next()?)?;
    let checksum = fields.next()?;
    let payload_text = fields.next()?;

    if index >= total_frames {
        return None;
    }

    let metadata = if payload_text.starts_with('{') {
        let metadata = TransferMetadata::from_json(payload_text).ok()?;
        if metadata.total_frames != total_frames {
            return None;
        }
        Some(metadata)
    } else {
        None
    };

    Some(Frame {
        index,
        total_frames,
        checksum: checksum.to_string(),
        payload_text: payload_text.to_string(),
        metadata,
    })
}

/// Parses a non-negative decimal counter. Signs and whitespace are rejected.
fn parse_counter(field: &str) -> Option<usize> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
