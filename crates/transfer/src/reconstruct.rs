use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::{info, warn};

use pixelbeam_protocol::{Frame, TransferMetadata, checksum, file_digest};

use crate::TransferError;

/// A verified file rebuilt from its frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstructed {
    pub bytes: Vec<u8>,
    pub metadata: TransferMetadata,
}

/// Rebuilds the original bytes from a complete frame set.
///
/// Frames may arrive in any order. Every data frame's checksum is checked
/// before anything is decoded, and the result is only returned once the
/// whole-file digest matches (unless the manifest carries no digest).
pub fn reconstruct<'a, I>(frames: I) -> Result<Reconstructed, TransferError>
where
    I: IntoIterator<Item = &'a Frame>,
{
    let mut metadata: Option<&TransferMetadata> = None;
    let mut data: BTreeMap<usize, &Frame> = BTreeMap::new();
    for frame in frames {
        match &frame.metadata {
            Some(meta) => {
                metadata.get_or_insert(meta);
            }
            None => {
                data.entry(frame.index).or_insert(frame);
            }
        }
    }
    let metadata = metadata.ok_or(TransferError::MissingMetadata)?;

    // Data occupies 1..total-1; metadata sits at both ends.
    let missing: Vec<usize> = (1..metadata.total_frames.saturating_sub(1))
        .filter(|i| !data.contains_key(i))
        .collect();
    if !missing.is_empty() {
        return Err(TransferError::IncompleteTransfer { missing });
    }

    let mut body = String::new();
    for (&index, frame) in &data {
        let actual = checksum(&frame.payload_text);
        if !actual.eq_ignore_ascii_case(&frame.checksum) {
            warn!(index, expected = %frame.checksum, %actual, "frame checksum mismatch");
            return Err(TransferError::ChecksumMismatch {
                index,
                expected: frame.checksum.clone(),
                actual,
            });
        }
        body.push_str(&frame.payload_text);
    }

    let bytes = STANDARD.decode(body.as_bytes())?;

    if metadata.has_digest() {
        let actual = file_digest(&bytes);
        if !actual.eq_ignore_ascii_case(&metadata.file_digest) {
            warn!(expected = %metadata.file_digest, %actual, "file digest mismatch");
            return Err(TransferError::IntegrityMismatch {
                expected: metadata.file_digest.clone(),
                actual,
            });
        }
    }

    info!(
        filename = %metadata.filename,
        bytes = bytes.len(),
        data_frames = data.len(),
        verified = metadata.has_digest(),
        "transfer reconstructed"
    );

    Ok(Reconstructed {
        bytes,
        metadata: metadata.clone(),
    })
}
