use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MIME_TYPE;
use crate::error::ProtocolError;

/// Manifest describing one transfer, carried by the metadata frames.
///
/// Serialized as compact camelCase JSON. Unknown keys are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    pub filename: String,
    pub original_size_bytes: u64,
    /// Creation time in Unix milliseconds. Display only.
    pub timestamp: i64,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// Total frames in the transfer, metadata frames included.
    pub total_frames: usize,
    /// Lowercase hex SHA-256 of the original bytes. Empty disables
    /// whole-file verification.
    #[serde(default)]
    pub file_digest: String,
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.into()
}

impl TransferMetadata {
    /// Serializes to the compact JSON carried in a metadata frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a metadata frame payload.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether whole-file verification is enabled for this transfer.
    pub fn has_digest(&self) -> bool {
        !self.file_digest.is_empty()
    }
}

/// Sender-supplied fields of a [`TransferMetadata`].
///
/// The encoder fills in the size, frame count, and digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDraft {
    pub filename: String,
    pub mime_type: String,
    pub timestamp: i64,
}

impl MetadataDraft {
    /// Creates a draft stamped with the current wall-clock time.
    pub fn now(filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Completes the draft into a full manifest.
    pub fn finalize(
        self,
        original_size_bytes: u64,
        total_frames: usize,
        file_digest: String,
    ) -> TransferMetadata {
        TransferMetadata {
            filename: self.filename,
            original_size_bytes,
            timestamp: self.timestamp,
            mime_type: self.mime_type,
            total_frames,
            file_digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransferMetadata {
        TransferMetadata {
            filename: "photo.jpg".into(),
            original_size_bytes: 245_678,
            timestamp: 1_700_000_000_000,
            mime_type: "image/jpeg".into(),
            total_frames: 7,
            file_digest: "ab".repeat(32),
        }
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let json = sample().to_json().unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains("\"originalSizeBytes\":245678"));
        assert!(json.contains("\"mimeType\":\"image/jpeg\""));
        assert!(json.contains("\"totalFrames\":7"));
        assert!(json.contains("\"fileDigest\""));
        // Compact: no whitespace after separators.
        assert!(!json.contains(": "));
    }

    #[test]
    fn json_roundtrip_preserves_fields() {
        let meta = sample();
        let parsed = TransferMetadata::from_json(&meta.to_json().unwrap()).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let json = r#"{"filename":"a.bin","originalSizeBytes":3,"timestamp":0,"totalFrames":3}"#;
        let meta = TransferMetadata::from_json(json).unwrap();
        assert_eq!(meta.mime_type, DEFAULT_MIME_TYPE);
        assert!(meta.file_digest.is_empty());
        assert!(!meta.has_digest());
    }

    #[test]
    fn unknown_keys_ignored() {
        let json = r#"{"filename":"a.jpg","originalSizeBytes":3,"compressedSizeBytes":2,
            "timestamp":0,"mimeType":"image/jpeg","totalFrames":3,"fileDigest":""}"#;
        assert!(TransferMetadata::from_json(json).is_ok());
    }

    #[test]
    fn missing_required_field_rejected() {
        let json = r#"{"filename":"a.bin","timestamp":0}"#;
        assert!(matches!(
            TransferMetadata::from_json(json),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn draft_finalize_fills_computed_fields() {
        let draft = MetadataDraft::now("notes.txt", "text/plain");
        assert!(draft.timestamp > 0);
        let meta = draft.clone().finalize(5, 4, "digest".into());
        assert_eq!(meta.filename, "notes.txt");
        assert_eq!(meta.timestamp, draft.timestamp);
        assert_eq!(meta.total_frames, 4);
        assert_eq!(meta.original_size_bytes, 5);
        assert_eq!(meta.file_digest, "digest");
    }
}
