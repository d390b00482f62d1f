fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use pixelbeam_protocol::{MetadataDraft, TransferMetadata, decode_frame};
    use pixelbeam_transfer::{EncoderConfig, FrameEncoder, reconstruct};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn fixture_lines(name: &str) -> Vec<String> {
        load_fixture(name).lines().map(str::to_string).collect()
    }

    fn hello_draft() -> MetadataDraft {
        MetadataDraft {
            filename: "hello.txt".into(),
            mime_type: "text/plain".into(),
            timestamp: 1_700_000_000_000,
        }
    }

    // --- Encoder output ---

    #[test]
    fn encoder_matches_hello_frames() {
        let encoder = FrameEncoder::new(EncoderConfig {
            chunk_size: 4,
            skip_digest: false,
        })
        .unwrap();
        let prepared = encoder.prepare(b"hello", hello_draft()).unwrap();

        assert_eq!(prepared.frame_texts(), fixture_lines("hello_frames.txt"));
    }

    #[test]
    fn metadata_json_is_byte_exact() {
        let encoder = FrameEncoder::new(EncoderConfig {
            chunk_size: 4,
            skip_digest: false,
        })
        .unwrap();
        let prepared = encoder.prepare(b"hello", hello_draft()).unwrap();

        let fixture = load_fixture("hello_metadata.json");
        assert_eq!(prepared.metadata().to_json().unwrap(), fixture.trim_end());
        assert_eq!(prepared.frames()[0].payload_text, fixture.trim_end());
    }

    // --- Decoder input ---

    #[test]
    fn fixture_frames_decode_and_reconstruct() {
        let frames: Vec<_> = fixture_lines("hello_frames.txt")
            .iter()
            .map(|line| decode_frame(line).expect("fixture frame decodes"))
            .collect();

        assert_eq!(frames.len(), 4);
        assert!(frames[0].is_metadata());
        assert!(frames[3].is_metadata());
        assert!(frames.iter().all(|f| f.checksum_valid()));

        let done = reconstruct(&frames).unwrap();
        assert_eq!(done.bytes, b"hello");
        assert_eq!(done.metadata.filename, "hello.txt");
    }

    #[test]
    fn fixture_metadata_fields() {
        let meta = TransferMetadata::from_json(load_fixture("hello_metadata.json").trim_end())
            .unwrap();
        assert_eq!(meta.original_size_bytes, 5);
        assert_eq!(meta.total_frames, 4);
        assert_eq!(
            meta.file_digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let value: serde_json::Value =
            serde_json::from_str(&load_fixture("hello_metadata.json")).unwrap();
        for key in [
            "filename",
            "originalSizeBytes",
            "timestamp",
            "mimeType",
            "totalFrames",
            "fileDigest",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn legacy_metadata_without_optional_keys() {
        let meta = TransferMetadata::from_json(&load_fixture("legacy_metadata.json")).unwrap();
        assert_eq!(meta.filename, "scan.pdf");
        assert_eq!(meta.mime_type, "application/octet-stream");
        assert!(!meta.has_digest());
    }

    #[test]
    fn compressed_size_key_is_ignored() {
        let json = serde_json::json!({
            "filename": "photo.jpg",
            "originalSizeBytes": 245678,
            "compressedSizeBytes": 120000,
            "timestamp": 1,
            "mimeType": "image/jpeg",
            "totalFrames": 3,
            "fileDigest": "",
        });
        let meta = TransferMetadata::from_json(&json.to_string()).unwrap();
        assert_eq!(meta.original_size_bytes, 245_678);
        assert!(!meta.to_json().unwrap().contains("compressedSizeBytes"));
    }
}
