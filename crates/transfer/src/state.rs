//! Receiver-side scan state machine.
//!
//! [`ScanMachine`] holds the frames of one session and decides every
//! transition. It performs no scheduling: when the last frame arrives it
//! moves to [`ScanState::Reconstructing`] and hands out a job, and the
//! result is fed back through [`ScanMachine::finish`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use pixelbeam_protocol::{Frame, TransferMetadata, decode_frame};

use crate::progress::ScanProgress;
use crate::reconstruct::Reconstructed;
use crate::TransferError;

/// Receiver-side policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanConfig {
    /// Check each data frame's checksum before storing it, so a corrupt
    /// first read of an index can be replaced by a later clean one.
    ///
    /// Off by default: the first copy of an index wins and corruption is
    /// reported at reconstruction time.
    pub verify_on_insert: bool,
}

/// Observable state of a scan session.
#[derive(Debug, Clone, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning {
        progress: ScanProgress,
        metadata: Option<TransferMetadata>,
    },
    Reconstructing,
    Success(Arc<Reconstructed>),
    Error(Arc<TransferError>),
}

impl ScanState {
    /// Whether the session has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }

    /// Whether new frames are accepted in this state.
    pub fn is_accepting(&self) -> bool {
        matches!(self, Self::Idle | Self::Scanning { .. })
    }
}

/// Result of offering one frame text to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Not a valid frame. Dropped without touching state.
    Malformed,
    /// Index already stored. Dropped.
    Duplicate { index: usize },
    /// Failed its checksum with `verify_on_insert` enabled. Dropped so a
    /// later copy can be stored.
    Rejected { index: usize },
    /// Session is reconstructing or finished; frames are ignored until reset.
    Ignored,
    /// Stored; more frames are needed.
    Stored { index: usize },
    /// Stored, and it was the last one missing. Reconstruction is due.
    Complete { index: usize },
    /// Frame contradicted the session; the session is now in error.
    Failed,
}

/// Frame accumulator and transition logic for one receiver.
///
/// Frames are only ever inserted; [`reset`](Self::reset) is the single way
/// to discard them, and it advances the generation so results computed for
/// an earlier session are recognised and dropped.
#[derive(Debug, Default)]
pub struct ScanMachine {
    config: ScanConfig,
    frames: BTreeMap<usize, Frame>,
    metadata: Option<TransferMetadata>,
    total_frames: Option<usize>,
    last_index: Option<usize>,
    generation: u64,
    state: ScanState,
}

impl ScanMachine {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Decodes and accepts one scanned frame text.
    pub fn ingest(&mut self, text: &str) -> IngestOutcome {
        if !self.state.is_accepting() {
            return IngestOutcome::Ignored;
        }
        match decode_frame(text) {
            Some(frame) => self.accept(frame),
            None => {
                debug!(len = text.len(), "dropping malformed frame");
                IngestOutcome::Malformed
            }
        }
    }

    /// Accepts an already decoded frame.
    pub fn accept(&mut self, frame: Frame) -> IngestOutcome {
        if !self.state.is_accepting() {
            return IngestOutcome::Ignored;
        }

        let index = frame.index;
        if frame.is_metadata() && !frame.checksum_valid() {
            debug!(index, "dropping metadata frame with bad checksum");
            return IngestOutcome::Malformed;
        }
        if self.frames.contains_key(&index) {
            debug!(index, "duplicate frame");
            return IngestOutcome::Duplicate { index };
        }
        if self.config.verify_on_insert && !frame.is_metadata() && !frame.checksum_valid() {
            debug!(index, "rejecting frame with bad checksum");
            return IngestOutcome::Rejected { index };
        }

        match &frame.metadata {
            Some(meta) => {
                if let Err(e) = self.adopt_metadata(meta) {
                    return self.fail(e);
                }
            }
            None => {
                if let Some(expected) = self.total_frames {
                    if frame.total_frames != expected {
                        return self.fail(TransferError::InconsistentTotal {
                            expected,
                            found: frame.total_frames,
                        });
                    }
                }
            }
        }

        self.frames.insert(index, frame);
        self.last_index = Some(index);
        debug!(index, stored = self.frames.len(), total = ?self.total_frames, "frame stored");

        if self.total_frames == Some(self.frames.len()) {
            info!(total = self.frames.len(), generation = self.generation, "all frames received");
            self.state = ScanState::Reconstructing;
            return IngestOutcome::Complete { index };
        }

        self.state = ScanState::Scanning {
            progress: self.progress(),
            metadata: self.metadata.clone(),
        };
        IngestOutcome::Stored { index }
    }

    /// Sets the expected total from a manifest, checking it against
    /// everything seen so far.
    fn adopt_metadata(&mut self, meta: &TransferMetadata) -> Result<(), TransferError> {
        let expected = meta.total_frames;
        match self.total_frames {
            Some(known) if known != expected => {
                return Err(TransferError::InconsistentTotal {
                    expected: known,
                    found: expected,
                });
            }
            Some(_) => return Ok(()),
            None => {}
        }

        if let Some(stray) = self.frames.values().find(|f| f.total_frames != expected) {
            return Err(TransferError::InconsistentTotal {
                expected,
                found: stray.total_frames,
            });
        }

        info!(
            filename = %meta.filename,
            size = meta.original_size_bytes,
            total = expected,
            "metadata received"
        );
        self.total_frames = Some(expected);
        self.metadata = Some(meta.clone());
        Ok(())
    }

    fn fail(&mut self, err: TransferError) -> IngestOutcome {
        warn!(error = %err, generation = self.generation, "scan session failed");
        self.state = ScanState::Error(Arc::new(err));
        IngestOutcome::Failed
    }

    /// Snapshot of the work needed to reconstruct, while reconstructing.
    pub fn reconstruction_job(&self) -> Option<(u64, Vec<Frame>)> {
        match self.state {
            ScanState::Reconstructing => {
                Some((self.generation, self.frames.values().cloned().collect()))
            }
            _ => None,
        }
    }

    /// Applies a reconstruction result computed for `generation`.
    ///
    /// Returns `false` and leaves state untouched if the session has been
    /// reset since the job was handed out.
    pub fn finish(
        &mut self,
        generation: u64,
        result: Result<Reconstructed, TransferError>,
    ) -> bool {
        if generation != self.generation || !matches!(self.state, ScanState::Reconstructing) {
            debug!(generation, current = self.generation, "discarding stale reconstruction");
            return false;
        }
        self.state = match result {
            Ok(done) => ScanState::Success(Arc::new(done)),
            Err(e) => {
                warn!(error = %e, index = ?e.frame_index(), "reconstruction failed");
                ScanState::Error(Arc::new(e))
            }
        };
        true
    }

    /// Discards every frame and returns to `Idle`.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.metadata = None;
        self.total_frames = None;
        self.last_index = None;
        self.generation = self.generation.wrapping_add(1);
        self.state = ScanState::Idle;
        debug!(generation = self.generation, "scan session reset");
    }

    /// Indices in `0..total` not yet stored. Empty until the total is known.
    pub fn missing_indices(&self) -> Vec<usize> {
        match self.total_frames {
            Some(total) => (0..total).filter(|i| !self.frames.contains_key(i)).collect(),
            None => Vec::new(),
        }
    }

    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            stored: self.frames.len(),
            total: self.total_frames,
            last_index: self.last_index,
            missing: self.missing_indices(),
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn metadata(&self) -> Option<&TransferMetadata> {
        self.metadata.as_ref()
    }

    /// Stored frame indices, ascending.
    pub fn stored_indices(&self) -> Vec<usize> {
        self.frames.keys().copied().collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderConfig, FrameEncoder};
    use crate::reconstruct::reconstruct;
    use pixelbeam_protocol::{MetadataDraft, checksum, encode_frame};

    fn hello_texts() -> Vec<String> {
        let encoder = FrameEncoder::new(EncoderConfig {
            chunk_size: 4,
            skip_digest: false,
        })
        .unwrap();
        let draft = MetadataDraft {
            filename: "hello.txt".into(),
            mime_type: "text/plain".into(),
            timestamp: 0,
        };
        encoder
            .prepare(b"hello", draft)
            .unwrap()
            .frame_texts()
            .to_vec()
    }

    fn metadata_text(index: usize, total: usize) -> String {
        let meta = TransferMetadata {
            filename: "x.bin".into(),
            original_size_bytes: 0,
            timestamp: 0,
            mime_type: "application/octet-stream".into(),
            total_frames: total,
            file_digest: String::new(),
        };
        let json = meta.to_json().unwrap();
        encode_frame(index, total, &checksum(&json), &json).unwrap()
    }

    fn run_job(machine: &mut ScanMachine) {
        let (generation, frames) = machine.reconstruction_job().unwrap();
        let result = reconstruct(&frames);
        assert!(machine.finish(generation, result));
    }

    #[test]
    fn starts_idle() {
        let machine = ScanMachine::new(ScanConfig::default());
        assert!(matches!(machine.state(), ScanState::Idle));
        assert!(machine.missing_indices().is_empty());
        assert_eq!(machine.progress().percentage(), 0);
    }

    #[test]
    fn malformed_text_leaves_state_untouched() {
        let mut machine = ScanMachine::new(ScanConfig::default());
        assert_eq!(machine.ingest("not a frame"), IngestOutcome::Malformed);
        assert_eq!(machine.ingest("IMG|004|001"), IngestOutcome::Malformed);
        assert!(matches!(machine.state(), ScanState::Idle));
        assert!(machine.stored_indices().is_empty());
    }

    #[test]
    fn data_before_metadata_is_stored() {
        let texts = hello_texts();
        let mut machine = ScanMachine::new(ScanConfig::default());
        assert_eq!(machine.ingest(&texts[2]), IngestOutcome::Stored { index: 2 });

        match machine.state() {
            ScanState::Scanning { progress, metadata } => {
                assert_eq!(progress.stored, 1);
                assert_eq!(progress.total, None);
                assert_eq!(progress.last_index, Some(2));
                assert!(metadata.is_none());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn completes_exactly_at_total() {
        let texts = hello_texts();
        let mut machine = ScanMachine::new(ScanConfig::default());

        for text in &texts[..3] {
            assert!(matches!(machine.ingest(text), IngestOutcome::Stored { .. }));
        }
        assert!(machine.reconstruction_job().is_none());
        assert_eq!(machine.missing_indices(), vec![3]);
        assert_eq!(machine.progress().percentage(), 75);

        assert_eq!(machine.ingest(&texts[3]), IngestOutcome::Complete { index: 3 });
        assert!(matches!(machine.state(), ScanState::Reconstructing));

        run_job(&mut machine);
        match machine.state() {
            ScanState::Success(done) => assert_eq!(done.bytes, b"hello"),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn duplicates_do_not_change_state() {
        let texts = hello_texts();
        let mut machine = ScanMachine::new(ScanConfig::default());
        machine.ingest(&texts[1]);
        machine.ingest(&texts[0]);

        for _ in 0..5 {
            assert_eq!(machine.ingest(&texts[1]), IngestOutcome::Duplicate { index: 1 });
        }
        assert_eq!(machine.stored_indices(), vec![0, 1]);
    }

    #[test]
    fn duplicate_keyed_by_index_not_content() {
        let texts = hello_texts();
        let mut machine = ScanMachine::new(ScanConfig::default());
        machine.ingest(&texts[1]);

        let other = encode_frame(1, 4, &checksum("zzzz"), "zzzz").unwrap();
        assert_eq!(machine.ingest(&other), IngestOutcome::Duplicate { index: 1 });
    }

    #[test]
    fn either_metadata_copy_completes() {
        let texts = hello_texts();
        let mut machine = ScanMachine::new(ScanConfig::default());
        machine.ingest(&texts[3]);
        machine.ingest(&texts[1]);
        machine.ingest(&texts[2]);
        assert!(matches!(machine.state(), ScanState::Scanning { .. }));
        assert_eq!(machine.missing_indices(), vec![0]);

        assert_eq!(machine.ingest(&texts[0]), IngestOutcome::Complete { index: 0 });
    }

    #[test]
    fn disagreeing_metadata_totals_fail() {
        let mut machine = ScanMachine::new(ScanConfig::default());
        machine.ingest(&metadata_text(0, 4));
        assert_eq!(machine.ingest(&metadata_text(4, 5)), IngestOutcome::Failed);

        match machine.state() {
            ScanState::Error(e) => assert!(matches!(
                **e,
                TransferError::InconsistentTotal {
                    expected: 4,
                    found: 5
                }
            )),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(machine.ingest(&metadata_text(0, 4)), IngestOutcome::Ignored);
    }

    #[test]
    fn data_frame_disagreeing_with_total_fails() {
        let mut machine = ScanMachine::new(ScanConfig::default());
        machine.ingest(&metadata_text(0, 4));
        let stray = encode_frame(1, 9, &checksum("aGVs"), "aGVs").unwrap();
        assert_eq!(machine.ingest(&stray), IngestOutcome::Failed);
    }

    #[test]
    fn stored_frame_disagreeing_with_later_metadata_fails() {
        let mut machine = ScanMachine::new(ScanConfig::default());
        let stray = encode_frame(1, 9, &checksum("aGVs"), "aGVs").unwrap();
        machine.ingest(&stray);
        assert_eq!(machine.ingest(&metadata_text(0, 4)), IngestOutcome::Failed);
    }

    #[test]
    fn metadata_with_bad_checksum_dropped() {
        let texts = hello_texts();
        let mut fields: Vec<&str> = texts[0].splitn(5, '|').collect();
        fields[3] = "00000000";
        let corrupted = fields.join("|");

        let mut machine = ScanMachine::new(ScanConfig::default());
        assert_eq!(machine.ingest(&corrupted), IngestOutcome::Malformed);
        assert!(machine.metadata().is_none());
    }

    #[test]
    fn corrupt_first_copy_wins_by_default() {
        let texts = hello_texts();
        let corrupt = texts[2].replace("bG8=", "bG9=");
        let mut machine = ScanMachine::new(ScanConfig::default());

        assert_eq!(machine.ingest(&corrupt), IngestOutcome::Stored { index: 2 });
        assert_eq!(machine.ingest(&texts[2]), IngestOutcome::Duplicate { index: 2 });
        machine.ingest(&texts[0]);
        machine.ingest(&texts[1]);
        machine.ingest(&texts[3]);

        run_job(&mut machine);
        match machine.state() {
            ScanState::Error(e) => assert_eq!(e.frame_index(), Some(2)),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn verify_on_insert_adopts_clean_copy() {
        let texts = hello_texts();
        let corrupt = texts[2].replace("bG8=", "bG9=");
        let mut machine = ScanMachine::new(ScanConfig {
            verify_on_insert: true,
        });

        assert_eq!(machine.ingest(&corrupt), IngestOutcome::Rejected { index: 2 });
        assert_eq!(machine.ingest(&texts[2]), IngestOutcome::Stored { index: 2 });
        machine.ingest(&texts[0]);
        machine.ingest(&texts[1]);
        machine.ingest(&texts[3]);

        run_job(&mut machine);
        assert!(matches!(machine.state(), ScanState::Success(_)));
    }

    #[test]
    fn frames_ignored_while_reconstructing() {
        let texts = hello_texts();
        let mut machine = ScanMachine::new(ScanConfig::default());
        for text in &texts {
            machine.ingest(text);
        }
        assert_eq!(machine.ingest(&texts[0]), IngestOutcome::Ignored);
    }

    #[test]
    fn reset_clears_and_discards_stale_result() {
        let texts = hello_texts();
        let mut machine = ScanMachine::new(ScanConfig::default());
        for text in &texts {
            machine.ingest(text);
        }
        let (generation, frames) = machine.reconstruction_job().unwrap();

        machine.reset();
        assert!(matches!(machine.state(), ScanState::Idle));
        assert!(machine.stored_indices().is_empty());
        assert!(machine.metadata().is_none());
        assert_ne!(machine.generation(), generation);

        assert!(!machine.finish(generation, reconstruct(&frames)));
        assert!(matches!(machine.state(), ScanState::Idle));

        // A fresh session works after reset.
        for text in &texts {
            machine.ingest(text);
        }
        run_job(&mut machine);
        assert!(matches!(machine.state(), ScanState::Success(_)));
    }
}
