//! `send` and `receive` subcommands.
//!
//! A frame text file holds one frame per line: what a QR renderer would
//! display on the sender, or what a QR decoder would hand back on the
//! receiver.

use std::io::{BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{debug, info, warn};

use pixelbeam_protocol::MetadataDraft;
use pixelbeam_transfer::{
    EncoderConfig, FrameEncoder, IngestOutcome, Reconstructed, ScanConfig, ScanSession, ScanState,
};

/// Options for `send`, after merging flags over configuration.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub file: PathBuf,
    pub out: Option<PathBuf>,
    pub chunk_size: usize,
    pub mime_type: String,
    pub skip_digest: bool,
}

/// Options for `receive`, after merging flags over configuration.
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub verify_on_insert: bool,
}

/// Encodes a file and writes its frames, one per line.
pub fn send(opts: &SendOptions) -> anyhow::Result<()> {
    let bytes = std::fs::read(&opts.file)
        .with_context(|| format!("failed to read {}", opts.file.display()))?;
    let filename = opts
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file.bin".into());

    let encoder = FrameEncoder::new(EncoderConfig {
        chunk_size: opts.chunk_size,
        skip_digest: opts.skip_digest,
    })?;
    let prepared = encoder.prepare(&bytes, MetadataDraft::now(filename, &opts.mime_type))?;

    let mut out: Box<dyn Write> = match &opts.out {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    for text in prepared.frame_texts() {
        writeln!(out, "{text}")?;
    }
    out.flush()?;

    info!(
        filename = %prepared.metadata().filename,
        bytes = bytes.len(),
        frames = prepared.metadata().total_frames,
        "frames written"
    );
    Ok(())
}

/// Feeds scanned frame lines into a session and writes the verified file.
///
/// Returns the path written.
pub async fn receive(opts: &ReceiveOptions) -> anyhow::Result<PathBuf> {
    let mut reader: Box<dyn BufRead> = if opts.input.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(
            std::fs::File::open(&opts.input)
                .with_context(|| format!("failed to open {}", opts.input.display()))?,
        ))
    };

    let session = ScanSession::current(ScanConfig {
        verify_on_insert: opts.verify_on_insert,
    });

    let mut complete = false;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        // A garbled read is one missed scan, not a failed transfer.
        let Ok(line) = std::str::from_utf8(&buf) else {
            debug!(len = buf.len(), "skipping line that is not UTF-8");
            continue;
        };
        match session.ingest(line.trim_end_matches(['\r', '\n'])) {
            IngestOutcome::Complete { .. } => {
                complete = true;
                break;
            }
            IngestOutcome::Failed => break,
            _ => {}
        }
    }

    if !complete {
        if let ScanState::Error(e) = session.state() {
            bail!("transfer failed: {e}");
        }
        let progress = session.progress();
        bail!(
            "input ended before the transfer completed ({}% received, missing frames {:?})",
            progress.percentage(),
            progress.missing
        );
    }

    match session.finished().await {
        ScanState::Success(done) => write_output(&opts.output_dir, &done),
        ScanState::Error(e) => {
            if let Some(index) = e.frame_index() {
                warn!(index, "rescan needed: frame was read corrupt");
            }
            bail!("transfer failed: {e}")
        }
        other => bail!("unexpected session state: {other:?}"),
    }
}

fn write_output(output_dir: &Path, done: &Reconstructed) -> anyhow::Result<PathBuf> {
    let name = safe_file_name(&done.metadata.filename);
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(name);
    std::fs::write(&path, &done.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(
        path = %path.display(),
        bytes = done.bytes.len(),
        mime_type = %done.metadata.mime_type,
        "file received"
    );
    Ok(path)
}

/// Reduces a sender-supplied filename to a single safe path component.
///
/// Directories, `..`, and absolute prefixes are stripped; an empty result
/// becomes `received.bin`.
fn safe_file_name(filename: &str) -> String {
    let normalized = filename.replace('\\', "/");
    Path::new(&normalized)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .next_back()
        .unwrap_or_else(|| "received.bin".into())
}
