//! PixelBeam command-line entry point.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ReceiveOptions, SendOptions};

#[derive(Parser)]
#[command(name = "pixelbeam", version, about = "Move files through a loop of QR codes")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/pixelbeam/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into frame texts, one per line
    Send {
        /// File to send
        file: PathBuf,

        /// Write frames here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Base64 characters per data frame
        #[arg(long)]
        chunk_size: Option<usize>,

        /// MIME type recorded in the manifest
        #[arg(long)]
        mime: Option<String>,

        /// Leave the SHA-256 file digest out of the manifest
        #[arg(long)]
        no_digest: bool,
    },
    /// Rebuild a file from scanned frame texts, one per line
    Receive {
        /// Frame text file, or `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Directory to write the received file into
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Check checksums as frames arrive so a clean repeat can replace a bad read
        #[arg(long)]
        verify_on_insert: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `send` can stream frames on stdout.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting pixelbeam");

    let config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Send {
            file,
            out,
            chunk_size,
            mime,
            no_digest,
        } => commands::send(&SendOptions {
            file,
            out,
            chunk_size: chunk_size.unwrap_or(config.chunk_size),
            mime_type: mime.unwrap_or(config.mime_type),
            skip_digest: no_digest,
        }),
        Commands::Receive {
            input,
            out_dir,
            verify_on_insert,
        } => {
            let opts = ReceiveOptions {
                input,
                output_dir: out_dir.unwrap_or(config.output_dir),
                verify_on_insert: verify_on_insert || config.verify_on_insert,
            };
            let rt = tokio::runtime::Runtime::new()?;
            let path = rt.block_on(commands::receive(&opts))?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
