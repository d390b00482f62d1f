//! CLI configuration.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/pixelbeam/config.toml`, falling back
//! to `~/.config/pixelbeam/config.toml`. A missing file means defaults;
//! command-line flags override whatever is loaded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pixelbeam_protocol::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_MIME_TYPE};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base64 characters per data frame.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// MIME type recorded in the manifest when sending.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,

    /// Directory received files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Check frame checksums on insert so a clean repeat can replace a
    /// corrupt first read.
    #[serde(default)]
    pub verify_on_insert: bool,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            mime_type: default_mime_type(),
            output_dir: default_output_dir(),
            verify_on_insert: false,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or the platform default location.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(),
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Returns the default configuration file path.
fn config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = std::env::var_os("HOME").unwrap_or_else(|| "/tmp".into());
            PathBuf::from(home).join(".config")
        });
    base.join("pixelbeam").join("config.toml")
}
