//! Configuration management for bluecast
//!
//! This module provides:
//! - Configuration structs for the output format, playback and device detection
//! - TOML persistence with read-merge-write semantics
//! - A manager for the user config file at `~/.config/bluecast/config.toml`
//!
//! Missing keys inherit their defaults and unknown top-level tables are kept
//! verbatim, so a config written by a newer release survives a round trip
//! through an older one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::audio::PcmFormat;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Target format for transcoding and the reference for conformance checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFormatConfig {
    pub sample_rate: u32,
    /// Bytes per sample
    pub sample_width: u16,
    pub channels: u16,
}

impl Default for OutputFormatConfig {
    fn default() -> Self {
        let format = PcmFormat::STANDARD;
        Self {
            sample_rate: format.sample_rate_hz,
            sample_width: format.sample_width_bytes,
            channels: format.channels,
        }
    }
}

impl OutputFormatConfig {
    /// Playback only handles 16-bit samples
    pub fn to_pcm_format(&self) -> Result<PcmFormat> {
        if self.sample_width != 2 {
            return Err(ConfigError::Invalid(format!(
                "sample_width must be 2 bytes, got {}",
                self.sample_width
            )));
        }
        if self.channels == 0 {
            return Err(ConfigError::Invalid("channels must be at least 1".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }

        Ok(PcmFormat {
            sample_width_bytes: self.sample_width,
            channels: self.channels,
            sample_rate_hz: self.sample_rate,
        })
    }
}

/// Playback tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frames read from the source and written per step
    pub chunk_size: u32,

    /// Frames a writer may queue ahead of the device
    pub buffer_size: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            buffer_size: 4096,
        }
    }
}

impl PlaybackConfig {
    /// Number of chunks that fit in the queue, never less than one
    pub fn queue_depth(&self) -> usize {
        (self.buffer_size / self.chunk_size.max(1)).max(1) as usize
    }
}

/// Bluetooth endpoint preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub prefer_stereo: bool,
    pub avoid_hands_free: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            prefer_stereo: true,
            avoid_hands_free: true,
        }
    }
}

/// Complete bluecast configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BluecastConfig {
    pub debug: bool,
    pub output_format: OutputFormatConfig,
    pub playback: PlaybackConfig,
    pub detection: DetectionConfig,

    /// Tables this release does not know about
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl BluecastConfig {
    /// Parse a settings file, filling absent keys with defaults
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;

        debug!(
            path = %path.display(),
            debug = config.debug,
            kept_tables = config.extra.len(),
            "Settings read"
        );
        Ok(config)
    }

    /// Write every category, including tables this release does not know
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, toml::to_string_pretty(self)?).await?;
        debug!(path = %path.display(), "Settings written");
        Ok(())
    }
}

/// Manager for the user configuration file
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for `config_dir/config.toml`
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");

        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/bluecast` on Linux, `~/Library/Application Support/bluecast`
    /// on macOS and `%APPDATA%\bluecast` on Windows
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("bluecast"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Read the user's settings, never failing the run
    ///
    /// A first run writes the defaults to disk. A file that no longer parses
    /// is set aside as `config.toml.corrupt` and the defaults are used.
    #[instrument(skip(self))]
    pub async fn load(&self) -> BluecastConfig {
        let path = &self.config_path;

        match fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                info!(path = %path.display(), "First run, writing default settings");
                let config = BluecastConfig::default();
                if let Err(e) = self.save(&config).await {
                    warn!(path = %path.display(), error = %e, "Default settings not written");
                }
                return config;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Settings file not accessible");
                return BluecastConfig::default();
            }
        }

        match BluecastConfig::load_from_file(path).await {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Settings file rejected, playing with defaults");
                Self::set_aside(path).await;
                BluecastConfig::default()
            }
        }
    }

    async fn set_aside(path: &Path) {
        let kept = path.with_extension("toml.corrupt");
        match fs::rename(path, &kept).await {
            Ok(()) => info!(path = %kept.display(), "Rejected settings kept for inspection"),
            Err(e) => warn!(path = %kept.display(), error = %e, "Rejected settings not kept"),
        }
    }

    /// Write `config`, creating the bluecast directory if needed
    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &BluecastConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }
}
