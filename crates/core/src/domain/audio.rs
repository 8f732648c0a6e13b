//! Audio device abstractions and domain models
//!
//! This module defines the platform-agnostic vocabulary of bluecast: the error
//! taxonomy, device handles, the PCM format, and the capability traits that the
//! `infra` crate implements for real hardware (CPAL, OS Bluetooth tools, ffmpeg).

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use thiserror::Error;

/// Errors that can occur while preparing audio, selecting devices or playing
#[derive(Debug, Error)]
pub enum AudioError {
    /// Input audio file does not exist
    #[error("Audio file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The host audio service could not be initialized or queried
    #[error("Audio subsystem unavailable: {0}")]
    AudioSubsystemUnavailable(String),

    /// The external transcoder is missing or exited with an error
    #[error("Transcoding failed: {0}")]
    TranscodeFailure(String),

    /// The audio container could not be parsed
    #[error("Unreadable audio format in {}: {reason}", path.display())]
    UnreadableFormat { path: PathBuf, reason: String },

    /// A candidate device did not accept a probe stream
    #[error("Device {index} ({name}) did not respond: {reason}")]
    DeviceProbeFailure {
        index: usize,
        name: String,
        reason: String,
    },

    /// An output stream could not be opened for playback
    #[error("Failed to open output stream on device {index}: {reason}")]
    StreamOpenFailure { index: usize, reason: String },

    /// Writing audio to an open output stream failed
    #[error("Failed to write to device {index}: {reason}")]
    StreamWriteFailure { index: usize, reason: String },

    /// Nothing is left to play to
    #[error("No devices selected for playback")]
    NoDevicesSelected,

    /// Invalid configuration for audio processing
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Output endpoint as reported by one enumeration pass of the audio subsystem
///
/// `index` is positional within that pass; a handle goes stale as soon as a
/// device connects or disconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub index: usize,
    pub display_name: String,
    pub max_output_channels: u16,
}

impl DeviceHandle {
    pub fn new(index: usize, display_name: impl Into<String>, max_output_channels: u16) -> Self {
        Self {
            index,
            display_name: display_name.into(),
            max_output_channels,
        }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device index: {}, Name: {}", self.index, self.display_name)
    }
}

/// Interleaved integer PCM layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_width_bytes: u16,
    pub channels: u16,
    pub sample_rate_hz: u32,
}

impl PcmFormat {
    /// 16-bit signed little-endian, stereo, 44.1 kHz
    pub const STANDARD: PcmFormat = PcmFormat {
        sample_width_bytes: 2,
        channels: 2,
        sample_rate_hz: 44_100,
    };

    /// Whether audio in this format can be played as-is when `target` is the
    /// requested output format.
    ///
    /// Width and rate must match exactly; any channel count from mono up to the
    /// target's channel count is accepted.
    pub fn conforms_to(&self, target: &PcmFormat) -> bool {
        self.sample_width_bytes == target.sample_width_bytes
            && self.sample_rate_hz == target.sample_rate_hz
            && (1..=target.channels).contains(&self.channels)
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width_bytes * 8
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-bit, {} Hz, {} channel(s)",
            self.bits_per_sample(),
            self.sample_rate_hz,
            self.channels
        )
    }
}

/// Enumerates the output endpoints of the host audio subsystem
pub trait DeviceCatalog: Send + Sync {
    /// All endpoints with at least one output channel, in platform order
    fn enumerate(&self) -> Result<Vec<DeviceHandle>>;
}

/// Checks that a device accepts an output stream without starting playback
pub trait DeviceProber: Send + Sync {
    fn probe(&self, device: &DeviceHandle, format: &PcmFormat) -> Result<()>;
}

/// Opens output streams on concrete devices
///
/// Shared by reference between playback workers; each sink it produces is
/// owned by exactly one worker thread.
pub trait OutputBackend: Send + Sync {
    type Sink: OutputSink;

    fn open(&self, device: &DeviceHandle, format: &PcmFormat) -> Result<Self::Sink>;
}

/// A single open output stream
pub trait OutputSink {
    /// Queue interleaved samples, blocking while the device catches up
    fn write(&mut self, samples: &[i16]) -> Result<()>;

    /// Wait for queued audio to play out, then release the stream
    fn finish(self) -> Result<()>;
}

/// Source of the friendly names of currently connected Bluetooth devices
///
/// Best-effort: implementations report an empty set on any failure.
#[async_trait::async_trait]
pub trait BluetoothNameResolver: Send + Sync {
    async fn active_device_names(&self) -> BTreeSet<String>;
}

/// External collaborator turning arbitrary audio into PCM WAV
#[async_trait::async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` to a WAV file in `target` format
    ///
    /// The returned path is deleted when dropped.
    async fn transcode(&self, input: &Path, target: &PcmFormat) -> Result<TempPath>;
}
