//! Platform integrations for bluecast
//!
//! Implements the capability traits of `bluecast_core::domain::audio` on top of
//! CPAL, the operating system's Bluetooth tools and ffmpeg.

pub mod audio;
pub mod bluetooth;
pub mod system;
pub mod transcode;

pub use audio::{AudioSubsystem, CpalBackend, CpalCatalog, CpalProber};
pub use bluetooth::{Platform, SystemBluetoothResolver};
pub use system::SystemReport;
pub use transcode::FfmpegTranscoder;
