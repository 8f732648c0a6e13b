//! Domain entities and business rules

pub mod audio;
pub mod config;
pub mod playback;
pub mod selector;
pub mod source;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    AudioError, BluetoothNameResolver, DeviceCatalog, DeviceHandle, DeviceProber, OutputBackend,
    OutputSink, PcmFormat, Transcoder,
};
pub use config::{BluecastConfig, ConfigError, ConfigManager};
pub use playback::{DeviceOutcome, DeviceState, PlaybackCoordinator, PlaybackReport, PlaybackStatus};
pub use selector::{
    base_device_name, parse_device_indices, resolve_manual_targets, CandidateDevice, DeviceSelector, ScoringRules,
    SelectedDevice,
};
pub use source::{AudioSource, PcmReader, PcmStream};
