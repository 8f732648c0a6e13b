//! CPAL-based device enumeration and liveness probing
//!
//! [`AudioSubsystem`] is the process-wide handle on the host audio API. It is
//! acquired once, shared behind an `Arc` by the catalog, the prober and the
//! playback backend, and released when the last owner drops it.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, info, warn};
use bluecast_core::domain::audio::{
    AudioError, DeviceCatalog, DeviceHandle, DeviceProber, PcmFormat, Result,
};

/// Frames per buffer requested by probe streams
pub const PROBE_BUFFER_FRAMES: u32 = 1024;

/// Scoped handle on the host audio API
pub struct AudioSubsystem {
    host: cpal::Host,
}

impl AudioSubsystem {
    /// Initialize the default host and check that it can list devices
    pub fn acquire() -> Result<Self> {
        let host = cpal::default_host();
        host.devices()
            .map_err(|e| AudioError::AudioSubsystemUnavailable(e.to_string()))?;

        info!("Audio subsystem acquired: {}", host.id().name());
        Ok(Self { host })
    }

    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    /// Every output-capable device, indexed by position in the full device list
    pub fn output_handles(&self) -> Result<Vec<DeviceHandle>> {
        let devices = self
            .host
            .devices()
            .map_err(|e| AudioError::AudioSubsystemUnavailable(e.to_string()))?;

        let handles: Vec<DeviceHandle> = devices
            .enumerate()
            .filter_map(|(index, device)| {
                let channels = max_output_channels(&device);
                if channels == 0 {
                    return None;
                }
                let handle = DeviceHandle::new(index, device_name(&device), channels);
                debug!("Found device: {}", handle);
                Some(handle)
            })
            .collect();

        info!("Found {} audio output devices", handles.len());
        Ok(handles)
    }

    /// Look a handle up again, refusing it if the device list has changed
    pub fn resolve(&self, handle: &DeviceHandle) -> std::result::Result<cpal::Device, String> {
        let device = self
            .host
            .devices()
            .map_err(|e| e.to_string())?
            .nth(handle.index)
            .ok_or_else(|| format!("no device at index {}", handle.index))?;

        let name = device_name(&device);
        if name != handle.display_name {
            return Err(format!(
                "device list changed: index {} is now {:?}",
                handle.index, name
            ));
        }

        Ok(device)
    }
}

impl Drop for AudioSubsystem {
    fn drop(&mut self) {
        debug!("Releasing audio subsystem");
    }
}

fn device_name(device: &cpal::Device) -> String {
    #[allow(deprecated)]
    device.name().unwrap_or_else(|_| "Unknown Device".to_string())
}

fn max_output_channels(device: &cpal::Device) -> u16 {
    device
        .supported_output_configs()
        .map(|configs| configs.map(|config| config.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

/// Builds the CPAL stream configuration for `format`
pub(crate) fn stream_config(format: &PcmFormat, buffer_size: cpal::BufferSize) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: format.channels,
        sample_rate: format.sample_rate_hz,
        buffer_size,
    }
}

/// Fixed probe buffer when the device advertises a range containing it
fn probe_buffer_size(device: &cpal::Device, format: &PcmFormat) -> cpal::BufferSize {
    let fits = device
        .supported_output_configs()
        .map(|mut configs| {
            configs.any(|range| {
                range.channels() == format.channels
                    && range.min_sample_rate() <= format.sample_rate_hz
                    && format.sample_rate_hz <= range.max_sample_rate()
                    && match range.buffer_size() {
                        cpal::SupportedBufferSize::Range { min, max } => {
                            (*min..=*max).contains(&PROBE_BUFFER_FRAMES)
                        }
                        cpal::SupportedBufferSize::Unknown => false,
                    }
            })
        })
        .unwrap_or(false);

    if fits {
        cpal::BufferSize::Fixed(PROBE_BUFFER_FRAMES)
    } else {
        cpal::BufferSize::Default
    }
}

/// Lists output devices through CPAL
pub struct CpalCatalog {
    subsystem: Arc<AudioSubsystem>,
}

impl CpalCatalog {
    pub fn new(subsystem: Arc<AudioSubsystem>) -> Self {
        Self { subsystem }
    }
}

impl DeviceCatalog for CpalCatalog {
    fn enumerate(&self) -> Result<Vec<DeviceHandle>> {
        self.subsystem.output_handles()
    }
}

/// Opens and immediately drops a paused output stream
pub struct CpalProber {
    subsystem: Arc<AudioSubsystem>,
}

impl CpalProber {
    pub fn new(subsystem: Arc<AudioSubsystem>) -> Self {
        Self { subsystem }
    }
}

impl DeviceProber for CpalProber {
    fn probe(&self, device: &DeviceHandle, format: &PcmFormat) -> Result<()> {
        let failure = |reason: String| AudioError::DeviceProbeFailure {
            index: device.index,
            name: device.display_name.clone(),
            reason,
        };

        let cpal_device = self.subsystem.resolve(device).map_err(failure)?;
        let config = stream_config(format, probe_buffer_size(&cpal_device, format));
        let index = device.index;

        let stream = cpal_device
            .build_output_stream(
                &config,
                |data: &mut [i16], _: &cpal::OutputCallbackInfo| data.fill(0),
                move |err| warn!(device = index, "Probe stream error: {}", err),
                None,
            )
            .map_err(|e| failure(e.to_string()))?;

        drop(stream);
        debug!(device = index, format = %format, "Probe stream opened");
        Ok(())
    }
}
