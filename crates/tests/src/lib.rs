//! Fixtures shared by the integration tests
//!
//! In-memory stand-ins for every hardware-facing trait of
//! `bluecast_core::domain::audio`, plus a WAV writer.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bluecast_core::domain::audio::{
    AudioError, BluetoothNameResolver, DeviceCatalog, DeviceHandle, DeviceProber, OutputBackend,
    OutputSink, PcmFormat, Result, Transcoder,
};
use tempfile::TempPath;

/// Write a 16-bit WAV whose samples count up from zero
pub fn write_ramp_wav(path: &Path, channels: u16, sample_rate: u32, frames: u32) -> PathBuf {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for i in 0..frames * channels as u32 {
        writer.write_sample((i % 32_000) as i16).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
    path.to_path_buf()
}

pub fn handles(entries: &[(usize, &str)]) -> Vec<DeviceHandle> {
    entries
        .iter()
        .map(|(index, name)| DeviceHandle::new(*index, *name, 2))
        .collect()
}

/// Catalog returning a fixed enumeration pass
pub struct StaticCatalog(pub Vec<DeviceHandle>);

impl DeviceCatalog for StaticCatalog {
    fn enumerate(&self) -> Result<Vec<DeviceHandle>> {
        Ok(self.0.clone())
    }
}

/// Resolver returning a fixed set of names
pub struct FixedNames(pub BTreeSet<String>);

impl FixedNames {
    pub fn new(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

#[async_trait::async_trait]
impl BluetoothNameResolver for FixedNames {
    async fn active_device_names(&self) -> BTreeSet<String> {
        self.0.clone()
    }
}

/// Prober that rejects the listed indices
#[derive(Default)]
pub struct ScriptedProber {
    pub dead: Vec<usize>,
}

impl DeviceProber for ScriptedProber {
    fn probe(&self, device: &DeviceHandle, _format: &PcmFormat) -> Result<()> {
        if self.dead.contains(&device.index) {
            return Err(AudioError::DeviceProbeFailure {
                index: device.index,
                name: device.display_name.clone(),
                reason: "no response".to_string(),
            });
        }
        Ok(())
    }
}

/// Transcoder writing a short conformant WAV into the system temp dir
#[derive(Default)]
pub struct FakeTranscoder {
    pub calls: AtomicUsize,
}

impl FakeTranscoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, _input: &Path, target: &PcmFormat) -> Result<TempPath> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let temp = tempfile::Builder::new()
            .prefix("converted_")
            .suffix(".wav")
            .tempfile()?
            .into_temp_path();
        write_ramp_wav(&temp, target.channels, target.sample_rate_hz, 2_000);
        Ok(temp)
    }
}

/// What one device received
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub format: Option<PcmFormat>,
    pub samples: Vec<i16>,
    pub finished: bool,
}

/// Backend recording every sample per device, with scripted open failures
#[derive(Default)]
pub struct RecordingBackend {
    pub refuse_open: Vec<usize>,
    logs: Mutex<Vec<(usize, Arc<Mutex<DeviceLog>>)>>,
}

impl RecordingBackend {
    pub fn refusing(indices: &[usize]) -> Self {
        Self {
            refuse_open: indices.to_vec(),
            ..Default::default()
        }
    }

    pub fn log(&self, index: usize) -> Option<Arc<Mutex<DeviceLog>>> {
        self.logs
            .lock()
            .ok()?
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, log)| log.clone())
    }

    pub fn opened(&self) -> Vec<usize> {
        self.logs
            .lock()
            .map(|logs| logs.iter().map(|(i, _)| *i).collect())
            .unwrap_or_default()
    }
}

pub struct RecordingSink {
    log: Arc<Mutex<DeviceLog>>,
}

impl OutputBackend for RecordingBackend {
    type Sink = RecordingSink;

    fn open(&self, device: &DeviceHandle, format: &PcmFormat) -> Result<RecordingSink> {
        if self.refuse_open.contains(&device.index) {
            return Err(AudioError::StreamOpenFailure {
                index: device.index,
                reason: "refused by test backend".to_string(),
            });
        }
        let log = Arc::new(Mutex::new(DeviceLog {
            format: Some(*format),
            ..Default::default()
        }));
        if let Ok(mut logs) = self.logs.lock() {
            logs.push((device.index, log.clone()));
        }
        Ok(RecordingSink { log })
    }
}

impl OutputSink for RecordingSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        if let Ok(mut log) = self.log.lock() {
            log.samples.extend_from_slice(samples);
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if let Ok(mut log) = self.log.lock() {
            log.finished = true;
        }
        Ok(())
    }
}
