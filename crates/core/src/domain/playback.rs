//! Concurrent multi-device playback
//!
//! The coordinator spawns one worker thread per target device and joins them
//! all before returning. Workers share nothing mutable: each opens its own
//! reader on the [`PcmStream`] and owns its output sink exclusively, so a
//! failing or stalled device never affects its siblings.
//!
//! Every worker walks `Opening → Streaming → Closing → Completed`. Any error
//! moves it straight to `Failed`, and the sink and reader are dropped on the
//! way out. There are no retries.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use super::audio::{AudioError, DeviceHandle, OutputBackend, OutputSink, Result};
use super::source::PcmStream;

/// Frames per write unless configured otherwise
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Lifecycle of one device's playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Opening,
    Streaming,
    Closing,
    Completed,
    Failed,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Opening => "opening",
            DeviceState::Streaming => "streaming",
            DeviceState::Closing => "closing",
            DeviceState::Completed => "completed",
            DeviceState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How playback ended on one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    Completed {
        frames: u64,
    },
    Failed {
        /// State the worker was in when the error occurred
        during: DeviceState,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOutcome {
    pub device: DeviceHandle,
    pub status: PlaybackStatus,
    pub elapsed: Duration,
}

impl DeviceOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, PlaybackStatus::Completed { .. })
    }

    pub fn state(&self) -> DeviceState {
        match self.status {
            PlaybackStatus::Completed { .. } => DeviceState::Completed,
            PlaybackStatus::Failed { .. } => DeviceState::Failed,
        }
    }
}

/// Per-device results, in target order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub outcomes: Vec<DeviceOutcome>,
}

impl PlaybackReport {
    pub fn completed(&self) -> impl Iterator<Item = &DeviceOutcome> {
        self.outcomes.iter().filter(|o| o.is_completed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeviceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_completed())
    }

    /// Fan-out is best effort: one finished device is a successful run
    pub fn is_success(&self) -> bool {
        self.completed().next().is_some()
    }
}

/// Drives a prepared stream to many devices at once
pub struct PlaybackCoordinator<'a, B> {
    backend: &'a B,
    chunk_frames: usize,
}

impl<'a, B: OutputBackend> PlaybackCoordinator<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
        }
    }

    pub fn with_chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = frames.max(1);
        self
    }

    /// Play `stream` on every target and block until all of them finish
    pub fn play(&self, stream: &PcmStream, targets: &[DeviceHandle]) -> PlaybackReport {
        if targets.is_empty() {
            info!("No devices specified for playback");
            return PlaybackReport::default();
        }

        info!(devices = targets.len(), "Starting playback");

        let outcomes: Vec<DeviceOutcome> = thread::scope(|scope| {
            let workers: Vec<_> = targets
                .iter()
                .map(|device| {
                    let spawned = thread::Builder::new()
                        .name(format!("playback-{}", device.index))
                        .spawn_scoped(scope, move || self.play_device(stream, device));
                    (device, spawned)
                })
                .collect();

            debug!("Waiting for playback to complete");

            workers
                .into_iter()
                .map(|(device, spawned)| {
                    let failure = |reason: String| DeviceOutcome {
                        device: device.clone(),
                        status: PlaybackStatus::Failed {
                            during: DeviceState::Opening,
                            reason,
                        },
                        elapsed: Duration::ZERO,
                    };
                    match spawned {
                        Ok(handle) => handle
                            .join()
                            .unwrap_or_else(|_| failure("playback worker panicked".to_string())),
                        Err(e) => failure(format!("could not spawn playback worker: {}", e)),
                    }
                })
                .collect()
        });

        let report = PlaybackReport { outcomes };
        info!(
            completed = report.completed().count(),
            failed = report.failed().count(),
            "Playback finished on all devices"
        );
        report
    }

    fn play_device(&self, stream: &PcmStream, device: &DeviceHandle) -> DeviceOutcome {
        let started = Instant::now();
        let mut state = DeviceState::Opening;

        let status = match self.stream_to_device(stream, device, &mut state) {
            Ok(frames) => {
                info!(device = device.index, frames, "Playback completed");
                PlaybackStatus::Completed { frames }
            }
            Err(e) => {
                error!(device = device.index, state = %state, error = %e, "Playback failed");
                PlaybackStatus::Failed {
                    during: state,
                    reason: e.to_string(),
                }
            }
        };

        DeviceOutcome {
            device: device.clone(),
            status,
            elapsed: started.elapsed(),
        }
    }

    fn stream_to_device(
        &self,
        stream: &PcmStream,
        device: &DeviceHandle,
        state: &mut DeviceState,
    ) -> Result<u64> {
        debug!(device = device.index, format = %stream.format(), "Opening stream");
        let mut reader = stream.open_reader()?;
        let mut sink = self.backend.open(device, stream.format())?;

        *state = DeviceState::Streaming;
        debug!(device = device.index, "Starting data playback");
        let mut chunk = Vec::with_capacity(self.chunk_frames * stream.format().channels as usize);
        let mut frames: u64 = 0;
        loop {
            let read = reader
                .read_chunk(self.chunk_frames, &mut chunk)
                .map_err(|e| AudioError::StreamWriteFailure {
                    index: device.index,
                    reason: format!("reading source: {}", e),
                })?;
            if read == 0 {
                break;
            }
            sink.write(&chunk)?;
            frames += read as u64;
        }

        *state = DeviceState::Closing;
        debug!(device = device.index, "Closing stream");
        sink.finish()?;

        *state = DeviceState::Completed;
        Ok(frames)
    }
}
