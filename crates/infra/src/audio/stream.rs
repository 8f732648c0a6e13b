//! Blocking playback streams on top of CPAL callbacks
//!
//! CPAL pulls audio from a callback on its own thread. [`CpalSink`] bridges that
//! to the push model of [`OutputSink`]: writers block on a bounded channel
//! whose depth is the configured buffer size, and the callback drains it.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam::channel::{bounded, select, Receiver, Sender, TryRecvError};
use tracing::{debug, error};
use bluecast_core::domain::audio::{
    AudioError, DeviceHandle, OutputBackend, OutputSink, PcmFormat, Result,
};

use super::cpal_backend::{stream_config, AudioSubsystem};

/// Opens 16-bit output streams on CPAL devices
pub struct CpalBackend {
    subsystem: Arc<AudioSubsystem>,
    queue_depth: usize,
}

impl CpalBackend {
    /// `queue_depth` is the number of chunks a writer may run ahead
    pub fn new(subsystem: Arc<AudioSubsystem>, queue_depth: usize) -> Self {
        Self {
            subsystem,
            queue_depth: queue_depth.max(1),
        }
    }
}

impl OutputBackend for CpalBackend {
    type Sink = CpalSink;

    fn open(&self, device: &DeviceHandle, format: &PcmFormat) -> Result<CpalSink> {
        let index = device.index;
        let open_failure = |reason: String| AudioError::StreamOpenFailure { index, reason };

        let cpal_device = self.subsystem.resolve(device).map_err(open_failure)?;
        let config = stream_config(format, cpal::BufferSize::Default);

        let (sample_tx, sample_rx) = bounded(self.queue_depth);
        let (done_tx, done_rx) = bounded(1);
        let (error_tx, error_rx) = bounded(1);
        let mut feeder = CallbackFeeder::new(sample_rx, done_tx);

        let stream = cpal_device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| feeder.fill(data),
                move |err| {
                    error!(device = index, "Output stream error: {}", err);
                    let _ = error_tx.try_send(err.to_string());
                },
                None,
            )
            .map_err(|e| open_failure(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| open_failure(format!("Failed to start stream: {}", e)))?;

        debug!(device = index, format = %format, "Stream opened successfully");

        Ok(CpalSink {
            index,
            stream,
            sample_tx,
            done_rx,
            error_rx,
        })
    }
}

/// One playing CPAL output stream
pub struct CpalSink {
    index: usize,
    stream: cpal::Stream,
    sample_tx: Sender<Vec<i16>>,
    done_rx: Receiver<()>,
    error_rx: Receiver<String>,
}

impl OutputSink for CpalSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        select! {
            send(self.sample_tx, samples.to_vec()) -> sent => sent.map_err(|_| {
                AudioError::StreamWriteFailure {
                    index: self.index,
                    reason: "output callback is gone".to_string(),
                }
            }),
            recv(self.error_rx) -> reason => Err(AudioError::StreamWriteFailure {
                index: self.index,
                reason: reason.unwrap_or_else(|_| "stream closed".to_string()),
            }),
        }
    }

    fn finish(self) -> Result<()> {
        let CpalSink {
            index,
            stream,
            sample_tx,
            done_rx,
            error_rx,
        } = self;

        // Disconnecting lets the callback notice the end of data
        drop(sample_tx);

        let drained = select! {
            recv(done_rx) -> _ => Ok(()),
            recv(error_rx) -> reason => Err(AudioError::StreamWriteFailure {
                index,
                reason: reason.unwrap_or_else(|_| "stream closed".to_string()),
            }),
        };

        if let Err(e) = stream.pause() {
            debug!(device = index, "Pause before close failed: {}", e);
        }
        drop(stream);
        drained
    }
}

/// State owned by the realtime callback
struct CallbackFeeder {
    samples: Receiver<Vec<i16>>,
    current: Vec<i16>,
    position: usize,
    exhausted: bool,
    done: Option<Sender<()>>,
}

impl CallbackFeeder {
    fn new(samples: Receiver<Vec<i16>>, done: Sender<()>) -> Self {
        Self {
            samples,
            current: Vec::new(),
            position: 0,
            exhausted: false,
            done: Some(done),
        }
    }

    /// Copy queued samples into `out`, padding with silence
    ///
    /// Completion is signalled on the first fully silent buffer after the
    /// writer disconnected, so the last real buffer has already been handed
    /// to the device.
    fn fill(&mut self, out: &mut [i16]) {
        let mut written = 0;

        while written < out.len() {
            if self.position == self.current.len() {
                match self.samples.try_recv() {
                    Ok(chunk) => {
                        self.current = chunk;
                        self.position = 0;
                        continue;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.exhausted = true;
                        break;
                    }
                }
            }

            let n = (out.len() - written).min(self.current.len() - self.position);
            out[written..written + n]
                .copy_from_slice(&self.current[self.position..self.position + n]);
            written += n;
            self.position += n;
        }

        out[written..].fill(0);

        if self.exhausted && written == 0 {
            if let Some(done) = self.done.take() {
                let _ = done.try_send(());
            }
        }
    }
}
