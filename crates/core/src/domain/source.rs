//! Audio source preparation
//!
//! [`AudioSource::prepare`] turns any input file into a [`PcmStream`]: a WAV
//! file in a format the playback path can write to devices unchanged.
//! Conformant WAV files are used in place; everything else goes through the
//! [`Transcoder`] collaborator.
//!
//! A prepared stream is immutable. Each consumer calls
//! [`PcmStream::open_reader`] to get its own cursor.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempPath;
use tokio::fs;
use tracing::{debug, info};

use super::audio::{AudioError, PcmFormat, Result, Transcoder};

/// Header facts read from a WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavProbe {
    pub format: PcmFormat,
    pub integer_samples: bool,
    pub total_frames: u32,
}

impl WavProbe {
    pub fn conforms_to(&self, target: &PcmFormat) -> bool {
        self.integer_samples && self.format.conforms_to(target)
    }
}

/// Read the header of `path` without decoding samples
pub fn probe_wav(path: &Path) -> Result<WavProbe> {
    let reader = open_wav(path)?;
    let spec = reader.spec();

    Ok(WavProbe {
        format: PcmFormat {
            sample_width_bytes: spec.bits_per_sample.div_ceil(8),
            channels: spec.channels,
            sample_rate_hz: spec.sample_rate,
        },
        integer_samples: spec.sample_format == hound::SampleFormat::Int,
        total_frames: reader.duration(),
    })
}

/// Only opening the file can fail with [`AudioError::Io`]; anything hound
/// rejects afterwards, short reads included, is a format problem
fn open_wav(path: &Path) -> Result<hound::WavReader<BufReader<File>>> {
    let file = File::open(path)?;
    hound::WavReader::new(BufReader::new(file)).map_err(|e| unreadable(path, e))
}

fn unreadable(path: &Path, err: hound::Error) -> AudioError {
    AudioError::UnreadableFormat {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Prepared 16-bit PCM audio ready to be fanned out
///
/// When the stream was produced by transcoding, it owns the temporary file and
/// deletes it on drop.
#[derive(Debug)]
pub struct PcmStream {
    path: PathBuf,
    format: PcmFormat,
    total_frames: u32,
    temp: Option<TempPath>,
}

impl PcmStream {
    /// Wrap an existing 16-bit integer WAV file
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let probe = probe_wav(&path)?;
        Self::from_probe(path, probe, None)
    }

    fn from_probe(path: PathBuf, probe: WavProbe, temp: Option<TempPath>) -> Result<Self> {
        if !probe.integer_samples || probe.format.sample_width_bytes != 2 {
            return Err(AudioError::UnreadableFormat {
                path,
                reason: format!("expected 16-bit integer PCM, found {}", probe.format),
            });
        }

        Ok(Self {
            path,
            format: probe.format,
            total_frames: probe.total_frames,
            temp,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames as f64 / self.format.sample_rate_hz as f64)
    }

    /// Whether the stream lives in a temporary file produced by transcoding
    pub fn is_transcoded(&self) -> bool {
        self.temp.is_some()
    }

    /// Independent cursor positioned at the first frame
    pub fn open_reader(&self) -> Result<PcmReader> {
        Ok(PcmReader {
            inner: open_wav(&self.path)?,
            path: self.path.clone(),
            channels: self.format.channels as usize,
        })
    }
}

/// Sequential frame reader over a [`PcmStream`]
pub struct PcmReader {
    inner: hound::WavReader<BufReader<File>>,
    path: PathBuf,
    channels: usize,
}

impl PcmReader {
    /// Replace `buf` with up to `frames` interleaved frames
    ///
    /// Returns the number of frames read; zero means the stream is exhausted.
    pub fn read_chunk(&mut self, frames: usize, buf: &mut Vec<i16>) -> Result<usize> {
        buf.clear();
        for sample in self.inner.samples::<i16>().take(frames * self.channels) {
            buf.push(sample.map_err(|e| match e {
                // hound reports a truncated data chunk as a short read
                hound::Error::IoError(e)
                    if !matches!(e.kind(), io::ErrorKind::Other | io::ErrorKind::UnexpectedEof) =>
                {
                    AudioError::Io(e)
                }
                other => unreadable(&self.path, other),
            })?);
        }
        Ok(buf.len() / self.channels)
    }
}

/// Resolves input files to playable PCM streams
pub struct AudioSource<T> {
    transcoder: T,
    target: PcmFormat,
}

impl<T: Transcoder> AudioSource<T> {
    pub fn new(transcoder: T) -> Self {
        Self::with_target(transcoder, PcmFormat::STANDARD)
    }

    pub fn with_target(transcoder: T, target: PcmFormat) -> Self {
        Self { transcoder, target }
    }

    pub fn target(&self) -> &PcmFormat {
        &self.target
    }

    /// Prepare `path` for playback
    ///
    /// Conformant WAV files are returned untouched; anything else is
    /// transcoded into a temporary file owned by the returned stream.
    pub async fn prepare(&self, path: &Path) -> Result<PcmStream> {
        if !fs::try_exists(path).await? {
            return Err(AudioError::FileNotFound(path.to_path_buf()));
        }

        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);

        if is_wav {
            let probe = probe_wav(path)?;
            debug!(path = %path.display(), format = %probe.format, "Audio format check");

            if probe.conforms_to(&self.target) {
                info!(path = %path.display(), "No conversion needed: already {}", probe.format);
                let stream = PcmStream::from_probe(path.to_path_buf(), probe, None)?;
                log_stream_details(&stream);
                return Ok(stream);
            }

            info!(
                path = %path.display(),
                "Conversion needed: current format is {}",
                probe.format
            );
        }

        let converted = self.transcoder.transcode(path, &self.target).await?;
        let converted_path = converted.to_path_buf();
        let probe = probe_wav(&converted_path)?;
        let stream = PcmStream::from_probe(converted_path, probe, Some(converted))?;
        log_stream_details(&stream);
        Ok(stream)
    }
}

fn log_stream_details(stream: &PcmStream) {
    info!(
        path = %stream.path().display(),
        channels = stream.format().channels,
        sample_width = stream.format().sample_width_bytes,
        sample_rate = stream.format().sample_rate_hz,
        frames = stream.total_frames(),
        duration_secs = format_args!("{:.2}", stream.duration().as_secs_f64()),
        "WAV file details"
    );
}
