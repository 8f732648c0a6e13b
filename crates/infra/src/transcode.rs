//! ffmpeg as the format-normalizing collaborator

use std::path::Path;
use std::process::Stdio;

use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, info};
use bluecast_core::domain::audio::{AudioError, PcmFormat, Result, Transcoder};

use crate::system::tool_responds;

/// Converts anything ffmpeg can decode into PCM WAV in the system temp dir
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// ffmpeg argument list for converting `input` into `output`
    pub fn arguments(input: &Path, output: &Path, target: &PcmFormat) -> Vec<std::ffi::OsString> {
        let codec = format!("pcm_s{}le", target.bits_per_sample());
        let mut args: Vec<std::ffi::OsString> = vec!["-i".into(), input.into()];
        args.extend(
            [
                "-acodec".to_string(),
                codec,
                "-ar".to_string(),
                target.sample_rate_hz.to_string(),
                "-ac".to_string(),
                target.channels.to_string(),
                "-y".to_string(),
            ]
            .into_iter()
            .map(Into::into),
        );
        args.push(output.into());
        args
    }
}

#[async_trait::async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, target: &PcmFormat) -> Result<TempPath> {
        if !tool_responds(&self.program, "-version").await {
            return Err(AudioError::TranscodeFailure(format!(
                "{} not found; cannot convert audio format",
                self.program
            )));
        }

        let stem = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let output = tempfile::Builder::new()
            .prefix(&format!("converted_{}_", stem))
            .suffix(".wav")
            .tempfile()?
            .into_temp_path();

        info!(path = %input.display(), "Converting audio to {}", target);
        let result = Command::new(&self.program)
            .args(Self::arguments(input, &output, target))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AudioError::TranscodeFailure(format!("could not run {}: {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            debug!(stderr = %stderr, "ffmpeg stderr");
            return Err(AudioError::TranscodeFailure(format!(
                "{} exited with {} while converting {}: {}",
                self.program,
                result.status,
                input.display(),
                stderr.lines().last().unwrap_or("").trim()
            )));
        }

        info!(path = %output.display(), "Conversion successful");
        Ok(output)
    }
}
