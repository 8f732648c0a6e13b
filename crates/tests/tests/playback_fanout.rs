//! Integration tests for preparing a file and fanning it out to devices

use std::path::PathBuf;

use bluecast_core::domain::audio::{AudioError, PcmFormat};
use bluecast_core::domain::playback::{DeviceState, PlaybackCoordinator, PlaybackStatus};
use bluecast_core::domain::selector::resolve_manual_targets;
use bluecast_core::domain::source::AudioSource;
use bluecast_tests::{handles, write_ramp_wav, FakeTranscoder, RecordingBackend};
use tempfile::TempDir;

fn ramp(frames: u32, channels: u16) -> Vec<i16> {
    (0..frames * channels as u32)
        .map(|i| (i % 32_000) as i16)
        .collect()
}

// ============================================================================
// PREPARE THEN PLAY
// ============================================================================

#[tokio::test]
async fn test_every_device_receives_the_whole_file() {
    let dir = TempDir::new().unwrap();
    let path = write_ramp_wav(&dir.path().join("song.wav"), 2, 44100, 3_000);

    let source = AudioSource::new(FakeTranscoder::default());
    let stream = source.prepare(&path).await.unwrap();
    assert!(!stream.is_transcoded());

    let targets = handles(&[(1, "Speakers (JBL Flip 5)"), (4, "Headphones (Bose Speaker)")]);
    let backend = RecordingBackend::default();
    let report = PlaybackCoordinator::new(&backend)
        .with_chunk_frames(512)
        .play(&stream, &targets);

    assert!(report.is_success());
    assert_eq!(report.completed().count(), 2);
    let expected = ramp(3_000, 2);
    for index in [1, 4] {
        let log = backend.log(index).unwrap();
        let log = log.lock().unwrap();
        assert!(log.finished);
        assert_eq!(log.format, Some(PcmFormat::STANDARD));
        assert_eq!(log.samples, expected);
    }
}

#[tokio::test]
async fn test_open_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let path = write_ramp_wav(&dir.path().join("song.wav"), 2, 44100, 2_048);
    let stream = AudioSource::new(FakeTranscoder::default())
        .prepare(&path)
        .await
        .unwrap();

    let catalog = handles(&[(0, "Speakers (Realtek)"), (2, "Speaker A"), (5, "Speaker B")]);
    let targets = resolve_manual_targets(&[2, 5], &catalog).unwrap();
    let backend = RecordingBackend::refusing(&[5]);

    let report = PlaybackCoordinator::new(&backend).play(&stream, &targets);

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].device.index, 2);
    assert_eq!(
        report.outcomes[0].status,
        PlaybackStatus::Completed { frames: 2_048 }
    );
    assert_eq!(report.outcomes[1].device.index, 5);
    assert!(matches!(
        report.outcomes[1].status,
        PlaybackStatus::Failed {
            during: DeviceState::Opening,
            ..
        }
    ));
    assert!(report.is_success());
    assert_eq!(backend.opened(), vec![2]);
}

#[tokio::test]
async fn test_all_devices_failing_is_not_success() {
    let dir = TempDir::new().unwrap();
    let path = write_ramp_wav(&dir.path().join("song.wav"), 2, 44100, 100);
    let stream = AudioSource::new(FakeTranscoder::default())
        .prepare(&path)
        .await
        .unwrap();

    let targets = handles(&[(2, "Speaker A"), (5, "Speaker B")]);
    let backend = RecordingBackend::refusing(&[2, 5]);

    let report = PlaybackCoordinator::new(&backend).play(&stream, &targets);

    assert_eq!(report.failed().count(), 2);
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_transcoded_file_removed_after_playback() {
    let dir = TempDir::new().unwrap();
    let path = write_ramp_wav(&dir.path().join("mono.wav"), 1, 22050, 500);

    let transcoder = FakeTranscoder::default();
    let source = AudioSource::new(transcoder);
    let stream = source.prepare(&path).await.unwrap();
    assert!(stream.is_transcoded());
    let converted: PathBuf = stream.path().to_path_buf();
    assert_ne!(converted, path);

    let targets = handles(&[(3, "Speaker")]);
    let backend = RecordingBackend::default();
    let report = PlaybackCoordinator::new(&backend).play(&stream, &targets);
    assert_eq!(
        report.outcomes[0].status,
        PlaybackStatus::Completed { frames: 2_000 }
    );

    drop(stream);
    assert!(!converted.exists());
    assert!(path.exists(), "the input file is never touched");
}

#[tokio::test]
async fn test_missing_file_never_reaches_devices() {
    let dir = TempDir::new().unwrap();
    let source = AudioSource::new(FakeTranscoder::default());

    let result = source.prepare(&dir.path().join("nope.mp3")).await;

    assert!(matches!(result, Err(AudioError::FileNotFound(_))));
}

#[tokio::test]
async fn test_no_targets_gives_empty_report() {
    let dir = TempDir::new().unwrap();
    let path = write_ramp_wav(&dir.path().join("song.wav"), 2, 44100, 10);
    let stream = AudioSource::new(FakeTranscoder::default())
        .prepare(&path)
        .await
        .unwrap();

    let backend = RecordingBackend::default();
    let report = PlaybackCoordinator::new(&backend).play(&stream, &[]);

    assert!(report.outcomes.is_empty());
    assert!(!report.is_success());
}
