//! bluecast CLI Application
//!
//! Plays one audio file on every connected Bluetooth speaker at once.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

use bluecast_core::domain::audio::{
    AudioError, BluetoothNameResolver, DeviceCatalog, DeviceHandle, DeviceProber, OutputBackend,
    PcmFormat, Transcoder,
};
use bluecast_core::domain::config::{BluecastConfig, ConfigManager};
use bluecast_core::domain::playback::{PlaybackCoordinator, PlaybackReport, PlaybackStatus};
use bluecast_core::domain::selector::{
    parse_device_indices, resolve_manual_targets, DeviceSelector, ScoringRules,
};
use bluecast_core::domain::source::AudioSource;
use bluecast_infra::{
    AudioSubsystem, CpalBackend, CpalCatalog, CpalProber, FfmpegTranscoder, SystemBluetoothResolver,
    SystemReport,
};

#[derive(Parser)]
#[command(name = "bluecast")]
#[command(about = "Play audio files to multiple Bluetooth devices simultaneously", long_about = None)]
struct Cli {
    /// Path to the audio file to play
    #[arg(required_unless_present = "list_devices")]
    audio_file: Option<PathBuf>,

    /// List all detected audio output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Comma-separated list of device indices to play on (overrides auto-detection)
    #[arg(long, value_name = "INDICES")]
    device_indices: Option<String>,

    /// Enable debug mode with verbose output
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (filter, filter_handle) = reload::Layer::new(log_filter(cli.debug));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config().await;
    let debug = cli.debug || config.debug;
    if debug && !cli.debug {
        if let Err(e) = filter_handle.modify(|filter| *filter = log_filter(true)) {
            warn!(error = %e, "Could not raise log level");
        }
    }

    info!("bluecast starting...");

    match run(cli, config, debug).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the debug switch
fn log_filter(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

async fn load_config() -> BluecastConfig {
    match ConfigManager::default_config_dir() {
        Ok(dir) => ConfigManager::new(dir).load().await,
        Err(e) => {
            warn!(error = %e, "Using default configuration");
            BluecastConfig::default()
        }
    }
}

async fn run(cli: Cli, config: BluecastConfig, debug: bool) -> anyhow::Result<ExitCode> {
    let subsystem = match AudioSubsystem::acquire() {
        Ok(subsystem) => Arc::new(subsystem),
        Err(e) => {
            if debug {
                println!("{}", SystemReport::collect(None));
            }
            return Err(e).context("Cannot access audio devices");
        }
    };

    if debug {
        println!("{}", SystemReport::collect(Some(subsystem.host_name())));
    }

    let catalog = CpalCatalog::new(subsystem.clone());

    if cli.list_devices {
        let devices = catalog.enumerate().context("Listing output devices")?;
        print_devices(&devices, "All Audio Output Devices");
        return Ok(ExitCode::SUCCESS);
    }

    let Some(audio_file) = cli.audio_file else {
        error!("No audio file given");
        return Ok(ExitCode::FAILURE);
    };

    let target = config.output_format.to_pcm_format().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring output_format from config");
        PcmFormat::STANDARD
    });

    let env = Collaborators {
        catalog,
        resolver: SystemBluetoothResolver::default(),
        prober: CpalProber::new(subsystem.clone()),
        source: AudioSource::with_target(FfmpegTranscoder::default(), target),
        backend: Arc::new(CpalBackend::new(subsystem, config.playback.queue_depth())),
    };
    let settings = RunSettings {
        rules: ScoringRules::from(&config.detection),
        chunk_frames: config.playback.chunk_size as usize,
    };

    play_file(&audio_file, cli.device_indices.as_deref(), &settings, &env).await
}

/// Everything a playback run talks to outside the process
struct Collaborators<C, R, P, T, B> {
    catalog: C,
    resolver: R,
    prober: P,
    source: AudioSource<T>,
    backend: Arc<B>,
}

struct RunSettings {
    rules: ScoringRules,
    chunk_frames: usize,
}

/// Prepare `audio_file`, pick the targets and play to all of them
async fn play_file<C, R, P, T, B>(
    audio_file: &Path,
    device_indices: Option<&str>,
    settings: &RunSettings,
    env: &Collaborators<C, R, P, T, B>,
) -> anyhow::Result<ExitCode>
where
    C: DeviceCatalog,
    R: BluetoothNameResolver,
    P: DeviceProber,
    T: Transcoder,
    B: OutputBackend + 'static,
{
    info!(path = %audio_file.display(), "Processing audio file");
    let stream = match env.source.prepare(audio_file).await {
        Ok(stream) => stream,
        Err(AudioError::FileNotFound(path)) => {
            error!("Audio file not found: {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            error!(error = %e, "Failed to prepare audio file for playback");
            return Ok(ExitCode::FAILURE);
        }
    };

    let targets = match device_indices {
        Some(raw) => {
            let indices = match parse_device_indices(raw) {
                Ok(indices) => indices,
                Err(e) => {
                    error!("{}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            let devices = env.catalog.enumerate().context("Listing output devices")?;
            match resolve_manual_targets(&indices, &devices) {
                Ok(targets) => {
                    print_devices(&targets, "Using specified devices");
                    targets
                }
                Err(_) => {
                    error!("No valid device indices specified");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        None => {
            // Probe with the format we are about to play, not a fixed one
            let selector = DeviceSelector::new(settings.rules).with_probe_format(*stream.format());
            let detection =
                detect_devices(&env.catalog, &env.resolver, &env.prober, &selector).await?;
            match detection.into_targets() {
                Ok(targets) => targets,
                Err(code) => return Ok(code),
            }
        }
    };

    let backend = Arc::clone(&env.backend);
    let chunk_frames = settings.chunk_frames;

    println!("\nStarting playback on {} device(s)...", targets.len());
    let report = tokio::task::spawn_blocking(move || {
        let report = PlaybackCoordinator::new(backend.as_ref())
            .with_chunk_frames(chunk_frames)
            .play(&stream, &targets);
        // The temporary file, if any, goes away with the stream
        drop(stream);
        report
    })
    .await
    .context("Playback coordinator panicked")?;

    print_report(&report);
    Ok(report_exit_code(&report))
}

#[derive(Debug)]
enum Detection {
    Found(Vec<DeviceHandle>),
    NoBluetooth,
    NoneConnected,
}

async fn detect_devices<C, R, P>(
    catalog: &C,
    resolver: &R,
    prober: &P,
    selector: &DeviceSelector,
) -> anyhow::Result<Detection>
where
    C: DeviceCatalog,
    R: BluetoothNameResolver,
    P: DeviceProber,
{
    info!("Detecting active Bluetooth audio devices...");
    let names: BTreeSet<String> = resolver.active_device_names().await;
    let devices = catalog.enumerate().context("Listing output devices")?;

    let candidates = selector.match_candidates(&names, &devices);
    if candidates.is_empty() {
        return Ok(Detection::NoBluetooth);
    }
    let handles: Vec<_> = candidates.iter().map(|c| c.handle.clone()).collect();
    print_devices(&handles, "All detected Bluetooth audio devices");

    let picked = selector.pick_best(&selector.group_by_base_name(candidates));
    let handles: Vec<_> = picked.iter().map(|(c, _)| c.handle.clone()).collect();
    print_devices(&handles, "Filtered active Bluetooth audio devices");

    let selected = selector.verify(picked, prober);
    if selected.is_empty() {
        return Ok(Detection::NoneConnected);
    }

    let targets: Vec<_> = selected.iter().map(|d| d.handle().clone()).collect();
    print_devices(&targets, "Selected devices for playback");
    Ok(Detection::Found(targets))
}

impl Detection {
    /// Devices to play to, or the exit code that ends the run here
    ///
    /// Finding no Bluetooth device at all is not an error; finding some that
    /// all fail verification is.
    fn into_targets(self) -> Result<Vec<DeviceHandle>, ExitCode> {
        match self {
            Detection::Found(targets) => Ok(targets),
            Detection::NoBluetooth => {
                println!("No active Bluetooth audio devices detected.");
                Err(ExitCode::SUCCESS)
            }
            Detection::NoneConnected => {
                println!("\nNo connected Bluetooth audio devices found for playback.");
                println!("Please ensure your devices are properly connected.");
                Err(ExitCode::FAILURE)
            }
        }
    }
}

/// Fan-out is best effort: one finished device makes the run a success
fn report_exit_code(report: &PlaybackReport) -> ExitCode {
    if report.is_success() {
        println!("Playback completed successfully");
        ExitCode::SUCCESS
    } else {
        println!("Playback failed on every device");
        ExitCode::FAILURE
    }
}

fn print_devices(devices: &[DeviceHandle], title: &str) {
    if devices.is_empty() {
        println!("No audio devices detected.");
        return;
    }

    println!("\n{}:", title);
    for device in devices {
        println!("  {}", device);
    }
}

fn print_report(report: &PlaybackReport) {
    println!("\nPlayback report:");
    for outcome in &report.outcomes {
        match &outcome.status {
            PlaybackStatus::Completed { frames } => println!(
                "  {} - completed ({} frames in {:.1}s)",
                outcome.device,
                frames,
                outcome.elapsed.as_secs_f64()
            ),
            PlaybackStatus::Failed { during, reason } => {
                println!("  {} - failed while {}: {}", outcome.device, during, reason)
            }
        }
    }
}
