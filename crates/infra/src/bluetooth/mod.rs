//! Connected Bluetooth device names from the operating system
//!
//! Each platform has its own registry and tool:
//! - Windows: PowerShell `Get-PnpDevice`
//! - Linux: BlueZ `bluetoothctl`
//! - macOS: `system_profiler`
//!
//! Every lookup is best-effort. A missing tool, a non-zero exit or unparsable
//! output yields an empty set and a log line, never an error.

mod linux;
mod macos;
mod windows;

use std::collections::BTreeSet;
use std::fmt;

use tokio::process::Command;
use tracing::{debug, info, warn};
use bluecast_core::domain::audio::BluetoothNameResolver;

pub use linux::parse_bluetoothctl_devices;
pub use macos::parse_system_profiler;
pub use windows::parse_pnp_friendly_names;

/// Operating system family as far as Bluetooth lookup is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unsupported(&'static str),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &'static str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            other => Platform::Unsupported(other),
        }
    }

    /// External program queried for device names
    pub fn bluetooth_tool(&self) -> Option<&'static str> {
        match self {
            Platform::Windows => Some(windows::PROGRAM),
            Platform::Linux => Some(linux::PROGRAM),
            Platform::MacOs => Some(macos::PROGRAM),
            Platform::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => f.write_str("Windows"),
            Platform::Linux => f.write_str("Linux"),
            Platform::MacOs => f.write_str("macOS"),
            Platform::Unsupported(os) => f.write_str(os),
        }
    }
}

/// Resolver that shells out to the platform's Bluetooth tool
#[derive(Debug, Clone)]
pub struct SystemBluetoothResolver {
    platform: Platform,
}

impl Default for SystemBluetoothResolver {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl SystemBluetoothResolver {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

#[async_trait::async_trait]
impl BluetoothNameResolver for SystemBluetoothResolver {
    async fn active_device_names(&self) -> BTreeSet<String> {
        let names = match self.platform {
            Platform::Windows => windows::connected_names().await,
            Platform::Linux => linux::connected_names().await,
            Platform::MacOs => macos::connected_names().await,
            Platform::Unsupported(os) => {
                warn!("System {} not currently supported", os);
                BTreeSet::new()
            }
        };

        info!(count = names.len(), "Active Bluetooth devices resolved");
        for name in &names {
            debug!(name = %name, "Active Bluetooth device");
        }
        names
    }
}

/// Run `program` and return its stdout, or `None` with a warning
async fn run_tool(program: &str, args: &[&str]) -> Option<String> {
    let output = match Command::new(program).args(args).output().await {
        Ok(output) => output,
        Err(e) => {
            warn!(program, error = %e, "Could not run Bluetooth tool");
            return None;
        }
    };

    if !output.status.success() {
        warn!(
            program,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Bluetooth tool failed"
        );
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Trim names and drop empty ones
fn collect_names<'a>(names: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
