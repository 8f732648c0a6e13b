//! Host diagnostics for `--debug`

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::bluetooth::Platform;

/// Whether `program` runs and exits successfully with `arg`
pub async fn tool_responds(program: &str, arg: &str) -> bool {
    Command::new(program)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// First executable named `program` on `PATH`
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{}.exe", program), program.to_string()]
    } else {
        vec![program.to_string()]
    };

    std::env::split_paths(&path)
        .flat_map(|dir| candidates.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub location: Option<PathBuf>,
}

/// Facts about the host worth printing before a debug run
#[derive(Debug, Clone)]
pub struct SystemReport {
    pub os: &'static str,
    pub family: &'static str,
    pub arch: &'static str,
    pub platform: Platform,
    pub audio_host: Option<&'static str>,
    pub tools: Vec<ToolStatus>,
}

impl SystemReport {
    pub fn collect(audio_host: Option<&'static str>) -> Self {
        let platform = Platform::current();
        let mut names = vec!["ffmpeg", "ffprobe"];
        names.extend(platform.bluetooth_tool());

        let tools = names
            .into_iter()
            .map(|name| ToolStatus {
                name,
                location: find_in_path(name),
            })
            .collect();

        Self {
            os: std::env::consts::OS,
            family: std::env::consts::FAMILY,
            arch: std::env::consts::ARCH,
            platform,
            audio_host,
            tools,
        }
    }
}

impl fmt::Display for SystemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System Information:")?;
        writeln!(f, "  OS: {} ({})", self.os, self.family)?;
        writeln!(f, "  Architecture: {}", self.arch)?;
        writeln!(f, "  Bluetooth lookup: {}", self.platform)?;
        writeln!(f, "  Audio host: {}", self.audio_host.unwrap_or("unavailable"))?;
        writeln!(f, "Required Tools:")?;
        for tool in &self.tools {
            match &tool.location {
                Some(path) => writeln!(f, "  {}: Available ({})", tool.name, path.display())?,
                None => writeln!(f, "  {}: Not Found", tool.name)?,
            }
        }
        Ok(())
    }
}
