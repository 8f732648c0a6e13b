//! Windows: Plug and Play registry through PowerShell

use std::collections::BTreeSet;

use super::{collect_names, run_tool};

pub(super) const PROGRAM: &str = "powershell";

const QUERY: &str = "Get-PnpDevice | Where-Object { $_.Class -eq 'Bluetooth' -and $_.Status -eq 'OK' -and $_.ConfigManagerErrorCode -eq 0 } | Select-Object FriendlyName";

pub(super) async fn connected_names() -> BTreeSet<String> {
    run_tool(PROGRAM, &["-NoProfile", "-Command", QUERY])
        .await
        .map(|stdout| parse_pnp_friendly_names(&stdout))
        .unwrap_or_default()
}

/// Names from the `FriendlyName` table printed by `Select-Object`
pub fn parse_pnp_friendly_names(stdout: &str) -> BTreeSet<String> {
    collect_names(stdout.lines().map(str::trim).filter(|line| {
        !line.starts_with("FriendlyName") && !line.starts_with('-')
    }))
}
