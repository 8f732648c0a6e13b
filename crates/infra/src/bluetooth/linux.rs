//! Linux: BlueZ through `bluetoothctl`

use std::collections::BTreeSet;

use super::{collect_names, run_tool};

pub(super) const PROGRAM: &str = "bluetoothctl";

pub(super) async fn connected_names() -> BTreeSet<String> {
    run_tool(PROGRAM, &["devices", "Connected"])
        .await
        .map(|stdout| parse_bluetoothctl_devices(&stdout))
        .unwrap_or_default()
}

/// Names from `Device <address> <name>` lines; anything else is ignored
pub fn parse_bluetoothctl_devices(stdout: &str) -> BTreeSet<String> {
    collect_names(stdout.lines().filter_map(|line| {
        line.trim()
            .strip_prefix("Device ")
            .and_then(|rest| rest.split_once(' '))
            .map(|(_address, name)| name)
    }))
}
