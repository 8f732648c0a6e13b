//! macOS: `system_profiler` JSON report

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;

use super::{collect_names, run_tool};

pub(super) const PROGRAM: &str = "system_profiler";

pub(super) async fn connected_names() -> BTreeSet<String> {
    run_tool(PROGRAM, &["SPBluetoothDataType", "-json"])
        .await
        .map(|stdout| parse_system_profiler(&stdout))
        .unwrap_or_default()
}

/// Names of connected devices in a `SPBluetoothDataType` report
///
/// Recent releases list them under `device_connected`; older ones put every
/// known device under `device_title` with a `device_isconnected` flag.
pub fn parse_system_profiler(stdout: &str) -> BTreeSet<String> {
    let report: Value = match serde_json::from_str(stdout) {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Could not parse system_profiler output");
            return BTreeSet::new();
        }
    };

    let controllers = report
        .get("SPBluetoothDataType")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut names: Vec<&str> = Vec::new();
    for controller in controllers {
        for entry in device_entries(controller, "device_connected") {
            names.extend(entry.keys().map(String::as_str));
        }
        for entry in device_entries(controller, "device_title") {
            names.extend(
                entry
                    .iter()
                    .filter(|(_, props)| {
                        props.get("device_isconnected").and_then(Value::as_str) == Some("attrib_Yes")
                    })
                    .map(|(name, _)| name.as_str()),
            );
        }
    }

    collect_names(names)
}

fn device_entries<'a>(
    controller: &'a Value,
    key: &str,
) -> impl Iterator<Item = &'a serde_json::Map<String, Value>> {
    controller
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}
