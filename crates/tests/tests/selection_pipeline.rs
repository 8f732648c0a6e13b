//! Integration tests for automatic device selection
//!
//! Names come from the same parsers the CLI runs on real tool output, so
//! these cover the path from `bluetoothctl`/PowerShell text to verified
//! playback targets.

use std::collections::BTreeSet;

use bluecast_core::domain::audio::{BluetoothNameResolver, DeviceCatalog, PcmFormat};
use bluecast_core::domain::selector::{resolve_manual_targets, DeviceSelector, ScoringRules};
use bluecast_infra::bluetooth::{parse_bluetoothctl_devices, parse_pnp_friendly_names};
use bluecast_tests::{handles, FixedNames, ScriptedProber, StaticCatalog};
use proptest::prelude::*;

fn windows_catalog() -> StaticCatalog {
    StaticCatalog(handles(&[
        (0, "Speakers (Realtek High Definition Audio)"),
        (2, "Headset Hands-Free (Bose Speaker)"),
        (3, "Stereo Headphones (Bose Speaker)"),
        (4, "Headphones (Bose Speaker)"),
        (5, "Speakers (JBL Flip 5)"),
        (6, "Headset (JBL Flip 5)"),
    ]))
}

// ============================================================================
// AUTOMATIC SELECTION
// ============================================================================

#[tokio::test]
async fn test_one_device_per_physical_speaker() {
    let names = FixedNames::new(&["Bose Speaker", "JBL Flip 5"])
        .active_device_names()
        .await;
    let catalog = windows_catalog().enumerate().unwrap();

    let selected = DeviceSelector::default().select(&names, &catalog, &ScriptedProber::default());

    let indices: Vec<_> = selected.iter().map(|d| d.handle().index).collect();
    assert_eq!(indices, vec![3, 5]);

    let scores: Vec<_> = selected.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![10, 0]);
}

#[tokio::test]
async fn test_group_suffix_splits_base_names() {
    let names = FixedNames::new(&["WH-1000XM4"]).active_device_names().await;
    let catalog = handles(&[
        (1, "Headset (WH-1000XM4 Hands-Free)"),
        (7, "Stereo Headphones (WH-1000XM4)"),
        (8, "Headset Hands-Free (WH-1000XM4)"),
    ]);

    let selected = DeviceSelector::default().select(&names, &catalog, &ScriptedProber::default());

    // "WH-1000XM4 Hands-Free" is its own group
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0].handle().index, 1);
    assert_eq!(selected[0].score, -8);
    assert_eq!(selected[1].handle().index, 7);
    assert_eq!(selected[1].candidate.base_name(), "WH-1000XM4");
}

#[test]
fn test_bluetoothctl_output_drives_selection() {
    let stdout = "Device 00:1B:66:AA:BB:CC JBL Flip 5\nDevice 4C:87:5D:11:22:33 Bose Speaker\n";
    let names = parse_bluetoothctl_devices(stdout);
    let catalog = handles(&[
        (0, "Built-in Audio Analog Stereo"),
        (1, "JBL Flip 5"),
        (2, "Bose Speaker"),
    ]);

    let selected = DeviceSelector::default().select(&names, &catalog, &ScriptedProber::default());

    let indices: Vec<_> = selected.iter().map(|d| d.handle().index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[test]
fn test_pnp_output_drives_selection() {
    let stdout = "\r\nFriendlyName\r\n------------\r\nBose Speaker\r\n   \r\nBose Speaker Avrcp Transport\r\n";
    let names = parse_pnp_friendly_names(stdout);
    let catalog = windows_catalog().0;

    let selected = DeviceSelector::default().select(&names, &catalog, &ScriptedProber::default());

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].handle().index, 3);
    assert_eq!(selected[0].candidate.matched_name, "Bose Speaker");
}

#[test]
fn test_silent_devices_are_skipped() {
    let names = BTreeSet::from(["JBL Flip 5".to_string(), "Bose Speaker".to_string()]);
    let catalog = windows_catalog().0;
    let prober = ScriptedProber { dead: vec![3] };

    let selected = DeviceSelector::default().select(&names, &catalog, &prober);

    // The runner-up endpoint of a silent speaker is not tried
    let indices: Vec<_> = selected.iter().map(|d| d.handle().index).collect();
    assert_eq!(indices, vec![5]);
}

#[test]
fn test_no_connected_names_selects_nothing() {
    let selected = DeviceSelector::default().select(
        &BTreeSet::new(),
        &windows_catalog().0,
        &ScriptedProber::default(),
    );
    assert!(selected.is_empty());
}

#[test]
fn test_neutral_rules_keep_first_endpoint() {
    let names = BTreeSet::from(["WH-1000XM4".to_string()]);
    let catalog = handles(&[
        (1, "Headset (WH-1000XM4)"),
        (7, "Stereo Headphones (WH-1000XM4)"),
    ]);
    let rules = ScoringRules {
        prefer_stereo: false,
        avoid_hands_free: false,
    };

    let selected = DeviceSelector::new(rules)
        .with_probe_format(PcmFormat {
            sample_width_bytes: 2,
            channels: 1,
            sample_rate_hz: 48000,
        })
        .select(&names, &catalog, &ScriptedProber::default());

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].handle().index, 1);
    assert_eq!(selected[0].score, 0);
}

// ============================================================================
// MANUAL SELECTION
// ============================================================================

#[test]
fn test_manual_indices_bypass_detection() {
    let catalog = windows_catalog().0;

    let targets = resolve_manual_targets(&[2, 5], &catalog).unwrap();

    let indices: Vec<_> = targets.iter().map(|d| d.index).collect();
    assert_eq!(indices, vec![2, 5]);
}

#[test]
fn test_manual_indices_keep_valid_subset() {
    let catalog = windows_catalog().0;

    let targets = resolve_manual_targets(&[99, 4, 1], &catalog).unwrap();

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].display_name, "Headphones (Bose Speaker)");
}

#[test]
fn test_manual_indices_none_valid() {
    assert!(resolve_manual_targets(&[1, 99], &windows_catalog().0).is_err());
}

proptest! {
    #[test]
    fn prop_selection_is_a_subset_of_the_catalog(
        dead in prop::collection::vec(0usize..8, 0..4),
        pick_bose in any::<bool>(),
        pick_jbl in any::<bool>(),
    ) {
        let mut names = BTreeSet::new();
        if pick_bose {
            names.insert("bose speaker".to_string());
        }
        if pick_jbl {
            names.insert("JBL FLIP 5".to_string());
        }
        let catalog = windows_catalog().0;
        let prober = ScriptedProber { dead: dead.clone() };

        let selected = DeviceSelector::default().select(&names, &catalog, &prober);

        for device in &selected {
            prop_assert!(catalog.contains(device.handle()));
            prop_assert!(!dead.contains(&device.handle().index));
        }
        let mut bases: Vec<_> = selected.iter().map(|d| d.candidate.base_name()).collect();
        let before = bases.len();
        bases.sort_unstable();
        bases.dedup();
        prop_assert_eq!(before, bases.len());
    }
}
