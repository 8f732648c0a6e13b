//! Bluetooth device selection
//!
//! Bluetooth stacks commonly expose one physical speaker as several logical
//! sinks (a hands-free profile endpoint next to an A2DP stereo endpoint, for
//! instance). Selection runs in five stages:
//!
//! 1. **Match** catalog entries against connected Bluetooth names
//! 2. **Group** the matches by base name
//! 3. **Score** each candidate from its display name
//! 4. **Pick** the best candidate of every group
//! 5. **Verify** each pick by opening a probe stream
//!
//! Every stage is exposed on its own so callers can report intermediate
//! results; [`DeviceSelector::select`] runs them all.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::audio::{AudioError, DeviceHandle, DeviceProber, PcmFormat, Result};
use super::config::DetectionConfig;

const STEREO_BONUS: i32 = 10;
const HANDS_FREE_PENALTY: i32 = -5;
const HEADSET_PENALTY: i32 = -3;

/// Catalog entry whose display name contains a connected Bluetooth name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDevice {
    pub handle: DeviceHandle,
    pub matched_name: String,
}

impl CandidateDevice {
    pub fn base_name(&self) -> &str {
        base_device_name(&self.handle.display_name)
    }
}

/// Candidates that share a base name, in catalog order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDeviceGroup {
    pub base_name: String,
    pub members: Vec<CandidateDevice>,
}

/// The winning, verified candidate for one physical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedDevice {
    pub candidate: CandidateDevice,
    pub score: i32,
}

impl SelectedDevice {
    pub fn handle(&self) -> &DeviceHandle {
        &self.candidate.handle
    }
}

/// Extract the name of the physical device from an endpoint display name
///
/// The content of the last innermost parenthesized group wins, so
/// `"Headphones (My Speaker)"` yields `"My Speaker"`. Names without a
/// non-blank group are their own base name.
pub fn base_device_name(display_name: &str) -> &str {
    let mut end = display_name.len();

    while let Some(close) = display_name[..end].rfind(')') {
        let head = &display_name[..close];
        if let Some(open) = head.rfind(|c: char| c == '(' || c == ')') {
            if head[open..].starts_with('(') {
                let inner = head[open + 1..].trim();
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
        end = close;
    }

    display_name
}

/// Additive preferences applied to endpoint display names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRules {
    /// Reward endpoints advertising stereo playback
    pub prefer_stereo: bool,
    /// Penalize hands-free and headset profile endpoints
    pub avoid_hands_free: bool,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            prefer_stereo: true,
            avoid_hands_free: true,
        }
    }
}

impl From<&DetectionConfig> for ScoringRules {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            prefer_stereo: config.prefer_stereo,
            avoid_hands_free: config.avoid_hands_free,
        }
    }
}

impl ScoringRules {
    pub fn score(&self, display_name: &str) -> i32 {
        let name = display_name.to_lowercase();
        let mut score = 0;

        if self.prefer_stereo && name.contains("stereo") {
            score += STEREO_BONUS;
        }
        if self.avoid_hands_free {
            if name.contains("hands-free") {
                score += HANDS_FREE_PENALTY;
            }
            if name.contains("headset") {
                score += HEADSET_PENALTY;
            }
        }

        score
    }
}

/// Turns connected Bluetooth names and an enumeration pass into playable devices
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    rules: ScoringRules,
    probe_format: PcmFormat,
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::new(ScoringRules::default())
    }
}

impl DeviceSelector {
    pub fn new(rules: ScoringRules) -> Self {
        Self {
            rules,
            probe_format: PcmFormat::STANDARD,
        }
    }

    /// Probe candidates with `format` instead of the standard stereo format
    pub fn with_probe_format(mut self, format: PcmFormat) -> Self {
        self.probe_format = format;
        self
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn probe_format(&self) -> &PcmFormat {
        &self.probe_format
    }

    /// Run every stage and return the verified devices, one per base name
    pub fn select(
        &self,
        names: &BTreeSet<String>,
        catalog: &[DeviceHandle],
        prober: &dyn DeviceProber,
    ) -> Vec<SelectedDevice> {
        let candidates = self.match_candidates(names, catalog);
        let groups = self.group_by_base_name(candidates);
        let picked = self.pick_best(&groups);
        self.verify(picked, prober)
    }

    /// Case-insensitive substring match; the first matching name claims a handle
    pub fn match_candidates(
        &self,
        names: &BTreeSet<String>,
        catalog: &[DeviceHandle],
    ) -> Vec<CandidateDevice> {
        let needles: Vec<(&str, String)> = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| (name, name.to_lowercase()))
            .collect();

        catalog
            .iter()
            .filter_map(|handle| {
                let haystack = handle.display_name.to_lowercase();
                needles
                    .iter()
                    .find(|(_, needle)| haystack.contains(needle.as_str()))
                    .map(|(name, _)| {
                        debug!(
                            device = handle.index,
                            bluetooth_name = %name,
                            "Matched with Bluetooth device"
                        );
                        CandidateDevice {
                            handle: handle.clone(),
                            matched_name: name.to_string(),
                        }
                    })
            })
            .collect()
    }

    /// Partition candidates by base name, keeping first-seen group order
    pub fn group_by_base_name(&self, candidates: Vec<CandidateDevice>) -> Vec<BaseDeviceGroup> {
        let mut groups: Vec<BaseDeviceGroup> = Vec::new();

        for candidate in candidates {
            let base_name = candidate.base_name().to_string();
            match groups.iter_mut().find(|group| group.base_name == base_name) {
                Some(group) => group.members.push(candidate),
                None => groups.push(BaseDeviceGroup {
                    base_name,
                    members: vec![candidate],
                }),
            }
        }

        groups
    }

    /// Highest score per group; ties go to the earliest member
    pub fn pick_best(&self, groups: &[BaseDeviceGroup]) -> Vec<(CandidateDevice, i32)> {
        groups
            .iter()
            .filter_map(|group| {
                let mut best: Option<(&CandidateDevice, i32)> = None;
                for member in &group.members {
                    let score = self.rules.score(&member.handle.display_name);
                    if best.map_or(true, |(_, top)| score > top) {
                        best = Some((member, score));
                    }
                }
                best.map(|(candidate, score)| {
                    debug!(
                        base_name = %group.base_name,
                        device = candidate.handle.index,
                        score,
                        "Picked best instance"
                    );
                    (candidate.clone(), score)
                })
            })
            .collect()
    }

    /// Keep the picks that accept a probe stream; failures are logged and dropped
    pub fn verify(
        &self,
        picked: Vec<(CandidateDevice, i32)>,
        prober: &dyn DeviceProber,
    ) -> Vec<SelectedDevice> {
        picked
            .into_iter()
            .filter_map(|(candidate, score)| {
                match prober.probe(&candidate.handle, &self.probe_format) {
                    Ok(()) => {
                        info!("  {} - CONNECTION VERIFIED", candidate.handle);
                        Some(SelectedDevice { candidate, score })
                    }
                    Err(e) => {
                        warn!(error = %e, "  {} - NOT RESPONDING (SKIPPED)", candidate.handle);
                        None
                    }
                }
            })
            .collect()
    }
}

/// Parse a `--device-indices` value such as `"2, 5"`
///
/// Surrounding whitespace is ignored per item; anything that is not a
/// non-negative integer rejects the whole list.
pub fn parse_device_indices(raw: &str) -> Result<Vec<usize>> {
    raw.split(',')
        .map(|item| item.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            debug!(value = raw, error = %e, "Rejected device index list");
            AudioError::InvalidConfiguration(
                "Device indices must be comma-separated integers".to_string(),
            )
        })
}

/// Resolve user-supplied indices against an enumeration pass
///
/// Unknown indices are warned about and skipped; only an empty result is an
/// error.
pub fn resolve_manual_targets(indices: &[usize], catalog: &[DeviceHandle]) -> Result<Vec<DeviceHandle>> {
    let mut targets: Vec<DeviceHandle> = Vec::new();

    for &index in indices {
        match catalog.iter().find(|handle| handle.index == index) {
            Some(handle) if !targets.contains(handle) => targets.push(handle.clone()),
            Some(_) => debug!(device = index, "Ignoring repeated device index"),
            None => warn!(device = index, "Device index {} not found", index),
        }
    }

    if targets.is_empty() {
        return Err(AudioError::NoDevicesSelected);
    }

    Ok(targets)
}
