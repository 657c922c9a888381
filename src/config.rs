//! Playback configuration.
//!
//! A [`PlaybackConfig`] is built once (usually from a YAML file) and never changes during a run.
//!
//! ```yaml
//! player-lanes: [0, 1, 2, 3]
//! opponent-lanes: [4, 5, 6, 7]
//! key-for-lane: {0: a, 1: s, 2: ";", 3: "'", 4: a, 5: s, 6: ";", 7: "'"}
//! special-note-hit: {death: false, poison: false}
//! floor-hold-seconds: 0.02
//! must-hit-swap: true
//! ```

use crate::chart::Lane;
use crate::error::ReplayError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const DEFAULT_KEYS: [&str; 4] = ["a", "s", ";", "'"];

fn default_floor_hold() -> f64 {
    0.02
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlaybackConfig {
    /// Lanes the player presses when the section is must-hit (or has no flag).
    pub player_lanes: BTreeSet<Lane>,
    /// Lanes that belong to the opponent; never pressed.
    pub opponent_lanes: BTreeSet<Lane>,
    pub key_for_lane: BTreeMap<Lane, String>,
    /// Opt-in table for named special notes. `bullet` is always hit regardless.
    #[serde(default)]
    pub special_note_hit: BTreeMap<String, bool>,
    /// Minimum press duration, so zero-length taps still register.
    #[serde(default = "default_floor_hold")]
    pub floor_hold_seconds: f64,
    /// Swap player and opponent lanes in sections whose must-hit flag is false.
    #[serde(default = "default_true")]
    pub must_hit_swap: bool,
}

impl Default for PlaybackConfig {
    /// Four-key layout: lanes 0-3 player, 4-7 opponent, `a s ; '` on both halves.
    fn default() -> Self {
        let key_for_lane = (0..8)
            .map(|lane| (lane, DEFAULT_KEYS[lane as usize % 4].to_string()))
            .collect();
        let special_note_hit = [("bullet", true), ("death", false), ("poison", false)]
            .into_iter()
            .map(|(name, hit)| (name.to_string(), hit))
            .collect();

        Self {
            player_lanes: (0..4).collect(),
            opponent_lanes: (4..8).collect(),
            key_for_lane,
            special_note_hit,
            floor_hold_seconds: default_floor_hold(),
            must_hit_swap: true,
        }
    }
}

impl PlaybackConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml(content: &str) -> Result<Self, ReplayError> {
        let config: PlaybackConfig =
            serde_yaml::from_str(content).map_err(|e| ReplayError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ReplayError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, ReplayError> {
        serde_yaml::to_string(self).map_err(|e| ReplayError::ConfigError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        if !self.floor_hold_seconds.is_finite() || self.floor_hold_seconds <= 0.0 {
            return Err(ReplayError::ConfigError(format!(
                "floor-hold-seconds must be a positive number, got {}",
                self.floor_hold_seconds
            )));
        }

        if let Some(lane) = self.player_lanes.intersection(&self.opponent_lanes).next() {
            return Err(ReplayError::ConfigError(format!(
                "lane {} is listed as both player and opponent",
                lane
            )));
        }

        if let Some((lane, _)) = self.key_for_lane.iter().find(|(_, key)| key.trim().is_empty()) {
            return Err(ReplayError::ConfigError(format!(
                "lane {} is mapped to an empty key",
                lane
            )));
        }

        Ok(())
    }

    pub fn key_for(&self, lane: Lane) -> Option<&str> {
        self.key_for_lane.get(&lane).map(String::as_str)
    }

    /// Every distinct key the configuration can press.
    pub fn all_keys(&self) -> Vec<String> {
        let keys: BTreeSet<&String> = self.key_for_lane.values().collect();
        keys.into_iter().cloned().collect()
    }
}
