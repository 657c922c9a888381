//! # Note Policy
//!
//! Per-note decisions made by the scheduler while draining events.
//!
//! ## Role resolution
//! Sectioned charts alternate which side is in the spotlight. When a section's must-hit flag
//! is false (and swapping is enabled for the run) the configured player and opponent lane
//! sets trade places. Events without a flag always use the configured sets.
//!
//! ## Special notes
//! - `Normal` notes are always hit
//! - `bullet` notes are always hit, whatever the configuration says
//! - any other named type is hit only if `special-note-hit` opts in; unknown types are skipped

use crate::chart::{Lane, NoteEvent, NoteType};
use crate::config::PlaybackConfig;
use serde::Serialize;
use std::collections::BTreeSet;

/// Note type that can never be disabled.
pub const BULLET: &str = "bullet";

/// Who a note belongs to after role resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Opponent,
    /// Lane in neither set.
    Unassigned,
}

/// Resolve the `(player, opponent)` lane sets that apply to `event`.
///
/// # Example
/// ```rust
/// use chartplay::{resolve, NoteEvent, PlaybackConfig};
///
/// let config = PlaybackConfig::default();
/// let note = NoteEvent::new(1.0, 5, 0.0).in_section(2, false);
///
/// let (player, opponent) = resolve(&note, &config);
/// assert!(player.contains(&5));
/// assert!(opponent.contains(&0));
/// ```
pub fn resolve<'a>(
    event: &NoteEvent,
    config: &'a PlaybackConfig,
) -> (&'a BTreeSet<Lane>, &'a BTreeSet<Lane>) {
    match event.must_hit_section {
        Some(false) if config.must_hit_swap => (&config.opponent_lanes, &config.player_lanes),
        _ => (&config.player_lanes, &config.opponent_lanes),
    }
}

/// Classify the owner of `event`'s lane.
///
/// The opponent set wins when a lane is in both, so such a lane is never pressed.
pub fn classify(event: &NoteEvent, config: &PlaybackConfig) -> Role {
    let (player, opponent) = resolve(event, config);
    if opponent.contains(&event.lane) {
        Role::Opponent
    } else if player.contains(&event.lane) {
        Role::Player
    } else {
        Role::Unassigned
    }
}

/// Decide whether a note of this type should be pressed.
pub fn should_hit(note_type: &NoteType, config: &PlaybackConfig) -> bool {
    match note_type {
        NoteType::Normal => true,
        NoteType::Named(label) if label == BULLET => true,
        NoteType::Named(label) => config.special_note_hit.get(label).copied().unwrap_or(false),
    }
}
