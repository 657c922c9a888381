//! # Chart Types
//!
//! The canonical event model every chart format is normalized into.
//!
//! ## Key Types
//! - [`NoteEvent`] - One timed lane press, with optional sustain and section context
//! - [`NoteType`] - `Normal` or a named special note (`bullet`, `death`, ...)
//! - [`ChartFormat`] - Which document layout to read, and which part of it
//!
//! A canonical sequence is sorted by `time_seconds`, with equal times kept in document order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lane index as written in the chart.
pub type Lane = i32;

/// Kind of note, as labelled by the chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Normal,
    Named(String),
}

impl NoteType {
    pub fn label(&self) -> Option<&str> {
        match self {
            NoteType::Normal => None,
            NoteType::Named(label) => Some(label),
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteType::Normal => write!(f, "normal"),
            NoteType::Named(label) => write!(f, "{}", label),
        }
    }
}

/// A single note in canonical form.
///
/// # Fields
/// - `time_seconds`: Offset from the start reference
/// - `lane`: Lane index as written in the chart
/// - `sustain_seconds`: How long the key stays down (0 for a tap)
/// - `note_type`: Normal or named special note
/// - `section_index`: Index of the source section (sectioned charts only)
/// - `must_hit_section`: Must-hit flag of the source section (sectioned charts only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub time_seconds: f64,
    pub lane: Lane,
    pub sustain_seconds: f64,
    pub note_type: NoteType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_hit_section: Option<bool>,
}

impl NoteEvent {
    /// A normal note with no section context.
    pub fn new(time_seconds: f64, lane: Lane, sustain_seconds: f64) -> Self {
        Self {
            time_seconds,
            lane,
            sustain_seconds,
            note_type: NoteType::Normal,
            section_index: None,
            must_hit_section: None,
        }
    }

    pub fn with_type(mut self, note_type: NoteType) -> Self {
        self.note_type = note_type;
        self
    }

    pub fn in_section(mut self, section_index: usize, must_hit: bool) -> Self {
        self.section_index = Some(section_index);
        self.must_hit_section = Some(must_hit);
        self
    }
}

impl fmt::Display for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}s lane {} hold {:.3}s {}",
            self.time_seconds, self.lane, self.sustain_seconds, self.note_type
        )?;
        if let (Some(section), Some(must_hit)) = (self.section_index, self.must_hit_section) {
            write!(f, " (section {}, must-hit {})", section, must_hit)?;
        }
        Ok(())
    }
}

/// Chart document layout.
///
/// The set of formats is closed: a new layout is a new variant here and a new arm in
/// [`crate::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartFormat {
    /// `{"notes": {"<difficulty>": [{"t", "d", "l"}, ...]}}`. No section context.
    FlatDifficulty { difficulty: String },
    /// `{"song": {"notes": [{"mustHitSection", "sectionNotes": [[t, lane, sus, type]]}]}}`.
    Sectioned,
    /// `{"strumLines": [{"notes": [{"time", "id", "sLen", "type"}]}]}`, one line selected.
    StrumLine { index: usize },
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartFormat::FlatDifficulty { difficulty } => write!(f, "flat ({})", difficulty),
            ChartFormat::Sectioned => write!(f, "sectioned"),
            ChartFormat::StrumLine { index } => write!(f, "strum line {}", index),
        }
    }
}
