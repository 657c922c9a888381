//! # Chart Parser
//!
//! Converts a chart document (JSON) into the canonical, time-ordered [`NoteEvent`] sequence.
//!
//! ## Formats
//! - [`ChartFormat::FlatDifficulty`] - per-difficulty lists of `{t, d, l}` records
//! - [`ChartFormat::Sectioned`] - sections with a must-hit flag and `[time, lane, sustain, type]` tuples
//! - [`ChartFormat::StrumLine`] - strum lines of `{time, id, sLen, type}` objects
//!
//! Times and sustains are milliseconds in every format and seconds in the output.
//!
//! ## Tolerance
//! Individual malformed notes (short tuples, non-numeric time or lane, negative time) are
//! dropped with a debug log. Structural problems (invalid JSON, a missing required key, a
//! field of the wrong kind) fail the whole parse; no partial result is returned.
//!
//! ## Example
//! ```rust
//! use chartplay::{parse, ChartFormat};
//!
//! let raw = r#"{"song": {"notes": [
//!     {"mustHitSection": true, "sectionNotes": [[1000, 1, 0], [500, 0, 250]]}
//! ]}}"#;
//!
//! let events = parse(raw, &ChartFormat::Sectioned)?;
//! assert_eq!(events.len(), 2);
//! assert_eq!(events[0].time_seconds, 0.5);
//! assert_eq!(events[0].sustain_seconds, 0.25);
//! # Ok::<(), chartplay::ReplayError>(())
//! ```

use crate::chart::{ChartFormat, Lane, NoteEvent, NoteType};
use crate::error::ReplayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Parse a chart document into a canonical event sequence.
///
/// The result is stably sorted by `time_seconds`: sections may be listed out of order, and
/// the scheduler relies on the ordering to drain chords in a single tick.
pub fn parse(raw: &str, format: &ChartFormat) -> Result<Vec<NoteEvent>, ReplayError> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|e| ReplayError::parse(format!("invalid JSON: {}", e)))?;

    let mut events = match format {
        ChartFormat::FlatDifficulty { difficulty } => parse_flat(&document, difficulty)?,
        ChartFormat::Sectioned => parse_sectioned(&document)?,
        ChartFormat::StrumLine { index } => parse_strum_line(&document, *index)?,
    };

    events.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
    log::debug!("parsed {} notes from {} chart", events.len(), format);
    Ok(events)
}

/// Read and parse a chart file. I/O failures are reported as parse errors.
pub fn parse_file(path: impl AsRef<Path>, format: &ChartFormat) -> Result<Vec<NoteEvent>, ReplayError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| ReplayError::parse(format!("cannot read '{}': {}", path.display(), e)))?;
    parse(&raw, format)
}

fn ms_to_seconds(ms: f64) -> f64 {
    ms / 1000.0
}

fn lane_from(value: &Value) -> Option<Lane> {
    if let Some(lane) = value.as_i64() {
        return Lane::try_from(lane).ok();
    }
    // Some editors write lanes as 1.0
    let lane = value.as_f64()?;
    if lane.fract() != 0.0 {
        return None;
    }
    Lane::try_from(lane as i64).ok()
}

// ============ Flat difficulty ============

#[derive(Deserialize)]
struct FlatNote {
    #[serde(alias = "time")]
    t: f64,
    #[serde(alias = "lane")]
    d: Lane,
    #[serde(default, alias = "length")]
    l: Option<f64>,
}

fn parse_flat(document: &Value, difficulty: &str) -> Result<Vec<NoteEvent>, ReplayError> {
    let difficulties = document
        .get("notes")
        .and_then(Value::as_object)
        .ok_or_else(|| ReplayError::parse("missing 'notes' object keyed by difficulty"))?;

    let records = difficulties.get(difficulty).ok_or_else(|| {
        let available: Vec<&str> = difficulties.keys().map(String::as_str).collect();
        ReplayError::parse(format!(
            "difficulty '{}' not found (available: {})",
            difficulty,
            available.join(", ")
        ))
    })?;

    let records = Vec::<FlatNote>::deserialize(records)
        .map_err(|e| ReplayError::parse(format!("difficulty '{}': {}", difficulty, e)))?;

    let mut events = Vec::with_capacity(records.len());
    for record in records {
        if record.t < 0.0 {
            log::debug!("dropping note with negative time {}ms", record.t);
            continue;
        }
        let sustain_ms = record.l.unwrap_or(0.0).max(0.0);
        events.push(NoteEvent::new(
            ms_to_seconds(record.t),
            record.d,
            ms_to_seconds(sustain_ms),
        ));
    }
    Ok(events)
}

// ============ Sectioned ============

fn parse_sectioned(document: &Value) -> Result<Vec<NoteEvent>, ReplayError> {
    // Wrapped charts keep everything under "song"; bare ones put "notes" at the top.
    let container = match document.get("song") {
        Some(song) if song.is_object() => song,
        _ => document,
    };

    let sections = match container.get("notes") {
        Some(Value::Array(sections)) => sections,
        Some(_) => return Err(ReplayError::parse("'notes' must be a list of sections")),
        None => return Err(ReplayError::parse("missing 'notes' list of sections")),
    };

    let mut events = Vec::new();
    for (index, section) in sections.iter().enumerate() {
        if !section.is_object() {
            return Err(ReplayError::section(index, "section must be an object"));
        }

        let must_hit = match section.get("mustHitSection") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(_) => {
                return Err(ReplayError::section(index, "'mustHitSection' must be a boolean"))
            }
        };

        let notes = match section.get("sectionNotes") {
            None | Some(Value::Null) => continue,
            Some(Value::Array(notes)) => notes,
            Some(_) => return Err(ReplayError::section(index, "'sectionNotes' must be a list")),
        };

        for raw in notes {
            match section_note(raw) {
                Some(mut event) => {
                    event.section_index = Some(index);
                    event.must_hit_section = must_hit;
                    events.push(event);
                }
                None => log::debug!("section {}: dropping malformed note {}", index, raw),
            }
        }
    }
    Ok(events)
}

/// `[time_ms, lane, sustain_ms?, type_label?]`
fn section_note(raw: &Value) -> Option<NoteEvent> {
    let fields = raw.as_array()?;
    if fields.len() < 2 {
        return None;
    }

    let time_ms = fields[0].as_f64()?;
    if time_ms < 0.0 {
        return None;
    }
    let lane = lane_from(&fields[1])?;
    let sustain_ms = fields.get(2).and_then(Value::as_f64).unwrap_or(0.0).max(0.0);
    let note_type = match fields.get(3) {
        Some(Value::String(label)) if !label.is_empty() => NoteType::Named(label.clone()),
        _ => NoteType::Normal,
    };

    Some(NoteEvent::new(ms_to_seconds(time_ms), lane, ms_to_seconds(sustain_ms)).with_type(note_type))
}

// ============ Strum lines ============

#[derive(Deserialize)]
struct StrumLineDocument {
    #[serde(rename = "strumLines")]
    strum_lines: Vec<RawStrumLine>,
    #[serde(default, rename = "noteTypes")]
    note_types: Vec<String>,
}

#[derive(Deserialize)]
struct RawStrumLine {
    #[serde(default)]
    position: Value,
    #[serde(default)]
    notes: Vec<Value>,
}

#[derive(Deserialize)]
struct StrumNote {
    time: f64,
    id: Lane,
    #[serde(default, rename = "sLen")]
    sustain: f64,
    #[serde(default, rename = "type")]
    kind: u32,
}

/// Overview of one strum line, for choosing which line to play.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrumLineSummary {
    pub index: usize,
    pub position: Option<String>,
    pub note_count: usize,
    pub lanes: BTreeSet<Lane>,
}

fn strum_line_document(document: &Value) -> Result<StrumLineDocument, ReplayError> {
    StrumLineDocument::deserialize(document)
        .map_err(|e| ReplayError::parse(format!("strum line chart: {}", e)))
}

/// List the strum lines of a strum-line chart.
pub fn strum_line_summaries(raw: &str) -> Result<Vec<StrumLineSummary>, ReplayError> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|e| ReplayError::parse(format!("invalid JSON: {}", e)))?;
    let chart = strum_line_document(&document)?;

    Ok(chart
        .strum_lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let notes: Vec<StrumNote> = line
                .notes
                .iter()
                .filter_map(|n| StrumNote::deserialize(n).ok())
                .collect();
            StrumLineSummary {
                index,
                position: line.position.as_str().map(str::to_string),
                note_count: notes.len(),
                lanes: notes.iter().map(|n| n.id).collect(),
            }
        })
        .collect())
}

fn parse_strum_line(document: &Value, index: usize) -> Result<Vec<NoteEvent>, ReplayError> {
    let chart = strum_line_document(document)?;
    let line = chart.strum_lines.get(index).ok_or_else(|| {
        ReplayError::section(
            index,
            format!("strum line out of range (chart has {})", chart.strum_lines.len()),
        )
    })?;

    let mut events = Vec::with_capacity(line.notes.len());
    for raw in &line.notes {
        let note = match StrumNote::deserialize(raw) {
            Ok(note) if note.time >= 0.0 => note,
            _ => {
                log::debug!("strum line {}: dropping malformed note {}", index, raw);
                continue;
            }
        };

        // Type 0 is a plain note; n > 0 indexes the chart's noteTypes table from 1.
        let note_type = match note.kind {
            0 => NoteType::Normal,
            n => match chart.note_types.get(n as usize - 1) {
                Some(name) => NoteType::Named(name.clone()),
                None => NoteType::Named(n.to_string()),
            },
        };

        events.push(
            NoteEvent::new(
                ms_to_seconds(note.time),
                note.id,
                ms_to_seconds(note.sustain.max(0.0)),
            )
            .with_type(note_type),
        );
    }
    Ok(events)
}
