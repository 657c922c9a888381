pub mod chart;
pub mod config;
pub mod error;
pub mod parser;
pub mod playback;
pub mod policy;

pub use chart::*;
pub use config::PlaybackConfig;
pub use error::*;
pub use parser::{parse, parse_file, strum_line_summaries, StrumLineSummary};
pub use policy::{classify, resolve, should_hit, Role};

use std::path::Path;

/// Load a chart file and check the configuration, before anything is pressed.
///
/// Both failures are fatal: a run never starts on a chart that did not parse cleanly.
pub fn prepare(
    chart_path: impl AsRef<Path>,
    format: &ChartFormat,
    config: &PlaybackConfig,
) -> Result<Vec<NoteEvent>, ReplayError> {
    config.validate()?;
    let events = parse_file(chart_path, format)?;
    log::info!("loaded {} notes", events.len());
    Ok(events)
}
