//! # Error Types
//!
//! This module defines the error type shared by the chart parser, the configuration
//! loader and the key device seam.
//!
//! ## Error Types
//! - `ParseError` - The chart document is not valid JSON or lacks a required structure
//! - `SectionError` - A structural problem located in one section or strum line
//! - `ConfigError` - The playback configuration is invalid
//! - `DeviceError` - The key device failed to press or release a key
//!
//! Only the first three are fatal. The scheduler logs a `DeviceError` and keeps going;
//! a lane without a key mapping is not an error at all, it is reported as a skipped note.
//!
//! ## Usage
//! ```rust
//! use chartplay::{parse, ChartFormat, ReplayError};
//!
//! match parse("{}", &ChartFormat::Sectioned) {
//!     Ok(events) => println!("{} notes", events.len()),
//!     Err(ReplayError::SectionError { section, message }) => {
//!         eprintln!("Section {}: {}", section, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    /// The chart document could not be read or has the wrong top-level shape.
    ///
    /// # Example
    /// ```
    /// # use chartplay::ReplayError;
    /// let err = ReplayError::ParseError {
    ///     message: "missing 'notes' object".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error: missing 'notes' object");
    /// ```
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// A structural problem inside one section (or strum line), with its index.
    ///
    /// # Example
    /// ```
    /// # use chartplay::ReplayError;
    /// let err = ReplayError::SectionError {
    ///     section: 3,
    ///     message: "'sectionNotes' must be a list".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Chart error at section 3: 'sectionNotes' must be a list");
    /// ```
    #[error("Chart error at section {section}: {message}")]
    SectionError { section: usize, message: String },

    /// Invalid playback configuration.
    ///
    /// # Example
    /// ```
    /// # use chartplay::ReplayError;
    /// let err = ReplayError::ConfigError("floor-hold-seconds must be positive".to_string());
    /// assert_eq!(err.to_string(), "Invalid config: floor-hold-seconds must be positive");
    /// ```
    #[error("Invalid config: {0}")]
    ConfigError(String),

    /// The key device rejected a press or release.
    #[error("Device error on key '{key}': {message}")]
    DeviceError { key: String, message: String },
}

impl ReplayError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        ReplayError::ParseError {
            message: message.into(),
        }
    }

    pub(crate) fn section(section: usize, message: impl Into<String>) -> Self {
        ReplayError::SectionError {
            section,
            message: message.into(),
        }
    }
}
