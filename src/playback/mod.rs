//! # Playback Module
//!
//! Replay a canonical event sequence as timed key presses.
//!
//! ## Sub-modules
//! - `engine` - The [`Scheduler`]: tick loop, holds, abort cleanup
//! - `control` - The [`ControlListener`] state machine and the shared [`ControlHandle`]
//! - `clock` - [`Clock`] trait with [`SystemClock`] and [`ManualClock`]
//! - `device` - [`KeyDevice`] seam with [`LogDevice`] and [`RecordingDevice`]
//! - `types` - Telemetry events, skip reasons and run phases
//!
//! ## Threads
//! The listener runs wherever raw key edges arrive and never blocks. The scheduler runs on
//! its own thread and only sleeps for one short tick at a time. They share the
//! [`ControlHandle`] and nothing else: the listener writes the start reference once and may
//! raise the cancel flag; the scheduler reads both on every iteration.
//!
//! ## Example
//! ```rust
//! use chartplay::playback::{
//!     ControlHandle, ControlListener, ManualClock, PlaybackEvent, RawInput, RecordingDevice,
//!     RunPhase, Scheduler,
//! };
//! use chartplay::{NoteEvent, PlaybackConfig};
//! use std::sync::Arc;
//!
//! let control = ControlHandle::new();
//! let listener = ControlListener::strict("y", "t", control.clone());
//! listener.handle_input(&RawInput::up("y"), 0.0);
//! listener.handle_input(&RawInput::down("y"), 0.0);
//!
//! let device = Arc::new(RecordingDevice::new());
//! let events = vec![NoteEvent::new(0.5, 0, 0.0), NoteEvent::new(1.0, 1, 0.25)];
//! let mut scheduler = Scheduler::new(
//!     events,
//!     PlaybackConfig::default(),
//!     device.clone(),
//!     ManualClock::new(),
//!     control,
//! );
//!
//! let mut telemetry: Vec<PlaybackEvent> = Vec::new();
//! assert_eq!(scheduler.run(&mut telemetry), RunPhase::Finished);
//! assert!(device.keys_down().is_empty());
//! ```

mod clock;
mod control;
mod device;
mod engine;
mod types;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use control::{ControlHandle, ControlListener, ControlMode, ControlState, RawInput};
pub use device::{DeviceAction, KeyDevice, LogDevice, RecordingDevice};
pub use engine::Scheduler;
pub use types::{HeldNote, LogSink, PlaybackEvent, RunPhase, SkipReason, TelemetrySink};
