//! Playback type definitions
//!
//! Telemetry events, run phases and the held-note record used by the scheduler.

use crate::chart::Lane;
use crate::policy::Role;
use serde::Serialize;

/// Phase of one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    WaitingForStart,
    Running,
    Finished,
    Aborted,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Finished | RunPhase::Aborted)
    }
}

/// Why a drained note produced no key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Special note type not opted in.
    SpecialNote,
    /// Player lane with no key in `key-for-lane`.
    UnmappedLane,
    /// Lane in neither the player nor the opponent set.
    UnassignedLane,
    /// Playback was paused when the note came due.
    Paused,
    /// The key device rejected the press.
    DeviceFailure,
}

/// A key currently held down by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldNote {
    /// Elapsed time (seconds since start reference) at which to release.
    pub release_time: f64,
    pub key: String,
}

/// Structured notification emitted during a run.
///
/// `time` is the note's chart time; `elapsed` is the scheduler clock when it acted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PlaybackEvent {
    RoleClassified {
        time: f64,
        lane: Lane,
        role: Role,
    },
    NoteFired {
        time: f64,
        elapsed: f64,
        lane: Lane,
        key: String,
        hold: f64,
    },
    NoteReleased {
        elapsed: f64,
        lane: Lane,
        key: String,
    },
    NoteSkipped {
        time: f64,
        lane: Lane,
        reason: SkipReason,
    },
    DeviceFailed {
        key: String,
        message: String,
    },
    Aborted {
        elapsed: f64,
        released: Vec<String>,
    },
}

/// Receiver for [`PlaybackEvent`]s.
pub trait TelemetrySink {
    fn record(&mut self, event: PlaybackEvent);
}

impl TelemetrySink for Vec<PlaybackEvent> {
    fn record(&mut self, event: PlaybackEvent) {
        self.push(event);
    }
}

/// Forwards telemetry to the `log` facade.
///
/// Fired notes go to `info` when `print_presses` is set, `debug` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink {
    pub print_presses: bool,
}

impl TelemetrySink for LogSink {
    fn record(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::RoleClassified { time, lane, role } => {
                log::trace!("[{:.3}s] lane {} -> {:?}", time, lane, role);
            }
            PlaybackEvent::NoteFired {
                elapsed, lane, key, hold, ..
            } => {
                let level = if self.print_presses {
                    log::Level::Info
                } else {
                    log::Level::Debug
                };
                log::log!(level, "[{:.3}s] Pressing: {} (lane {}, hold {:.3}s)", elapsed, key, lane, hold);
            }
            PlaybackEvent::NoteReleased { elapsed, lane, key } => {
                log::trace!("[{:.3}s] Released: {} (lane {})", elapsed, key, lane);
            }
            PlaybackEvent::NoteSkipped { time, lane, reason } => {
                log::debug!("[{:.3}s] skipped lane {}: {:?}", time, lane, reason);
            }
            PlaybackEvent::DeviceFailed { key, message } => {
                log::warn!("key device failed on '{}': {}", key, message);
            }
            PlaybackEvent::Aborted { elapsed, released } => {
                log::info!("[{:.3}s] stopped, released {:?}", elapsed, released);
            }
        }
    }
}
