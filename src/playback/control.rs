//! Control-signal state machine.
//!
//! A [`ControlListener`] reacts to raw key edges on its own thread and publishes two things
//! through a [`ControlHandle`]: the start reference (written once) and the cancel flag. The
//! scheduler only reads them.
//!
//! ## Variants
//! - **Strict arm**: the start key must be seen released before a press can start playback,
//!   so a key that was already held (or buffered) at launch cannot start it by accident.
//! - **Toggle**: one key starts, pauses and resumes; a stop key aborts and releases every
//!   configured key straight away.
//! - **Countdown**: playback starts a fixed delay after arming; only the abort key is watched.

use super::device::KeyDevice;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlState {
    Idle = 0,
    /// Start key seen released; the next press starts playback.
    ArmPending = 1,
    /// Start reference fixed in the future (countdown).
    Armed = 2,
    Playing = 3,
    Paused = 4,
    /// Terminal.
    Stopped = 5,
}

impl ControlState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ControlState::Idle,
            1 => ControlState::ArmPending,
            2 => ControlState::Armed,
            3 => ControlState::Playing,
            4 => ControlState::Paused,
            _ => ControlState::Stopped,
        }
    }
}

// NaN marks "no start reference yet".
const UNSET: u64 = 0x7ff8_0000_0000_0000;

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    cancelled: AtomicBool,
    start_bits: AtomicU64,
}

/// Shared view of the control state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    shared: Arc<Shared>,
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(ControlState::Idle as u8),
                cancelled: AtomicBool::new(false),
                start_bits: AtomicU64::new(UNSET),
            }),
        }
    }

    pub fn state(&self) -> ControlState {
        ControlState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Clock time playback offsets are measured from, once one has been fixed.
    pub fn start_reference(&self) -> Option<f64> {
        let bits = self.shared.start_bits.load(Ordering::Acquire);
        (bits != UNSET).then(|| f64::from_bits(bits))
    }

    /// Start reference if playback should be running at `now`.
    pub fn poll_start(&self, now: f64) -> Option<f64> {
        match self.state() {
            ControlState::Playing | ControlState::Paused => self.start_reference(),
            ControlState::Armed => self.start_reference().filter(|start| now >= *start),
            _ => None,
        }
    }

    /// Raise the cancel flag and move to `Stopped`.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        self.shared
            .state
            .store(ControlState::Stopped as u8, Ordering::Release);
    }

    fn transition(&self, from: ControlState, to: ControlState) -> bool {
        self.shared
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Fix the start reference (first writer wins), then publish `to`.
    fn start(&self, from: ControlState, to: ControlState, reference: f64) -> bool {
        if self.state() != from {
            return false;
        }
        let _ = self.shared.start_bits.compare_exchange(
            UNSET,
            reference.to_bits(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.transition(from, to)
    }
}

/// One key edge from the input hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInput {
    pub key: String,
    pub pressed: bool,
}

impl RawInput {
    pub fn down(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pressed: true,
        }
    }

    pub fn up(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pressed: false,
        }
    }

    fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMode {
    StrictArm { start_key: String, abort_key: String },
    Toggle { toggle_key: String, stop_key: String },
    Countdown { abort_key: String },
}

/// Edge-triggered listener driving a [`ControlHandle`].
pub struct ControlListener {
    mode: ControlMode,
    handle: ControlHandle,
    release_on_stop: Option<(Arc<dyn KeyDevice>, Vec<String>)>,
}

impl ControlListener {
    pub fn new(mode: ControlMode, handle: ControlHandle) -> Self {
        Self {
            mode,
            handle,
            release_on_stop: None,
        }
    }

    pub fn strict(start_key: &str, abort_key: &str, handle: ControlHandle) -> Self {
        Self::new(
            ControlMode::StrictArm {
                start_key: start_key.to_string(),
                abort_key: abort_key.to_string(),
            },
            handle,
        )
    }

    /// Toggle listener; `keys` is the full configured key set released on stop.
    pub fn toggle(
        toggle_key: &str,
        stop_key: &str,
        device: Arc<dyn KeyDevice>,
        keys: Vec<String>,
        handle: ControlHandle,
    ) -> Self {
        Self::new(
            ControlMode::Toggle {
                toggle_key: toggle_key.to_string(),
                stop_key: stop_key.to_string(),
            },
            handle,
        )
        .releasing_on_stop(device, keys)
    }

    pub fn countdown(abort_key: &str, handle: ControlHandle) -> Self {
        Self::new(
            ControlMode::Countdown {
                abort_key: abort_key.to_string(),
            },
            handle,
        )
    }

    /// Release `keys` on `device` whenever this listener stops playback.
    pub fn releasing_on_stop(mut self, device: Arc<dyn KeyDevice>, keys: Vec<String>) -> Self {
        self.release_on_stop = Some((device, keys));
        self
    }

    pub fn handle(&self) -> &ControlHandle {
        &self.handle
    }

    pub fn mode(&self) -> &ControlMode {
        &self.mode
    }

    /// Arm a countdown start at `now + delay`. Only valid from `Idle`.
    pub fn arm_countdown(&self, now: f64, delay: f64) -> bool {
        let armed = self
            .handle
            .start(ControlState::Idle, ControlState::Armed, now + delay.max(0.0));
        if armed {
            log::info!("starting in {:.1}s", delay);
        }
        armed
    }

    /// Apply one key edge observed at clock time `now`; returns the resulting state.
    pub fn handle_input(&self, input: &RawInput, now: f64) -> ControlState {
        match &self.mode {
            ControlMode::StrictArm {
                start_key,
                abort_key,
            } => {
                if input.pressed && input.is(abort_key) {
                    self.stop();
                } else if input.is(start_key) {
                    if !input.pressed {
                        if self.handle.transition(ControlState::Idle, ControlState::ArmPending) {
                            log::info!("'{}' released, press it again to start", start_key);
                        }
                    } else if self.handle.start(ControlState::ArmPending, ControlState::Playing, now) {
                        log::info!("'{}' pressed, starting playback", start_key);
                    }
                }
            }
            ControlMode::Toggle {
                toggle_key,
                stop_key,
            } => {
                if input.pressed && input.is(stop_key) {
                    self.stop();
                } else if input.pressed && input.is(toggle_key) {
                    match self.handle.state() {
                        ControlState::Idle => {
                            if self.handle.start(ControlState::Idle, ControlState::Playing, now) {
                                log::info!("[START]");
                            }
                        }
                        ControlState::Playing => {
                            if self.handle.transition(ControlState::Playing, ControlState::Paused) {
                                log::info!("[PAUSE]");
                            }
                        }
                        ControlState::Paused => {
                            if self.handle.transition(ControlState::Paused, ControlState::Playing) {
                                log::info!("[RESUME]");
                            }
                        }
                        _ => {}
                    }
                }
            }
            ControlMode::Countdown { abort_key } => {
                if input.pressed && input.is(abort_key) {
                    self.stop();
                }
            }
        }
        self.handle.state()
    }

    fn stop(&self) {
        if self.handle.state() != ControlState::Stopped {
            log::info!("[STOP] stop requested");
        }
        self.handle.cancel();

        // May race with the scheduler's own cleanup; release is idempotent.
        if let Some((device, keys)) = &self.release_on_stop {
            for key in keys {
                if let Err(e) = device.release(key) {
                    log::warn!("release of '{}' on stop failed: {}", key, e);
                }
            }
        }
    }
}
