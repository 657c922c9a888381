//! Real-time playback scheduler
//!
//! Replays a canonical event sequence against a [`KeyDevice`], measuring every event from the
//! start reference published by the control listener.
//!
//! # Tick
//! 1. Release held notes whose release time has passed
//! 2. If the cancel flag is up, release everything still held and stop
//! 3. Drain every event that is due, in order (chords fire in the same tick)
//! 4. Finish once no events remain and nothing is held
//!
//! Between ticks the scheduler sleeps `tick_interval` (1 ms by default), which bounds both the
//! timing error and the abort latency.

use super::clock::Clock;
use super::control::{ControlHandle, ControlState};
use super::device::KeyDevice;
use super::types::{HeldNote, PlaybackEvent, RunPhase, SkipReason, TelemetrySink};
use crate::chart::{Lane, NoteEvent};
use crate::config::PlaybackConfig;
use crate::error::ReplayError;
use crate::policy::{self, Role};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1);
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// What to do with one drained event.
enum Action {
    /// Opponent note: telemetry only.
    Observe,
    Skip(SkipReason),
    Press { key: String, hold: f64 },
}

pub struct Scheduler<C: Clock> {
    events: Vec<NoteEvent>,
    cursor: usize,
    config: PlaybackConfig,
    device: Arc<dyn KeyDevice>,
    clock: C,
    control: ControlHandle,
    held: BTreeMap<Lane, HeldNote>,
    phase: RunPhase,
    tick_interval: Duration,
    wait_interval: Duration,
}

impl<C: Clock> Scheduler<C> {
    /// Create a scheduler. `events` are stably sorted by time if they are not already.
    pub fn new(
        mut events: Vec<NoteEvent>,
        config: PlaybackConfig,
        device: Arc<dyn KeyDevice>,
        clock: C,
        control: ControlHandle,
    ) -> Self {
        events.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
        Self {
            events,
            cursor: 0,
            config,
            device,
            clock,
            control,
            held: BTreeMap::new(),
            phase: RunPhase::WaitingForStart,
            tick_interval: DEFAULT_TICK_INTERVAL,
            wait_interval: DEFAULT_WAIT_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn held(&self) -> &BTreeMap<Lane, HeldNote> {
        &self.held
    }

    /// Events not yet drained.
    pub fn remaining(&self) -> usize {
        self.events.len() - self.cursor
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Wait for the start signal, then tick until the chart finishes or is aborted.
    pub fn run(&mut self, sink: &mut dyn TelemetrySink) -> RunPhase {
        if self.phase.is_terminal() {
            return self.phase;
        }

        let Some(start) = self.wait_for_start() else {
            log::info!("aborted before start");
            self.phase = RunPhase::Aborted;
            sink.record(PlaybackEvent::Aborted {
                elapsed: 0.0,
                released: Vec::new(),
            });
            return self.phase;
        };

        log::info!("playback started ({} notes)", self.events.len());
        self.phase = RunPhase::Running;
        loop {
            let elapsed = self.clock.now() - start;
            let phase = self.tick(elapsed, sink);
            if phase.is_terminal() {
                return phase;
            }
            self.clock.sleep(self.tick_interval);
        }
    }

    fn wait_for_start(&mut self) -> Option<f64> {
        self.phase = RunPhase::WaitingForStart;
        loop {
            if self.control.is_cancelled() {
                return None;
            }
            if let Some(start) = self.control.poll_start(self.clock.now()) {
                return Some(start);
            }
            self.clock.sleep(self.wait_interval);
        }
    }

    /// Advance playback to `elapsed` seconds past the start reference.
    pub fn tick(&mut self, elapsed: f64, sink: &mut dyn TelemetrySink) -> RunPhase {
        if self.phase.is_terminal() {
            return self.phase;
        }
        self.phase = RunPhase::Running;

        // Releases first, so a sustain ending as a new note starts frees its key.
        self.release_due(elapsed, sink);

        if self.control.is_cancelled() {
            self.abort(elapsed, sink);
            return self.phase;
        }

        self.drain(elapsed, sink);

        if self.cursor >= self.events.len() && self.held.is_empty() {
            log::info!("all notes played");
            self.phase = RunPhase::Finished;
        }
        self.phase
    }

    /// Release every held key and end the run as `Aborted`.
    pub fn abort(&mut self, elapsed: f64, sink: &mut dyn TelemetrySink) {
        let held = std::mem::take(&mut self.held);
        let mut released = Vec::with_capacity(held.len());
        for (lane, note) in held {
            // Each key is attempted even when an earlier release failed.
            release_key(self.device.as_ref(), lane, &note.key, elapsed, sink);
            released.push(note.key);
        }
        self.phase = RunPhase::Aborted;
        sink.record(PlaybackEvent::Aborted { elapsed, released });
    }

    fn release_due(&mut self, elapsed: f64, sink: &mut dyn TelemetrySink) {
        let device = self.device.as_ref();
        self.held.retain(|lane, note| {
            if note.release_time <= elapsed {
                release_key(device, *lane, &note.key, elapsed, sink);
                false
            } else {
                true
            }
        });
    }

    fn drain(&mut self, elapsed: f64, sink: &mut dyn TelemetrySink) {
        let paused = self.control.state() == ControlState::Paused;

        while let Some(event) = self.events.get(self.cursor) {
            if event.time_seconds > elapsed {
                break;
            }
            let (time, lane) = (event.time_seconds, event.lane);
            let role = policy::classify(event, &self.config);
            sink.record(PlaybackEvent::RoleClassified { time, lane, role });

            let action = match role {
                Role::Opponent => Action::Observe,
                Role::Unassigned => Action::Skip(SkipReason::UnassignedLane),
                Role::Player if paused => Action::Skip(SkipReason::Paused),
                Role::Player if !policy::should_hit(&event.note_type, &self.config) => {
                    Action::Skip(SkipReason::SpecialNote)
                }
                Role::Player => match self.config.key_for(lane) {
                    Some(key) => Action::Press {
                        key: key.to_string(),
                        hold: self.config.floor_hold_seconds.max(event.sustain_seconds),
                    },
                    None => Action::Skip(SkipReason::UnmappedLane),
                },
            };
            self.cursor += 1;

            match action {
                Action::Observe => {}
                Action::Skip(reason) => sink.record(PlaybackEvent::NoteSkipped { time, lane, reason }),
                Action::Press { key, hold } => self.press(time, lane, key, hold, elapsed, sink),
            }
        }
    }

    fn press(
        &mut self,
        time: f64,
        lane: Lane,
        key: String,
        hold: f64,
        elapsed: f64,
        sink: &mut dyn TelemetrySink,
    ) {
        // A key still down, on this lane or another lane mapped to it, is released before
        // the new press so the press produces a fresh key-down edge.
        let restarted: Vec<Lane> = self
            .held
            .iter()
            .filter(|(held_lane, note)| **held_lane == lane || note.key == key)
            .map(|(held_lane, _)| *held_lane)
            .collect();
        for held_lane in restarted {
            if let Some(previous) = self.held.remove(&held_lane) {
                release_key(self.device.as_ref(), held_lane, &previous.key, elapsed, sink);
            }
        }

        match self.device.press(&key) {
            Ok(()) => {
                sink.record(PlaybackEvent::NoteFired {
                    time,
                    elapsed,
                    lane,
                    key: key.clone(),
                    hold,
                });
                self.held.insert(
                    lane,
                    HeldNote {
                        release_time: elapsed + hold,
                        key,
                    },
                );
            }
            Err(e) => {
                report_failure(&key, &e, sink);
                sink.record(PlaybackEvent::NoteSkipped {
                    time,
                    lane,
                    reason: SkipReason::DeviceFailure,
                });
            }
        }
    }
}

impl<C: Clock> Drop for Scheduler<C> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        log::warn!("scheduler dropped with {} keys down, releasing", self.held.len());
        for (_, note) in std::mem::take(&mut self.held) {
            if let Err(e) = self.device.release(&note.key) {
                log::warn!("release of '{}' failed: {}", note.key, e);
            }
        }
    }
}

fn release_key(
    device: &dyn KeyDevice,
    lane: Lane,
    key: &str,
    elapsed: f64,
    sink: &mut dyn TelemetrySink,
) {
    match device.release(key) {
        Ok(()) => sink.record(PlaybackEvent::NoteReleased {
            elapsed,
            lane,
            key: key.to_string(),
        }),
        Err(e) => report_failure(key, &e, sink),
    }
}

fn report_failure(key: &str, error: &ReplayError, sink: &mut dyn TelemetrySink) {
    log::warn!("{}", error);
    sink.record(PlaybackEvent::DeviceFailed {
        key: key.to_string(),
        message: error.to_string(),
    });
}
