use super::*;
use crate::chart::{NoteEvent, NoteType};
use crate::config::PlaybackConfig;
use crate::error::ReplayError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn config() -> PlaybackConfig {
    PlaybackConfig {
        player_lanes: BTreeSet::from([0, 1, 2, 3]),
        opponent_lanes: BTreeSet::from([4, 5, 6, 7]),
        key_for_lane: BTreeMap::from([
            (0, "a".to_string()),
            (1, "s".to_string()),
            (2, "d".to_string()),
            (5, "k".to_string()),
        ]),
        special_note_hit: BTreeMap::from([("bullet".to_string(), false)]),
        floor_hold_seconds: 0.02,
        must_hit_swap: true,
    }
}

fn scheduler(
    events: Vec<NoteEvent>,
    device: &Arc<RecordingDevice>,
    control: &ControlHandle,
) -> Scheduler<ManualClock> {
    Scheduler::new(
        events,
        config(),
        device.clone(),
        ManualClock::new(),
        control.clone(),
    )
}

fn playing() -> ControlHandle {
    let control = ControlHandle::new();
    let listener = ControlListener::strict("y", "t", control.clone());
    listener.handle_input(&RawInput::up("y"), 0.0);
    listener.handle_input(&RawInput::down("y"), 0.0);
    control
}

fn fired_lanes(telemetry: &[PlaybackEvent]) -> Vec<i32> {
    telemetry
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::NoteFired { lane, .. } => Some(*lane),
            _ => None,
        })
        .collect()
}

fn skipped(telemetry: &[PlaybackEvent]) -> Vec<(i32, SkipReason)> {
    telemetry
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::NoteSkipped { lane, reason, .. } => Some((*lane, *reason)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_chord_and_sustain_walkthrough() {
    let events = vec![
        NoteEvent::new(0.50, 0, 0.0),
        NoteEvent::new(0.50, 1, 0.0),
        NoteEvent::new(1.00, 0, 0.5),
    ];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    assert_eq!(scheduler.tick(0.49, &mut telemetry), RunPhase::Running);
    assert!(device.actions().is_empty());

    // Both chord notes fire in one tick, in chart order, held for the floor.
    scheduler.tick(0.50, &mut telemetry);
    assert_eq!(
        device.actions(),
        vec![DeviceAction::Press("a".into()), DeviceAction::Press("s".into())]
    );
    assert_eq!(scheduler.held().len(), 2);
    for note in scheduler.held().values() {
        assert!((note.release_time - 0.52).abs() < 1e-9);
    }

    scheduler.tick(0.53, &mut telemetry);
    assert!(scheduler.held().is_empty());
    assert!(device.keys_down().is_empty());

    scheduler.tick(1.00, &mut telemetry);
    assert_eq!(scheduler.held()[&0].release_time, 1.5);
    assert_eq!(device.keys_down(), BTreeSet::from(["a".to_string()]));

    assert_eq!(scheduler.tick(1.49, &mut telemetry), RunPhase::Running);
    assert_eq!(device.keys_down().len(), 1);

    assert_eq!(scheduler.tick(1.50, &mut telemetry), RunPhase::Finished);
    assert!(device.keys_down().is_empty());
    assert_eq!(fired_lanes(&telemetry), vec![0, 1, 0]);
}

#[test]
fn test_zero_sustain_uses_floor_hold() {
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(vec![NoteEvent::new(0.0, 2, 0.0)], &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.0, &mut telemetry);
    match &telemetry[1] {
        PlaybackEvent::NoteFired { hold, .. } => assert_eq!(*hold, 0.02),
        other => panic!("expected a fired note, got {:?}", other),
    }
    assert_eq!(scheduler.held()[&2].release_time, 0.02);
}

#[test]
fn test_release_runs_before_press_on_same_key() {
    // Sustain on lane 0 ends exactly when the next lane-0 note starts.
    let events = vec![NoteEvent::new(0.0, 0, 0.5), NoteEvent::new(0.5, 0, 0.0)];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.0, &mut telemetry);
    scheduler.tick(0.5, &mut telemetry);
    assert_eq!(
        device.actions(),
        vec![
            DeviceAction::Press("a".into()),
            DeviceAction::Release("a".into()),
            DeviceAction::Press("a".into()),
        ]
    );
    assert_eq!(device.keys_down().len(), 1);
}

#[test]
fn test_new_note_on_held_lane_restarts_press() {
    let events = vec![NoteEvent::new(0.0, 1, 2.0), NoteEvent::new(1.0, 1, 0.0)];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.0, &mut telemetry);
    scheduler.tick(1.0, &mut telemetry);
    assert_eq!(device.actions().len(), 3);
    assert!((scheduler.held()[&1].release_time - 1.02).abs() < 1e-9);
}

#[test]
fn test_note_on_lane_sharing_a_held_key_restarts_press() {
    // Default layout maps lanes 0 and 4 to the same key.
    let events = vec![
        NoteEvent::new(0.0, 0, 1.0).in_section(0, true),
        NoteEvent::new(0.5, 4, 0.0).in_section(1, false),
    ];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = Scheduler::new(
        events,
        PlaybackConfig::default(),
        device.clone(),
        ManualClock::new(),
        control,
    );
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.0, &mut telemetry);
    scheduler.tick(0.5, &mut telemetry);
    assert_eq!(
        device.actions(),
        vec![
            DeviceAction::Press("a".into()),
            DeviceAction::Release("a".into()),
            DeviceAction::Press("a".into()),
        ]
    );
    assert_eq!(scheduler.held().keys().copied().collect::<Vec<_>>(), vec![4]);

    scheduler.tick(0.6, &mut telemetry);
    assert!(scheduler.held().is_empty());
    assert!(device.keys_down().is_empty());

    // Nothing is left to release once the lane 0 sustain would have ended.
    assert_eq!(scheduler.tick(1.0, &mut telemetry), RunPhase::Finished);
    assert_eq!(device.actions().len(), 4);
}

#[test]
fn test_opponent_notes_are_only_observed() {
    let events = vec![NoteEvent::new(0.1, 4, 0.0), NoteEvent::new(0.1, 6, 1.0)];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    assert_eq!(scheduler.tick(0.2, &mut telemetry), RunPhase::Finished);
    assert!(device.actions().is_empty());
    assert_eq!(
        telemetry,
        vec![
            PlaybackEvent::RoleClassified {
                time: 0.1,
                lane: 4,
                role: crate::policy::Role::Opponent,
            },
            PlaybackEvent::RoleClassified {
                time: 0.1,
                lane: 6,
                role: crate::policy::Role::Opponent,
            },
        ]
    );
}

#[test]
fn test_section_swap_moves_player_to_other_half() {
    let events = vec![
        NoteEvent::new(0.1, 5, 0.0).in_section(0, false),
        NoteEvent::new(0.1, 1, 0.0).in_section(0, false),
        NoteEvent::new(0.2, 1, 0.0).in_section(1, true),
    ];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.3, &mut telemetry);
    assert_eq!(fired_lanes(&telemetry), vec![5, 1]);
    assert_eq!(
        device.actions()[..2],
        [DeviceAction::Press("k".into()), DeviceAction::Press("s".into())]
    );
}

#[test]
fn test_unmapped_and_unassigned_lanes_are_skipped() {
    let events = vec![
        NoteEvent::new(0.1, 3, 0.0),
        NoteEvent::new(0.1, 9, 0.0),
        NoteEvent::new(0.2, 0, 0.0),
    ];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.2, &mut telemetry);
    assert_eq!(
        skipped(&telemetry),
        vec![(3, SkipReason::UnmappedLane), (9, SkipReason::UnassignedLane)]
    );
    assert_eq!(fired_lanes(&telemetry), vec![0]);
}

#[test]
fn test_special_notes() {
    let events = vec![
        NoteEvent::new(0.1, 0, 0.0).with_type(NoteType::Named("death".into())),
        NoteEvent::new(0.1, 1, 0.0).with_type(NoteType::Named("bullet".into())),
    ];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.1, &mut telemetry);
    assert_eq!(skipped(&telemetry), vec![(0, SkipReason::SpecialNote)]);
    assert_eq!(device.actions(), vec![DeviceAction::Press("s".into())]);
}

#[test]
fn test_abort_releases_every_held_key() {
    let events = vec![
        NoteEvent::new(0.0, 0, 5.0),
        NoteEvent::new(0.0, 1, 5.0),
        NoteEvent::new(0.0, 2, 0.0),
        NoteEvent::new(3.0, 2, 0.0),
    ];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.0, &mut telemetry);
    scheduler.tick(1.0, &mut telemetry);
    assert_eq!(scheduler.held().len(), 2);

    control.cancel();
    assert_eq!(scheduler.tick(1.1, &mut telemetry), RunPhase::Aborted);
    assert!(scheduler.held().is_empty());
    assert!(device.keys_down().is_empty());
    assert_eq!(
        telemetry.last(),
        Some(&PlaybackEvent::Aborted {
            elapsed: 1.1,
            released: vec!["a".to_string(), "s".to_string()],
        })
    );

    // Terminal: further ticks do nothing.
    let actions = device.actions().len();
    assert_eq!(scheduler.tick(3.0, &mut telemetry), RunPhase::Aborted);
    assert_eq!(device.actions().len(), actions);
}

#[test]
fn test_abort_continues_past_failed_release() {
    let events = vec![NoteEvent::new(0.0, 0, 5.0), NoteEvent::new(0.0, 1, 5.0)];
    let device = Arc::new(RecordingDevice::new().failing_release(["a"]));
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.0, &mut telemetry);
    control.cancel();
    scheduler.tick(0.5, &mut telemetry);

    let releases: Vec<DeviceAction> = device
        .actions()
        .into_iter()
        .filter(|a| matches!(a, DeviceAction::Release(_)))
        .collect();
    assert_eq!(
        releases,
        vec![DeviceAction::Release("a".into()), DeviceAction::Release("s".into())]
    );
    assert!(scheduler.held().is_empty());
    assert!(telemetry
        .iter()
        .any(|e| matches!(e, PlaybackEvent::DeviceFailed { key, .. } if key == "a")));
}

#[test]
fn test_failed_press_is_skipped_and_not_held() {
    let events = vec![NoteEvent::new(0.0, 0, 1.0), NoteEvent::new(0.0, 1, 0.0)];
    let device = Arc::new(RecordingDevice::new().failing_press(["a"]));
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.0, &mut telemetry);
    assert_eq!(skipped(&telemetry), vec![(0, SkipReason::DeviceFailure)]);
    assert_eq!(scheduler.held().keys().copied().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_paused_notes_are_skipped() {
    let device = Arc::new(RecordingDevice::new());
    let control = ControlHandle::new();
    let listener = ControlListener::toggle("t", "p", device.clone(), vec![], control.clone());
    listener.handle_input(&RawInput::down("t"), 0.0);

    let events = vec![NoteEvent::new(0.1, 0, 0.0), NoteEvent::new(0.3, 1, 0.0)];
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    listener.handle_input(&RawInput::down("t"), 0.05);
    scheduler.tick(0.1, &mut telemetry);
    listener.handle_input(&RawInput::down("t"), 0.2);
    scheduler.tick(0.3, &mut telemetry);

    assert_eq!(skipped(&telemetry), vec![(0, SkipReason::Paused)]);
    assert_eq!(fired_lanes(&telemetry), vec![1]);
}

#[test]
fn test_unsorted_input_is_sorted_stably() {
    let events = vec![
        NoteEvent::new(0.2, 2, 0.0),
        NoteEvent::new(0.1, 1, 0.0),
        NoteEvent::new(0.1, 0, 0.0),
    ];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    scheduler.tick(0.2, &mut telemetry);
    assert_eq!(fired_lanes(&telemetry), vec![1, 0, 2]);
}

#[test]
fn test_run_to_completion() {
    let events = vec![NoteEvent::new(0.5, 0, 0.0), NoteEvent::new(0.5, 1, 0.25)];
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(events, &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    assert_eq!(scheduler.run(&mut telemetry), RunPhase::Finished);
    assert!(device.keys_down().is_empty());
    assert_eq!(fired_lanes(&telemetry), vec![0, 1]);
    assert!(scheduler.clock().now() >= 0.75);
    assert!(scheduler.clock().now() < 0.8);
}

#[test]
fn test_run_cancelled_while_waiting() {
    let device = Arc::new(RecordingDevice::new());
    let control = ControlHandle::new();
    control.cancel();
    let mut scheduler = scheduler(vec![NoteEvent::new(0.0, 0, 0.0)], &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    assert_eq!(scheduler.run(&mut telemetry), RunPhase::Aborted);
    assert!(device.actions().is_empty());
    assert_eq!(scheduler.remaining(), 1);
}

#[test]
fn test_run_waits_for_countdown() {
    let device = Arc::new(RecordingDevice::new());
    let control = ControlHandle::new();
    let listener = ControlListener::countdown("t", control.clone());
    listener.arm_countdown(0.0, 2.0);

    let mut scheduler = scheduler(vec![NoteEvent::new(0.5, 0, 0.0)], &device, &control);
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();
    assert_eq!(scheduler.run(&mut telemetry), RunPhase::Finished);

    match &telemetry[1] {
        PlaybackEvent::NoteFired { elapsed, .. } => assert!(*elapsed >= 0.5 && *elapsed < 0.52),
        other => panic!("expected a fired note, got {:?}", other),
    }
    assert!(scheduler.clock().now() >= 2.5);
}

/// Raises the cancel flag the first time `trigger` is pressed.
struct StopOnPress {
    inner: RecordingDevice,
    control: ControlHandle,
    trigger: String,
}

impl KeyDevice for StopOnPress {
    fn press(&self, key: &str) -> Result<(), ReplayError> {
        self.inner.press(key)?;
        if key == self.trigger {
            self.control.cancel();
        }
        Ok(())
    }

    fn release(&self, key: &str) -> Result<(), ReplayError> {
        self.inner.release(key)
    }
}

#[test]
fn test_run_aborted_mid_song_leaves_no_key_down() {
    let control = playing();
    let device = Arc::new(StopOnPress {
        inner: RecordingDevice::new(),
        control: control.clone(),
        trigger: "d".to_string(),
    });
    let events = vec![
        NoteEvent::new(0.1, 0, 10.0),
        NoteEvent::new(0.2, 1, 10.0),
        NoteEvent::new(0.3, 2, 10.0),
        NoteEvent::new(5.0, 0, 0.0),
    ];
    let mut scheduler = Scheduler::new(
        events,
        config(),
        device.clone(),
        ManualClock::new(),
        control.clone(),
    );
    let mut telemetry: Vec<PlaybackEvent> = Vec::new();

    assert_eq!(scheduler.run(&mut telemetry), RunPhase::Aborted);
    assert!(device.inner.keys_down().is_empty());
    assert_eq!(scheduler.remaining(), 1);
    assert!(scheduler.clock().now() < 0.35);
}

#[test]
fn test_drop_releases_held_keys() {
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    {
        let mut scheduler = scheduler(vec![NoteEvent::new(0.0, 0, 10.0)], &device, &control);
        scheduler.tick(0.0, &mut Vec::<PlaybackEvent>::new());
        assert_eq!(device.keys_down().len(), 1);
    }
    assert!(device.keys_down().is_empty());
}

#[test]
fn test_log_sink_accepts_every_event() {
    let mut sink = LogSink { print_presses: true };
    let device = Arc::new(RecordingDevice::new());
    let control = playing();
    let mut scheduler = scheduler(
        vec![NoteEvent::new(0.0, 0, 0.0), NoteEvent::new(0.0, 9, 0.0)],
        &device,
        &control,
    );
    assert_eq!(scheduler.tick(0.1, &mut sink), RunPhase::Running);
    assert_eq!(scheduler.tick(0.2, &mut sink), RunPhase::Finished);
}
