mod support;

use playback::{NamePattern, Orchestrator, Pipeline, Placement, StartParams, Storage, Watchdog};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use support::{
    Event, EventLog, HEIGHT, PATTERN, RecordingDisplay, RecordingStorage, RecordingSupervisor,
    WIDTH, events_for, rendered, wait_until, write_frames,
};
use tempfile::tempdir;

/// Replay one lane's events and check the slot strictly alternates between
/// a complete load and a draw of that same frame.
fn assert_alternates(lane: usize, events: &[Event]) {
    let mut loaded: Option<u8> = None;
    let mut reading: Option<u8> = None;

    for (i, event) in events.iter().enumerate() {
        match event {
            Event::Open { frame, .. } => {
                assert!(
                    reading.is_none() && loaded.is_none(),
                    "Lane {} event {}: load started before the previous frame was drawn",
                    lane,
                    i
                );
                reading = Some(*frame);
            }
            Event::OpenFailed { .. } => {
                assert!(reading.is_none(), "Lane {} event {}: open failed mid-read", lane, i);
            }
            Event::Close { .. } => {
                loaded = reading.take();
                assert!(loaded.is_some(), "Lane {} event {}: close without open", lane, i);
            }
            Event::Render { frame, .. } => {
                assert!(reading.is_none(), "Lane {} event {}: drawn while loading", lane, i);
                assert_eq!(
                    loaded.take(),
                    Some(*frame),
                    "Lane {} event {}: drew a frame that was not just loaded",
                    lane,
                    i
                );
            }
        }
    }
}

fn start(root: &Path, log: &EventLog) -> (Pipeline, Arc<AtomicBool>, RecordingSupervisor) {
    let supervisor = RecordingSupervisor::default();
    let watchdog = Watchdog::init(Duration::from_secs(2), supervisor.clone()).unwrap();
    let storage: Arc<dyn Storage> = Arc::new(RecordingStorage::new(root, Arc::clone(log)));
    let (display, overlaps) = RecordingDisplay::new(Arc::clone(log));

    let params = StartParams::new(NamePattern::parse(PATTERN).unwrap(), 0, 0, WIDTH, HEIGHT);
    let pipeline = Orchestrator::new(storage, watchdog)
        .with_timings(support::fast_timings())
        .with_placement(Placement::unpinned())
        .start(params, Box::new(display))
        .unwrap();
    (pipeline, overlaps, supervisor)
}

/// Loader and drawer of each lane take turns on their slot
///
/// Tests:
/// - Per lane: open, close, draw, repeated, never interleaved
/// - Each draw shows the frame its loader just read
/// - The two drawers never push to the display at the same time
#[test]
fn test_each_lane_alternates_load_and_draw() {
    let dir = tempdir().unwrap();
    write_frames(dir.path(), 6);

    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let (pipeline, overlaps, supervisor) = start(dir.path(), &log);

    assert!(wait_until(Duration::from_secs(10), || rendered(&log).len() >= 40));
    pipeline.shutdown();

    for lane in 1..=2 {
        let events = events_for(&log, lane);
        assert!(
            events.iter().filter(|e| matches!(e, Event::Render { .. })).count() >= 5,
            "Lane {} should have drawn several frames",
            lane
        );
        assert_alternates(lane, &events);
    }

    assert!(!overlaps.load(Ordering::SeqCst), "Display pushes must not overlap");
    assert!(supervisor.expired_tasks().is_empty());
}

/// A drawer that cannot get the display keeps its frame and retries
///
/// Tests:
/// - Holding the display past the lock timeout produces draw retries
/// - No load starts on a lane whose frame has not been drawn yet
/// - The retried draw shows the frame that was loaded before the stall
#[test]
fn test_display_contention_is_retried_with_same_frame() {
    let dir = tempdir().unwrap();
    write_frames(dir.path(), 3);

    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let (pipeline, _overlaps, supervisor) = start(dir.path(), &log);
    assert!(wait_until(Duration::from_secs(5), || rendered(&log).len() >= 4));

    {
        let _held = pipeline
            .context()
            .display
            .lock_timeout(Duration::from_secs(1))
            .unwrap();
        thread::sleep(Duration::from_millis(500));
    }

    let retries: u64 = pipeline.stats().iter().map(|s| s.draw_retries).sum();
    assert!(retries > 0, "Drawers should have retried while the display was held");

    let before = rendered(&log).len();
    assert!(wait_until(Duration::from_secs(5), || rendered(&log).len() >= before + 6));
    pipeline.shutdown();

    for lane in 1..=2 {
        assert_alternates(lane, &events_for(&log, lane));
    }
    assert!(supervisor.expired_tasks().is_empty());
}
