#![allow(dead_code)]

use playback::{Area, DisplayError, DisplaySink, FsStorage, PixelData, Storage, Supervisor, Timings};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const PATTERN: &str = "/output_frame/frame%d.bin";
pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 4;

/// Short waits so a test runs many handoffs per second.
pub fn fast_timings() -> Timings {
    Timings {
        index_lock_timeout: Duration::from_millis(50),
        slot_lock_timeout: Duration::from_millis(200),
        display_lock_timeout: Duration::from_millis(200),
        open_retry_delay: Duration::from_millis(20),
        lock_retry_delay: Duration::from_millis(2),
        frame_interval: Duration::from_millis(5),
        idle_poll: Duration::from_millis(50),
        settle_delay: Duration::from_millis(10),
        stagger_delay: Duration::from_millis(5),
    }
}

/// Write frames `1..=count`, every byte of frame `i` set to `i`.
pub fn write_frames(root: &Path, count: u8) {
    let dir = root.join("output_frame");
    fs::create_dir_all(&dir).unwrap();
    for i in 1..=count {
        fs::write(dir.join(format!("frame{}.bin", i)), vec![i; (WIDTH * HEIGHT) as usize]).unwrap();
    }
}

pub fn frame_path(root: &Path, index: u8) -> std::path::PathBuf {
    root.join(format!("output_frame/frame{}.bin", index))
}

/// Lane number taken from the calling task's thread name (`loader-2` -> 2).
pub fn current_lane() -> Option<usize> {
    thread::current()
        .name()
        .and_then(|name| name.rsplit('-').next())
        .and_then(|n| n.parse().ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { lane: usize, frame: u8 },
    OpenFailed { lane: usize, frame: u8 },
    Close { lane: usize },
    Render { lane: usize, frame: u8 },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn events_for(log: &EventLog, lane: usize) -> Vec<Event> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| match e {
            Event::Open { lane: l, .. }
            | Event::OpenFailed { lane: l, .. }
            | Event::Close { lane: l }
            | Event::Render { lane: l, .. } => *l == lane,
        })
        .cloned()
        .collect()
}

pub fn rendered(log: &EventLog) -> Vec<u8> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::Render { frame, .. } => Some(*frame),
            _ => None,
        })
        .collect()
}

/// Frame numbers a lane tried to open, in order, with whether the open worked.
pub fn open_attempts(log: &EventLog, lane: usize) -> Vec<(u8, bool)> {
    events_for(log, lane)
        .into_iter()
        .filter_map(|e| match e {
            Event::Open { frame, .. } => Some((frame, true)),
            Event::OpenFailed { frame, .. } => Some((frame, false)),
            _ => None,
        })
        .collect()
}

/// Block until `done` holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn frame_number(name: &str) -> u8 {
    name.trim_start_matches("/output_frame/frame")
        .trim_end_matches(".bin")
        .parse()
        .unwrap_or(0)
}

/// Filesystem storage that logs every open, failed open and close made by a
/// lane task.
pub struct RecordingStorage {
    inner: FsStorage,
    log: EventLog,
}

impl RecordingStorage {
    pub fn new(root: &Path, log: EventLog) -> Self {
        Self {
            inner: FsStorage::new(root),
            log,
        }
    }
}

struct RecordingReader {
    inner: Box<dyn Read + Send>,
    lane: Option<usize>,
    log: EventLog,
}

impl Read for RecordingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for RecordingReader {
    fn drop(&mut self) {
        if let Some(lane) = self.lane {
            self.log.lock().unwrap().push(Event::Close { lane });
        }
    }
}

impl Storage for RecordingStorage {
    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let lane = current_lane();
        let frame = frame_number(name);
        let inner = match self.inner.open(name) {
            Ok(inner) => inner,
            Err(e) => {
                if let Some(lane) = lane {
                    self.log.lock().unwrap().push(Event::OpenFailed { lane, frame });
                }
                return Err(e);
            }
        };
        if let Some(lane) = lane {
            self.log.lock().unwrap().push(Event::Open { lane, frame });
        }
        Ok(Box::new(RecordingReader {
            inner,
            lane,
            log: Arc::clone(&self.log),
        }))
    }
}

/// Display that logs each push and flags any two pushes overlapping.
pub struct RecordingDisplay {
    log: EventLog,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicBool>,
}

impl RecordingDisplay {
    pub fn new(log: EventLog) -> (Self, Arc<AtomicBool>) {
        let overlaps = Arc::new(AtomicBool::new(false));
        let display = Self {
            log,
            busy: Arc::new(AtomicBool::new(false)),
            overlaps: Arc::clone(&overlaps),
        };
        (display, overlaps)
    }
}

impl DisplaySink for RecordingDisplay {
    fn push_pixels(&mut self, area: Area, pixels: PixelData<'_>) -> Result<(), DisplayError> {
        playback::display::check_pixels(area, &pixels)?;
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.store(true, Ordering::SeqCst);
        }

        let frame = pixels.bytes()[0];
        let lane = current_lane().unwrap_or(0);
        self.log.lock().unwrap().push(Event::Render { lane, frame });
        thread::sleep(Duration::from_millis(1));

        self.busy.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn fill(&mut self, _area: Area, _color: u16) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Supervisor that only remembers who expired.
#[derive(Clone, Default)]
pub struct RecordingSupervisor(pub Arc<Mutex<Vec<String>>>);

impl RecordingSupervisor {
    pub fn expired_tasks(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Supervisor for RecordingSupervisor {
    fn expired(&self, task: &str, _silent_for: Duration) {
        self.0.lock().unwrap().push(task.to_string());
    }
}
