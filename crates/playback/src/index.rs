use handoff::{SyncError, TimedLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 1-based position of a frame in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(u32);

impl FrameIndex {
    pub const FIRST: FrameIndex = FrameIndex(1);

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out frame indices 1, 2, ..., total, 1, 2, ... to any number of
/// loaders. Each index is handed out exactly once per cycle.
pub struct FrameIndexGenerator {
    total: u32,
    counter: TimedLock<u32>,
    lock_timeout: Duration,
    fallbacks: AtomicU64,
}

impl FrameIndexGenerator {
    pub fn new(total: u32, lock_timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            total: total.max(1),
            counter: TimedLock::new(1)?,
            lock_timeout,
            fallbacks: AtomicU64::new(0),
        })
    }

    /// Return the current index and advance, wrapping after `total`.
    ///
    /// If the counter cannot be locked in time the first frame is returned and
    /// the counter is left alone.
    pub fn next(&self) -> FrameIndex {
        match self.counter.lock_timeout(self.lock_timeout) {
            Ok(mut counter) => {
                let current = *counter;
                *counter = if current >= self.total { 1 } else { current + 1 };
                FrameIndex(current)
            }
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Frame index unavailable ({}), falling back to frame 1", e);
                FrameIndex::FIRST
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// How many times `next` fell back to the first frame.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}
