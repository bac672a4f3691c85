use crate::index::FrameIndex;
use handoff::{DmaBuffer, Notify, SyncError, TimedGuard, TimedLock};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// What a slot holds: the pixel bytes and which frame they came from.
pub struct SlotContents {
    pub pixels: DmaBuffer,
    /// `None` until a load completes, and again after a failed read.
    pub frame: Option<FrameIndex>,
}

/// One frame buffer shared by exactly one loader and one drawer.
pub struct BufferSlot {
    contents: TimedLock<SlotContents>,
    capacity: usize,
}

impl BufferSlot {
    pub fn allocate(size: usize) -> Result<Self, SyncError> {
        let pixels = DmaBuffer::allocate(size)?;
        Ok(Self {
            contents: TimedLock::new(SlotContents { pixels, frame: None })?,
            capacity: size,
        })
    }

    pub fn lock_timeout(&self, timeout: Duration) -> Result<TimedGuard<'_, SlotContents>, SyncError> {
        self.contents.lock_timeout(timeout)
    }

    pub fn try_lock(&self) -> Result<TimedGuard<'_, SlotContents>, SyncError> {
        self.contents.try_lock()
    }

    pub fn is_locked(&self) -> bool {
        self.contents.is_locked()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Default)]
struct LaneStats {
    loaded: AtomicU64,
    skipped: AtomicU64,
    rendered: AtomicU64,
    draw_retries: AtomicU64,
    last_rendered: AtomicU32,
}

/// Point-in-time counters for one lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneSnapshot {
    pub lane: usize,
    pub loaded: u64,
    pub skipped: u64,
    pub rendered: u64,
    pub draw_retries: u64,
    /// 0 until the first frame is drawn.
    pub last_rendered: u32,
}

/// A slot plus the two signals that pass it back and forth between its
/// loader and drawer.
pub struct Lane {
    id: usize,
    pub slot: BufferSlot,
    /// Drawer to loader: the slot may be refilled.
    pub load_signal: Notify,
    /// Loader to drawer: the slot holds a new frame.
    pub draw_signal: Notify,
    stats: LaneStats,
}

impl Lane {
    pub fn new(id: usize, frame_bytes: usize) -> Result<Self, SyncError> {
        Ok(Self {
            id,
            slot: BufferSlot::allocate(frame_bytes)?,
            load_signal: Notify::new()?,
            draw_signal: Notify::new()?,
            stats: LaneStats::default(),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Wake both tasks without handing anything over.
    pub fn wake_all(&self) {
        for signal in [&self.load_signal, &self.draw_signal] {
            if let Err(e) = signal.give() {
                tracing::error!("Lane {}: failed to wake task: {}", self.id, e);
            }
        }
    }

    pub(crate) fn record_loaded(&self) {
        self.stats.loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_draw_retry(&self) {
        self.stats.draw_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rendered(&self, frame: Option<FrameIndex>) -> u64 {
        if let Some(frame) = frame {
            self.stats.last_rendered.store(frame.get(), Ordering::Relaxed);
        }
        self.stats.rendered.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> LaneSnapshot {
        LaneSnapshot {
            lane: self.id,
            loaded: self.stats.loaded.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            rendered: self.stats.rendered.load(Ordering::Relaxed),
            draw_retries: self.stats.draw_retries.load(Ordering::Relaxed),
            last_rendered: self.stats.last_rendered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_is_exclusive() {
        let slot = BufferSlot::allocate(16).unwrap();
        assert_eq!(slot.capacity(), 16);

        let mut guard = slot.lock_timeout(Duration::from_millis(10)).unwrap();
        guard.pixels[0] = 9;
        guard.frame = Some(FrameIndex::FIRST);
        assert!(slot.is_locked());
        assert!(matches!(slot.try_lock(), Err(SyncError::Busy)));
        drop(guard);

        let guard = slot.try_lock().unwrap();
        assert_eq!(guard.pixels[0], 9);
        assert_eq!(guard.frame, Some(FrameIndex::FIRST));
    }

    #[test]
    fn test_stats_snapshot() {
        let lane = Lane::new(2, 8).unwrap();
        lane.record_loaded();
        lane.record_skipped();
        lane.record_draw_retry();
        assert_eq!(lane.record_rendered(Some(FrameIndex::FIRST)), 1);
        assert_eq!(lane.record_rendered(None), 2);

        let snapshot = lane.snapshot();
        assert_eq!(
            snapshot,
            LaneSnapshot {
                lane: 2,
                loaded: 1,
                skipped: 1,
                rendered: 2,
                draw_retries: 1,
                last_rendered: 1,
            }
        );
    }

    #[test]
    fn test_wake_all_sets_both_signals() {
        let lane = Lane::new(1, 8).unwrap();
        lane.wake_all();
        assert!(lane.load_signal.is_pending());
        assert!(lane.draw_signal.is_pending());
    }
}
