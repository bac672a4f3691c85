use std::thread;
use std::time::{Duration, Instant};

/// Fixed per-frame time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacing {
    interval: Duration,
}

impl FramePacing {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::fixed(Duration::from_secs_f64(1.0 / fps.max(1) as f64))
    }

    pub fn frame_duration(&self) -> Duration {
        self.interval
    }

    /// Sleep the full interval.
    pub fn pause(&self) {
        thread::sleep(self.interval);
    }

    /// Sleep for whatever is left of the budget of a frame begun at `started`.
    /// Returns the overrun if the frame already took longer.
    pub fn wait_from(&self, started: Instant) -> Option<Duration> {
        let elapsed = started.elapsed();
        match self.interval.checked_sub(elapsed) {
            Some(remaining) => {
                thread::sleep(remaining);
                None
            }
            None => Some(elapsed - self.interval),
        }
    }
}
