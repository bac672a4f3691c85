use crate::display::{Area, DisplaySink, PixelData};
use crate::pacing::FramePacing;
use media::{FrameSource, PixelFormat, VideoFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Shown in place of a frame whose size does not match the area.
pub const MISMATCH_COLOR: u16 = 0xF81F;

const REWIND_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub shown: u64,
    pub mismatched: u64,
    pub rewinds: u64,
    pub overruns: u64,
}

/// Plays a single [`FrameSource`] straight to a display, paced to the
/// source's frame rate.
pub struct SourcePlayer {
    area: Area,
    pixel_format: PixelFormat,
}

impl SourcePlayer {
    pub fn new(area: Area, pixel_format: PixelFormat) -> Self {
        Self { area, pixel_format }
    }

    /// Run until `shutdown` is set. The source is rewound whenever it ends or
    /// fails.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        display: &mut dyn DisplaySink,
        shutdown: &AtomicBool,
    ) -> PlayerStats {
        let pacing = FramePacing::from_fps(source.frame_rate());
        let expected = self.pixel_format.frame_bytes(self.area.width, self.area.height);
        let mut frame = VideoFrame::new();
        let mut stats = PlayerStats::default();

        tracing::info!(
            "Playing {}x{} source at {} fps into {:?}",
            source.frame_width(),
            source.frame_height(),
            source.frame_rate(),
            self.area
        );

        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();

            match source.next_frame(&mut frame) {
                Ok(true) => {}
                Ok(false) => {
                    self.restart(source, &mut stats, "end of stream");
                    continue;
                }
                Err(e) => {
                    self.restart(source, &mut stats, &e.to_string());
                    continue;
                }
            }

            let pushed = if frame.len() == expected {
                display.push_pixels(self.area, PixelData::new(self.pixel_format, &frame.data))
            } else {
                tracing::warn!(
                    "Frame size mismatch: expected {} bytes, got {}",
                    expected,
                    frame.len()
                );
                stats.mismatched += 1;
                display.fill(self.area, MISMATCH_COLOR)
            };

            if let Err(e) = pushed {
                tracing::warn!("Display push failed: {}", e);
            }
            stats.shown += 1;

            if let Some(overrun) = pacing.wait_from(started) {
                stats.overruns += 1;
                tracing::debug!("Frame {} overran budget by {:?}", stats.shown, overrun);
            }
        }

        tracing::info!(
            "Player stopped after {} frames ({} rewinds)",
            stats.shown,
            stats.rewinds
        );
        stats
    }

    fn restart(&self, source: &mut dyn FrameSource, stats: &mut PlayerStats, reason: &str) {
        tracing::warn!("Failed to get next frame ({}), rewinding", reason);
        if let Err(e) = source.rewind() {
            tracing::error!("Rewind failed: {}", e);
        }
        stats.rewinds += 1;
        thread::sleep(REWIND_DELAY);
    }
}
