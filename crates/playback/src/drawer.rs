use crate::display::PixelData;
use crate::lane::Lane;
use crate::pacing::FramePacing;
use crate::pipeline::PipelineContext;
use common::span_debug;
use std::sync::Arc;
use std::thread;

const STATUS_EVERY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawerState {
    /// Waiting for the loader to fill the slot.
    Idle,
    /// Trying to get the slot onto the screen.
    Active,
}

/// Pushes one lane's slot to the shared display, then hands the slot back to
/// the loader.
///
/// The display lock is taken first with a bounded wait; the slot is then only
/// tried, never waited on, so no lock is held while blocking on another.
pub struct DrawerTask {
    ctx: Arc<PipelineContext>,
    lane: usize,
}

impl DrawerTask {
    pub fn new(ctx: Arc<PipelineContext>, lane: usize) -> Self {
        Self { ctx, lane }
    }

    pub fn run(self) {
        let lane = &self.ctx.lanes[self.lane];
        let name = format!("drawer-{}", lane.id());
        let watchdog = self.ctx.watchdog.register(&name);
        let pacing = FramePacing::fixed(self.ctx.timings.frame_interval);
        let mut state = DrawerState::Idle;

        tracing::info!("{} ready", name);

        while !self.ctx.is_shutting_down() {
            watchdog.ping();
            state = match state {
                DrawerState::Idle => self.wait_for_frame(lane),
                DrawerState::Active => self.draw(lane, &pacing),
            };
        }

        tracing::info!("{} stopped", name);
    }

    fn wait_for_frame(&self, lane: &Lane) -> DrawerState {
        match lane.draw_signal.take(self.ctx.timings.idle_poll) {
            Ok(true) => DrawerState::Active,
            Ok(false) => DrawerState::Idle,
            Err(e) => {
                tracing::error!("Drawer {}: wait failed: {}", lane.id(), e);
                thread::sleep(self.ctx.timings.lock_retry_delay);
                DrawerState::Idle
            }
        }
    }

    fn draw(&self, lane: &Lane, pacing: &FramePacing) -> DrawerState {
        let timings = &self.ctx.timings;
        let config = &self.ctx.config;
        let _span = span_debug!("draw_frame", lane = lane.id());

        let mut display = match self.ctx.display.lock_timeout(timings.display_lock_timeout) {
            Ok(display) => display,
            Err(e) => {
                if e.is_contention() {
                    tracing::warn!("Drawer {}: display busy ({}), retrying", lane.id(), e);
                } else {
                    tracing::error!("Drawer {}: display lock failed: {}, retrying", lane.id(), e);
                }
                lane.record_draw_retry();
                thread::sleep(timings.lock_retry_delay);
                return DrawerState::Active;
            }
        };

        let slot = match lane.slot.try_lock() {
            Ok(slot) => slot,
            Err(e) => {
                drop(display);
                if e.is_contention() {
                    tracing::debug!("Drawer {}: buffer busy ({}), retrying", lane.id(), e);
                } else {
                    tracing::error!("Drawer {}: buffer lock failed: {}, retrying", lane.id(), e);
                }
                lane.record_draw_retry();
                thread::sleep(timings.lock_retry_delay);
                return DrawerState::Active;
            }
        };

        let frame = slot.frame;
        let pushed = display.push_pixels(config.area, PixelData::new(config.pixel_format, &slot.pixels));
        drop(slot);
        drop(display);

        match pushed {
            Ok(()) => {
                let rendered = lane.record_rendered(frame);
                if let Some(frame) = frame {
                    tracing::debug!("Drew frame {} from buffer {}", frame, lane.id());
                }
                if rendered.is_multiple_of(STATUS_EVERY) {
                    let stats = lane.snapshot();
                    tracing::info!(
                        lane = stats.lane,
                        rendered = stats.rendered,
                        skipped = stats.skipped,
                        draw_retries = stats.draw_retries,
                        last_frame = stats.last_rendered,
                        "Drawer status"
                    );
                }
            }
            Err(e) => tracing::warn!("Drawer {}: display push failed: {}", lane.id(), e),
        }

        pacing.pause();

        if let Err(e) = lane.load_signal.give() {
            tracing::error!("Drawer {}: failed to wake loader: {}", lane.id(), e);
        }
        DrawerState::Idle
    }
}
