use crate::lane::Lane;
use crate::pipeline::PipelineContext;
use crate::storage::Storage;
use common::span_debug;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoaderState {
    /// Waiting for the drawer to hand the slot back.
    Idle,
    /// Trying to fill the slot with the next frame.
    Active,
}

/// Fills one lane's slot from storage, then hands it to the drawer.
pub struct LoaderTask {
    ctx: Arc<PipelineContext>,
    lane: usize,
}

impl LoaderTask {
    pub fn new(ctx: Arc<PipelineContext>, lane: usize) -> Self {
        Self { ctx, lane }
    }

    pub fn run(self) {
        let lane = &self.ctx.lanes[self.lane];
        let name = format!("loader-{}", lane.id());
        let watchdog = self.ctx.watchdog.register(&name);
        let mut state = LoaderState::Idle;

        tracing::info!("{} ready", name);

        while !self.ctx.is_shutting_down() {
            watchdog.ping();
            state = match state {
                LoaderState::Idle => self.wait_for_slot(lane),
                LoaderState::Active => self.load_next(lane),
            };
        }

        tracing::info!("{} stopped", name);
    }

    fn wait_for_slot(&self, lane: &Lane) -> LoaderState {
        match lane.load_signal.take(self.ctx.timings.idle_poll) {
            Ok(true) => LoaderState::Active,
            Ok(false) => LoaderState::Idle,
            Err(e) => {
                tracing::error!("Loader {}: wait failed: {}", lane.id(), e);
                thread::sleep(self.ctx.timings.lock_retry_delay);
                LoaderState::Idle
            }
        }
    }

    fn load_next(&self, lane: &Lane) -> LoaderState {
        let timings = &self.ctx.timings;
        let frame = self.ctx.index.next();
        let file_name = self.ctx.config.pattern.resolve(frame.get());
        let _span = span_debug!("load_frame", lane = lane.id(), frame = frame.get());

        let mut slot = match lane.slot.lock_timeout(timings.slot_lock_timeout) {
            Ok(slot) => slot,
            Err(e) => {
                if e.is_contention() {
                    tracing::warn!("Loader {}: buffer busy, skipping frame {} ({})", lane.id(), frame, e);
                } else {
                    tracing::error!("Loader {}: buffer lock failed, skipping frame {}: {}", lane.id(), frame, e);
                }
                lane.record_skipped();
                thread::sleep(timings.lock_retry_delay);
                return LoaderState::Active;
            }
        };

        if let Err(e) = read_frame(&*self.ctx.storage, &file_name, &mut slot.pixels) {
            slot.frame = None;
            drop(slot);
            tracing::warn!("Loader {}: cannot read {}: {}", lane.id(), file_name, e);
            lane.record_skipped();
            thread::sleep(timings.open_retry_delay);
            return LoaderState::Active;
        }

        slot.frame = Some(frame);
        drop(slot);
        lane.record_loaded();
        tracing::debug!("Loaded {} into buffer {}", file_name, lane.id());

        if let Err(e) = lane.draw_signal.give() {
            tracing::error!("Loader {}: failed to wake drawer: {}", lane.id(), e);
        }
        LoaderState::Idle
    }
}

/// Read exactly `buf.len()` bytes of `name`. The file is closed on return.
fn read_frame(storage: &dyn Storage, name: &str, buf: &mut [u8]) -> io::Result<()> {
    let mut file = storage.open(name)?;
    file.read_exact(buf)
}
