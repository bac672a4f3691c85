use crate::config::{Placement, Timings};
use crate::display::{Area, DisplaySink};
use crate::drawer::DrawerTask;
use crate::index::FrameIndexGenerator;
use crate::lane::{Lane, LaneSnapshot};
use crate::loader::LoaderTask;
use crate::pattern::NamePattern;
use crate::storage::Storage;
use crate::task::{self, TaskContext};
use crate::watchdog::Watchdog;
use common::span;
use handoff::{SyncError, TimedLock};
use media::PixelFormat;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Fewer frames than this and there is nothing to double-buffer.
pub const MIN_FRAMES: u32 = 2;

/// Probing stops after this many consecutive files.
pub const MAX_PROBED_FRAMES: u32 = 999;

pub const LANE_COUNT: usize = 2;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Found {found} frame(s) for {pattern}, need at least {MIN_FRAMES}")]
    InsufficientFrames { found: u32, pattern: String },

    #[error("Failed to allocate {what}: {source}")]
    Allocation {
        what: &'static str,
        #[source]
        source: SyncError,
    },

    #[error("Failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

fn allocation(what: &'static str) -> impl FnOnce(SyncError) -> PipelineError {
    move |source| PipelineError::Allocation { what, source }
}

/// What to play and where: the caller-facing start request.
#[derive(Debug, Clone)]
pub struct StartParams {
    pub pattern: NamePattern,
    pub area: Area,
    pub pixel_format: PixelFormat,
}

impl StartParams {
    pub fn new(pattern: NamePattern, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            pattern,
            area: Area::new(x, y, width, height),
            pixel_format: PixelFormat::default(),
        }
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn frame_bytes(&self) -> usize {
        self.pixel_format.frame_bytes(self.area.width, self.area.height)
    }
}

/// Fixed for the lifetime of a running pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pattern: NamePattern,
    pub area: Area,
    pub pixel_format: PixelFormat,
    pub total_frames: u32,
}

/// Everything the four tasks share.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub timings: Timings,
    pub index: FrameIndexGenerator,
    pub lanes: [Lane; LANE_COUNT],
    pub display: TimedLock<Box<dyn DisplaySink>>,
    pub storage: Arc<dyn Storage>,
    pub watchdog: Arc<Watchdog>,
    shutdown: AtomicBool,
}

impl PipelineContext {
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for lane in &self.lanes {
            lane.wake_all();
        }
    }
}

/// Count frames `1..` that exist, stopping at the first gap.
pub fn count_frames(storage: &dyn Storage, pattern: &NamePattern) -> u32 {
    let mut found = 0;
    while found < MAX_PROBED_FRAMES && storage.exists(&pattern.resolve(found + 1)) {
        found += 1;
    }
    found
}

/// Builds and launches the two-lane playback pipeline.
pub struct Orchestrator {
    storage: Arc<dyn Storage>,
    watchdog: Arc<Watchdog>,
    timings: Timings,
    placement: Placement,
}

impl Orchestrator {
    pub fn new(storage: Arc<dyn Storage>, watchdog: Arc<Watchdog>) -> Self {
        Self {
            storage,
            watchdog,
            timings: Timings::default(),
            placement: Placement::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Count the frames, allocate both slots, start the loaders and drawers
    /// and kick off the first two loads.
    ///
    /// Nothing is spawned unless at least two frames exist.
    pub fn start(self, params: StartParams, display: Box<dyn DisplaySink>) -> Result<Pipeline, PipelineError> {
        let _span = span!("start_playback", pattern = %params.pattern);
        let total_frames = count_frames(&*self.storage, &params.pattern);
        tracing::info!("Found {} frames matching {}", total_frames, params.pattern);

        if total_frames < MIN_FRAMES {
            tracing::error!(
                "Not enough frames to start playback ({} < {})",
                total_frames,
                MIN_FRAMES
            );
            return Err(PipelineError::InsufficientFrames {
                found: total_frames,
                pattern: params.pattern.to_string(),
            });
        }

        let frame_bytes = params.frame_bytes();
        let index = FrameIndexGenerator::new(total_frames, self.timings.index_lock_timeout)
            .map_err(allocation("frame index"))?;
        let lanes = [
            Lane::new(1, frame_bytes).map_err(allocation("frame buffer 1"))?,
            Lane::new(2, frame_bytes).map_err(allocation("frame buffer 2"))?,
        ];
        let display = TimedLock::new(display).map_err(allocation("display lock"))?;

        let ctx = Arc::new(PipelineContext {
            config: PipelineConfig {
                pattern: params.pattern,
                area: params.area,
                pixel_format: params.pixel_format,
                total_frames,
            },
            timings: self.timings,
            index,
            lanes,
            display,
            storage: self.storage,
            watchdog: self.watchdog,
            shutdown: AtomicBool::new(false),
        });

        let tasks = spawn_tasks(&ctx, &self.placement)?;

        thread::sleep(ctx.timings.settle_delay);
        kick(&ctx.lanes[0]);
        thread::sleep(ctx.timings.stagger_delay);
        kick(&ctx.lanes[1]);

        tracing::info!(
            "Playback started: {} frames, {} bytes per buffer, area {:?}",
            total_frames,
            frame_bytes,
            ctx.config.area
        );

        Ok(Pipeline { ctx, tasks })
    }
}

fn kick(lane: &Lane) {
    if let Err(e) = lane.load_signal.give() {
        tracing::error!("Failed to start loader {}: {}", lane.id(), e);
    }
}

fn spawn_tasks(ctx: &Arc<PipelineContext>, placement: &Placement) -> Result<Vec<JoinHandle<()>>, PipelineError> {
    let mut tasks = Vec::with_capacity(LANE_COUNT * 2);

    for lane in 0..LANE_COUNT {
        let id = ctx.lanes[lane].id();

        let loader = LoaderTask::new(Arc::clone(ctx), lane);
        let loader_ctx = TaskContext::new(format!("loader-{}", id), placement.stack_size)
            .on_cpu(placement.loader_cpu)
            .with_priority(placement.priority);
        let spawned = task::spawn(loader_ctx.clone(), move || loader.run());
        push_or_unwind(ctx, &mut tasks, loader_ctx.name, spawned)?;

        let drawer = DrawerTask::new(Arc::clone(ctx), lane);
        let drawer_ctx = TaskContext::new(format!("drawer-{}", id), placement.stack_size)
            .on_cpu(placement.drawer_cpu)
            .with_priority(placement.priority);
        let spawned = task::spawn(drawer_ctx.clone(), move || drawer.run());
        push_or_unwind(ctx, &mut tasks, drawer_ctx.name, spawned)?;
    }

    Ok(tasks)
}

fn push_or_unwind(
    ctx: &PipelineContext,
    tasks: &mut Vec<JoinHandle<()>>,
    name: String,
    spawned: io::Result<JoinHandle<()>>,
) -> Result<(), PipelineError> {
    match spawned {
        Ok(handle) => {
            tasks.push(handle);
            Ok(())
        }
        Err(source) => {
            tracing::error!("Failed to spawn {}: {}", name, source);
            ctx.request_shutdown();
            for handle in tasks.drain(..) {
                let _ = handle.join();
            }
            Err(PipelineError::Spawn { name, source })
        }
    }
}

/// Handle to a running pipeline.
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn total_frames(&self) -> u32 {
        self.ctx.config.total_frames
    }

    pub fn stats(&self) -> [LaneSnapshot; LANE_COUNT] {
        [self.ctx.lanes[0].snapshot(), self.ctx.lanes[1].snapshot()]
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Stop all four tasks and wait for them.
    pub fn shutdown(mut self) {
        tracing::info!("Stopping playback");
        self.ctx.request_shutdown();
        for handle in self.tasks.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Playback task panicked");
            }
        }
        tracing::info!("Playback stopped");
    }
}
