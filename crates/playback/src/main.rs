use anyhow::Context;
use common::{retry_with_backoff, wait_for_resource};
use media::AviReader;
use playback::{
    AbortSupervisor, FsStorage, LinuxFramebuffer, Orchestrator, PlaybackConfig, Watchdog,
    logging::setup_logging, player::SourcePlayer,
};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const STORAGE_POLL_MS: u64 = 500;
const DISPLAY_OPEN_ATTEMPTS: u32 = 5;
const DISPLAY_RETRY_BASE_MS: u64 = 200;
const STATUS_INTERVAL: Duration = Duration::from_secs(5);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    let config = PlaybackConfig::from_env()?;
    setup_logging(&config);
    let shutdown = Arc::new(AtomicBool::new(false));

    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;

    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    let storage = wait_for_resource(
        || FsStorage::mounted(&config.storage_root),
        STORAGE_POLL_MS,
        "Storage card",
    );

    let display = retry_with_backoff(
        || {
            LinuxFramebuffer::open(
                &config.framebuffer.device,
                config.framebuffer.screen_width,
                config.framebuffer.screen_height,
            )
        },
        DISPLAY_OPEN_ATTEMPTS,
        DISPLAY_RETRY_BASE_MS,
        "Display init",
    )
    .with_context(|| {
        format!(
            "Failed to open framebuffer {}",
            config.framebuffer.device.display()
        )
    })?;

    match &config.avi_path {
        Some(path) => play_container(&config, path, display, &shutdown),
        None => stream_frames(&config, storage, display, &shutdown),
    }
}

fn stream_frames(
    config: &PlaybackConfig,
    storage: FsStorage,
    display: LinuxFramebuffer,
    shutdown: &AtomicBool,
) -> anyhow::Result<()> {
    let watchdog = Watchdog::init(config.watchdog_timeout, AbortSupervisor)
        .context("Failed to start watchdog")?;

    let pipeline = Orchestrator::new(Arc::new(storage), watchdog)
        .with_timings(config.timings.clone())
        .with_placement(config.placement.clone())
        .start(config.params.clone(), Box::new(display))
        .context("Failed to start playback - check the storage card holds the frame files")?;

    let mut last_status = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(SHUTDOWN_POLL);
        if last_status.elapsed() >= STATUS_INTERVAL {
            for lane in pipeline.stats() {
                tracing::info!(
                    lane = lane.lane,
                    loaded = lane.loaded,
                    rendered = lane.rendered,
                    skipped = lane.skipped,
                    last_frame = lane.last_rendered,
                    "Playback status"
                );
            }
            last_status = Instant::now();
        }
    }

    pipeline.shutdown();
    tracing::info!("Playback stopped gracefully");
    Ok(())
}

fn play_container(
    config: &PlaybackConfig,
    path: &std::path::Path,
    mut display: LinuxFramebuffer,
    shutdown: &AtomicBool,
) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut source = AviReader::open(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let player = SourcePlayer::new(config.params.area, config.params.pixel_format);
    let stats = player.run(&mut source, &mut display, shutdown);

    tracing::info!("Container playback stopped after {} frames", stats.shown);
    Ok(())
}
