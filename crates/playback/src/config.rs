use crate::display::Area;
use crate::pattern::{NamePattern, PatternError};
use crate::pipeline::StartParams;
use common::env_or;
use media::{MediaError, PixelFormat};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use common::Environment;

const DEFAULT_STORAGE_ROOT: &str = "/mnt/sd";
const DEFAULT_FRAME_PATTERN: &str = "/output_frame/frame%d.bin";
const DEFAULT_FRAMEBUFFER: &str = "/dev/fb0";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid FRAME_PATTERN: {0}")]
    Pattern(#[from] PatternError),

    #[error("Invalid PIXEL_FORMAT: {0}")]
    PixelFormat(#[from] MediaError),

    #[error("Frame size must be non-zero, got {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Frame area {area:?} does not fit the {screen_width}x{screen_height} screen")]
    AreaOffScreen {
        area: Area,
        screen_width: u32,
        screen_height: u32,
    },

    #[error("Watchdog timeout {watchdog:?} must exceed the idle poll {idle_poll:?}")]
    WatchdogTooShort { watchdog: Duration, idle_poll: Duration },
}

/// Every wait and delay the pipeline tasks use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    pub index_lock_timeout: Duration,
    pub slot_lock_timeout: Duration,
    pub display_lock_timeout: Duration,
    /// Back-off after a frame file could not be opened or read.
    pub open_retry_delay: Duration,
    /// Back-off after a lock could not be taken.
    pub lock_retry_delay: Duration,
    /// Pause after every draw.
    pub frame_interval: Duration,
    /// Longest an idle task sleeps before feeding the watchdog again.
    pub idle_poll: Duration,
    pub settle_delay: Duration,
    pub stagger_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            index_lock_timeout: Duration::from_millis(100),
            slot_lock_timeout: Duration::from_secs(1),
            display_lock_timeout: Duration::from_secs(1),
            open_retry_delay: Duration::from_millis(100),
            lock_retry_delay: Duration::from_millis(10),
            frame_interval: Duration::from_millis(66),
            idle_poll: Duration::from_secs(1),
            settle_delay: Duration::from_millis(100),
            stagger_delay: Duration::from_millis(50),
        }
    }
}

/// Where and how the pipeline threads run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub loader_cpu: Option<usize>,
    pub drawer_cpu: Option<usize>,
    /// Nice value applied to every task; 0 leaves the scheduler default.
    pub priority: i32,
    pub stack_size: usize,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            loader_cpu: Some(1),
            drawer_cpu: Some(0),
            priority: 0,
            stack_size: 64 * 1024,
        }
    }
}

impl Placement {
    /// No pinning, default priority. Used where the host has a single CPU or
    /// affinity does not matter.
    pub fn unpinned() -> Self {
        Self {
            loader_cpu: None,
            drawer_cpu: None,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct FramebufferConfig {
    pub device: PathBuf,
    pub screen_width: u32,
    pub screen_height: u32,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub environment: Environment,
    pub storage_root: PathBuf,
    pub params: StartParams,
    pub timings: Timings,
    pub placement: Placement,
    pub watchdog_timeout: Duration,
    pub framebuffer: FramebufferConfig,
    /// Play this container instead of the numbered frame files.
    pub avi_path: Option<PathBuf>,
}

impl PlaybackConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        let storage_root =
            PathBuf::from(env::var("STORAGE_ROOT").unwrap_or_else(|_| DEFAULT_STORAGE_ROOT.to_string()));

        let pattern = NamePattern::parse(
            &env::var("FRAME_PATTERN").unwrap_or_else(|_| DEFAULT_FRAME_PATTERN.to_string()),
        )?;

        let pixel_format = env::var("PIXEL_FORMAT")
            .ok()
            .map(|s| s.parse::<PixelFormat>())
            .transpose()?
            .unwrap_or_default();

        let area = Area::new(
            env_or("DISPLAY_X", 0),
            env_or("DISPLAY_Y", 0),
            env_or("FRAME_WIDTH", 160),
            env_or("FRAME_HEIGHT", 128),
        );

        let timings = Timings {
            frame_interval: Duration::from_millis(env_or("FRAME_INTERVAL_MS", 66)),
            ..Timings::default()
        };

        let placement = Placement {
            loader_cpu: Some(env_or("LOADER_CPU", 1)),
            drawer_cpu: Some(env_or("DRAWER_CPU", 0)),
            priority: env_or("TASK_PRIORITY", 0),
            ..Placement::default()
        };

        let framebuffer = FramebufferConfig {
            device: PathBuf::from(
                env::var("FRAMEBUFFER_DEVICE").unwrap_or_else(|_| DEFAULT_FRAMEBUFFER.to_string()),
            ),
            screen_width: env_or("SCREEN_WIDTH", 160),
            screen_height: env_or("SCREEN_HEIGHT", 128),
        };

        let avi_path = env::var("AVI_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let config = Self {
            environment,
            storage_root,
            params: StartParams {
                pattern,
                area,
                pixel_format,
            },
            timings,
            placement,
            watchdog_timeout: Duration::from_secs(env_or("WATCHDOG_TIMEOUT_SECS", 10)),
            framebuffer,
            avi_path,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let area = self.params.area;
        if area.width == 0 || area.height == 0 {
            return Err(ConfigError::EmptyFrame {
                width: area.width,
                height: area.height,
            });
        }
        if !area.fits(self.framebuffer.screen_width, self.framebuffer.screen_height) {
            return Err(ConfigError::AreaOffScreen {
                area,
                screen_width: self.framebuffer.screen_width,
                screen_height: self.framebuffer.screen_height,
            });
        }
        if self.watchdog_timeout <= self.timings.idle_poll {
            return Err(ConfigError::WatchdogTooShort {
                watchdog: self.watchdog_timeout,
                idle_poll: self.timings.idle_poll,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 12] = [
        "STORAGE_ROOT",
        "FRAME_PATTERN",
        "PIXEL_FORMAT",
        "DISPLAY_X",
        "DISPLAY_Y",
        "FRAME_WIDTH",
        "FRAME_HEIGHT",
        "FRAME_INTERVAL_MS",
        "WATCHDOG_TIMEOUT_SECS",
        "SCREEN_WIDTH",
        "SCREEN_HEIGHT",
        "AVI_PATH",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = PlaybackConfig::from_env().unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/mnt/sd"));
        assert_eq!(config.params.pattern.resolve(4), "/output_frame/frame4.bin");
        assert_eq!(config.params.area, Area::new(0, 0, 160, 128));
        assert_eq!(config.params.pixel_format, PixelFormat::Rgb332);
        assert_eq!(config.timings, Timings::default());
        assert_eq!(config.watchdog_timeout, Duration::from_secs(10));
        assert_eq!(config.placement.loader_cpu, Some(1));
        assert_eq!(config.placement.drawer_cpu, Some(0));
        assert!(config.avi_path.is_none());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        unsafe {
            env::set_var("FRAME_PATTERN", "/clip/f%03d.raw");
            env::set_var("PIXEL_FORMAT", "rgb565");
            env::set_var("DISPLAY_X", "10");
            env::set_var("FRAME_WIDTH", "100");
            env::set_var("FRAME_INTERVAL_MS", "40");
            env::set_var("AVI_PATH", "/mnt/sd/movie.avi");
        }

        let config = PlaybackConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.params.pattern.resolve(4), "/clip/f004.raw");
        assert_eq!(config.params.pixel_format, PixelFormat::Rgb565);
        assert_eq!(config.params.area, Area::new(10, 0, 100, 128));
        assert_eq!(config.timings.frame_interval, Duration::from_millis(40));
        assert_eq!(config.avi_path, Some(PathBuf::from("/mnt/sd/movie.avi")));
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_rejected() {
        clear_env();
        unsafe { env::set_var("FRAME_PATTERN", "frame.bin") };
        assert!(matches!(PlaybackConfig::from_env(), Err(ConfigError::Pattern(_))));

        clear_env();
        unsafe { env::set_var("PIXEL_FORMAT", "yuyv") };
        assert!(matches!(PlaybackConfig::from_env(), Err(ConfigError::PixelFormat(_))));

        clear_env();
        unsafe { env::set_var("DISPLAY_X", "100") };
        assert!(matches!(PlaybackConfig::from_env(), Err(ConfigError::AreaOffScreen { .. })));

        clear_env();
        unsafe { env::set_var("WATCHDOG_TIMEOUT_SECS", "1") };
        assert!(matches!(PlaybackConfig::from_env(), Err(ConfigError::WatchdogTooShort { .. })));

        clear_env();
    }
}
