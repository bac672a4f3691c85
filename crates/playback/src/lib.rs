pub mod config;
pub mod display;
pub mod drawer;
pub mod frames;
pub mod index;
pub mod lane;
pub mod loader;
pub mod logging;
pub mod pacing;
pub mod pattern;
pub mod pipeline;
pub mod player;
pub mod storage;
pub mod task;
pub mod watchdog;

pub use config::{ConfigError, Placement, PlaybackConfig, Timings};
pub use display::{Area, DisplayError, DisplaySink, LinuxFramebuffer, PixelData};
pub use index::{FrameIndex, FrameIndexGenerator};
pub use lane::{BufferSlot, Lane, LaneSnapshot};
pub use pattern::{NamePattern, PatternError};
pub use pipeline::{Orchestrator, Pipeline, PipelineConfig, PipelineContext, PipelineError, StartParams};
pub use storage::{FsStorage, Storage};
pub use watchdog::{AbortSupervisor, Supervisor, Watchdog, WatchdogEntry};
