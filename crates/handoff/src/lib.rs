//! Synchronization primitives and frame memory shared between the loader and
//! drawer threads of the playback pipeline.
//!
//! Everything here is built on unnamed POSIX semaphores so that every wait
//! can carry an explicit deadline, mirroring the bounded takes of an RTOS.

pub mod dma;
pub mod errors;
pub mod lock;
pub mod notify;
pub mod semaphore;

pub use dma::DmaBuffer;
pub use errors::SyncError;
pub use lock::{TimedGuard, TimedLock};
pub use notify::Notify;
pub use semaphore::Semaphore;
