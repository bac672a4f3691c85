use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Semaphore operation failed: {0}")]
    Semaphore(#[from] nix::errno::Errno),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Lock is held elsewhere")]
    Busy,

    #[error("Failed to allocate {size} byte buffer: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("Buffer size must be non-zero")]
    ZeroSized,
}

impl SyncError {
    /// True for the recoverable "could not get it in time" outcomes.
    pub fn is_contention(&self) -> bool {
        matches!(self, SyncError::Timeout(_) | SyncError::Busy)
    }
}
