use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid {container} data: {reason}")]
    InvalidHeader {
        container: &'static str,
        reason: &'static str,
    },

    #[error("No movi list found in AVI stream")]
    MissingMovi,

    #[error("Skipped {0} consecutive non-video chunks without finding a frame")]
    TooManySkippedChunks(usize),

    #[error("Video chunk of {size} bytes exceeds the {limit} byte frame limit")]
    ChunkTooLarge { size: u32, limit: u64 },

    #[error("Pixel buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Unknown pixel format: {0}")]
    UnknownPixelFormat(String),
}

impl MediaError {
    pub(crate) fn avi(reason: &'static str) -> Self {
        MediaError::InvalidHeader {
            container: "AVI",
            reason,
        }
    }

    pub(crate) fn wav(reason: &'static str) -> Self {
        MediaError::InvalidHeader {
            container: "WAV",
            reason,
        }
    }
}
