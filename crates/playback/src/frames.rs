use crate::pattern::NamePattern;
use crate::pipeline::count_frames;
use crate::storage::Storage;
use media::{FrameSource, MediaError, PixelFormat, VideoFrame};
use std::io::Read;
use std::sync::Arc;

/// Numbered frame files read one after another as a single stream.
pub struct FrameFiles {
    storage: Arc<dyn Storage>,
    pattern: NamePattern,
    total: u32,
    next: u32,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frame_rate: u32,
}

impl FrameFiles {
    pub fn discover(
        storage: Arc<dyn Storage>,
        pattern: NamePattern,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        frame_rate: u32,
    ) -> Self {
        let total = count_frames(&*storage, &pattern);
        tracing::info!("{} frame files found for {}", total, pattern);
        Self {
            storage,
            pattern,
            total,
            next: 1,
            width,
            height,
            pixel_format,
            frame_rate,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

impl FrameSource for FrameFiles {
    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn frame_width(&self) -> u32 {
        self.width
    }

    fn frame_height(&self) -> u32 {
        self.height
    }

    fn next_frame(&mut self, frame: &mut VideoFrame) -> Result<bool, MediaError> {
        if self.next > self.total {
            return Ok(false);
        }

        let name = self.pattern.resolve(self.next);
        frame.data.resize(self.pixel_format.frame_bytes(self.width, self.height), 0);
        self.storage.open(&name)?.read_exact(&mut frame.data)?;
        frame.width = self.width;
        frame.height = self.height;
        self.next += 1;
        Ok(true)
    }

    fn rewind(&mut self) -> Result<(), MediaError> {
        self.next = 1;
        Ok(())
    }
}
