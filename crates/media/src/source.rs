use crate::errors::MediaError;

/// One decoded frame. `data` grows to fit the largest frame seen and is
/// reused between calls.
#[derive(Debug, Default, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pull-based producer of fixed-size video frames.
pub trait FrameSource: Send {
    fn frame_rate(&self) -> u32;
    fn frame_width(&self) -> u32;
    fn frame_height(&self) -> u32;

    /// Fill `frame` with the next frame. Returns `Ok(false)` at end of stream.
    fn next_frame(&mut self, frame: &mut VideoFrame) -> Result<bool, MediaError>;

    /// Go back to the first frame.
    fn rewind(&mut self) -> Result<(), MediaError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StereoSample {
    pub left: i16,
    pub right: i16,
}

/// Pull-based producer of PCM audio.
pub trait SampleSource: Send {
    fn sample_rate(&self) -> u32;

    /// Fill every slot of `samples`, looping the source if it runs out.
    fn fill(&mut self, samples: &mut [StereoSample]) -> Result<(), MediaError>;
}
