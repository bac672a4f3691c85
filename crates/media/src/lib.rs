pub mod avi;
pub mod errors;
pub mod pixel;
pub mod source;
pub mod wav;

pub use avi::{AviHeader, AviReader};
pub use errors::MediaError;
pub use pixel::PixelFormat;
pub use source::{FrameSource, SampleSource, StereoSample, VideoFrame};
pub use wav::{WavHeader, WavReader};
