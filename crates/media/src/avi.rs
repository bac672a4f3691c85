use crate::errors::MediaError;
use crate::source::{FrameSource, VideoFrame};
use common::span_debug;
use std::io::{self, Read, Seek, SeekFrom};

/// RIFF header + hdrl LIST header + avih chunk.
const AVI_HEADER_LEN: usize = 88;

/// Offset of the first chunk after `RIFF <size> AVI `.
const RIFF_PREAMBLE_LEN: u64 = 12;

/// Consecutive non-video chunks tolerated before the stream is declared malformed.
pub const MAX_SKIPPED_CHUNKS: usize = 64;

const DEFAULT_FRAME_RATE: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AviHeader {
    pub file_size: u32,
    pub micro_sec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub total_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
}

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

impl AviHeader {
    pub fn parse(bytes: &[u8; AVI_HEADER_LEN]) -> Result<Self, MediaError> {
        if &bytes[0..4] != b"RIFF" {
            return Err(MediaError::avi("Not RIFF format"));
        }
        if &bytes[8..12] != b"AVI " {
            return Err(MediaError::avi("Not AVI file"));
        }
        if &bytes[12..16] != b"LIST" {
            return Err(MediaError::avi("No LIST section found"));
        }
        if &bytes[20..24] != b"hdrl" {
            return Err(MediaError::avi("No hdrl section found"));
        }
        if &bytes[24..28] != b"avih" {
            return Err(MediaError::avi("No avih header found"));
        }

        let header = Self {
            file_size: le_u32(bytes, 4),
            micro_sec_per_frame: le_u32(bytes, 32),
            max_bytes_per_sec: le_u32(bytes, 36),
            total_frames: le_u32(bytes, 48),
            streams: le_u32(bytes, 56),
            suggested_buffer_size: le_u32(bytes, 60),
            width: le_u32(bytes, 64),
            height: le_u32(bytes, 68),
        };

        if header.width == 0 || header.height == 0 {
            return Err(MediaError::avi("Invalid frame dimensions"));
        }
        if header.total_frames == 0 {
            return Err(MediaError::avi("No frames found"));
        }
        Ok(header)
    }

    /// Largest video chunk accepted: the suggested buffer size, but never
    /// less than one 16 bpp frame.
    pub fn max_frame_bytes(&self) -> u64 {
        let frame = self.width as u64 * self.height as u64 * 2;
        frame.max(self.suggested_buffer_size as u64)
    }

    pub fn frame_rate(&self) -> u32 {
        match self.micro_sec_per_frame {
            0 => DEFAULT_FRAME_RATE,
            us => (1_000_000 / us).max(1),
        }
    }
}

fn is_video_chunk(id: &[u8; 4]) -> bool {
    id[2] == b'd' && (id[3] == b'b' || id[3] == b'c')
}

/// RIFF chunks are word aligned; odd sizes carry one pad byte.
fn padded(size: u32) -> i64 {
    size as i64 + (size & 1) as i64
}

/// Reads uncompressed video chunks out of an AVI container, looping back to
/// the first frame once `total_frames` have been delivered.
pub struct AviReader<R> {
    reader: R,
    header: AviHeader,
    data_start: u64,
    current_frame: u32,
}

impl<R: Read + Seek + Send> AviReader<R> {
    pub fn open(mut reader: R) -> Result<Self, MediaError> {
        let mut raw = [0u8; AVI_HEADER_LEN];
        reader.read_exact(&mut raw)?;
        let header = AviHeader::parse(&raw)?;

        tracing::debug!(
            file_size = header.file_size,
            micro_sec_per_frame = header.micro_sec_per_frame,
            max_bytes_per_sec = header.max_bytes_per_sec,
            streams = header.streams,
            "AVI header"
        );

        let data_start = Self::find_movi(&mut reader)?;
        tracing::info!(
            "AVI loaded: {}x{}, {} frames, {} fps, movi at {}",
            header.width,
            header.height,
            header.total_frames,
            header.frame_rate(),
            data_start
        );

        Ok(Self {
            reader,
            header,
            data_start,
            current_frame: 0,
        })
    }

    pub fn header(&self) -> &AviHeader {
        &self.header
    }

    fn read_chunk_header(reader: &mut R) -> io::Result<([u8; 4], u32)> {
        let mut raw = [0u8; 8];
        reader.read_exact(&mut raw)?;
        let mut id = [0u8; 4];
        id.copy_from_slice(&raw[..4]);
        Ok((id, le_u32(&raw, 4)))
    }

    /// Walk top-level chunks until the `movi` list; returns the offset of its first chunk.
    fn find_movi(reader: &mut R) -> Result<u64, MediaError> {
        reader.seek(SeekFrom::Start(RIFF_PREAMBLE_LEN))?;

        loop {
            let (id, size) = match Self::read_chunk_header(reader) {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(MediaError::MissingMovi);
                }
                Err(e) => return Err(e.into()),
            };

            if &id == b"LIST" {
                let mut list_type = [0u8; 4];
                match reader.read_exact(&mut list_type) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        return Err(MediaError::MissingMovi);
                    }
                    Err(e) => return Err(e.into()),
                }
                if &list_type == b"movi" {
                    return Ok(reader.stream_position()?);
                }
                reader.seek(SeekFrom::Current(padded(size) - 4))?;
            } else {
                reader.seek(SeekFrom::Current(padded(size)))?;
            }
        }
    }
}

impl<R: Read + Seek + Send> FrameSource for AviReader<R> {
    fn frame_rate(&self) -> u32 {
        self.header.frame_rate()
    }

    fn frame_width(&self) -> u32 {
        self.header.width
    }

    fn frame_height(&self) -> u32 {
        self.header.height
    }

    fn next_frame(&mut self, frame: &mut VideoFrame) -> Result<bool, MediaError> {
        let _s = span_debug!("avi_next_frame", frame = self.current_frame);

        if self.current_frame >= self.header.total_frames {
            self.rewind()?;
        }

        let mut skipped = 0;
        loop {
            let (id, size) = match Self::read_chunk_header(&mut self.reader) {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
                Err(e) => return Err(e.into()),
            };

            if is_video_chunk(&id) {
                let limit = self.header.max_frame_bytes();
                if size as u64 > limit {
                    return Err(MediaError::ChunkTooLarge { size, limit });
                }
                frame.data.resize(size as usize, 0);
                match self.reader.read_exact(&mut frame.data) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
                    Err(e) => return Err(e.into()),
                }
                if size & 1 == 1 {
                    self.reader.seek(SeekFrom::Current(1))?;
                }
                frame.width = self.header.width;
                frame.height = self.header.height;
                self.current_frame += 1;
                return Ok(true);
            }

            skipped += 1;
            if skipped > MAX_SKIPPED_CHUNKS {
                return Err(MediaError::TooManySkippedChunks(skipped));
            }

            if &id == b"LIST" {
                // `rec ` groups inside movi hold frames: step into the list.
                self.reader.seek(SeekFrom::Current(4))?;
            } else {
                self.reader.seek(SeekFrom::Current(padded(size)))?;
            }
        }
    }

    fn rewind(&mut self) -> Result<(), MediaError> {
        self.current_frame = 0;
        self.reader.seek(SeekFrom::Start(self.data_start))?;
        Ok(())
    }
}
