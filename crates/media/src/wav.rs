use crate::errors::MediaError;
use crate::source::{SampleSource, StereoSample};
use std::io::{Read, Seek, SeekFrom};

const WAV_HEADER_LEN: u64 = 44;
const MAX_SAMPLE_RATE: u32 = 48_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    pub wav_size: u32,
    pub fmt_chunk_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub sample_alignment: u16,
    pub bit_depth: u16,
    pub data_bytes: u32,
}

impl WavHeader {
    pub fn parse(bytes: &[u8; WAV_HEADER_LEN as usize]) -> Result<Self, MediaError> {
        let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);

        if &bytes[0..4] != b"RIFF" {
            return Err(MediaError::wav("Not RIFF format"));
        }
        if &bytes[8..12] != b"WAVE" {
            return Err(MediaError::wav("Not Wave file"));
        }
        if &bytes[12..15] != b"fmt" {
            return Err(MediaError::wav("No format section found"));
        }
        if &bytes[36..40] != b"data" {
            return Err(MediaError::wav("data section not found"));
        }

        let header = Self {
            wav_size: u32_at(4),
            fmt_chunk_size: u32_at(16),
            audio_format: u16_at(20),
            num_channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            sample_alignment: u16_at(32),
            bit_depth: u16_at(34),
            data_bytes: u32_at(40),
        };

        if header.audio_format != 1 {
            return Err(MediaError::wav("format Id must be 1"));
        }
        if header.fmt_chunk_size != 16 {
            return Err(MediaError::wav("format section size must be 16"));
        }
        if header.num_channels != 1 && header.num_channels != 2 {
            return Err(MediaError::wav("only mono or stereo permitted"));
        }
        if header.sample_rate > MAX_SAMPLE_RATE {
            return Err(MediaError::wav("Sample rate cannot be greater than 48000"));
        }
        if header.bit_depth != 8 && header.bit_depth != 16 {
            return Err(MediaError::wav("Only 8 or 16 bits per sample permitted"));
        }
        if (header.data_bytes as usize) < header.block_len() {
            return Err(MediaError::wav("no samples in data section"));
        }
        Ok(header)
    }

    /// Bytes in one sample frame across all channels.
    pub fn block_len(&self) -> usize {
        self.num_channels as usize * (self.bit_depth as usize / 8)
    }
}

/// Streams PCM sample frames from a WAV file, looping at the end of the data
/// section. Mono input is duplicated onto both channels.
pub struct WavReader<R> {
    reader: R,
    header: WavHeader,
    position: u64,
}

impl<R: Read + Seek + Send> WavReader<R> {
    pub fn open(mut reader: R) -> Result<Self, MediaError> {
        let mut raw = [0u8; WAV_HEADER_LEN as usize];
        reader.read_exact(&mut raw)?;
        let header = WavHeader::parse(&raw)?;

        tracing::info!(
            "WAV loaded: {} Hz, {} channel(s), {} bit, {} data bytes",
            header.sample_rate,
            header.num_channels,
            header.bit_depth,
            header.data_bytes
        );

        Ok(Self {
            reader,
            header,
            position: 0,
        })
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    fn decode(&self, raw: &[u8]) -> i16 {
        match self.header.bit_depth {
            8 => ((raw[0] as i16) - 128) << 8,
            _ => i16::from_le_bytes([raw[0], raw[1]]),
        }
    }
}

impl<R: Read + Seek + Send> SampleSource for WavReader<R> {
    fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    fn fill(&mut self, samples: &mut [StereoSample]) -> Result<(), MediaError> {
        let block_len = self.header.block_len();
        let data_len = self.header.data_bytes as u64;
        let sample_len = block_len / self.header.num_channels as usize;
        let mut block = [0u8; 4];

        for out in samples.iter_mut() {
            if self.position + block_len as u64 > data_len {
                self.reader.seek(SeekFrom::Start(WAV_HEADER_LEN))?;
                self.position = 0;
            }

            self.reader.read_exact(&mut block[..block_len])?;
            self.position += block_len as u64;

            let left = self.decode(&block[..sample_len]);
            let right = if self.header.num_channels == 1 {
                left
            } else {
                self.decode(&block[sample_len..block_len])
            };
            *out = StereoSample { left, right };
        }
        Ok(())
    }
}
