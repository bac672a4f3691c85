use crate::errors::MediaError;
use std::fmt;
use std::str::FromStr;

/// Pixel layouts a stored frame can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 3-3-2 bits packed in one byte, as produced by the frame converter.
    #[default]
    Rgb332,
    /// 5-6-5 bits, little-endian, two bytes per pixel.
    Rgb565,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb332 => 1,
            PixelFormat::Rgb565 => 2,
        }
    }

    /// Bytes needed for one `width` x `height` frame.
    pub fn frame_bytes(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

impl FromStr for PixelFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb332" | "332" => Ok(PixelFormat::Rgb332),
            "rgb565" | "565" => Ok(PixelFormat::Rgb565),
            other => Err(MediaError::UnknownPixelFormat(other.to_string())),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Rgb332 => f.write_str("rgb332"),
            PixelFormat::Rgb565 => f.write_str("rgb565"),
        }
    }
}

#[inline]
pub fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

// Top bits are replicated into the low bits so full-scale 3-bit values map to
// full-scale 5/6-bit values.
const BLUE_2_TO_5: [u16; 4] = [0, 11, 21, 31];

#[inline]
pub fn rgb332_to_rgb565(color: u8) -> u16 {
    let c = color as u16;
    ((c & 0xE0) << 8)
        | ((c & 0xC0) << 5)
        | ((c & 0x1C) << 6)
        | ((c & 0x1C) << 3)
        | BLUE_2_TO_5[(c & 0x03) as usize]
}

/// Convert packed RGB888 triples into RGB565 pixels.
pub fn convert_rgb888_to_rgb565(rgb888: &[u8], rgb565: &mut [u16]) -> Result<(), MediaError> {
    if rgb888.len() != rgb565.len() * 3 {
        return Err(MediaError::LengthMismatch {
            expected: rgb565.len() * 3,
            actual: rgb888.len(),
        });
    }

    for (px, out) in rgb888.chunks_exact(3).zip(rgb565.iter_mut()) {
        *out = rgb888_to_rgb565(px[0], px[1], px[2]);
    }
    Ok(())
}

/// Expand RGB332 bytes into RGB565 pixels.
pub fn expand_rgb332(rgb332: &[u8], rgb565: &mut [u16]) -> Result<(), MediaError> {
    if rgb332.len() != rgb565.len() {
        return Err(MediaError::LengthMismatch {
            expected: rgb565.len(),
            actual: rgb332.len(),
        });
    }

    for (&c, out) in rgb332.iter().zip(rgb565.iter_mut()) {
        *out = rgb332_to_rgb565(c);
    }
    Ok(())
}

/// 8x8 checkerboard, handy for checking display wiring and orientation.
pub fn checkerboard(width: u32, height: u32, color1: u16, color2: u16) -> Vec<u16> {
    (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                if ((x / 8) + (y / 8)).is_multiple_of(2) {
                    color1
                } else {
                    color2
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb888_primaries() {
        assert_eq!(rgb888_to_rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb888_to_rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb888_to_rgb565(0, 0, 255), 0x001F);
        assert_eq!(rgb888_to_rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb888_to_rgb565(0, 0, 0), 0x0000);
    }

    #[test]
    fn test_rgb332_primaries_reach_full_scale() {
        assert_eq!(rgb332_to_rgb565(0xE0), 0xF800);
        assert_eq!(rgb332_to_rgb565(0x1C), 0x07E0);
        assert_eq!(rgb332_to_rgb565(0x03), 0x001F);
        assert_eq!(rgb332_to_rgb565(0xFF), 0xFFFF);
        assert_eq!(rgb332_to_rgb565(0x00), 0x0000);
    }

    #[test]
    fn test_convert_rejects_bad_lengths() {
        let mut out = [0u16; 2];
        assert!(convert_rgb888_to_rgb565(&[0u8; 5], &mut out).is_err());
        assert!(expand_rgb332(&[0u8; 3], &mut out).is_err());

        convert_rgb888_to_rgb565(&[255, 0, 0, 0, 0, 255], &mut out).unwrap();
        assert_eq!(out, [0xF800, 0x001F]);
    }

    #[test]
    fn test_checkerboard_layout() {
        let pattern = checkerboard(16, 16, 0xAAAA, 0x5555);
        assert_eq!(pattern.len(), 256);
        assert_eq!(pattern[0], 0xAAAA);
        assert_eq!(pattern[8], 0x5555);
        assert_eq!(pattern[8 * 16], 0x5555);
        assert_eq!(pattern[8 * 16 + 8], 0xAAAA);
    }

    #[test]
    fn test_pixel_format_parsing() {
        assert_eq!("RGB332".parse::<PixelFormat>().unwrap(), PixelFormat::Rgb332);
        assert_eq!("rgb565".parse::<PixelFormat>().unwrap(), PixelFormat::Rgb565);
        assert!("yuyv".parse::<PixelFormat>().is_err());
        assert_eq!(PixelFormat::Rgb565.frame_bytes(160, 128), 160 * 128 * 2);
        assert_eq!(PixelFormat::Rgb332.frame_bytes(160, 128), 160 * 128);
    }
}
