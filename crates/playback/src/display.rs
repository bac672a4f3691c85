use media::PixelFormat;
use media::pixel::rgb332_to_rgb565;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::raw::{c_char, c_ulong};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Area {area:?} does not fit a {screen_width}x{screen_height} screen")]
    OutOfBounds {
        area: Area,
        screen_width: u32,
        screen_height: u32,
    },

    #[error("Area holds {expected} pixels but {actual} were supplied")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Framebuffer {path} is {actual} bytes, need at least {required}")]
    FramebufferTooSmall {
        path: String,
        required: usize,
        actual: usize,
    },

    #[error("Framebuffer line length {line_length} is shorter than {width} pixels at 16bpp")]
    StrideTooSmall { line_length: usize, width: u32 },

    #[error("Framebuffer I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Screen rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Area {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Area {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn fits(&self, screen_width: u32, screen_height: u32) -> bool {
        self.x as u64 + self.width as u64 <= screen_width as u64
            && self.y as u64 + self.height as u64 <= screen_height as u64
    }
}

/// Borrowed frame bytes tagged with their layout.
#[derive(Debug, Clone, Copy)]
pub struct PixelData<'a> {
    format: PixelFormat,
    bytes: &'a [u8],
}

impl<'a> PixelData<'a> {
    pub fn new(format: PixelFormat, bytes: &'a [u8]) -> Self {
        Self { format, bytes }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn pixel_count(&self) -> usize {
        self.bytes.len() / self.format.bytes_per_pixel()
    }

    /// Pixel `i` as RGB565.
    #[inline]
    pub fn rgb565(&self, i: usize) -> u16 {
        match self.format {
            PixelFormat::Rgb332 => rgb332_to_rgb565(self.bytes[i]),
            PixelFormat::Rgb565 => u16::from_le_bytes([self.bytes[2 * i], self.bytes[2 * i + 1]]),
        }
    }
}

/// Anything that can show a rectangle of pixels.
///
/// Callers serialize access themselves; an implementation only ever sees one
/// push at a time.
pub trait DisplaySink: Send {
    fn push_pixels(&mut self, area: Area, pixels: PixelData<'_>) -> Result<(), DisplayError>;

    fn fill(&mut self, area: Area, color: u16) -> Result<(), DisplayError>;
}

/// Check that `pixels` exactly covers `area`.
pub fn check_pixels(area: Area, pixels: &PixelData<'_>) -> Result<(), DisplayError> {
    let expected = area.pixel_count() * pixels.format().bytes_per_pixel();
    if pixels.bytes().len() != expected {
        return Err(DisplayError::SizeMismatch {
            expected: area.pixel_count(),
            actual: pixels.pixel_count(),
        });
    }
    Ok(())
}

const FBIOGET_FSCREENINFO: c_ulong = 0x4602;

/// `struct fb_fix_screeninfo` from `<linux/fb.h>`.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Default)]
struct FbFixScreeninfo {
    id: [c_char; 16],
    smem_start: c_ulong,
    smem_len: u32,
    type_: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

nix::ioctl_read_bad!(fbioget_fscreeninfo, FBIOGET_FSCREENINFO, FbFixScreeninfo);

/// Line length and video memory size reported by the driver, if it is one.
fn fixed_screen_info(file: &File) -> Option<(usize, usize)> {
    let mut info = FbFixScreeninfo::default();
    match unsafe { fbioget_fscreeninfo(file.as_raw_fd(), &mut info) } {
        Ok(_) => Some((info.line_length as usize, info.smem_len as usize)),
        Err(e) => {
            tracing::debug!("FBIOGET_FSCREENINFO unavailable ({}), assuming packed rows", e);
            None
        }
    }
}

/// A 16 bpp Linux framebuffer device mapped into memory.
pub struct LinuxFramebuffer {
    mmap: MmapMut,
    width: u32,
    height: u32,
    stride: usize,
}

impl LinuxFramebuffer {
    /// Map `path` for a `width` x `height` RGB565 screen.
    ///
    /// Rows are `line_length` bytes apart on a framebuffer device; anything
    /// else (a plain file, `/dev/zero`) is taken as packed rows.
    pub fn open(path: impl AsRef<Path>, width: u32, height: u32) -> Result<Self, DisplayError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let packed = width as usize * 2;

        let (stride, device_len) = match fixed_screen_info(&file) {
            Some((line_length, smem_len)) if line_length > 0 => (line_length, Some(smem_len)),
            _ => (packed, None),
        };
        if stride < packed {
            return Err(DisplayError::StrideTooSmall {
                line_length: stride,
                width,
            });
        }
        let required = stride * height as usize;

        let metadata = file.metadata()?;
        let available = if metadata.is_file() {
            Some(metadata.len() as usize)
        } else {
            device_len
        };
        if let Some(actual) = available
            && actual < required
        {
            return Err(DisplayError::FramebufferTooSmall {
                path: path.display().to_string(),
                required,
                actual,
            });
        }

        let mmap = unsafe { MmapOptions::new().len(required).map_mut(&file)? };

        tracing::info!(
            "Framebuffer {} mapped: {}x{} @ 16bpp, stride {}",
            path.display(),
            width,
            height,
            stride
        );

        Ok(Self {
            mmap,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn check_area(&self, area: Area) -> Result<(), DisplayError> {
        if !area.fits(self.width, self.height) {
            return Err(DisplayError::OutOfBounds {
                area,
                screen_width: self.width,
                screen_height: self.height,
            });
        }
        Ok(())
    }

    fn row_mut(&mut self, area: Area, row: u32) -> &mut [u8] {
        let start = (area.y + row) as usize * self.stride + area.x as usize * 2;
        &mut self.mmap[start..start + area.width as usize * 2]
    }
}

impl DisplaySink for LinuxFramebuffer {
    fn push_pixels(&mut self, area: Area, pixels: PixelData<'_>) -> Result<(), DisplayError> {
        self.check_area(area)?;
        check_pixels(area, &pixels)?;

        let width = area.width as usize;
        for row in 0..area.height {
            let first = row as usize * width;
            let dst = self.row_mut(area, row);
            for (col, out) in dst.chunks_exact_mut(2).enumerate() {
                out.copy_from_slice(&pixels.rgb565(first + col).to_le_bytes());
            }
        }
        Ok(())
    }

    fn fill(&mut self, area: Area, color: u16) -> Result<(), DisplayError> {
        self.check_area(area)?;

        let color = color.to_le_bytes();
        for row in 0..area.height {
            for out in self.row_mut(area, row).chunks_exact_mut(2) {
                out.copy_from_slice(&color);
            }
        }
        Ok(())
    }
}
