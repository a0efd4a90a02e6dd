//! Pixel layout shared by the capture side and the sampler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Layout of one pixel in host memory.
///
/// Only formats that are color-renderable on every GL ES 3.0 / GL 3.0 device
/// and that read back without row padding are listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit unsigned normalized R, G, B, A in that byte order.
    #[default]
    Rgba8,
}

impl PixelFormat {
    /// Bytes occupied by a single pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
        }
    }

    /// Index of the alpha byte within a pixel.
    pub const fn alpha_component(self) -> usize {
        match self {
            Self::Rgba8 => 3,
        }
    }

    /// Size in bytes of a tightly packed `width * height` image.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba8 => write!(f, "RGBA8"),
        }
    }
}

/// Destination for captured pixels.
///
/// Implemented by storage that owns a tightly packed pixel buffer. The
/// writer never resizes or reallocates the buffer; it only overwrites its
/// contents, so `pixels_mut().len()` must equal
/// `format().byte_len(width(), height())`.
pub trait PixelSink {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> PixelFormat;
    fn pixels_mut(&mut self) -> &mut [u8];
}

impl<S: PixelSink + ?Sized> PixelSink for &mut S {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn format(&self) -> PixelFormat {
        (**self).format()
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        (**self).pixels_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_layout() {
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgba8.alpha_component(), 3);
        assert_eq!(PixelFormat::Rgba8.byte_len(3, 5), 60);
    }

    #[test]
    fn test_format_serde_name() {
        let json = serde_json::to_string(&PixelFormat::Rgba8).expect("serialize");
        assert_eq!(json, "\"rgba8\"");
    }
}
