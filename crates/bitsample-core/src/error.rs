use thiserror::Error;

#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("bitmap dimensions must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
    #[error("component {component} is out of range for a {bytes_per_pixel}-byte pixel")]
    BadComponent {
        component: usize,
        bytes_per_pixel: usize,
    },
    #[error("pixel buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("image export failed: {0}")]
    Image(#[from] image::ImageError),
}
