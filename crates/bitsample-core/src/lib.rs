//! bitsample core: CPU-side pixel storage for image-based physics sampling.
//!
//! This crate owns the host copy of sampled pixels and turns it into scalar
//! density samples. No GPU dependencies; the capture side lives in
//! `bitsample-gl`, which writes into anything implementing [`PixelSink`].

pub mod bitmap;
pub mod desc;
pub mod error;
pub mod format;

// Re-exports for convenience.
pub use bitmap::{BitmapSampler, Border, Rect};
pub use desc::SamplerDesc;
pub use error::BitmapError;
pub use format::{PixelFormat, PixelSink};
