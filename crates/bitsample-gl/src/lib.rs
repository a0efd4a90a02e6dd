//! bitsample GL: capture offscreen GPU rendering into a CPU bitmap.
//!
//! [`RenderBufferSampler`] owns a renderbuffer-backed framebuffer. Drawing
//! done inside [`RenderBufferSampler::render_into`] lands in that
//! framebuffer, and its full contents are read back into a
//! [`PixelSink`](bitsample_core::PixelSink) afterwards.
//!
//! The graphics API is reached through [`GraphicsContext`]. With the default
//! `glow` feature it is implemented for `glow::Context`; [`SoftwareContext`]
//! implements it on the CPU for tests and headless use.

mod error;

pub mod context;
#[cfg(feature = "glow")]
pub mod glow_backend;
pub mod readback;
pub mod sampler;
pub mod scope;
pub mod software;

pub use context::{GraphicsContext, Viewport};
pub use error::{AllocationError, ContextError, ResourceKind, SamplerError};
pub use sampler::RenderBufferSampler;
pub use scope::{BindingScope, BindingState};
pub use software::{FailPoint, SoftwareContext};
