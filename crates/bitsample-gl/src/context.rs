//! The slice of a graphics API that render-buffer sampling needs.

use std::fmt;

use bitsample_core::PixelFormat;

use crate::error::ContextError;

/// Rectangle drawing maps onto, in window pixels of the bound target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Viewport covering a whole `width x height` target.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Framebuffer, renderbuffer, viewport and readback operations on a
/// single-threaded graphics context.
///
/// Apart from [`bind_draw_framebuffer`](Self::bind_draw_framebuffer) and
/// [`set_viewport`](Self::set_viewport), implementations must leave every
/// global binding as they found it.
pub trait GraphicsContext {
    type Framebuffer: Copy + Eq + fmt::Debug;
    type Renderbuffer: Copy + Eq + fmt::Debug;

    /// Largest width or height accepted by [`renderbuffer_storage`](Self::renderbuffer_storage).
    fn max_renderbuffer_size(&self) -> u32;

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, ContextError>;
    fn create_renderbuffer(&self) -> Result<Self::Renderbuffer, ContextError>;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn delete_renderbuffer(&self, renderbuffer: Self::Renderbuffer);

    /// Allocate `width x height` storage of `format` for `renderbuffer`.
    fn renderbuffer_storage(
        &self,
        renderbuffer: Self::Renderbuffer,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<(), ContextError>;

    /// Attach `renderbuffer` as color attachment 0 and verify completeness.
    fn attach_color_renderbuffer(
        &self,
        framebuffer: Self::Framebuffer,
        renderbuffer: Self::Renderbuffer,
    ) -> Result<(), ContextError>;

    /// Current draw framebuffer; `None` is the default framebuffer.
    fn draw_framebuffer(&self) -> Option<Self::Framebuffer>;
    fn bind_draw_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);

    fn viewport(&self) -> Viewport;
    fn set_viewport(&self, viewport: Viewport);

    /// Synchronously copy the `width x height` region at the origin of
    /// `framebuffer`'s color attachment into `out`, bottom row first.
    fn read_pixels(
        &self,
        framebuffer: Self::Framebuffer,
        width: u32,
        height: u32,
        format: PixelFormat,
        out: &mut [u8],
    ) -> Result<(), ContextError>;
}

/// Fail with [`ContextError::BufferSize`] unless `out` holds exactly one image.
pub(crate) fn check_pixel_buffer(
    out: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<(), ContextError> {
    let expected = format.byte_len(width, height);
    if out.len() != expected {
        return Err(ContextError::BufferSize {
            expected,
            actual: out.len(),
        });
    }
    Ok(())
}
