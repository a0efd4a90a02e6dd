//! [`GraphicsContext`] for `glow::Context` (GL 3.0+ / GL ES 3.0+ / WebGL 2).
//!
//! The caller must make the context current on the calling thread before
//! using a sampler, and keep it current for the sampler's lifetime.
//! Driver failures are picked up through `glGetError` right after each call,
//! so errors left pending by earlier unrelated code are attributed to the
//! next sampler operation.
#![allow(unsafe_code)]
// glow exposes every GL entry point as an unsafe fn.

use bitsample_core::PixelFormat;
use glow::HasContext;

use crate::context::{GraphicsContext, Viewport, check_pixel_buffer};
use crate::error::{ContextError, ResourceKind};

type GlFramebuffer = <glow::Context as HasContext>::Framebuffer;
type GlRenderbuffer = <glow::Context as HasContext>::Renderbuffer;

/// Pack parameters forced during readback so rows land tightly packed at
/// the start of the client buffer.
const TIGHT_PACK: [(u32, i32); 4] = [
    (glow::PACK_ALIGNMENT, 1),
    (glow::PACK_ROW_LENGTH, 0),
    (glow::PACK_SKIP_PIXELS, 0),
    (glow::PACK_SKIP_ROWS, 0),
];

fn internal_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgba8 => glow::RGBA8,
    }
}

fn transfer_format(format: PixelFormat) -> (u32, u32) {
    match format {
        PixelFormat::Rgba8 => (glow::RGBA, glow::UNSIGNED_BYTE),
    }
}

/// First pending GL error, draining the rest.
fn check_error(gl: &glow::Context, op: &'static str) -> Result<(), ContextError> {
    // SAFETY: glGetError has no preconditions beyond a current context.
    let first = unsafe { gl.get_error() };
    if first == glow::NO_ERROR {
        return Ok(());
    }
    loop {
        // SAFETY: as above.
        let next = unsafe { gl.get_error() };
        if next == glow::NO_ERROR {
            break;
        }
        tracing::trace!("{op}: discarding additional GL error {next:#06x}");
    }
    Err(ContextError::Gl { op, code: first })
}

impl GraphicsContext for glow::Context {
    type Framebuffer = GlFramebuffer;
    type Renderbuffer = GlRenderbuffer;

    fn max_renderbuffer_size(&self) -> u32 {
        // SAFETY: state query.
        let max = unsafe { self.get_parameter_i32(glow::MAX_RENDERBUFFER_SIZE) };
        max.max(0) as u32
    }

    fn create_framebuffer(&self) -> Result<GlFramebuffer, ContextError> {
        // SAFETY: creates a new name; no bindings change.
        unsafe { HasContext::create_framebuffer(self) }.map_err(|reason| ContextError::Create {
            kind: ResourceKind::Framebuffer,
            reason,
        })
    }

    fn create_renderbuffer(&self) -> Result<GlRenderbuffer, ContextError> {
        // SAFETY: creates a new name; no bindings change.
        unsafe { HasContext::create_renderbuffer(self) }.map_err(|reason| ContextError::Create {
            kind: ResourceKind::Renderbuffer,
            reason,
        })
    }

    fn delete_framebuffer(&self, framebuffer: GlFramebuffer) {
        // SAFETY: the name was created on this context and is deleted once.
        unsafe { HasContext::delete_framebuffer(self, framebuffer) }
    }

    fn delete_renderbuffer(&self, renderbuffer: GlRenderbuffer) {
        // SAFETY: the name was created on this context and is deleted once.
        unsafe { HasContext::delete_renderbuffer(self, renderbuffer) }
    }

    fn renderbuffer_storage(
        &self,
        renderbuffer: GlRenderbuffer,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<(), ContextError> {
        // SAFETY: the previous renderbuffer binding is restored before return.
        unsafe {
            let previous = self.get_parameter_renderbuffer(glow::RENDERBUFFER_BINDING);
            self.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            HasContext::renderbuffer_storage(
                self,
                glow::RENDERBUFFER,
                internal_format(format),
                width as i32,
                height as i32,
            );
            let result = check_error(self, "renderbuffer_storage");
            self.bind_renderbuffer(glow::RENDERBUFFER, previous);
            result
        }
    }

    fn attach_color_renderbuffer(
        &self,
        framebuffer: GlFramebuffer,
        renderbuffer: GlRenderbuffer,
    ) -> Result<(), ContextError> {
        // SAFETY: only the draw binding is touched, and it is restored.
        unsafe {
            let previous = self.get_parameter_framebuffer(glow::DRAW_FRAMEBUFFER_BINDING);
            self.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(framebuffer));
            self.framebuffer_renderbuffer(
                glow::DRAW_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::RENDERBUFFER,
                Some(renderbuffer),
            );
            let status = self.check_framebuffer_status(glow::DRAW_FRAMEBUFFER);
            let result = check_error(self, "framebuffer_renderbuffer");
            self.bind_framebuffer(glow::DRAW_FRAMEBUFFER, previous);
            result?;
            if status != glow::FRAMEBUFFER_COMPLETE {
                return Err(ContextError::IncompleteFramebuffer { status });
            }
            Ok(())
        }
    }

    fn draw_framebuffer(&self) -> Option<GlFramebuffer> {
        // SAFETY: state query.
        unsafe { self.get_parameter_framebuffer(glow::DRAW_FRAMEBUFFER_BINDING) }
    }

    fn bind_draw_framebuffer(&self, framebuffer: Option<GlFramebuffer>) {
        // SAFETY: binding a live name or the default framebuffer.
        unsafe { self.bind_framebuffer(glow::DRAW_FRAMEBUFFER, framebuffer) }
    }

    fn viewport(&self) -> Viewport {
        let mut values = [0i32; 4];
        // SAFETY: GL_VIEWPORT writes exactly four integers.
        unsafe { self.get_parameter_i32_slice(glow::VIEWPORT, &mut values) };
        Viewport::new(
            values[0],
            values[1],
            values[2].max(0) as u32,
            values[3].max(0) as u32,
        )
    }

    fn set_viewport(&self, viewport: Viewport) {
        // SAFETY: plain state change.
        unsafe {
            HasContext::viewport(
                self,
                viewport.x,
                viewport.y,
                viewport.width as i32,
                viewport.height as i32,
            )
        }
    }

    fn read_pixels(
        &self,
        framebuffer: GlFramebuffer,
        width: u32,
        height: u32,
        format: PixelFormat,
        out: &mut [u8],
    ) -> Result<(), ContextError> {
        check_pixel_buffer(out, width, height, format)?;
        let (gl_format, gl_type) = transfer_format(format);

        // SAFETY: `out` holds exactly `width * height` tightly packed pixels.
        // Every entry of TIGHT_PACK is forced, so no alignment padding, row
        // length or skip offset can push writes past the end of `out`, and
        // nothing goes to a pack buffer. The read binding, pack buffer and
        // pack parameters are restored afterwards.
        unsafe {
            let previous_read = self.get_parameter_framebuffer(glow::READ_FRAMEBUFFER_BINDING);
            let previous_pack_buffer = self.get_parameter_buffer(glow::PIXEL_PACK_BUFFER_BINDING);
            let previous_pack = TIGHT_PACK.map(|(param, _)| (param, self.get_parameter_i32(param)));

            self.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(framebuffer));
            self.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
            for (param, value) in TIGHT_PACK {
                self.pixel_store_i32(param, value);
            }

            HasContext::read_pixels(
                self,
                0,
                0,
                width as i32,
                height as i32,
                gl_format,
                gl_type,
                glow::PixelPackData::Slice(Some(out)),
            );
            let result = check_error(self, "read_pixels");

            for (param, value) in previous_pack.into_iter().rev() {
                self.pixel_store_i32(param, value);
            }
            self.bind_buffer(glow::PIXEL_PACK_BUFFER, previous_pack_buffer);
            self.bind_framebuffer(glow::READ_FRAMEBUFFER, previous_read);
            result
        }
    }
}
