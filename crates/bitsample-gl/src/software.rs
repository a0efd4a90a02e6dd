//! CPU implementation of [`GraphicsContext`].
//!
//! `SoftwareContext` models the GL object and binding rules the sampler
//! relies on: named framebuffers and renderbuffers, a default framebuffer,
//! a draw binding, a viewport, and synchronous readback. It also exposes a
//! few drawing commands so callers can render without a GPU, and lets tests
//! inject driver failures and count live objects.

use std::collections::HashMap;
use std::num::NonZeroU32;

use bitsample_core::PixelFormat;
use parking_lot::Mutex;

use crate::context::{GraphicsContext, Viewport, check_pixel_buffer};
use crate::error::{ContextError, ResourceKind};

const GL_INVALID_VALUE: u32 = 0x0501;
const GL_OUT_OF_MEMORY: u32 = 0x0505;
const GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT: u32 = 0x8CD6;

/// Default value of `GL_MAX_RENDERBUFFER_SIZE` reported by a new context.
pub const DEFAULT_MAX_RENDERBUFFER_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoftFramebuffer(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoftRenderbuffer(NonZeroU32);

/// Driver call that should fail on its next invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateFramebuffer,
    CreateRenderbuffer,
    RenderbufferStorage,
    AttachRenderbuffer,
    ReadPixels,
}

/// Bottom-up RGBA8 pixel storage.
#[derive(Debug, Clone)]
struct Surface {
    width: u32,
    height: u32,
    texels: Vec<[u8; 4]>,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    /// Fill the intersection of the surface with `[x0, x1) x [y0, y1)`.
    fn fill(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 4]) {
        let x0 = x0.clamp(0, self.width as i64) as usize;
        let x1 = x1.clamp(0, self.width as i64) as usize;
        let y0 = y0.clamp(0, self.height as i64) as usize;
        let y1 = y1.clamp(0, self.height as i64) as usize;
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let stride = self.width as usize;
        for y in y0..y1 {
            self.texels[y * stride + x0..y * stride + x1].fill(color);
        }
    }
}

#[derive(Debug)]
struct State {
    next_name: u32,
    max_renderbuffer_size: u32,
    fail_next: Option<FailPoint>,
    default_surface: Surface,
    /// Framebuffer name to its color attachment.
    framebuffers: HashMap<SoftFramebuffer, Option<SoftRenderbuffer>>,
    /// Renderbuffer name to its storage, once allocated.
    renderbuffers: HashMap<SoftRenderbuffer, Option<Surface>>,
    draw_framebuffer: Option<SoftFramebuffer>,
    viewport: Viewport,
    clear_color: [u8; 4],
}

impl State {
    fn take_failure(&mut self, point: FailPoint) -> bool {
        if self.fail_next == Some(point) {
            self.fail_next = None;
            return true;
        }
        false
    }

    fn allocate_name(&mut self) -> NonZeroU32 {
        self.next_name += 1;
        NonZeroU32::MIN.saturating_add(self.next_name - 1)
    }

    /// Color storage behind `framebuffer`, if it has any.
    fn surface_mut(&mut self, framebuffer: Option<SoftFramebuffer>) -> Option<&mut Surface> {
        match framebuffer {
            None => Some(&mut self.default_surface),
            Some(fb) => {
                let rb = (*self.framebuffers.get(&fb)?)?;
                self.renderbuffers.get_mut(&rb)?.as_mut()
            }
        }
    }

    fn surface(&self, framebuffer: Option<SoftFramebuffer>) -> Option<&Surface> {
        match framebuffer {
            None => Some(&self.default_surface),
            Some(fb) => {
                let rb = (*self.framebuffers.get(&fb)?)?;
                self.renderbuffers.get(&rb)?.as_ref()
            }
        }
    }
}

/// CPU-backed graphics context with a `width x height` default framebuffer.
#[derive(Debug)]
pub struct SoftwareContext {
    state: Mutex<State>,
}

impl SoftwareContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Mutex::new(State {
                next_name: 0,
                max_renderbuffer_size: DEFAULT_MAX_RENDERBUFFER_SIZE,
                fail_next: None,
                default_surface: Surface::new(width, height),
                framebuffers: HashMap::new(),
                renderbuffers: HashMap::new(),
                draw_framebuffer: None,
                viewport: Viewport::full(width, height),
                clear_color: [0; 4],
            }),
        }
    }

    pub fn set_max_renderbuffer_size(&self, max: u32) {
        self.state.lock().max_renderbuffer_size = max;
    }

    /// Make the next call at `point` fail the way a driver would.
    pub fn fail_next(&self, point: FailPoint) {
        self.state.lock().fail_next = Some(point);
    }

    pub fn live_framebuffers(&self) -> usize {
        self.state.lock().framebuffers.len()
    }

    pub fn live_renderbuffers(&self) -> usize {
        self.state.lock().renderbuffers.len()
    }

    /// Color used by [`clear`](Self::clear).
    pub fn clear_color(&self, color: [u8; 4]) {
        self.state.lock().clear_color = color;
    }

    /// Fill the whole bound draw target with the clear color.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let color = state.clear_color;
        let target = state.draw_framebuffer;
        if let Some(surface) = state.surface_mut(target) {
            surface.texels.fill(color);
        }
    }

    /// Fill a window-space rectangle of the bound draw target, clipped to
    /// the viewport.
    pub fn fill_rect(&self, x: i32, y: i32, width: u32, height: u32, color: [u8; 4]) {
        let mut state = self.state.lock();
        let vp = state.viewport;
        let target = state.draw_framebuffer;
        let Some(surface) = state.surface_mut(target) else {
            return;
        };
        let x0 = (x as i64).max(vp.x as i64);
        let y0 = (y as i64).max(vp.y as i64);
        let x1 = (x as i64 + width as i64).min(vp.x as i64 + vp.width as i64);
        let y1 = (y as i64 + height as i64).min(vp.y as i64 + vp.height as i64);
        surface.fill(x0, y0, x1, y1, color);
    }

    /// Draw a quad covering the whole viewport.
    pub fn fill_viewport(&self, color: [u8; 4]) {
        let vp = self.state.lock().viewport;
        self.fill_rect(vp.x, vp.y, vp.width, vp.height, color);
    }

    /// Texel of the default framebuffer at window coordinates.
    pub fn default_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let state = self.state.lock();
        let surface = &state.default_surface;
        if x >= surface.width || y >= surface.height {
            return None;
        }
        Some(surface.texels[y as usize * surface.width as usize + x as usize])
    }
}

impl GraphicsContext for SoftwareContext {
    type Framebuffer = SoftFramebuffer;
    type Renderbuffer = SoftRenderbuffer;

    fn max_renderbuffer_size(&self) -> u32 {
        self.state.lock().max_renderbuffer_size
    }

    fn create_framebuffer(&self) -> Result<SoftFramebuffer, ContextError> {
        let mut state = self.state.lock();
        if state.take_failure(FailPoint::CreateFramebuffer) {
            return Err(ContextError::Create {
                kind: ResourceKind::Framebuffer,
                reason: "injected failure".into(),
            });
        }
        let fb = SoftFramebuffer(state.allocate_name());
        state.framebuffers.insert(fb, None);
        Ok(fb)
    }

    fn create_renderbuffer(&self) -> Result<SoftRenderbuffer, ContextError> {
        let mut state = self.state.lock();
        if state.take_failure(FailPoint::CreateRenderbuffer) {
            return Err(ContextError::Create {
                kind: ResourceKind::Renderbuffer,
                reason: "injected failure".into(),
            });
        }
        let rb = SoftRenderbuffer(state.allocate_name());
        state.renderbuffers.insert(rb, None);
        Ok(rb)
    }

    fn delete_framebuffer(&self, framebuffer: SoftFramebuffer) {
        let mut state = self.state.lock();
        if state.framebuffers.remove(&framebuffer).is_some()
            && state.draw_framebuffer == Some(framebuffer)
        {
            // Deleting the bound framebuffer reverts the binding to the default.
            state.draw_framebuffer = None;
        }
    }

    fn delete_renderbuffer(&self, renderbuffer: SoftRenderbuffer) {
        let mut state = self.state.lock();
        if state.renderbuffers.remove(&renderbuffer).is_some() {
            for attachment in state.framebuffers.values_mut() {
                if *attachment == Some(renderbuffer) {
                    *attachment = None;
                }
            }
        }
    }

    fn renderbuffer_storage(
        &self,
        renderbuffer: SoftRenderbuffer,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<(), ContextError> {
        let mut state = self.state.lock();
        if state.take_failure(FailPoint::RenderbufferStorage) {
            return Err(ContextError::Gl {
                op: "renderbuffer_storage",
                code: GL_OUT_OF_MEMORY,
            });
        }
        let max = state.max_renderbuffer_size;
        if width > max || height > max {
            return Err(ContextError::Gl {
                op: "renderbuffer_storage",
                code: GL_INVALID_VALUE,
            });
        }
        match format {
            PixelFormat::Rgba8 => {}
        }
        let slot = state
            .renderbuffers
            .get_mut(&renderbuffer)
            .ok_or(ContextError::UnknownHandle {
                kind: ResourceKind::Renderbuffer,
            })?;
        *slot = Some(Surface::new(width, height));
        Ok(())
    }

    fn attach_color_renderbuffer(
        &self,
        framebuffer: SoftFramebuffer,
        renderbuffer: SoftRenderbuffer,
    ) -> Result<(), ContextError> {
        let mut state = self.state.lock();
        if state.take_failure(FailPoint::AttachRenderbuffer) {
            return Err(ContextError::IncompleteFramebuffer {
                status: GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT,
            });
        }
        let has_storage = match state.renderbuffers.get(&renderbuffer) {
            Some(storage) => storage.is_some(),
            None => {
                return Err(ContextError::UnknownHandle {
                    kind: ResourceKind::Renderbuffer,
                });
            }
        };
        let attachment =
            state
                .framebuffers
                .get_mut(&framebuffer)
                .ok_or(ContextError::UnknownHandle {
                    kind: ResourceKind::Framebuffer,
                })?;
        *attachment = Some(renderbuffer);
        if !has_storage {
            return Err(ContextError::IncompleteFramebuffer {
                status: GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT,
            });
        }
        Ok(())
    }

    fn draw_framebuffer(&self) -> Option<SoftFramebuffer> {
        self.state.lock().draw_framebuffer
    }

    fn bind_draw_framebuffer(&self, framebuffer: Option<SoftFramebuffer>) {
        self.state.lock().draw_framebuffer = framebuffer;
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.state.lock().viewport = viewport;
    }

    fn read_pixels(
        &self,
        framebuffer: SoftFramebuffer,
        width: u32,
        height: u32,
        format: PixelFormat,
        out: &mut [u8],
    ) -> Result<(), ContextError> {
        check_pixel_buffer(out, width, height, format)?;
        let mut state = self.state.lock();
        if state.take_failure(FailPoint::ReadPixels) {
            return Err(ContextError::Gl {
                op: "read_pixels",
                code: GL_OUT_OF_MEMORY,
            });
        }
        if !state.framebuffers.contains_key(&framebuffer) {
            return Err(ContextError::UnknownHandle {
                kind: ResourceKind::Framebuffer,
            });
        }
        let surface = state
            .surface(Some(framebuffer))
            .ok_or(ContextError::IncompleteFramebuffer {
                status: GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT,
            })?;
        if width > surface.width || height > surface.height {
            return Err(ContextError::Gl {
                op: "read_pixels",
                code: GL_INVALID_VALUE,
            });
        }
        if width == 0 || height == 0 {
            return Ok(());
        }

        let dst: &mut [[u8; 4]] = bytemuck::cast_slice_mut(out);
        let src_stride = surface.width as usize;
        for (row, dst_row) in dst.chunks_exact_mut(width as usize).enumerate() {
            let start = row * src_stride;
            dst_row.copy_from_slice(&surface.texels[start..start + width as usize]);
        }
        Ok(())
    }
}
