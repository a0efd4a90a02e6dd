//! Render-buffer backed bitmap sampler.
//!
//! Works like rendering into an offscreen texture, except that the
//! projection is left alone and the result ends up in host memory: whatever
//! the callback passed to [`RenderBufferSampler::render_into`] draws is read
//! back into the sampler's [`PixelSink`] once the callback returns.

use std::sync::Arc;

use bitsample_core::{BitmapSampler, PixelFormat, PixelSink};

use crate::context::{GraphicsContext, Viewport};
use crate::error::{AllocationError, ContextError, SamplerError};
use crate::readback;
use crate::scope::BindingScope;

/// Framebuffer with a renderbuffer on color attachment 0.
///
/// Deletes both objects exactly once when dropped.
struct GpuTarget<C: GraphicsContext> {
    ctx: Arc<C>,
    framebuffer: C::Framebuffer,
    renderbuffer: C::Renderbuffer,
}

impl<C: GraphicsContext> GpuTarget<C> {
    fn allocate(ctx: Arc<C>, width: u32, height: u32) -> Result<Self, SamplerError> {
        if width == 0 || height == 0 {
            return Err(SamplerError::InvalidDimensions { width, height });
        }
        let max = ctx.max_renderbuffer_size();
        if width > max || height > max {
            return Err(AllocationError::TooLarge { width, height, max }.into());
        }

        let mut pending = PendingTarget {
            ctx,
            framebuffer: None,
            renderbuffer: None,
        };
        let framebuffer = pending.ctx.create_framebuffer().map_err(allocation)?;
        pending.framebuffer = Some(framebuffer);
        let renderbuffer = pending.ctx.create_renderbuffer().map_err(allocation)?;
        pending.renderbuffer = Some(renderbuffer);

        pending
            .ctx
            .renderbuffer_storage(renderbuffer, PixelFormat::Rgba8, width, height)
            .map_err(allocation)?;
        pending
            .ctx
            .attach_color_renderbuffer(framebuffer, renderbuffer)
            .map_err(allocation)?;

        Ok(pending.finish(framebuffer, renderbuffer))
    }
}

impl<C: GraphicsContext> Drop for GpuTarget<C> {
    fn drop(&mut self) {
        tracing::debug!(
            "releasing render buffer sampler target {:?}/{:?}",
            self.framebuffer,
            self.renderbuffer
        );
        self.ctx.delete_framebuffer(self.framebuffer);
        self.ctx.delete_renderbuffer(self.renderbuffer);
    }
}

/// Objects created so far while building a [`GpuTarget`].
///
/// Dropping it before [`finish`](Self::finish) deletes only what exists.
struct PendingTarget<C: GraphicsContext> {
    ctx: Arc<C>,
    framebuffer: Option<C::Framebuffer>,
    renderbuffer: Option<C::Renderbuffer>,
}

impl<C: GraphicsContext> PendingTarget<C> {
    fn finish(mut self, framebuffer: C::Framebuffer, renderbuffer: C::Renderbuffer) -> GpuTarget<C> {
        self.framebuffer = None;
        self.renderbuffer = None;
        GpuTarget {
            ctx: Arc::clone(&self.ctx),
            framebuffer,
            renderbuffer,
        }
    }
}

impl<C: GraphicsContext> Drop for PendingTarget<C> {
    fn drop(&mut self) {
        if self.framebuffer.is_none() && self.renderbuffer.is_none() {
            return;
        }
        tracing::warn!(
            "render buffer sampler construction failed; releasing framebuffer {:?} and renderbuffer {:?}",
            self.framebuffer,
            self.renderbuffer
        );
        if let Some(renderbuffer) = self.renderbuffer.take() {
            self.ctx.delete_renderbuffer(renderbuffer);
        }
        if let Some(framebuffer) = self.framebuffer.take() {
            self.ctx.delete_framebuffer(framebuffer);
        }
    }
}

fn allocation(err: ContextError) -> SamplerError {
    AllocationError::Context(err).into()
}

/// Bitmap sampler whose pixels come from an offscreen GPU framebuffer.
///
/// The framebuffer is a fixed `width x height` RGBA8 renderbuffer. Each
/// render call re-reads the whole buffer into the sink, bottom row first.
pub struct RenderBufferSampler<C: GraphicsContext, S: PixelSink = BitmapSampler> {
    target: GpuTarget<C>,
    sink: S,
    width: u32,
    height: u32,
}

impl<C: GraphicsContext> RenderBufferSampler<C> {
    /// Allocate a `width x height` framebuffer on `ctx` and a matching
    /// zero-filled [`BitmapSampler`] that samples alpha.
    pub fn create(ctx: Arc<C>, width: u32, height: u32) -> Result<Self, SamplerError> {
        let target = GpuTarget::allocate(ctx, width, height)?;
        let sink = BitmapSampler::new(width, height, PixelFormat::Rgba8)
            .map_err(|_| SamplerError::InvalidDimensions { width, height })?;
        tracing::debug!(
            "created {width}x{height} render buffer sampler {:?}/{:?}",
            target.framebuffer,
            target.renderbuffer
        );
        Ok(Self {
            target,
            sink,
            width,
            height,
        })
    }
}

impl<C: GraphicsContext, S: PixelSink> RenderBufferSampler<C, S> {
    /// Capture into an existing sink; the framebuffer takes its size.
    pub fn with_sink(ctx: Arc<C>, mut sink: S) -> Result<Self, SamplerError> {
        let (width, height) = (sink.width(), sink.height());
        if width == 0 || height == 0 {
            return Err(SamplerError::InvalidDimensions { width, height });
        }
        readback::validate_sink(&mut sink, width, height)?;
        let target = GpuTarget::allocate(ctx, width, height)?;
        tracing::debug!(
            "created {width}x{height} render buffer sampler {:?}/{:?} over caller sink",
            target.framebuffer,
            target.renderbuffer
        );
        Ok(Self {
            target,
            sink,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn context(&self) -> &Arc<C> {
        &self.target.ctx
    }

    pub fn framebuffer(&self) -> C::Framebuffer {
        self.target.framebuffer
    }

    pub fn renderbuffer(&self) -> C::Renderbuffer {
        self.target.renderbuffer
    }

    /// Pixels captured by the most recent render.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access for sampler settings. Contents are overwritten by the
    /// next render.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Release the GPU objects and keep the last captured pixels.
    pub fn into_sink(self) -> S {
        let Self { target, sink, .. } = self;
        drop(target);
        sink
    }

    /// Run `draw` with this sampler's framebuffer bound, then read it back.
    ///
    /// During `draw` the draw framebuffer is this sampler's and the viewport
    /// is `(0, 0, width, height)`. Both are restored before this returns,
    /// including when `draw` panics. Projection and other state are left to
    /// the caller.
    pub fn render_into<F>(&mut self, draw: F) -> Result<(), SamplerError>
    where
        F: FnOnce(),
    {
        self.try_render_into(|| {
            draw();
            Ok::<(), SamplerError>(())
        })
    }

    /// Fallible form of [`render_into`](Self::render_into).
    ///
    /// An `Err` from `draw` is returned as is once the previous binding has
    /// been restored. In that case the readback step is skipped, so the
    /// sink keeps its previous contents instead of a partial frame; this is
    /// the one departure from running every step of a render in order.
    /// Binding restoration happens on every path. Readback failures are
    /// converted into `E`.
    pub fn try_render_into<T, E, F>(&mut self, draw: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<SamplerError>,
    {
        let value = {
            let _scope = BindingScope::enter(
                &*self.target.ctx,
                self.target.framebuffer,
                Viewport::full(self.width, self.height),
            );
            draw()?
        };
        self.read_back()?;
        Ok(value)
    }

    /// Copy the whole framebuffer into the sink without drawing.
    pub fn read_back(&mut self) -> Result<(), SamplerError> {
        readback::read_framebuffer(
            &*self.target.ctx,
            self.target.framebuffer,
            self.width,
            self.height,
            &mut self.sink,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::{FailPoint, SoftwareContext};

    #[test]
    fn test_create_allocates_one_pair() {
        let ctx = Arc::new(SoftwareContext::new(8, 8));
        let sampler = RenderBufferSampler::create(Arc::clone(&ctx), 5, 3).expect("create");
        assert_eq!(sampler.width(), 5);
        assert_eq!(sampler.height(), 3);
        assert_eq!(sampler.sink().pixels().len(), 5 * 3 * 4);
        assert_eq!(ctx.live_framebuffers(), 1);
        assert_eq!(ctx.live_renderbuffers(), 1);
    }

    #[test]
    fn test_create_rejects_zero_dimension() {
        let ctx = Arc::new(SoftwareContext::new(8, 8));
        let err = RenderBufferSampler::create(Arc::clone(&ctx), 0, 3)
            .err()
            .expect("zero width");
        assert!(matches!(err, SamplerError::InvalidDimensions { width: 0, height: 3 }));
        assert_eq!(ctx.live_framebuffers(), 0);
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        let ctx = Arc::new(SoftwareContext::new(8, 8));
        let sampler = RenderBufferSampler::create(Arc::clone(&ctx), 2, 2).expect("create");
        drop(sampler);
        assert_eq!(ctx.live_framebuffers(), 0);
        assert_eq!(ctx.live_renderbuffers(), 0);
    }

    #[test]
    fn test_into_sink_releases_and_keeps_pixels() {
        let ctx = Arc::new(SoftwareContext::new(8, 8));
        let mut sampler = RenderBufferSampler::create(Arc::clone(&ctx), 2, 2).expect("create");
        let draw_ctx = Arc::clone(&ctx);
        sampler
            .render_into(|| draw_ctx.fill_viewport([1, 2, 3, 4]))
            .expect("render");

        let bitmap = sampler.into_sink();
        assert_eq!(ctx.live_framebuffers(), 0);
        assert_eq!(ctx.live_renderbuffers(), 0);
        assert!(bitmap.pixels_rgba().iter().all(|&px| px == [1, 2, 3, 4]));
    }

    #[test]
    fn test_storage_failure_releases_partial_pair() {
        let ctx = Arc::new(SoftwareContext::new(8, 8));
        ctx.fail_next(FailPoint::RenderbufferStorage);
        let err = RenderBufferSampler::create(Arc::clone(&ctx), 4, 4)
            .err()
            .expect("storage failure");
        assert!(matches!(
            err,
            SamplerError::ResourceAllocation(AllocationError::Context(ContextError::Gl { .. }))
        ));
        assert_eq!(ctx.live_framebuffers(), 0);
        assert_eq!(ctx.live_renderbuffers(), 0);
    }
}
