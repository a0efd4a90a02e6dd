//! GPU-to-CPU readback of a whole framebuffer.
//!
//! Every call copies the complete color attachment and blocks until the
//! copy has finished. There is no dirty-region tracking and no staging
//! through pixel buffer objects.

use bitsample_core::{PixelFormat, PixelSink};

use crate::context::GraphicsContext;
use crate::error::SamplerError;

/// Check that `sink` can receive a `width x height` RGBA8 image.
pub fn validate_sink<S: PixelSink + ?Sized>(
    sink: &mut S,
    width: u32,
    height: u32,
) -> Result<(), SamplerError> {
    let expected = PixelFormat::Rgba8.byte_len(width, height);
    let len = sink.pixels_mut().len();
    if sink.format() != PixelFormat::Rgba8
        || sink.width() != width
        || sink.height() != height
        || len != expected
    {
        return Err(SamplerError::SinkMismatch {
            width: sink.width(),
            height: sink.height(),
            format: sink.format(),
            len,
            expected,
        });
    }
    Ok(())
}

/// Overwrite `sink` with the `width x height` contents of `framebuffer`.
///
/// The sink is checked again on every call since a caller-owned sink can
/// change shape between renders.
pub fn read_framebuffer<C, S>(
    ctx: &C,
    framebuffer: C::Framebuffer,
    width: u32,
    height: u32,
    sink: &mut S,
) -> Result<(), SamplerError>
where
    C: GraphicsContext + ?Sized,
    S: PixelSink + ?Sized,
{
    validate_sink(sink, width, height)?;
    let format = PixelFormat::Rgba8;
    ctx.read_pixels(framebuffer, width, height, format, sink.pixels_mut())
        .map_err(SamplerError::Readback)?;
    tracing::trace!("read back {width}x{height} {format} from {framebuffer:?}");
    Ok(())
}
