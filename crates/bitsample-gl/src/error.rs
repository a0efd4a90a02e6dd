use std::fmt;

use bitsample_core::PixelFormat;
use thiserror::Error;

/// GPU object kinds owned by a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Framebuffer,
    Renderbuffer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Framebuffer => write!(f, "framebuffer"),
            Self::Renderbuffer => write!(f, "renderbuffer"),
        }
    }
}

/// Failures reported by a [`GraphicsContext`](crate::GraphicsContext) backend.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to create {kind}: {reason}")]
    Create { kind: ResourceKind, reason: String },
    #[error("{op} raised GL error {code:#06x}")]
    Gl { op: &'static str, code: u32 },
    #[error("framebuffer is incomplete (status {status:#06x})")]
    IncompleteFramebuffer { status: u32 },
    #[error("{kind} handle is not live")]
    UnknownHandle { kind: ResourceKind },
    #[error("pixel buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Why the framebuffer/renderbuffer pair could not be allocated.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("{width}x{height} exceeds the maximum renderbuffer size {max}")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error(transparent)]
    Context(#[from] ContextError),
}

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("sampler dimensions must be at least 1x1, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocation(#[from] AllocationError),
    #[error(
        "pixel sink is {width}x{height} {format} with {len} bytes; expected {expected} bytes of {required}",
        required = PixelFormat::Rgba8
    )]
    SinkMismatch {
        width: u32,
        height: u32,
        format: PixelFormat,
        len: usize,
        expected: usize,
    },
    #[error("readback failed: {0}")]
    Readback(#[source] ContextError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_error_display() {
        let err = SamplerError::from(AllocationError::TooLarge {
            width: 9000,
            height: 16,
            max: 8192,
        });
        let text = err.to_string();
        assert!(text.contains("GPU resource allocation failed"), "{text}");
        assert!(text.contains("9000x16"), "{text}");
        assert!(text.contains("8192"), "{text}");
    }

    #[test]
    fn test_context_error_display() {
        let err = ContextError::Gl {
            op: "read_pixels",
            code: 0x0502,
        };
        assert_eq!(err.to_string(), "read_pixels raised GL error 0x0502");

        let err = ContextError::Create {
            kind: ResourceKind::Renderbuffer,
            reason: "out of names".into(),
        };
        assert_eq!(err.to_string(), "failed to create renderbuffer: out of names");
    }
}
