//! Scoped rebinding of the draw target.
//!
//! [`BindingScope`] saves the draw framebuffer and viewport, points both at
//! an offscreen target, and puts the saved values back when dropped. The
//! restore runs on normal exit, on early return through `?`, and while
//! unwinding from a panic.

use crate::context::{GraphicsContext, Viewport};

/// Snapshot of the global state a render scope overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingState<F> {
    pub framebuffer: Option<F>,
    pub viewport: Viewport,
}

impl<F: Copy> BindingState<F> {
    pub fn capture<C>(ctx: &C) -> Self
    where
        C: GraphicsContext<Framebuffer = F> + ?Sized,
    {
        Self {
            framebuffer: ctx.draw_framebuffer(),
            viewport: ctx.viewport(),
        }
    }

    pub fn apply<C>(&self, ctx: &C)
    where
        C: GraphicsContext<Framebuffer = F> + ?Sized,
    {
        ctx.bind_draw_framebuffer(self.framebuffer);
        ctx.set_viewport(self.viewport);
    }
}

/// Guard that keeps `target` bound until dropped.
#[must_use = "dropping the scope immediately restores the previous binding"]
pub struct BindingScope<'a, C: GraphicsContext + ?Sized> {
    ctx: &'a C,
    saved: BindingState<C::Framebuffer>,
}

impl<'a, C: GraphicsContext + ?Sized> BindingScope<'a, C> {
    pub fn enter(ctx: &'a C, target: C::Framebuffer, viewport: Viewport) -> Self {
        let saved = BindingState::capture(ctx);
        BindingState {
            framebuffer: Some(target),
            viewport,
        }
        .apply(ctx);
        Self { ctx, saved }
    }

    /// State that will be restored on drop.
    pub fn saved(&self) -> &BindingState<C::Framebuffer> {
        &self.saved
    }
}

impl<C: GraphicsContext + ?Sized> Drop for BindingScope<'_, C> {
    fn drop(&mut self) {
        self.saved.apply(self.ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareContext;

    #[test]
    fn test_scope_binds_then_restores() {
        let ctx = SoftwareContext::new(32, 32);
        let fb = ctx.create_framebuffer().expect("framebuffer");
        let before = BindingState::capture(&ctx);

        {
            let scope = BindingScope::enter(&ctx, fb, Viewport::full(8, 4));
            assert_eq!(scope.saved(), &before);
            assert_eq!(ctx.draw_framebuffer(), Some(fb));
            assert_eq!(ctx.viewport(), Viewport::full(8, 4));
        }

        assert_eq!(BindingState::capture(&ctx), before);
    }

    #[test]
    fn test_scope_restores_after_inner_rebind() {
        let ctx = SoftwareContext::new(32, 32);
        let outer = ctx.create_framebuffer().expect("outer");
        let inner = ctx.create_framebuffer().expect("inner");
        ctx.bind_draw_framebuffer(Some(outer));
        ctx.set_viewport(Viewport::new(3, 5, 7, 11));
        let before = BindingState::capture(&ctx);

        {
            let _scope = BindingScope::enter(&ctx, inner, Viewport::full(2, 2));
            ctx.bind_draw_framebuffer(None);
            ctx.set_viewport(Viewport::new(-1, -1, 100, 100));
        }

        assert_eq!(BindingState::capture(&ctx), before);
    }

    #[test]
    fn test_scope_restores_during_unwind() {
        let ctx = SoftwareContext::new(16, 16);
        let fb = ctx.create_framebuffer().expect("framebuffer");
        let before = BindingState::capture(&ctx);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = BindingScope::enter(&ctx, fb, Viewport::full(4, 4));
            panic!("draw failed");
        }));

        assert!(result.is_err());
        assert_eq!(BindingState::capture(&ctx), before);
    }
}
