// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The renderer: owns the device context and the current shared framebuffer, and drives the
acquire → render → flush → release cycle around them.
*/
use std::fmt::Formatter;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, DisplaySurface};
use crate::handles::FramebufferHandle;
use crate::interop::context::{ContextError, DeviceContext};
use crate::interop::framebuffer::{DpiScale, FramebufferError, SharedFramebuffer};
use crate::interop::lock::DisplayLock;
use crate::interop::timing::{Clock, FrameStats, FrameTiming, MonotonicClock};
use crate::settings::ContextSettings;

/// Identifies a listener added with [Renderer::add_render_complete_listener].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type RenderCallback = Box<dyn FnMut(Duration)>;
type RenderCompleteListener = Box<dyn FnMut()>;

/**
Renders frames into a shared framebuffer and hands them to a display surface.

Everything happens on the calling thread: [Renderer::resize] and [Renderer::render] must be called
from the thread that owns the display surface, and the draw notifications run inline.

Two notifications fire per frame, in this order:

1. the render callback (at most one), with the time since the previous frame, while the
   framebuffer is bound;
2. the render-complete listeners (any number, in the order added), after the framebuffer has been
   unbound and flushed but before the surface goes back to the compositor.
*/
pub struct Renderer<B: Backend, D: DisplaySurface, C: Clock = MonotonicClock> {
    //note that drop order is significant here.
    framebuffer: Option<SharedFramebuffer<B>>,
    context: Arc<DeviceContext<B>>,
    display: D,
    timing: FrameTiming<C>,
    stats: FrameStats,
    on_render: Option<RenderCallback>,
    on_render_complete: Vec<(ListenerId, RenderCompleteListener)>,
    next_listener: u64,
}

impl<B: Backend, D: DisplaySurface> Renderer<B, D> {
    /**
    Opens the device context.  The renderer starts without a framebuffer; call
    [Renderer::resize] before anything is rendered.
    */
    pub fn new(backend: B, settings: ContextSettings, display: D) -> Result<Self, ContextError> {
        Self::with_clock(backend, settings, display, MonotonicClock::new())
    }
}

impl<B: Backend, D: DisplaySurface, C: Clock> Renderer<B, D, C> {
    /// Like [Renderer::new], with a custom time source.
    pub fn with_clock(
        backend: B,
        settings: ContextSettings,
        display: D,
        clock: C,
    ) -> Result<Self, ContextError> {
        let context = Arc::new(DeviceContext::new(backend, settings)?);
        Ok(Renderer {
            framebuffer: None,
            context,
            display,
            timing: FrameTiming::new(clock),
            stats: FrameStats::default(),
            on_render: None,
            on_render_complete: Vec::new(),
            next_listener: 0,
        })
    }

    /**
    Resizes the shared framebuffer to `width` × `height` device pixels.

    Nothing is recreated when both dimensions match the current framebuffer; a changed DPI scale
    is just stored.  Otherwise the current framebuffer is disposed first, and a new one is
    created if both dimensions are positive.  Either way the display surface's backing surface
    is set again afterwards, to the new surface or to none.

    If construction fails the renderer is left without a framebuffer, the display is cleared,
    and the error is returned.  Later [Renderer::render] calls do nothing until a resize succeeds.
    */
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        dpi_scale_x: f64,
        dpi_scale_y: f64,
    ) -> Result<(), FramebufferError> {
        let dpi_scale = DpiScale::new(dpi_scale_x, dpi_scale_y);
        if let Some(framebuffer) = self.framebuffer.as_mut() {
            if framebuffer.size() == (width, height) {
                if framebuffer.dpi_scale() != dpi_scale {
                    framebuffer.set_dpi_scale(dpi_scale);
                }
                return Ok(());
            }
        }
        logwise::info_sync!(
            "Resizing shared framebuffer to {width}x{height}",
            width = width,
            height = height
        );

        if let Some(mut previous) = self.framebuffer.take() {
            previous.dispose();
        }

        let mut result = Ok(());
        let mut backing = None;
        if width > 0 && height > 0 {
            match SharedFramebuffer::new(&self.context, width, height, dpi_scale) {
                Ok(framebuffer) => {
                    backing = framebuffer.surface_handle();
                    let mut lock = DisplayLock::acquire(&mut self.display);
                    lock.set_backing_surface(backing);
                    lock.unlock();
                    self.framebuffer = Some(framebuffer);
                }
                Err(e) => {
                    logwise::error_sync!(
                        "Can't create shared framebuffer: {err}",
                        err = logwise::privacy::LogIt(&e)
                    );
                    result = Err(e);
                }
            }
        } else {
            logwise::warn_sync!(
                "Zero-area resize to {width}x{height}; nothing will be rendered",
                width = width,
                height = height
            );
        }

        // with `None` the display drops whatever surface it still references
        let mut lock = DisplayLock::acquire(&mut self.display);
        lock.set_backing_surface(backing);
        lock.unlock();
        result
    }

    /**
    Renders one frame.

    Does nothing if there is no framebuffer.
    */
    pub fn render(&mut self) {
        let Some(framebuffer) = self.framebuffer.as_ref() else {
            return;
        };
        let Some(surface) = framebuffer.surface_handle() else {
            return;
        };
        let delta = self.timing.next_delta();

        let mut display_lock = DisplayLock::acquire(&mut self.display);
        if let Some(mut interop) = display_lock.lock_interop(framebuffer) {
            interop.bind();
            let draw = logwise::perfwarn_begin!("interop_surface draw callbacks");
            if let Some(on_render) = self.on_render.as_mut() {
                on_render(delta);
            }
            interop.unbind_and_flush();
            for (_, listener) in self.on_render_complete.iter_mut() {
                listener();
            }
            drop(draw);
            interop.release();
        }
        display_lock.present(surface, framebuffer.full_rect());
        self.stats.record(delta);
    }

    /// Sets the render callback, replacing any previous one.
    pub fn set_render_callback(&mut self, callback: impl FnMut(Duration) + 'static) {
        self.on_render = Some(Box::new(callback));
    }
    pub fn clear_render_callback(&mut self) {
        self.on_render = None;
    }

    /// Adds a listener that runs after the render callback on every frame.
    pub fn add_render_complete_listener(&mut self, listener: impl FnMut() + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.on_render_complete.push((id, Box::new(listener)));
        id
    }
    /// Returns whether a listener was removed.
    pub fn remove_render_complete_listener(&mut self, id: ListenerId) -> bool {
        let before = self.on_render_complete.len();
        self.on_render_complete.retain(|(i, _)| *i != id);
        self.on_render_complete.len() != before
    }

    /// Framebuffer width in device pixels, or 0 without a framebuffer.
    pub fn width(&self) -> u32 {
        self.framebuffer.as_ref().map_or(0, |f| f.width())
    }
    /// Framebuffer height in device pixels, or 0 without a framebuffer.
    pub fn height(&self) -> u32 {
        self.framebuffer.as_ref().map_or(0, |f| f.height())
    }
    pub fn dpi_scale(&self) -> Option<DpiScale> {
        self.framebuffer.as_ref().map(|f| f.dpi_scale())
    }
    pub fn framebuffer(&self) -> Option<&SharedFramebuffer<B>> {
        self.framebuffer.as_ref()
    }
    pub fn framebuffer_handle(&self) -> Option<FramebufferHandle> {
        self.framebuffer
            .as_ref()
            .and_then(|f| f.framebuffer_handle())
    }
    pub fn context(&self) -> &Arc<DeviceContext<B>> {
        &self.context
    }
    pub fn display(&self) -> &D {
        &self.display
    }
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
    pub fn frame_stats(&self) -> &FrameStats {
        &self.stats
    }
    pub fn clock(&self) -> &C {
        self.timing.clock()
    }
}

impl<B: Backend, D: DisplaySurface, C: Clock> Drop for Renderer<B, D, C> {
    fn drop(&mut self) {
        if let Some(mut framebuffer) = self.framebuffer.take() {
            framebuffer.dispose();
            let mut lock = DisplayLock::acquire(&mut self.display);
            lock.set_backing_surface(None);
            lock.unlock();
        }
    }
}

impl<B: Backend, D: DisplaySurface, C: Clock> std::fmt::Debug for Renderer<B, D, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("context", &self.context)
            .field("framebuffer", &self.framebuffer)
            .field("stats", &self.stats)
            .field("has_render_callback", &self.on_render.is_some())
            .field("render_complete_listeners", &self.on_render_complete.len())
            .finish_non_exhaustive()
    }
}
