// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The shared framebuffer: one render target visible to both APIs.

A [SharedFramebuffer] owns three things, all created together and released together:

1. a render-target surface from the display-side API,
2. a framebuffer object from the rendering API,
3. the interop registration binding (1) as the storage of (2).

Construction is all-or-nothing.  If a later step fails, whatever the earlier steps created is
released before the error is returned, so a caller never sees a partially registered framebuffer.
*/
use std::fmt::Formatter;
use std::sync::Arc;

use crate::backend::{Backend, BackendError};
use crate::handles::{DirtyRect, FramebufferHandle, RegistrationHandle, SurfaceHandle};
use crate::interop::context::DeviceContext;

/// Logical-to-physical scale factors of the display the framebuffer is shown on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpiScale {
    pub x: f64,
    pub y: f64,
}

impl DpiScale {
    pub const IDENTITY: DpiScale = DpiScale { x: 1.0, y: 1.0 };
    pub const fn new(x: f64, y: f64) -> Self {
        DpiScale { x, y }
    }
}

impl Default for DpiScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy)]
struct Resources {
    surface: SurfaceHandle,
    framebuffer: FramebufferHandle,
    registration: RegistrationHandle,
}

/**
An interop-registered render target of fixed size.

Width and height are device pixels and always positive.  The DPI scale is carried for consumers
that map logical coordinates; it has no effect on the allocation.
*/
pub struct SharedFramebuffer<B: Backend> {
    context: Arc<DeviceContext<B>>,
    width: u32,
    height: u32,
    dpi_scale: DpiScale,
    // None once disposed
    resources: Option<Resources>,
}

impl<B: Backend> SharedFramebuffer<B> {
    /**
    Allocates a `width` × `height` surface, wraps it in a framebuffer object and registers the pair.
    */
    pub fn new(
        context: &Arc<DeviceContext<B>>,
        width: u32,
        height: u32,
        dpi_scale: DpiScale,
    ) -> Result<Self, FramebufferError> {
        if width == 0 || height == 0 {
            return Err(FramebufferError::InvalidSize { width, height });
        }
        let backend = context.backend();
        let device = context.device();

        let surface = backend
            .create_render_target(device, width, height)
            .map_err(|source| FramebufferError::RenderTarget {
                width,
                height,
                source,
            })?;
        let framebuffer = match backend.create_framebuffer(width, height) {
            Ok(framebuffer) => framebuffer,
            Err(source) => {
                backend.release_render_target(device, surface);
                return Err(FramebufferError::Framebuffer { source });
            }
        };
        let registration = match backend.register_surface(device, surface, framebuffer) {
            Ok(registration) => registration,
            Err(source) => {
                backend.delete_framebuffer(framebuffer);
                backend.release_render_target(device, surface);
                return Err(FramebufferError::Registration { source });
            }
        };

        logwise::info_sync!(
            "Created shared framebuffer {width}x{height} {framebuffer}",
            width = width,
            height = height,
            framebuffer = logwise::privacy::LogIt(&framebuffer)
        );
        Ok(SharedFramebuffer {
            context: context.clone(),
            width,
            height,
            dpi_scale,
            resources: Some(Resources {
                surface,
                framebuffer,
                registration,
            }),
        })
    }

    /**
    Unregisters, deletes the framebuffer object, then releases the surface.

    Calling this again is a no-op.  Dropping the framebuffer disposes it.
    */
    pub fn dispose(&mut self) {
        let Some(resources) = self.resources.take() else {
            return;
        };
        let backend = self.context.backend();
        let device = self.context.device();
        backend.unregister(device, resources.registration);
        backend.delete_framebuffer(resources.framebuffer);
        backend.release_render_target(device, resources.surface);
        logwise::info_sync!(
            "Disposed shared framebuffer {width}x{height} {framebuffer}",
            width = self.width,
            height = self.height,
            framebuffer = logwise::privacy::LogIt(&resources.framebuffer)
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.resources.is_none()
    }

    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
    pub fn dpi_scale(&self) -> DpiScale {
        self.dpi_scale
    }
    pub(crate) fn set_dpi_scale(&mut self, dpi_scale: DpiScale) {
        self.dpi_scale = dpi_scale;
    }
    /// The whole framebuffer as a dirty rectangle.
    pub fn full_rect(&self) -> DirtyRect {
        DirtyRect::covering(self.width, self.height)
    }

    /// The framebuffer object for the rendering API.  `None` after disposal.
    pub fn framebuffer_handle(&self) -> Option<FramebufferHandle> {
        self.resources.map(|r| r.framebuffer)
    }
    /// The render-target surface to hand to the display surface.  `None` after disposal.
    pub fn surface_handle(&self) -> Option<SurfaceHandle> {
        self.resources.map(|r| r.surface)
    }
    pub fn registration_handle(&self) -> Option<RegistrationHandle> {
        self.resources.map(|r| r.registration)
    }

    pub fn context(&self) -> &Arc<DeviceContext<B>> {
        &self.context
    }
}

impl<B: Backend> Drop for SharedFramebuffer<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<B: Backend> std::fmt::Debug for SharedFramebuffer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFramebuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dpi_scale", &self.dpi_scale)
            .field("resources", &self.resources)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FramebufferError {
    #[error("Can't create a {width}x{height} framebuffer")]
    InvalidSize { width: u32, height: u32 },
    #[error("Can't allocate {width}x{height} render target: {source}")]
    RenderTarget {
        width: u32,
        height: u32,
        #[source]
        source: BackendError,
    },
    #[error("Can't create framebuffer object: {source}")]
    Framebuffer {
        #[source]
        source: BackendError,
    },
    #[error("Can't register render target for interop: {source}")]
    Registration {
        #[source]
        source: BackendError,
    },
}
