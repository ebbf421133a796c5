// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The capabilities the interop core drives.

The core never talks to a driver directly.  Everything it needs is expressed as one of these traits,
and every call that needs the interop device receives the [DeviceHandle] explicitly.  That keeps
the ordering of the lock protocol observable, which is what [recording] is for.

* [SurfaceAllocator] is the display-side API: it allocates the render-target surface the compositor shows.
* [RenderingApi] is the immediate-mode API the draw callbacks use.
* [InteropSubsystem] binds the two together and arbitrates access.
* [DisplaySurface] is the host's displayable image source.

Backends implement the first three on one type; [Backend] is the umbrella bound the core uses.
Backend methods take `&self`; GPU APIs are driver-global state and a backend is free to use interior
mutability to track them.
*/
use crate::handles::{DeviceHandle, DirtyRect, FramebufferHandle, RegistrationHandle, SurfaceHandle};
use crate::settings::ContextSettings;

pub mod recording;

/// Broad classification of a [BackendError].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum BackendErrorKind {
    /// The driver lacks a required extension or capability.
    Unsupported,
    OutOfMemory,
    /// The requested dimensions exceed what the device can allocate.
    InvalidSize,
    Other,
}

/// An error reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        BackendError {
            kind,
            message: message.into(),
        }
    }
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unsupported, message)
    }
    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }
}

/**
Allocates render-target surfaces that the display surface can show.
*/
pub trait SurfaceAllocator {
    /// Allocates a `width` × `height` render target on `device`.  Both dimensions are positive.
    fn create_render_target(
        &self,
        device: DeviceHandle,
        width: u32,
        height: u32,
    ) -> Result<SurfaceHandle, BackendError>;
    fn release_render_target(&self, device: DeviceHandle, surface: SurfaceHandle);
}

/**
The immediate-mode rendering API.
*/
pub trait RenderingApi {
    /// Creates a framebuffer object of the given size.  It is not usable until registered.
    fn create_framebuffer(&self, width: u32, height: u32) -> Result<FramebufferHandle, BackendError>;
    fn delete_framebuffer(&self, framebuffer: FramebufferHandle);
    /// Binds `framebuffer` as the active render target, or the default target for `None`.
    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>);
    fn viewport(&self, x: i32, y: i32, width: u32, height: u32);
    /// Submits all outstanding rendering commands.
    fn flush(&self);
}

/**
The driver layer that lets the rendering API treat a display-side surface as its own.
*/
pub trait InteropSubsystem {
    /**
    Opens the interop device for a rendering context created from `settings`.

    Backends return a [BackendErrorKind::Unsupported] error when the driver cannot do interop.
    */
    fn open_device(&self, settings: &ContextSettings) -> Result<DeviceHandle, BackendError>;
    fn close_device(&self, device: DeviceHandle);
    /// Registers `surface` as the backing storage for `framebuffer`.
    fn register_surface(
        &self,
        device: DeviceHandle,
        surface: SurfaceHandle,
        framebuffer: FramebufferHandle,
    ) -> Result<RegistrationHandle, BackendError>;
    fn unregister(&self, device: DeviceHandle, registration: RegistrationHandle);
    /// Gives the rendering API exclusive access to the registered objects.
    fn lock_objects(&self, device: DeviceHandle, registrations: &[RegistrationHandle]);
    fn unlock_objects(&self, device: DeviceHandle, registrations: &[RegistrationHandle]);
}

/// Everything the core needs from a graphics backend.
pub trait Backend: SurfaceAllocator + RenderingApi + InteropSubsystem {}
impl<T: SurfaceAllocator + RenderingApi + InteropSubsystem> Backend for T {}

/**
The host's displayable image source.

Lock and unlock are only valid from the host's UI thread, which is why the whole core is
single-threaded.  Implementations must accept `None` in [DisplaySurface::set_backing_surface]
and treat it as "drop the previous surface, show nothing".
*/
pub trait DisplaySurface {
    fn lock(&mut self);
    fn unlock(&mut self);
    fn set_backing_surface(&mut self, surface: Option<SurfaceHandle>);
    fn mark_dirty(&mut self, rect: DirtyRect);
}

impl<D: DisplaySurface + ?Sized> DisplaySurface for &mut D {
    fn lock(&mut self) {
        (**self).lock()
    }
    fn unlock(&mut self) {
        (**self).unlock()
    }
    fn set_backing_surface(&mut self, surface: Option<SurfaceHandle>) {
        (**self).set_backing_surface(surface)
    }
    fn mark_dirty(&mut self, rect: DirtyRect) {
        (**self).mark_dirty(rect)
    }
}

impl<D: DisplaySurface + ?Sized> DisplaySurface for Box<D> {
    fn lock(&mut self) {
        (**self).lock()
    }
    fn unlock(&mut self) {
        (**self).unlock()
    }
    fn set_backing_surface(&mut self, surface: Option<SurfaceHandle>) {
        (**self).set_backing_surface(surface)
    }
    fn mark_dirty(&mut self, rect: DirtyRect) {
        (**self).mark_dirty(rect)
    }
}
