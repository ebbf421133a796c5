// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The per-frame handoff of the shared surface between the display surface and the rendering API.

One frame walks this state machine, strictly in order:

```text
Idle ──lock display──▶ DisplayLocked ──lock objects──▶ InteropLocked
  ▲                        │     ▲                           │
  └──present + unlock──────┘     └──flush + unlock objects───┘
```

Each non-idle state is a guard.  [DisplayLock] holds the display surface locked; [InteropLock]
holds the registration locked for the rendering API and mutably borrows the [DisplayLock], so
presenting while interop-locked does not compile.  The framebuffer object can only be bound
through an [InteropLock].

A guard dropped before it completes (a draw callback panicking, for instance) still unlocks in
reverse order, but the frame is never presented.
*/
use crate::backend::{Backend, DisplaySurface};
use crate::handles::{DeviceHandle, DirtyRect, FramebufferHandle, RegistrationHandle, SurfaceHandle};
use crate::interop::context::DeviceContext;
use crate::interop::framebuffer::SharedFramebuffer;

/**
The display surface, locked so the compositor won't read it mid-update.
*/
#[derive(Debug)]
pub struct DisplayLock<'a, D: DisplaySurface> {
    display: &'a mut D,
    released: bool,
}

impl<'a, D: DisplaySurface> DisplayLock<'a, D> {
    pub fn acquire(display: &'a mut D) -> Self {
        logwise::trace_sync!("DisplayLock::acquire");
        display.lock();
        DisplayLock {
            display,
            released: false,
        }
    }

    /// Points the display at `surface` (or at nothing) without reporting a new frame.
    pub fn set_backing_surface(&mut self, surface: Option<SurfaceHandle>) {
        self.display.set_backing_surface(surface);
    }

    /**
    Locks `framebuffer`'s registration for the rendering API.

    Returns `None` if the framebuffer has already been disposed.
    */
    pub fn lock_interop<'l, B: Backend>(
        &'l mut self,
        framebuffer: &'l SharedFramebuffer<B>,
    ) -> Option<InteropLock<'l, B>> {
        let registration = framebuffer.registration_handle()?;
        let handle = framebuffer.framebuffer_handle()?;
        Some(InteropLock::acquire(
            framebuffer.context(),
            registration,
            handle,
            framebuffer.size(),
        ))
    }

    /// Makes `surface` the backing image, reports `rect` as changed, and unlocks.
    pub fn present(mut self, surface: SurfaceHandle, rect: DirtyRect) {
        logwise::trace_sync!(
            "DisplayLock::present {rect}",
            rect = logwise::privacy::LogIt(&rect)
        );
        self.display.set_backing_surface(Some(surface));
        self.display.mark_dirty(rect);
        self.finish();
    }

    /// Unlocks without reporting a new frame.
    pub fn unlock(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.released {
            self.released = true;
            self.display.unlock();
        }
    }
}

impl<D: DisplaySurface> Drop for DisplayLock<'_, D> {
    fn drop(&mut self) {
        if !self.released {
            logwise::warn_sync!("Display lock dropped without presenting");
            self.finish();
        }
    }
}

/**
The shared surface, locked for the rendering API's exclusive use.
*/
#[derive(Debug)]
pub struct InteropLock<'l, B: Backend> {
    context: &'l DeviceContext<B>,
    registration: RegistrationHandle,
    framebuffer: FramebufferHandle,
    size: (u32, u32),
    bound: bool,
    released: bool,
}

impl<'l, B: Backend> InteropLock<'l, B> {
    fn acquire(
        context: &'l DeviceContext<B>,
        registration: RegistrationHandle,
        framebuffer: FramebufferHandle,
        size: (u32, u32),
    ) -> Self {
        logwise::trace_sync!(
            "InteropLock::acquire {registration}",
            registration = logwise::privacy::LogIt(&registration)
        );
        context
            .backend()
            .lock_objects(context.device(), &[registration]);
        InteropLock {
            context,
            registration,
            framebuffer,
            size,
            bound: false,
            released: false,
        }
    }

    pub fn device(&self) -> DeviceHandle {
        self.context.device()
    }

    /// Binds the framebuffer object as the active target, with a viewport covering all of it.
    pub fn bind(&mut self) {
        let backend = self.context.backend();
        backend.bind_framebuffer(Some(self.framebuffer));
        backend.viewport(0, 0, self.size.0, self.size.1);
        self.bound = true;
    }

    /// Rebinds the default target and flushes outstanding commands.
    pub fn unbind_and_flush(&mut self) {
        let backend = self.context.backend();
        backend.bind_framebuffer(None);
        backend.flush();
        self.bound = false;
    }

    /// Hands the surface back.  Unbinds and flushes first if the framebuffer is still bound.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.bound {
            self.unbind_and_flush();
        }
        self.context
            .backend()
            .unlock_objects(self.context.device(), &[self.registration]);
        logwise::trace_sync!("InteropLock released");
    }
}

impl<B: Backend> Drop for InteropLock<'_, B> {
    fn drop(&mut self) {
        if !self.released {
            logwise::warn_sync!("Interop lock dropped without release");
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};
    use crate::interop::framebuffer::DpiScale;
    use crate::settings::ContextSettings;
    use std::sync::Arc;

    fn setup() -> (
        RecordingBackend,
        SharedFramebuffer<RecordingBackend>,
    ) {
        let backend = RecordingBackend::new();
        let context =
            Arc::new(DeviceContext::new(backend.clone(), ContextSettings::default()).unwrap());
        let fb = SharedFramebuffer::new(&context, 20, 10, DpiScale::IDENTITY).unwrap();
        backend.take_journal();
        (backend, fb)
    }

    #[test]
    fn full_cycle_order() {
        let (backend, fb) = setup();
        let mut display = backend.display();
        let registration = fb.registration_handle().unwrap();
        let handle = fb.framebuffer_handle().unwrap();
        let surface = fb.surface_handle().unwrap();

        let mut display_lock = DisplayLock::acquire(&mut display);
        let mut interop = display_lock.lock_interop(&fb).unwrap();
        interop.bind();
        interop.unbind_and_flush();
        interop.release();
        display_lock.present(surface, fb.full_rect());

        assert_eq!(
            backend.journal(),
            vec![
                Call::DisplayLock,
                Call::LockObjects(vec![registration]),
                Call::BindFramebuffer(Some(handle)),
                Call::Viewport {
                    x: 0,
                    y: 0,
                    width: 20,
                    height: 10
                },
                Call::BindFramebuffer(None),
                Call::Flush,
                Call::UnlockObjects(vec![registration]),
                Call::SetBackingSurface(Some(surface)),
                Call::MarkDirty(DirtyRect::covering(20, 10)),
                Call::DisplayUnlock,
            ]
        );
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn release_while_bound_unbinds_first() {
        let (backend, fb) = setup();
        let mut display = backend.display();
        let registration = fb.registration_handle().unwrap();

        let mut display_lock = DisplayLock::acquire(&mut display);
        let mut interop = display_lock.lock_interop(&fb).unwrap();
        interop.bind();
        interop.release();
        display_lock.unlock();

        let journal = backend.journal();
        assert_eq!(
            &journal[journal.len() - 4..],
            &[
                Call::BindFramebuffer(None),
                Call::Flush,
                Call::UnlockObjects(vec![registration]),
                Call::DisplayUnlock,
            ]
        );
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn unwinding_releases_without_presenting() {
        let (backend, fb) = setup();
        let mut display = backend.display();
        let registration = fb.registration_handle().unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut display_lock = DisplayLock::acquire(&mut display);
            let mut interop = display_lock.lock_interop(&fb).unwrap();
            interop.bind();
            panic!("draw callback failed");
        }));
        assert!(result.is_err());

        let journal = backend.journal();
        assert_eq!(
            &journal[journal.len() - 4..],
            &[
                Call::BindFramebuffer(None),
                Call::Flush,
                Call::UnlockObjects(vec![registration]),
                Call::DisplayUnlock,
            ]
        );
        assert!(!journal.iter().any(|c| matches!(c, Call::MarkDirty(_))));
        assert!(!display.is_locked());
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn disposed_framebuffer_cannot_be_locked() {
        let (backend, mut fb) = setup();
        fb.dispose();
        let mut display = backend.display();
        let mut display_lock = DisplayLock::acquire(&mut display);
        assert!(display_lock.lock_interop(&fb).is_none());
        display_lock.unlock();
        assert!(backend.violations().is_empty());
    }
}
