// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
An in-memory backend that journals every call.

[RecordingBackend] implements all the backend traits without touching a GPU, and
[RecordingBackend::display] hands out a [RecordingDisplay] that writes to the same journal, so the
relative order of display-side and rendering-side calls can be checked.

Besides the journal the backend tracks which handles are alive and checks the interop rules as
they happen, recording a [Violation] instead of panicking.  Tests usually finish with
`assert!(backend.violations().is_empty())`.

Failures can be injected to exercise error paths: [RecordingBackend::unsupported] refuses to open
a device, [RecordingBackend::with_max_dimension] refuses oversized render targets, and the
`fail_next_*` methods fail exactly one subsequent request.
*/
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{
    BackendError, BackendErrorKind, DisplaySurface, InteropSubsystem, RenderingApi,
    SurfaceAllocator,
};
use crate::handles::{DeviceHandle, DirtyRect, FramebufferHandle, RegistrationHandle, SurfaceHandle};
use crate::settings::ContextSettings;

/// One journaled call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    OpenDevice(DeviceHandle),
    CloseDevice(DeviceHandle),
    CreateRenderTarget {
        surface: SurfaceHandle,
        width: u32,
        height: u32,
    },
    ReleaseRenderTarget(SurfaceHandle),
    CreateFramebuffer(FramebufferHandle),
    DeleteFramebuffer(FramebufferHandle),
    Register {
        registration: RegistrationHandle,
        surface: SurfaceHandle,
        framebuffer: FramebufferHandle,
    },
    Unregister(RegistrationHandle),
    LockObjects(Vec<RegistrationHandle>),
    UnlockObjects(Vec<RegistrationHandle>),
    BindFramebuffer(Option<FramebufferHandle>),
    Viewport {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Flush,
    DisplayLock,
    DisplayUnlock,
    SetBackingSurface(Option<SurfaceHandle>),
    MarkDirty(DirtyRect),
}

/// A broken interop rule, noticed while it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    UnknownDevice(DeviceHandle),
    /// Released twice, or never created.
    UnknownSurface(SurfaceHandle),
    UnknownFramebuffer(FramebufferHandle),
    UnknownRegistration(RegistrationHandle),
    /// A surface or framebuffer was released while a registration still referred to it.
    ReleasedWhileRegistered(RegistrationHandle),
    UnregisteredWhileLocked(RegistrationHandle),
    AlreadyLocked(RegistrationHandle),
    NotLocked(RegistrationHandle),
    /// A registered framebuffer was bound while its registration was not locked.
    BoundOutsideLock(FramebufferHandle),
    /// The display surface was updated or unlocked while objects were interop-locked.
    PresentedWhileInteropLocked(Call),
    /// The display surface was updated without holding its lock.
    DisplayNotLocked(Call),
    DisplayAlreadyLocked,
}

#[derive(Debug, Default)]
struct State {
    issued: u64,
    journal: Vec<Call>,
    violations: Vec<Violation>,

    devices: HashSet<DeviceHandle>,
    surfaces: HashMap<SurfaceHandle, (u32, u32)>,
    framebuffers: HashSet<FramebufferHandle>,
    registrations: HashMap<RegistrationHandle, (SurfaceHandle, FramebufferHandle)>,
    locked: HashSet<RegistrationHandle>,
    bound: Option<FramebufferHandle>,

    display_locked: bool,
    backing_surface: Option<SurfaceHandle>,

    unsupported: bool,
    max_dimension: Option<u32>,
    fail_next_render_target: bool,
    fail_next_framebuffer: bool,
    fail_next_registration: bool,
}

impl State {
    fn next_raw(&mut self) -> NonZeroU64 {
        let raw = NonZeroU64::MIN.saturating_add(self.issued);
        self.issued += 1;
        raw
    }
    fn check_device(&mut self, device: DeviceHandle) {
        if !self.devices.contains(&device) {
            self.violations.push(Violation::UnknownDevice(device));
        }
    }
    fn registration_for_surface(&self, surface: SurfaceHandle) -> Option<RegistrationHandle> {
        self.registrations
            .iter()
            .find(|(_, (s, _))| *s == surface)
            .map(|(r, _)| *r)
    }
    fn registration_for_framebuffer(
        &self,
        framebuffer: FramebufferHandle,
    ) -> Option<RegistrationHandle> {
        self.registrations
            .iter()
            .find(|(_, (_, f))| *f == framebuffer)
            .map(|(r, _)| *r)
    }
    fn display_update(&mut self, call: Call) {
        if !self.display_locked {
            self.violations.push(Violation::DisplayNotLocked(call.clone()));
        }
        if !self.locked.is_empty() {
            self.violations
                .push(Violation::PresentedWhileInteropLocked(call.clone()));
        }
        self.journal.push(call);
    }
}

/**
A backend that journals calls instead of issuing them.

Clones share the same journal and resource tables.
*/
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<State>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose driver lacks interop support; [InteropSubsystem::open_device] fails.
    pub fn unsupported() -> Self {
        let backend = Self::new();
        backend.state().unsupported = true;
        backend
    }

    /// Refuses render targets wider or taller than `max_dimension`.
    pub fn with_max_dimension(self, max_dimension: u32) -> Self {
        self.state().max_dimension = Some(max_dimension);
        self
    }

    pub fn fail_next_render_target(&self) {
        self.state().fail_next_render_target = true;
    }
    pub fn fail_next_framebuffer(&self) {
        self.state().fail_next_framebuffer = true;
    }
    pub fn fail_next_registration(&self) {
        self.state().fail_next_registration = true;
    }

    /// A display surface journaling into this backend's log.
    pub fn display(&self) -> RecordingDisplay {
        RecordingDisplay {
            state: self.state.clone(),
        }
    }

    pub fn journal(&self) -> Vec<Call> {
        self.state().journal.clone()
    }
    /// Returns the journal and starts a fresh one.
    pub fn take_journal(&self) -> Vec<Call> {
        std::mem::take(&mut self.state().journal)
    }
    pub fn violations(&self) -> Vec<Violation> {
        self.state().violations.clone()
    }

    pub fn live_devices(&self) -> usize {
        self.state().devices.len()
    }
    pub fn live_surfaces(&self) -> usize {
        self.state().surfaces.len()
    }
    pub fn live_framebuffers(&self) -> usize {
        self.state().framebuffers.len()
    }
    pub fn live_registrations(&self) -> usize {
        self.state().registrations.len()
    }
    /// Size of a live render target.
    pub fn surface_size(&self, surface: SurfaceHandle) -> Option<(u32, u32)> {
        self.state().surfaces.get(&surface).copied()
    }
    /// The framebuffer most recently bound, if it was not the default target.
    pub fn bound_framebuffer(&self) -> Option<FramebufferHandle> {
        self.state().bound
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SurfaceAllocator for RecordingBackend {
    fn create_render_target(
        &self,
        device: DeviceHandle,
        width: u32,
        height: u32,
    ) -> Result<SurfaceHandle, BackendError> {
        let mut state = self.state();
        state.check_device(device);
        if std::mem::take(&mut state.fail_next_render_target) {
            return Err(BackendError::new(
                BackendErrorKind::OutOfMemory,
                "injected render target failure",
            ));
        }
        if let Some(max) = state.max_dimension {
            if width > max || height > max {
                return Err(BackendError::new(
                    BackendErrorKind::InvalidSize,
                    format!("{width}x{height} exceeds maximum dimension {max}"),
                ));
            }
        }
        let raw = state.next_raw();
        let surface = SurfaceHandle::new(raw);
        state.surfaces.insert(surface, (width, height));
        state.journal.push(Call::CreateRenderTarget {
            surface,
            width,
            height,
        });
        Ok(surface)
    }

    fn release_render_target(&self, device: DeviceHandle, surface: SurfaceHandle) {
        let mut state = self.state();
        state.check_device(device);
        if let Some(registration) = state.registration_for_surface(surface) {
            state
                .violations
                .push(Violation::ReleasedWhileRegistered(registration));
        }
        if state.surfaces.remove(&surface).is_none() {
            state.violations.push(Violation::UnknownSurface(surface));
        }
        state.journal.push(Call::ReleaseRenderTarget(surface));
    }
}

impl RenderingApi for RecordingBackend {
    fn create_framebuffer(&self, _width: u32, _height: u32) -> Result<FramebufferHandle, BackendError> {
        let mut state = self.state();
        if std::mem::take(&mut state.fail_next_framebuffer) {
            return Err(BackendError::new(
                BackendErrorKind::Other,
                "injected framebuffer failure",
            ));
        }
        let raw = state.next_raw();
        let framebuffer = FramebufferHandle::new(raw);
        state.framebuffers.insert(framebuffer);
        state.journal.push(Call::CreateFramebuffer(framebuffer));
        Ok(framebuffer)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferHandle) {
        let mut state = self.state();
        if let Some(registration) = state.registration_for_framebuffer(framebuffer) {
            state
                .violations
                .push(Violation::ReleasedWhileRegistered(registration));
        }
        if !state.framebuffers.remove(&framebuffer) {
            state
                .violations
                .push(Violation::UnknownFramebuffer(framebuffer));
        }
        if state.bound == Some(framebuffer) {
            state.bound = None;
        }
        state.journal.push(Call::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferHandle>) {
        let mut state = self.state();
        if let Some(framebuffer) = framebuffer {
            if !state.framebuffers.contains(&framebuffer) {
                state
                    .violations
                    .push(Violation::UnknownFramebuffer(framebuffer));
            }
            if let Some(registration) = state.registration_for_framebuffer(framebuffer) {
                if !state.locked.contains(&registration) {
                    state
                        .violations
                        .push(Violation::BoundOutsideLock(framebuffer));
                }
            }
        }
        state.bound = framebuffer;
        state.journal.push(Call::BindFramebuffer(framebuffer));
    }

    fn viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        self.state().journal.push(Call::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn flush(&self) {
        self.state().journal.push(Call::Flush);
    }
}

impl InteropSubsystem for RecordingBackend {
    fn open_device(&self, _settings: &ContextSettings) -> Result<DeviceHandle, BackendError> {
        let mut state = self.state();
        if state.unsupported {
            return Err(BackendError::unsupported(
                "driver does not expose a surface interop extension",
            ));
        }
        let raw = state.next_raw();
        let device = DeviceHandle::new(raw);
        state.devices.insert(device);
        state.journal.push(Call::OpenDevice(device));
        Ok(device)
    }

    fn close_device(&self, device: DeviceHandle) {
        let mut state = self.state();
        if !state.devices.remove(&device) {
            state.violations.push(Violation::UnknownDevice(device));
        }
        state.journal.push(Call::CloseDevice(device));
    }

    fn register_surface(
        &self,
        device: DeviceHandle,
        surface: SurfaceHandle,
        framebuffer: FramebufferHandle,
    ) -> Result<RegistrationHandle, BackendError> {
        let mut state = self.state();
        state.check_device(device);
        if std::mem::take(&mut state.fail_next_registration) {
            return Err(BackendError::new(
                BackendErrorKind::Other,
                "injected registration failure",
            ));
        }
        if !state.surfaces.contains_key(&surface) {
            state.violations.push(Violation::UnknownSurface(surface));
        }
        if !state.framebuffers.contains(&framebuffer) {
            state
                .violations
                .push(Violation::UnknownFramebuffer(framebuffer));
        }
        let raw = state.next_raw();
        let registration = RegistrationHandle::new(raw);
        state
            .registrations
            .insert(registration, (surface, framebuffer));
        state.journal.push(Call::Register {
            registration,
            surface,
            framebuffer,
        });
        Ok(registration)
    }

    fn unregister(&self, device: DeviceHandle, registration: RegistrationHandle) {
        let mut state = self.state();
        state.check_device(device);
        if state.locked.remove(&registration) {
            state
                .violations
                .push(Violation::UnregisteredWhileLocked(registration));
        }
        if state.registrations.remove(&registration).is_none() {
            state
                .violations
                .push(Violation::UnknownRegistration(registration));
        }
        state.journal.push(Call::Unregister(registration));
    }

    fn lock_objects(&self, device: DeviceHandle, registrations: &[RegistrationHandle]) {
        let mut state = self.state();
        state.check_device(device);
        for registration in registrations {
            if !state.registrations.contains_key(registration) {
                state
                    .violations
                    .push(Violation::UnknownRegistration(*registration));
            }
            if !state.locked.insert(*registration) {
                state.violations.push(Violation::AlreadyLocked(*registration));
            }
        }
        state.journal.push(Call::LockObjects(registrations.to_vec()));
    }

    fn unlock_objects(&self, device: DeviceHandle, registrations: &[RegistrationHandle]) {
        let mut state = self.state();
        state.check_device(device);
        for registration in registrations {
            if !state.locked.remove(registration) {
                state.violations.push(Violation::NotLocked(*registration));
            }
        }
        state
            .journal
            .push(Call::UnlockObjects(registrations.to_vec()));
    }
}

/**
A display surface that journals into its [RecordingBackend].
*/
#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    state: Arc<Mutex<State>>,
}

impl RecordingDisplay {
    /// The surface the display is currently showing.
    pub fn backing_surface(&self) -> Option<SurfaceHandle> {
        self.state().backing_surface
    }
    pub fn is_locked(&self) -> bool {
        self.state().display_locked
    }
    /// Every dirty rectangle still in the journal, oldest first.
    pub fn dirty_rects(&self) -> Vec<DirtyRect> {
        self.state()
            .journal
            .iter()
            .filter_map(|call| match call {
                Call::MarkDirty(rect) => Some(*rect),
                _ => None,
            })
            .collect()
    }
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySurface for RecordingDisplay {
    fn lock(&mut self) {
        let mut state = self.state();
        if state.display_locked {
            state.violations.push(Violation::DisplayAlreadyLocked);
        }
        state.display_locked = true;
        state.journal.push(Call::DisplayLock);
    }

    fn unlock(&mut self) {
        let mut state = self.state();
        if !state.display_locked {
            state
                .violations
                .push(Violation::DisplayNotLocked(Call::DisplayUnlock));
        }
        if !state.locked.is_empty() {
            state
                .violations
                .push(Violation::PresentedWhileInteropLocked(Call::DisplayUnlock));
        }
        state.display_locked = false;
        state.journal.push(Call::DisplayUnlock);
    }

    fn set_backing_surface(&mut self, surface: Option<SurfaceHandle>) {
        let mut state = self.state();
        state.backing_surface = surface;
        state.display_update(Call::SetBackingSurface(surface));
    }

    fn mark_dirty(&mut self, rect: DirtyRect) {
        self.state().display_update(Call::MarkDirty(rect));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(backend: &RecordingBackend) -> DeviceHandle {
        backend
            .open_device(&ContextSettings::default())
            .expect("recording backend supports interop")
    }

    #[test]
    fn unsupported_backend_refuses_device() {
        let backend = RecordingBackend::unsupported();
        let err = backend
            .open_device(&ContextSettings::default())
            .unwrap_err();
        assert_eq!(err.kind(), BackendErrorKind::Unsupported);
        assert!(backend.journal().is_empty());
    }

    #[test]
    fn handles_are_distinct_across_kinds() {
        let backend = RecordingBackend::new();
        let device = open(&backend);
        let surface = backend.create_render_target(device, 4, 4).unwrap();
        let framebuffer = backend.create_framebuffer(4, 4).unwrap();
        assert_ne!(device.as_raw(), surface.as_raw());
        assert_ne!(surface.as_raw(), framebuffer.as_raw());
        assert_eq!(backend.surface_size(surface), Some((4, 4)));
    }

    #[test]
    fn double_release_is_a_violation() {
        let backend = RecordingBackend::new();
        let device = open(&backend);
        let surface = backend.create_render_target(device, 4, 4).unwrap();
        backend.release_render_target(device, surface);
        assert!(backend.violations().is_empty());
        backend.release_render_target(device, surface);
        assert_eq!(
            backend.violations(),
            vec![Violation::UnknownSurface(surface)]
        );
    }

    #[test]
    fn binding_outside_lock_is_a_violation() {
        let backend = RecordingBackend::new();
        let device = open(&backend);
        let surface = backend.create_render_target(device, 4, 4).unwrap();
        let framebuffer = backend.create_framebuffer(4, 4).unwrap();
        let registration = backend
            .register_surface(device, surface, framebuffer)
            .unwrap();

        backend.lock_objects(device, &[registration]);
        backend.bind_framebuffer(Some(framebuffer));
        backend.bind_framebuffer(None);
        backend.unlock_objects(device, &[registration]);
        assert!(backend.violations().is_empty());

        backend.bind_framebuffer(Some(framebuffer));
        assert_eq!(
            backend.violations(),
            vec![Violation::BoundOutsideLock(framebuffer)]
        );
    }

    #[test]
    fn releasing_registered_surface_is_a_violation() {
        let backend = RecordingBackend::new();
        let device = open(&backend);
        let surface = backend.create_render_target(device, 4, 4).unwrap();
        let framebuffer = backend.create_framebuffer(4, 4).unwrap();
        let registration = backend
            .register_surface(device, surface, framebuffer)
            .unwrap();
        backend.release_render_target(device, surface);
        assert_eq!(
            backend.violations(),
            vec![Violation::ReleasedWhileRegistered(registration)]
        );
    }

    #[test]
    fn display_updates_while_interop_locked_are_violations() {
        let backend = RecordingBackend::new();
        let mut display = backend.display();
        let device = open(&backend);
        let surface = backend.create_render_target(device, 4, 4).unwrap();
        let framebuffer = backend.create_framebuffer(4, 4).unwrap();
        let registration = backend
            .register_surface(device, surface, framebuffer)
            .unwrap();

        display.lock();
        backend.lock_objects(device, &[registration]);
        display.mark_dirty(DirtyRect::covering(4, 4));
        assert_eq!(
            backend.violations(),
            vec![Violation::PresentedWhileInteropLocked(Call::MarkDirty(
                DirtyRect::covering(4, 4)
            ))]
        );
    }

    #[test]
    fn failures_are_one_shot() {
        let backend = RecordingBackend::new().with_max_dimension(64);
        let device = open(&backend);
        backend.fail_next_render_target();
        assert!(backend.create_render_target(device, 8, 8).is_err());
        assert!(backend.create_render_target(device, 8, 8).is_ok());
        let err = backend.create_render_target(device, 65, 8).unwrap_err();
        assert_eq!(err.kind(), BackendErrorKind::InvalidSize);
    }

    #[test]
    fn display_tracks_backing_surface() {
        let backend = RecordingBackend::new();
        let mut display = backend.display();
        let surface = SurfaceHandle::from_raw(7).unwrap();
        display.lock();
        display.set_backing_surface(Some(surface));
        display.unlock();
        assert_eq!(display.backing_surface(), Some(surface));
        assert!(!display.is_locked());

        display.set_backing_surface(None);
        assert_eq!(
            backend.violations(),
            vec![Violation::DisplayNotLocked(Call::SetBackingSurface(None))]
        );
    }
}
