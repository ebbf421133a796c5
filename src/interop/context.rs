// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The interop device context.
//!
//! The context is only an anchor: it opens the interop device once and hands its handle to
//! every framebuffer and every lock.  It never draws.
use std::fmt::Formatter;

use crate::backend::{Backend, BackendError};
use crate::handles::DeviceHandle;
use crate::settings::{ContextSettings, SettingsError};

/**
Owns the backend and the interop device opened on it.

Created once per renderer and never mutated afterwards.  Framebuffers hold it through an `Arc`,
so it outlives every framebuffer it created.  Dropping the last reference closes the device.
*/
pub struct DeviceContext<B: Backend> {
    backend: B,
    device: DeviceHandle,
    settings: ContextSettings,
}

impl<B: Backend> DeviceContext<B> {
    /**
    Validates `settings` and opens the interop device.

    Fails with [ContextError::UnsupportedInterop] when the driver cannot share surfaces.  That is
    fatal for the session; nothing here retries.
    */
    pub fn new(backend: B, settings: ContextSettings) -> Result<Self, ContextError> {
        settings.validate()?;
        let device = backend
            .open_device(&settings)
            .map_err(ContextError::UnsupportedInterop)?;
        logwise::info_sync!(
            "Opened interop device {device} for {settings}",
            device = logwise::privacy::LogIt(&device),
            settings = logwise::privacy::LogIt(&settings)
        );
        Ok(DeviceContext {
            backend,
            device,
            settings,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
    pub fn device(&self) -> DeviceHandle {
        self.device
    }
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }
}

impl<B: Backend> Drop for DeviceContext<B> {
    fn drop(&mut self) {
        logwise::info_sync!(
            "Closing interop device {device}",
            device = logwise::privacy::LogIt(&self.device)
        );
        self.backend.close_device(self.device);
    }
}

impl<B: Backend> std::fmt::Debug for DeviceContext<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("device", &self.device)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ContextError {
    #[error("Invalid context settings: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("Surface interop is not supported: {0}")]
    UnsupportedInterop(#[source] BackendError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};
    use crate::settings::Profile;

    #[test]
    fn opens_and_closes_device() {
        let backend = RecordingBackend::new();
        let context = DeviceContext::new(backend.clone(), ContextSettings::default()).unwrap();
        let device = context.device();
        assert_eq!(backend.live_devices(), 1);
        drop(context);
        assert_eq!(
            backend.journal(),
            vec![Call::OpenDevice(device), Call::CloseDevice(device)]
        );
        assert_eq!(backend.live_devices(), 0);
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn unsupported_interop_is_fatal() {
        let backend = RecordingBackend::unsupported();
        let err = DeviceContext::new(backend.clone(), ContextSettings::default()).unwrap_err();
        assert!(matches!(err, ContextError::UnsupportedInterop(_)));
        assert_eq!(backend.live_devices(), 0);
    }

    #[test]
    fn invalid_settings_never_reach_the_driver() {
        let backend = RecordingBackend::new();
        let settings = ContextSettings::default()
            .with_version(2, 1)
            .with_profile(Profile::Core);
        let err = DeviceContext::new(backend.clone(), settings).unwrap_err();
        assert!(matches!(err, ContextError::InvalidSettings(_)));
        assert!(backend.journal().is_empty());
    }
}
