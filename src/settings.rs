// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Configuration for the interop device context.

These settings describe the rendering context the backend opens its interop device against.
Presentation-loop concerns (vsync, continuous rendering) belong to the host control and are not
represented here.
*/

/// Which rendering-API profile to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Profile {
    /// Let the driver pick.
    Any,
    /// Core profile; deprecated immediate-mode entry points are unavailable.
    Core,
    /// Compatibility profile.  Immediate-mode drawing works here.
    #[default]
    Compatibility,
}

/// Context creation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextFlags {
    pub debug: bool,
    pub forward_compatible: bool,
}

/**
Settings used to create a [crate::interop::DeviceContext].

The defaults request a 3.3 compatibility context with no flags.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextSettings {
    pub major_version: u8,
    pub minor_version: u8,
    pub profile: Profile,
    pub flags: ContextFlags,
}

impl Default for ContextSettings {
    fn default() -> Self {
        ContextSettings {
            major_version: 3,
            minor_version: 3,
            profile: Profile::default(),
            flags: ContextFlags::default(),
        }
    }
}

impl ContextSettings {
    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.flags.debug = debug;
        self
    }
    pub fn with_forward_compatible(mut self, forward_compatible: bool) -> Self {
        self.flags.forward_compatible = forward_compatible;
        self
    }

    /// The requested version as a `(major, minor)` pair, comparable with `<`.
    pub fn version(&self) -> (u8, u8) {
        (self.major_version, self.minor_version)
    }

    /**
    Checks that the combination of settings is one a driver could satisfy.

    * version 0.x does not exist
    * core profiles start at 3.2
    * forward-compatible contexts start at 3.0
    */
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.major_version == 0 {
            return Err(SettingsError::InvalidVersion {
                major: self.major_version,
                minor: self.minor_version,
            });
        }
        if self.profile == Profile::Core && self.version() < (3, 2) {
            return Err(SettingsError::CoreProfileUnavailable {
                major: self.major_version,
                minor: self.minor_version,
            });
        }
        if self.flags.forward_compatible && self.version() < (3, 0) {
            return Err(SettingsError::ForwardCompatibleUnavailable {
                major: self.major_version,
                minor: self.minor_version,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("Version {major}.{minor} is not a valid context version")]
    InvalidVersion { major: u8, minor: u8 },
    #[error("Core profile requires version 3.2 or later, got {major}.{minor}")]
    CoreProfileUnavailable { major: u8, minor: u8 },
    #[error("Forward-compatible contexts require version 3.0 or later, got {major}.{minor}")]
    ForwardCompatibleUnavailable { major: u8, minor: u8 },
}
