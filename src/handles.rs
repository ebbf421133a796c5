// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Opaque handles passed between the core and a backend.

Handles are plain non-zero integers.  A backend decides what they mean (a COM pointer, a GL object
name, an index into its own table); the core only copies them around and hands them back.
Zero is reserved, so `Option<Handle>` costs nothing and "no surface" has a single spelling.
*/
use std::fmt::Formatter;
use std::num::NonZeroU64;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU64);

        impl $name {
            pub const fn new(raw: NonZeroU64) -> Self {
                Self(raw)
            }
            /// Wraps a raw backend value.  Returns `None` for zero.
            pub const fn from_raw(raw: u64) -> Option<Self> {
                match NonZeroU64::new(raw) {
                    Some(v) => Some(Self(v)),
                    None => None,
                }
            }
            pub const fn as_raw(self) -> u64 {
                self.0.get()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0.get())
            }
        }
    };
}

handle!(
    /// The interop device opened against the rendering context.
    DeviceHandle
);
handle!(
    /// A render-target surface owned by the display-side API.
    SurfaceHandle
);
handle!(
    /// A framebuffer object owned by the rendering API.
    FramebufferHandle
);
handle!(
    /// The interop registration binding a surface to a framebuffer object.
    RegistrationHandle
);

/**
A region reported to the compositor as changed, in device pixels.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DirtyRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        DirtyRect { x, y, width, height }
    }
    /// The rectangle from the origin covering `width` × `height`.
    pub const fn covering(width: u32, height: u32) -> Self {
        DirtyRect::new(0, 0, width, height)
    }
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for DirtyRect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{} {}x{})", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_handle() {
        assert!(SurfaceHandle::from_raw(0).is_none());
        let h = SurfaceHandle::from_raw(0x2a).unwrap();
        assert_eq!(h.as_raw(), 42);
        assert_eq!(format!("{:?}", h), "SurfaceHandle(0x2a)");
    }

    #[test]
    fn option_handle_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<Option<RegistrationHandle>>(),
            std::mem::size_of::<u64>()
        );
    }

    #[test]
    fn covering_rect() {
        let r = DirtyRect::covering(100, 50);
        assert_eq!(r, DirtyRect::new(0, 0, 100, 50));
        assert!(!r.is_empty());
        assert!(DirtyRect::covering(0, 50).is_empty());
        assert_eq!(r.to_string(), "(0,0 100x50)");
    }
}
