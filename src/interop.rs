// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The interop core: device context, shared framebuffer, lock protocol and renderer. */

pub mod context;
pub mod framebuffer;
pub mod lock;
pub mod renderer;
pub mod timing;

pub use context::{ContextError, DeviceContext};
pub use framebuffer::{DpiScale, FramebufferError, SharedFramebuffer};
pub use lock::{DisplayLock, InteropLock};
pub use renderer::{ListenerId, Renderer};
pub use timing::{Clock, FrameStats, FrameTiming, ManualClock, MonotonicClock};
