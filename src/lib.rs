/*! interop_surface lets a retained-mode UI show frames drawn with an immediate-mode graphics API,
by sharing one GPU render target between the two APIs instead of copying pixels through host memory.

The difficult part is not drawing, it is ownership.  One API renders into the surface, a
compositor displays the same surface, and both have to agree frame by frame on who may touch it.
When the control resizes, the surface has to be replaced without leaking handles or showing a torn
frame.

# Pieces

| Type                                  | Role                                                                    |
|---------------------------------------|-------------------------------------------------------------------------|
| [interop::DeviceContext]              | Opens the interop device once; every other call is made against it.     |
| [interop::SharedFramebuffer]          | One render target, visible to both APIs, registered for interop.        |
| [interop::DisplayLock] / [interop::InteropLock] | The per-frame handoff between compositor and renderer.        |
| [interop::Renderer]                   | Timing, resize, and the acquire → render → flush → release cycle.       |

A frame goes like this:

1. compute the time since the previous frame,
2. lock the display surface, then lock the shared surface for the rendering API,
3. bind the framebuffer and run the render callback,
4. unbind, flush, run the render-complete listeners,
5. unlock the shared surface, point the display at it, mark it dirty, unlock the display.

# Backends

The core never calls a driver.  It drives the traits in [backend], and every call that needs the
interop device gets the device handle explicitly.  A real backend wraps something like a
D3D9Ex device plus `WGL_NV_DX_interop`; [backend::recording] is an in-memory backend that journals
calls and checks the protocol, which is what the tests run against.

```
use interop_surface::backend::recording::RecordingBackend;
use interop_surface::interop::Renderer;
use interop_surface::settings::ContextSettings;

let backend = RecordingBackend::new();
let display = backend.display();
let mut renderer = Renderer::new(backend.clone(), ContextSettings::default(), display).unwrap();
renderer.set_render_callback(|delta| {
    // issue drawing commands here
    let _ = delta;
});
renderer.resize(640, 480, 1.0, 1.0).unwrap();
renderer.render();
assert_eq!(renderer.frame_stats().frames_rendered(), 1);
assert!(backend.violations().is_empty());
```

# Threading

None.  Lock and unlock on the display surface are only valid from the UI thread, so the renderer
expects to be driven from there and runs the callbacks inline.
*/

pub mod backend;
pub mod handles;
pub mod interop;
pub mod settings;

pub use backend::{Backend, BackendError, DisplaySurface};
pub use handles::{DeviceHandle, DirtyRect, FramebufferHandle, RegistrationHandle, SurfaceHandle};
pub use interop::{ContextError, FramebufferError, Renderer};
pub use settings::ContextSettings;
