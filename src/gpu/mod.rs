//! GPU rendering with OpenGL ES
//!
//! Handles:
//! - GBM device/surface creation
//! - EGL context creation (GBM platform)
//! - Per-process binding of device, allocator and context

pub mod binding;
pub mod context;

pub use binding::{GbmBinder, GbmBinding, KmsOutput};
pub use context::{EglContext, EglDisplay, EglSurface, GbmDevice, GbmSurface, GlRenderer, ScanoutBuffer};
