//! eglgbm - EGL/GBM display system for DRM/KMS
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │      Screen / Primary Layer adapters     │
//! ├──────────────────────────────────────────┤
//! │  Shared display state  │  Scanout (flip) │
//! │          ↓                      ↓        │
//! │   Per-process binding (GBM + EGL)        │
//! │                 ↓                        │
//! │           DRM/KMS Output                 │
//! └──────────────────────────────────────────┘
//! ```

pub mod config;
pub mod constants;
pub mod drm;
pub mod error;
pub mod framework;
pub mod gpu;
pub mod layer;
pub mod modes;
pub mod rotation;
pub mod scanout;
pub mod screen;
pub mod shared;
pub mod system;

pub use config::Config;
pub use error::{BindError, DiscoveryError, Error, Result};
pub use layer::EglPrimaryLayer;
pub use screen::EglScreen;
pub use system::{info, Binder, Binding, Role, System};
