//! Global constants for eglgbm
//!
//! Consolidates device selection, shared-state naming, and descriptor
//! strings to eliminate magic values throughout the codebase.

// ============================================================================
// Device Selection
// ============================================================================

/// Device node used when neither the config file nor the environment names one
pub const DEFAULT_DEVICE: &str = "/dev/dri/card0";

/// Environment variable consulted for the device node
pub const DEVICE_ENV: &str = "DRICARD";

/// Maximum stored length of the device path in bytes
pub const DEVICE_NAME_MAX: usize = 255;

// ============================================================================
// Shared State
// ============================================================================

/// Arena key under which the master publishes the shared display state
pub const SHARED_FIELD: &str = "egl";

/// Arena key of the surface pool id counter
pub const POOL_COUNTER_FIELD: &str = "pool-ids";

/// Arena directory name below the runtime directory
pub const ARENA_DIR_NAME: &str = "eglgbm";

// ============================================================================
// Descriptors
// ============================================================================

pub const SYSTEM_NAME: &str = "EGL";
pub const SYSTEM_VENDOR: &str = "eglgbm";
pub const SYSTEM_VERSION: (u32, u32) = (0, 1);

pub const SCREEN_NAME: &str = "EGL Screen";
pub const OUTPUT_NAME: &str = "EGL Output";
pub const PRIMARY_LAYER_NAME: &str = "EGL Primary Layer";

// ============================================================================
// Scanout
// ============================================================================

/// Color depth registered with ADDFB
pub const SCANOUT_DEPTH: u32 = 24;

/// Bits per pixel registered with ADDFB
pub const SCANOUT_BPP: u32 = 32;

/// KMS connector property carrying the panel mounting orientation
pub const PANEL_ORIENTATION_PROP: &str = "panel orientation";
