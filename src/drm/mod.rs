//! DRM/KMS display management

pub mod device;
pub mod discovery;
pub mod display;
pub mod props;

pub use device::Device;
pub use discovery::{discover, DiscoveredOutput, PhysicalOutput, ResourceSource};
pub use display::{fb_handle, page_flip, set_crtc, wait_for_flip, DrmFramebuffer, SavedCrtc};
pub use props::panel_orientation;
