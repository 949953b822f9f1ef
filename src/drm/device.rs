//! DRM device management
//!
//! Opens the DRM device (/dev/dri/card*) and exposes its connectors,
//! encoders, and CRTCs to output discovery.

use anyhow::{anyhow, Context, Result};
use drm::control::{connector, crtc, encoder, Device as ControlDevice, Mode, ResourceHandles};
use drm::Device as BasicDevice;
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::Path;

use super::discovery::{ConnectorSnapshot, EncoderSnapshot, ResourceSource};

/// DRM device wrapper
pub struct Device {
    file: File,
    resources: ResourceHandles,
}

// Trait implementations required by drm crate
impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl BasicDevice for Device {}
impl ControlDevice for Device {}

impl Device {
    /// Open DRM device
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/dri/card0")
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        info!("Opening DRM device: {}", path.display());

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        // Create temporary device wrapper to get resources
        struct TempDevice<'a>(&'a File);
        impl AsFd for TempDevice<'_> {
            fn as_fd(&self) -> BorrowedFd<'_> {
                self.0.as_fd()
            }
        }
        impl BasicDevice for TempDevice<'_> {}
        impl ControlDevice for TempDevice<'_> {}

        let resources = TempDevice(&file).resource_handles()?;

        info!(
            "DRM resources: connectors={}, crtcs={}, encoders={}",
            resources.connectors().len(),
            resources.crtcs().len(),
            resources.encoders().len()
        );

        Ok(Self { file, resources })
    }

    /// Get connector info
    pub fn get_connector(&self, handle: connector::Handle) -> Result<connector::Info> {
        ControlDevice::get_connector(self, handle, false)
            .with_context(|| format!("Failed to get connector {:?} info", handle))
    }

    /// Get encoder info
    pub fn get_encoder(&self, handle: encoder::Handle) -> Result<encoder::Info> {
        ControlDevice::get_encoder(self, handle)
            .with_context(|| format!("Failed to get encoder {:?} info", handle))
    }

    /// Get CRTC info
    pub fn get_crtc(&self, handle: crtc::Handle) -> Result<crtc::Info> {
        ControlDevice::get_crtc(self, handle)
            .with_context(|| format!("Failed to get CRTC {:?} info", handle))
    }

    /// Get RawFd (needed for GBM/EGL and framebuffer ioctls)
    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Duplicate fd and return as File (for GBM device)
    pub fn dup_fd(&self) -> Result<File> {
        self.file
            .try_clone()
            .map_err(|e| anyhow!("fd dup failed: {}", e))
    }
}

impl ResourceSource for Device {
    type Connector = connector::Handle;
    type Encoder = encoder::Handle;
    type Crtc = crtc::Handle;
    type Mode = Mode;

    fn connectors(&self) -> Vec<connector::Handle> {
        self.resources.connectors().to_vec()
    }

    fn connector(&self, handle: connector::Handle) -> Option<ConnectorSnapshot<encoder::Handle, Mode>> {
        match self.get_connector(handle) {
            Ok(info) => Some(ConnectorSnapshot {
                connected: info.state() == connector::State::Connected,
                current_encoder: info.current_encoder(),
                encoders: info.encoders().to_vec(),
                modes: info.modes().to_vec(),
            }),
            Err(e) => {
                debug!("{:#}", e);
                None
            }
        }
    }

    fn encoder(&self, handle: encoder::Handle) -> Option<EncoderSnapshot<crtc::Handle>> {
        match self.get_encoder(handle) {
            Ok(info) => Some(EncoderSnapshot {
                crtc: info.crtc(),
                possible_crtcs: self.resources.filter_crtcs(info.possible_crtcs()),
            }),
            Err(e) => {
                debug!("{:#}", e);
                None
            }
        }
    }
}
