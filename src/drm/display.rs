//! DRM display management
//!
//! Framebuffers, mode setting and page flip handling

use anyhow::{anyhow, Context, Result};
use drm::control::{connector, crtc, framebuffer, Device as ControlDevice, Event, Mode, PageFlipFlags};
use log::{debug, trace, warn};

use super::device::Device;
use crate::constants::{SCANOUT_BPP, SCANOUT_DEPTH};
use crate::scanout::FramebufferId;

/// KMS framebuffer attached to a GBM buffer object
///
/// Removed from the device when dropped, which GBM does when it frees the
/// buffer object carrying it as user data.
#[derive(Debug)]
pub struct DrmFramebuffer {
    device_fd: std::os::unix::io::RawFd,
    fb_id: u32,
}

impl DrmFramebuffer {
    /// Create framebuffer from GBM BO
    pub fn from_bo<T: 'static>(device: &Device, bo: &gbm::BufferObject<T>) -> Result<Self> {
        let raw_handle = bo
            .handle()
            .map_err(|e| anyhow!("Failed to get BO handle: {:?}", e))?;
        let handle = unsafe { raw_handle.s32 } as u32;
        let width = bo.width().map_err(|e| anyhow!("{:?}", e))?;
        let height = bo.height().map_err(|e| anyhow!("{:?}", e))?;
        let stride = bo.stride().map_err(|e| anyhow!("{:?}", e))?;

        // Add framebuffer directly via DRM_IOCTL_MODE_ADDFB
        let mut fb_cmd = drm_mode_fb_cmd {
            fb_id: 0,
            width,
            height,
            pitch: stride,
            bpp: SCANOUT_BPP,
            depth: SCANOUT_DEPTH,
            handle,
        };
        let ret = unsafe {
            libc::ioctl(
                device.as_raw_fd(),
                DRM_IOCTL_MODE_ADDFB,
                &mut fb_cmd as *mut _,
            )
        };
        if ret < 0 {
            return Err(anyhow!(
                "Failed to add framebuffer: {}",
                std::io::Error::last_os_error()
            ));
        }

        debug!(
            "Framebuffer created: id={}, {}x{}, stride={}",
            fb_cmd.fb_id, width, height, stride
        );

        Ok(Self {
            device_fd: device.as_raw_fd(),
            fb_id: fb_cmd.fb_id,
        })
    }

    pub fn id(&self) -> FramebufferId {
        FramebufferId(self.fb_id)
    }
}

impl Drop for DrmFramebuffer {
    fn drop(&mut self) {
        trace!("Removing framebuffer {}", self.fb_id);
        unsafe {
            let mut fb_id = self.fb_id;
            libc::ioctl(self.device_fd, DRM_IOCTL_MODE_RMFB, &mut fb_id as *mut _);
        }
    }
}

/// drm handle for a framebuffer id
pub fn fb_handle(fb: FramebufferId) -> framebuffer::Handle {
    // framebuffer::Handle is internally u32
    unsafe { std::mem::transmute::<u32, framebuffer::Handle>(fb.0) }
}

/// Set display mode
pub fn set_crtc(
    device: &Device,
    crtc: crtc::Handle,
    connector: connector::Handle,
    mode: Mode,
    fb: FramebufferId,
) -> Result<()> {
    device
        .set_crtc(crtc, Some(fb_handle(fb)), (0, 0), &[connector], Some(mode))
        .context("Failed to set display mode")?;
    Ok(())
}

/// Queue a page flip completing with a flip event
pub fn page_flip(device: &Device, crtc: crtc::Handle, fb: FramebufferId) -> Result<()> {
    device
        .page_flip(crtc, fb_handle(fb), PageFlipFlags::EVENT, None)
        .with_context(|| format!("Failed to queue page flip to framebuffer {}", fb.0))
}

/// Block on the device until a page flip event for `crtc` arrives
pub fn wait_for_flip(device: &Device, crtc: crtc::Handle) -> Result<()> {
    loop {
        let events = device
            .receive_events()
            .context("Failed to read DRM events")?;
        for event in events {
            match event {
                Event::PageFlip(flip) if flip.crtc == crtc => {
                    trace!("Page flip complete (frame {})", flip.frame);
                    return Ok(());
                }
                Event::PageFlip(flip) => {
                    debug!("Ignoring page flip for CRTC {:?}", flip.crtc);
                }
                _ => {}
            }
        }
    }
}

/// Save and restore original CRTC configuration
pub struct SavedCrtc {
    info: crtc::Info,
    crtc: crtc::Handle,
    connector: connector::Handle,
}

impl SavedCrtc {
    pub fn save(device: &Device, crtc: crtc::Handle, connector: connector::Handle) -> Result<Self> {
        let info = device.get_crtc(crtc)?;
        Ok(Self {
            info,
            crtc,
            connector,
        })
    }

    pub fn restore(&self, device: &Device) {
        if let Some(fb) = self.info.framebuffer() {
            if let Err(e) = device.set_crtc(
                self.crtc,
                Some(fb),
                self.info.position(),
                &[self.connector],
                self.info.mode(),
            ) {
                warn!("Failed to restore CRTC {:?}: {}", self.crtc, e);
            }
        }
    }
}

// DRM ioctl constants
#[repr(C)]
struct drm_mode_fb_cmd {
    fb_id: u32,
    width: u32,
    height: u32,
    pitch: u32,
    bpp: u32,
    depth: u32,
    handle: u32,
}

const DRM_IOCTL_MODE_ADDFB: libc::c_ulong =
    nix::request_code_readwrite!(0x64, 0xAE, std::mem::size_of::<drm_mode_fb_cmd>())
        as libc::c_ulong;

const DRM_IOCTL_MODE_RMFB: libc::c_ulong =
    nix::request_code_readwrite!(0x64, 0xAF, std::mem::size_of::<u32>()) as libc::c_ulong;
