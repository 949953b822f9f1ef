//! Per-process binding
//!
//! Device node, GBM allocator, EGL display/surface/context and the output
//! they drive. Acquired step by step; each step maps to its own
//! [`BindError`] and everything acquired so far is released on failure.

use anyhow::Result;
use drm::control::{connector, crtc, encoder, Mode};
use log::{info, warn};
use std::rc::Rc;

use super::context::{EglContext, EglDisplay, EglSurface, GbmDevice, GbmSurface, ScanoutBuffer};
use crate::drm::{self as kms, discover, Device, DrmFramebuffer, PhysicalOutput, SavedCrtc};
use crate::error::BindError;
use crate::framework::Dimension;
use crate::rotation::PanelOrientation;
use crate::scanout::{FramebufferId, ScanoutTarget};
use crate::system::{Binder, Binding};

/// Output driven by this process
pub type KmsOutput = PhysicalOutput<connector::Handle, encoder::Handle, crtc::Handle, Mode>;

/// Binds to a DRM device through GBM and EGL
#[derive(Debug, Default, Clone, Copy)]
pub struct GbmBinder;

impl Binder for GbmBinder {
    type Binding = GbmBinding;

    fn bind(&self, device_path: &str) -> std::result::Result<GbmBinding, BindError> {
        GbmBinding::new(device_path)
    }
}

/// Bound display resources of one process
///
/// Fields drop in declaration order, the reverse of acquisition.
pub struct GbmBinding {
    context: EglContext,
    egl_surface: EglSurface,
    gbm_surface: GbmSurface,
    #[allow(dead_code)]
    egl_display: Rc<EglDisplay>,
    #[allow(dead_code)]
    gbm: GbmDevice,
    output: KmsOutput,
    saved_crtc: Option<SavedCrtc>,
    device: Device,
}

impl GbmBinding {
    pub fn new(device_path: &str) -> std::result::Result<Self, BindError> {
        let device = Device::open(device_path).map_err(|e| BindError::OpenFailed {
            path: device_path.to_string(),
            reason: e.to_string(),
        })?;

        let gbm = device
            .dup_fd()
            .and_then(GbmDevice::new)
            .map_err(|e| BindError::AllocatorInitFailed(format!("{:#}", e)))?;

        let egl_display = EglDisplay::new(&gbm)
            .map(Rc::new)
            .map_err(|e| BindError::ContextInitFailed(format!("{:#}", e)))?;

        let config = egl_display
            .choose_config()
            .map_err(|e| BindError::NoDisplayConfig(format!("{:#}", e)))?;

        let output = discover(&device)?;

        let saved_crtc = match SavedCrtc::save(&device, output.crtc, output.connector) {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!("Cannot save CRTC state: {:#}", e);
                None
            }
        };

        let gbm_surface = GbmSurface::new(&gbm, output.width, output.height)
            .map_err(|e| BindError::SurfaceCreateFailed(format!("{:#}", e)))?;

        let egl_surface = EglSurface::new(Rc::clone(&egl_display), config, &gbm_surface)
            .map_err(|e| BindError::SurfaceCreateFailed(format!("{:#}", e)))?;

        let context = EglContext::new(Rc::clone(&egl_display), config)
            .map_err(|e| BindError::ContextCreateFailed(format!("{:#}", e)))?;

        context
            .make_current(&egl_surface)
            .map_err(|e| BindError::MakeCurrentFailed(format!("{:#}", e)))?;

        info!(
            "Bound {} ({}x{})",
            device_path, output.width, output.height
        );

        Ok(Self {
            context,
            egl_surface,
            gbm_surface,
            egl_display,
            gbm,
            output,
            saved_crtc,
            device,
        })
    }

    pub fn context(&self) -> &EglContext {
        &self.context
    }

    pub fn surface_size(&self) -> Dimension {
        Dimension::new(self.gbm_surface.width() as i32, self.gbm_surface.height() as i32)
    }
}

impl Drop for GbmBinding {
    fn drop(&mut self) {
        if let Some(saved) = &self.saved_crtc {
            saved.restore(&self.device);
        }
    }
}

impl ScanoutTarget for GbmBinding {
    type Buffer = ScanoutBuffer;

    fn swap_buffers(&mut self) -> Result<()> {
        self.egl_surface.swap_buffers()
    }

    fn lock_front_buffer(&mut self) -> Result<Option<ScanoutBuffer>> {
        Ok(self.gbm_surface.lock_front_buffer())
    }

    fn cached_framebuffer(&self, buffer: &ScanoutBuffer) -> Option<FramebufferId> {
        match buffer.userdata() {
            Ok(Some(fb)) => Some(fb.id()),
            _ => None,
        }
    }

    fn register_framebuffer(&mut self, buffer: &mut ScanoutBuffer) -> Result<FramebufferId> {
        let fb = DrmFramebuffer::from_bo(&self.device, buffer)?;
        let id = fb.id();
        buffer
            .set_userdata(fb)
            .map_err(|e| anyhow::anyhow!("Failed to attach framebuffer {}: {:?}", id.0, e))?;
        Ok(id)
    }

    fn set_crtc(&mut self, fb: FramebufferId) -> Result<()> {
        kms::set_crtc(
            &self.device,
            self.output.crtc,
            self.output.connector,
            self.output.mode,
            fb,
        )
    }

    fn page_flip(&mut self, fb: FramebufferId) -> Result<()> {
        kms::page_flip(&self.device, self.output.crtc, fb)
    }

    fn wait_for_flip(&mut self) -> Result<()> {
        kms::wait_for_flip(&self.device, self.output.crtc)
    }

    fn release_buffer(&mut self, buffer: ScanoutBuffer) {
        // dropping the buffer object hands it back to the surface
        drop(buffer);
    }
}

impl Binding for GbmBinding {
    fn physical_size(&self) -> Dimension {
        Dimension::new(self.output.width as i32, self.output.height as i32)
    }

    fn panel_orientation(&self) -> Result<Option<PanelOrientation>> {
        kms::panel_orientation(&self.device, self.output.connector)
    }
}
