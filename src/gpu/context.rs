//! GPU context management
//!
//! GBM + EGL + OpenGL ES setup, one RAII type per acquired object

use anyhow::{anyhow, Context, Result};
use gbm::AsRaw;
use glow::HasContext;
use khronos_egl as egl;
use log::{debug, info};
use std::ffi::c_void;
use std::rc::Rc;

use crate::drm::DrmFramebuffer;

// EGL_PLATFORM_GBM_KHR (EGL extension)
const EGL_PLATFORM_GBM_KHR: egl::Enum = 0x31D7;

/// GBM device
pub struct GbmDevice {
    device: gbm::Device<std::fs::File>,
}

impl GbmDevice {
    /// Create GBM device from DRM file descriptor
    pub fn new(drm_file: std::fs::File) -> Result<Self> {
        let device = gbm::Device::new(drm_file)
            .map_err(|e| anyhow!("Failed to create GBM device: {:?}", e))?;
        info!("GBM device created");
        Ok(Self { device })
    }

    /// Reference to internal device
    pub fn device(&self) -> &gbm::Device<std::fs::File> {
        &self.device
    }
}

/// Buffer object the scanout surface hands out, carrying its framebuffer
pub type ScanoutBuffer = gbm::BufferObject<DrmFramebuffer>;

/// GBM surface
pub struct GbmSurface {
    surface: gbm::Surface<DrmFramebuffer>,
    width: u32,
    height: u32,
}

impl GbmSurface {
    /// Create a scanout-capable ARGB8888 surface
    pub fn new(device: &GbmDevice, width: u32, height: u32) -> Result<Self> {
        let surface = device
            .device()
            .create_surface::<DrmFramebuffer>(
                width,
                height,
                gbm::Format::Argb8888,
                gbm::BufferObjectFlags::SCANOUT | gbm::BufferObjectFlags::RENDERING,
            )
            .map_err(|e| anyhow!("Failed to create GBM surface: {:?}", e))?;

        info!("GBM surface created: {}x{}", width, height);
        Ok(Self {
            surface,
            width,
            height,
        })
    }

    /// Lock the buffer completed by the last swap; `None` if there is none
    pub fn lock_front_buffer(&self) -> Option<ScanoutBuffer> {
        // Safety: only called after a successful eglSwapBuffers on the
        // EGL surface wrapping this GBM surface
        match unsafe { self.surface.lock_front_buffer() } {
            Ok(bo) => Some(bo),
            Err(e) => {
                debug!("No front buffer: {:?}", e);
                None
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn as_native(&self) -> *mut c_void {
        self.surface.as_raw() as *mut c_void
    }
}

/// EGL instance type (dynamic loading)
type EglInstance = egl::Instance<egl::Dynamic<libloading::Library, egl::EGL1_5>>;

/// Initialized EGL display on the GBM platform
pub struct EglDisplay {
    instance: EglInstance,
    display: egl::Display,
}

impl EglDisplay {
    /// Load libEGL, get the GBM platform display and initialize it
    pub fn new(gbm_device: &GbmDevice) -> Result<Self> {
        // Load EGL library
        let lib = unsafe {
            libloading::Library::new("libEGL.so.1")
                .or_else(|_| libloading::Library::new("libEGL.so"))
                .context("Failed to load EGL library")?
        };

        let instance: EglInstance = unsafe {
            egl::DynamicInstance::<egl::EGL1_5>::load_required_from(lib)
                .context("Failed to create EGL instance")?
        };

        // Get display with GBM platform
        let display = unsafe {
            instance
                .get_platform_display(
                    EGL_PLATFORM_GBM_KHR,
                    gbm_device.device().as_raw() as *mut c_void,
                    &[egl::ATTRIB_NONE],
                )
                .context("Failed to get EGL display")?
        };

        instance
            .initialize(display)
            .context("Failed to initialize EGL")?;

        // terminated on drop from here on
        let egl_display = Self { instance, display };

        if let Ok(version_str) = egl_display.instance.query_string(Some(display), egl::VERSION) {
            info!("EGL version: {}", version_str.to_string_lossy());
        }

        egl_display
            .instance
            .bind_api(egl::OPENGL_ES_API)
            .context("Failed to bind OpenGL ES API")?;

        Ok(egl_display)
    }

    /// First window config with 8 bits per RGBA channel renderable by ES 2
    pub fn choose_config(&self) -> Result<egl::Config> {
        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            8,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES2_BIT,
            egl::NONE,
        ];

        self.instance
            .choose_first_config(self.display, &config_attribs)
            .context("choose_first_config failed")?
            .ok_or_else(|| anyhow!("No suitable EGL config found"))
    }
}

impl Drop for EglDisplay {
    fn drop(&mut self) {
        let _ = self.instance.terminate(self.display);
    }
}

/// EGL window surface wrapping a GBM surface
pub struct EglSurface {
    display: Rc<EglDisplay>,
    surface: egl::Surface,
}

impl EglSurface {
    pub fn new(display: Rc<EglDisplay>, config: egl::Config, gbm_surface: &GbmSurface) -> Result<Self> {
        // Try create_platform_window_surface, fallback to create_window_surface
        let surface = unsafe {
            display
                .instance
                .create_platform_window_surface(
                    display.display,
                    config,
                    gbm_surface.as_native(),
                    &[egl::ATTRIB_NONE],
                )
                .or_else(|_| {
                    display.instance.create_window_surface(
                        display.display,
                        config,
                        gbm_surface.as_native() as egl::NativeWindowType,
                        None,
                    )
                })
                .context("Failed to create EGL surface")?
        };
        Ok(Self { display, surface })
    }

    /// Swap buffers
    pub fn swap_buffers(&self) -> Result<()> {
        self.display
            .instance
            .swap_buffers(self.display.display, self.surface)
            .context("Failed to swap buffers")?;
        Ok(())
    }
}

impl Drop for EglSurface {
    fn drop(&mut self) {
        let _ = self
            .display
            .instance
            .destroy_surface(self.display.display, self.surface);
    }
}

/// OpenGL ES 2 context
pub struct EglContext {
    display: Rc<EglDisplay>,
    context: egl::Context,
}

impl EglContext {
    pub fn new(display: Rc<EglDisplay>, config: egl::Config) -> Result<Self> {
        let context_attribs = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];
        let context = display
            .instance
            .create_context(display.display, config, None, &context_attribs)
            .context("Failed to create EGL context")?;
        info!("EGL context created");
        Ok(Self { display, context })
    }

    /// Bind the context to `surface` on the calling thread
    pub fn make_current(&self, surface: &EglSurface) -> Result<()> {
        self.display
            .instance
            .make_current(
                self.display.display,
                Some(surface.surface),
                Some(surface.surface),
                Some(self.context),
            )
            .context("Failed to make EGL context current")?;
        Ok(())
    }

    /// Load GL function pointers
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        self.display
            .instance
            .get_proc_address(name)
            .map(|f| f as *const c_void)
            .unwrap_or(std::ptr::null())
    }
}

impl Drop for EglContext {
    fn drop(&mut self) {
        let instance = &self.display.instance;
        let _ = instance.make_current(self.display.display, None, None, None);
        let _ = instance.destroy_context(self.display.display, self.context);
    }
}

/// OpenGL ES renderer
pub struct GlRenderer {
    gl: glow::Context,
}

impl GlRenderer {
    /// Initialize OpenGL ES from a current EGL context
    pub fn new(egl: &EglContext) -> Self {
        let gl = unsafe { glow::Context::from_loader_function(|name| egl.get_proc_address(name)) };

        unsafe {
            info!("OpenGL ES: {}", gl.get_parameter_string(glow::VERSION));
            info!("Renderer: {}", gl.get_parameter_string(glow::RENDERER));
            info!("Vendor: {}", gl.get_parameter_string(glow::VENDOR));
        }

        Self { gl }
    }

    /// Clear screen (fill with solid color)
    pub fn clear(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// Set viewport
    pub fn set_viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe {
            self.gl.viewport(x, y, width, height);
        }
    }
}
