//! Primary layer adapter

use log::debug;

use crate::constants::PRIMARY_LAYER_NAME;
use crate::error::{Error, Result};
use crate::framework::{
    BufferMode, Dimension, LayerCaps, LayerConfig, LayerConfigFlags, LayerDescription,
    LayerFuncs, LayerTypes, PixelFormat, Region, RegionConfig, RegionConfigFlags,
};
use crate::scanout::PresentOutcome;
use crate::system::{Binding, System};

pub struct EglPrimaryLayer<'a, B: Binding> {
    system: &'a mut System<B>,
}

impl<'a, B: Binding> EglPrimaryLayer<'a, B> {
    pub fn new(system: &'a mut System<B>) -> Self {
        Self { system }
    }
}

impl<B: Binding> LayerFuncs for EglPrimaryLayer<'_, B> {
    fn init_layer(&mut self) -> Result<(LayerDescription, LayerConfig)> {
        let mode = self.system.shared.mode().size;
        let overrides = &self.system.config().mode;

        let config = LayerConfig {
            flags: LayerConfigFlags::WIDTH
                | LayerConfigFlags::HEIGHT
                | LayerConfigFlags::PIXELFORMAT
                | LayerConfigFlags::BUFFERMODE,
            width: overrides.width.map_or(mode.w, |w| w as i32),
            height: overrides.height.map_or(mode.h, |h| h as i32),
            pixelformat: overrides.format.unwrap_or(PixelFormat::Argb),
            buffermode: BufferMode::FrontOnly,
        };

        Ok((
            LayerDescription {
                caps: LayerCaps::SURFACE,
                types: LayerTypes::GRAPHICS,
                name: PRIMARY_LAYER_NAME.to_string(),
            },
            config,
        ))
    }

    fn test_region(&self, config: &RegionConfig) -> Result<()> {
        debug!(
            "test_region({}x{}, {})",
            config.source.x2 - config.source.x1 + 1,
            config.source.y2 - config.source.y1 + 1,
            config.format.name()
        );

        let mut failed = RegionConfigFlags::empty();

        match config.buffermode {
            BufferMode::FrontOnly
            | BufferMode::BackVideo
            | BufferMode::BackSystem
            | BufferMode::Triple => {}
            _ => failed |= RegionConfigFlags::BUFFERMODE,
        }

        match config.format {
            PixelFormat::Argb | PixelFormat::Rgb16 => {}
            _ => failed |= RegionConfigFlags::FORMAT,
        }

        if !config.options.is_empty() {
            failed |= RegionConfigFlags::OPTIONS;
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Unsupported(failed))
        }
    }

    fn set_region(&mut self, _config: &RegionConfig, updated: RegionConfigFlags) -> Result<()> {
        debug!("set_region({:?})", updated);
        Ok(())
    }

    fn update_region(&mut self, surface_size: Dimension, left_update: Option<&Region>) -> Result<()> {
        let mut region = Region::from_dimension(surface_size);
        if let Some(update) = left_update {
            if !region.intersect(update) {
                debug!("Update {:?} outside the surface", update);
                return Ok(());
            }
        }

        let system = &mut *self.system;
        match system.scanout.present(&mut system.binding)? {
            PresentOutcome::Presented(fb) => debug!("Presented framebuffer {}", fb.0),
            PresentOutcome::NoBuffer | PresentOutcome::Dropped => {}
        }
        Ok(())
    }
}
