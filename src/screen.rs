//! Screen adapter
//!
//! One screen with one output. The logical mode lives in the shared state;
//! the rotation is re-derived by every process at screen init.

use log::{debug, info, warn};

use crate::constants::{OUTPUT_NAME, SCREEN_NAME};
use crate::error::{Error, Result};
use crate::framework::{
    Dimension, OutputCaps, OutputConfig, OutputConfigFlags, OutputDescription, ScreenCaps,
    ScreenDescription, ScreenFuncs,
};
use crate::modes;
use crate::rotation::{self, Rotation};
use crate::system::{Binding, Role, System};

pub struct EglScreen<'a, B: Binding> {
    system: &'a mut System<B>,
}

impl<'a, B: Binding> EglScreen<'a, B> {
    pub fn new(system: &'a mut System<B>) -> Self {
        Self { system }
    }

    /// Mode size before rotation: config override, else the physical output
    fn default_mode(&self) -> Dimension {
        let physical = self.system.binding.physical_size();
        let mode = &self.system.config().mode;
        Dimension::new(
            mode.width.map_or(physical.w, |w| w as i32),
            mode.height.map_or(physical.h, |h| h as i32),
        )
    }

    fn check_output(output: usize) -> Result<()> {
        if output != 0 {
            return Err(Error::InvalidArgument("screen has a single output"));
        }
        Ok(())
    }
}

impl<B: Binding> ScreenFuncs for EglScreen<'_, B> {
    fn init_screen(&mut self) -> Result<ScreenDescription> {
        let size = self.default_mode();
        info!("Default mode is {}x{}", size.w, size.h);

        let explicit = self.system.config().layer.rotation;
        let orientation = if explicit.is_some() {
            None
        } else {
            match self.system.binding.panel_orientation() {
                Ok(orientation) => orientation,
                Err(e) => {
                    warn!("Cannot read panel orientation: {:#}", e);
                    None
                }
            }
        };
        if let Some(orientation) = orientation {
            info!(
                "Using {} panel orientation (rotation = {})",
                orientation.name(),
                orientation.rotation().degrees()
            );
        }

        let state = rotation::resolve(explicit, orientation, size);
        self.system.screen_data = state;

        if self.system.role() == Role::Master {
            self.system.shared.set_mode(state.size);
        }

        Ok(ScreenDescription {
            caps: ScreenCaps::OUTPUTS,
            outputs: 1,
            name: SCREEN_NAME.to_string(),
        })
    }

    fn init_output(&self, output: usize) -> Result<(OutputDescription, OutputConfig)> {
        Self::check_output(output)?;

        let resolution = self.system.shared.mode().resolution();
        debug!("Output {} resolution {:?}", output, resolution);

        Ok((
            OutputDescription {
                caps: OutputCaps::RESOLUTION,
                name: OUTPUT_NAME.to_string(),
            },
            OutputConfig {
                flags: OutputConfigFlags::RESOLUTION,
                resolution,
            },
        ))
    }

    fn set_output_config(&mut self, output: usize, config: &OutputConfig) -> Result<()> {
        Self::check_output(output)?;

        if config.flags != OutputConfigFlags::RESOLUTION {
            return Err(Error::InvalidArgument("only the resolution can be configured"));
        }

        let size = modes::index_to_size(config.resolution)?;
        self.system.shared.set_mode(size);
        info!("Output {} set to {}x{}", output, size.w, size.h);
        Ok(())
    }

    fn screen_size(&self) -> Result<Dimension> {
        Ok(self.system.shared.mode().size)
    }

    fn screen_rotation(&self) -> Result<Rotation> {
        Ok(self.system.screen_data.rotation)
    }
}
