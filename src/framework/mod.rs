//! Display framework contract
//!
//! The framework's generic core drives a system module through callback
//! tables. They are modelled here as traits, together with the value types
//! passed across them.

pub mod types;

pub use types::{
    BufferMode, Dimension, LayerCaps, LayerConfig, LayerConfigFlags, LayerDescription,
    LayerOptions, LayerTypes, OutputCaps, OutputConfig, OutputConfigFlags, OutputDescription,
    PixelFormat, PoolId, Region, RegionConfig, RegionConfigFlags, ScreenCaps, ScreenDescription,
    SystemCaps, SystemInfo,
};

use crate::config::Config;
use crate::error::Result;
use crate::rotation::Rotation;
use crate::shared::Arena;

/// Screen callback table
pub trait ScreenFuncs {
    /// Describe the screen and derive its mode and rotation
    fn init_screen(&mut self) -> Result<ScreenDescription>;

    /// Describe one output and report its current configuration
    fn init_output(&self, output: usize) -> Result<(OutputDescription, OutputConfig)>;

    fn set_output_config(&mut self, output: usize, config: &OutputConfig) -> Result<()>;

    fn screen_size(&self) -> Result<Dimension>;

    fn screen_rotation(&self) -> Result<Rotation>;
}

/// Display layer callback table
pub trait LayerFuncs {
    /// Describe the layer and report its default configuration
    fn init_layer(&mut self) -> Result<(LayerDescription, LayerConfig)>;

    /// Check a region configuration without applying it.
    ///
    /// Rejections carry the mask of offending fields in
    /// [`Error::Unsupported`](crate::Error::Unsupported).
    fn test_region(&self, config: &RegionConfig) -> Result<()>;

    fn set_region(&mut self, config: &RegionConfig, updated: RegionConfigFlags) -> Result<()>;

    /// Present the surface contents.
    ///
    /// `left_update` limits the update to a sub-region; `None` means the
    /// whole surface.
    fn update_region(&mut self, surface_size: Dimension, left_update: Option<&Region>)
        -> Result<()>;
}

/// Surface pool lifecycle as seen by a system module
pub trait SurfacePoolFuncs {
    fn initialize(&self) -> Result<PoolId>;
    fn join(&self, pool: PoolId) -> Result<()>;
    fn destroy(&self, pool: PoolId) -> Result<()>;
    fn leave(&self, pool: PoolId) -> Result<()>;
}

/// Framework services handed to every system entry point
pub struct Core<'a, P: SurfacePoolFuncs> {
    pub arena: &'a Arena,
    pub pools: &'a P,
    pub config: &'a Config,
}

impl<'a, P: SurfacePoolFuncs> Core<'a, P> {
    pub fn new(arena: &'a Arena, pools: &'a P, config: &'a Config) -> Self {
        Self {
            arena,
            pools,
            config,
        }
    }
}
