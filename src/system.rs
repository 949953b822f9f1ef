//! System lifecycle
//!
//! The master process creates the shared display state, binds its own
//! device/allocator/context and publishes the state; joiners look it up and
//! bind against the same device node.

use log::{info, warn};

use crate::config::{Config, DeviceSource};
use crate::constants::{SYSTEM_NAME, SYSTEM_VENDOR, SYSTEM_VERSION};
use crate::error::{BindError, Result};
use crate::framework::{Core, Dimension, PoolId, SurfacePoolFuncs, SystemCaps, SystemInfo};
use crate::layer::EglPrimaryLayer;
use crate::rotation::{PanelOrientation, RotationState};
use crate::scanout::{ScanoutManager, ScanoutTarget};
use crate::screen::EglScreen;
use crate::shared::SharedDisplay;

/// Process-local device, allocator and rendering context
pub trait Binding: ScanoutTarget {
    /// Native size of the discovered output
    fn physical_size(&self) -> Dimension;

    /// Mounting orientation reported by the output's connector
    fn panel_orientation(&self) -> anyhow::Result<Option<PanelOrientation>>;
}

/// Acquires a [`Binding`] for a device node
pub trait Binder {
    type Binding: Binding;

    fn bind(&self, device_path: &str) -> std::result::Result<Self::Binding, BindError>;
}

/// Which side of the shared state this process is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Joiner,
}

/// Capabilities and identity of the system module
pub fn info() -> SystemInfo {
    SystemInfo {
        version: SYSTEM_VERSION,
        caps: SystemCaps::ACCELERATION | SystemCaps::ALWAYS_INDIRECT,
        name: SYSTEM_NAME.to_string(),
        vendor: SYSTEM_VENDOR.to_string(),
    }
}

/// A process attached to the display
pub struct System<B: Binding> {
    role: Role,
    pool: PoolId,
    config: Config,
    pub(crate) screen_data: RotationState,
    pub(crate) scanout: ScanoutManager,
    // dropped before the shared state
    pub(crate) binding: B,
    pub(crate) shared: SharedDisplay,
}

impl<B: Binding> System<B> {
    /// Bring the display up as the master process
    pub fn initialize<P, D>(core: &Core<'_, P>, binder: &D) -> Result<Self>
    where
        P: SurfacePoolFuncs,
        D: Binder<Binding = B>,
    {
        let (device, source) = core.config.resolve_device();
        match source {
            DeviceSource::Config => info!("Using device {} (from config)", device),
            DeviceSource::Environment => info!("Using device {} (from environment)", device),
            DeviceSource::Default => info!("Using device {} (default)", device),
        }

        if let Some(stale_pool) = SharedDisplay::reclaim_stale(core.arena)? {
            if let Err(e) = core.pools.destroy(stale_pool) {
                warn!("Failed to destroy stale surface pool {}: {}", stale_pool.0, e);
            }
        }

        let mut shared = SharedDisplay::create(core.arena, &device)?;

        let binding = binder.bind(&device)?;

        let pool = core.pools.initialize()?;
        shared.set_pool(pool);

        if let Err(e) = shared.publish(core.arena) {
            if let Err(pool_err) = core.pools.destroy(pool) {
                warn!("Failed to destroy surface pool: {}", pool_err);
            }
            return Err(e);
        }

        info!("Display system initialized on {}", device);

        Ok(Self {
            role: Role::Master,
            pool,
            config: core.config.clone(),
            screen_data: RotationState::default(),
            scanout: ScanoutManager::new(),
            binding,
            shared,
        })
    }

    /// Attach to the display brought up by the master
    pub fn join<P, D>(core: &Core<'_, P>, binder: &D) -> Result<Self>
    where
        P: SurfacePoolFuncs,
        D: Binder<Binding = B>,
    {
        let shared = SharedDisplay::join(core.arena)?;
        let device = shared.device_name();

        let binding = match binder.bind(&device) {
            Ok(binding) => binding,
            Err(e) => {
                shared.detach();
                return Err(e.into());
            }
        };

        let pool = shared.pool();
        if let Err(e) = core.pools.join(pool) {
            drop(binding);
            shared.detach();
            return Err(e);
        }

        info!("Joined display system on {}", device);

        Ok(Self {
            role: Role::Joiner,
            pool,
            config: core.config.clone(),
            screen_data: RotationState::default(),
            scanout: ScanoutManager::new(),
            binding,
            shared,
        })
    }

    /// Tear down as master: destroy the pool, unbind, free the shared state
    pub fn shutdown<P: SurfacePoolFuncs>(self, pools: &P) -> Result<()> {
        if self.role == Role::Joiner {
            warn!("shutdown called by a joining process, leaving instead");
            return self.leave(pools);
        }

        let Self {
            pool,
            binding,
            shared,
            ..
        } = self;

        let pool_result = pools.destroy(pool);
        drop(binding);
        shared.free()?;

        info!("Display system shut down");
        pool_result
    }

    /// Tear down as joiner: leave the pool and unbind; the shared state stays
    pub fn leave<P: SurfacePoolFuncs>(self, pools: &P) -> Result<()> {
        let Self {
            pool,
            binding,
            shared,
            ..
        } = self;

        let pool_result = pools.leave(pool);
        drop(binding);
        shared.detach();

        info!("Left display system");
        pool_result
    }

    /// Shutdown or leave, depending on the role
    pub fn close<P: SurfacePoolFuncs>(self, pools: &P) -> Result<()> {
        match self.role {
            Role::Master => self.shutdown(pools),
            Role::Joiner => self.leave(pools),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shared(&self) -> &SharedDisplay {
        &self.shared
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut B {
        &mut self.binding
    }

    pub fn scanout(&self) -> &ScanoutManager {
        &self.scanout
    }

    /// Screen adapter of this process
    pub fn screen(&mut self) -> EglScreen<'_, B> {
        EglScreen::new(self)
    }

    /// Primary layer adapter of this process
    pub fn primary_layer(&mut self) -> EglPrimaryLayer<'_, B> {
        EglPrimaryLayer::new(self)
    }
}
