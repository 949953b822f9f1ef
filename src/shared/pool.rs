//! Surface pools backed by the shared arena
//!
//! Only the pool lifecycle lives here: each pool is a small shared block
//! counting its attached processes. Ids come from a shared counter so
//! every process names a pool the same way.

use log::{debug, info};
use std::sync::atomic::{AtomicU32, Ordering};

use super::arena::{Arena, SharedBlock, SharedRegion};
use crate::constants::POOL_COUNTER_FIELD;
use crate::error::{Error, Result};
use crate::framework::{PoolId, SurfacePoolFuncs};

#[repr(C)]
struct PoolCounterBlock {
    magic: AtomicU32,
    next: AtomicU32,
}

unsafe impl SharedBlock for PoolCounterBlock {
    const MAGIC: u32 = 0x504f_4f43; // "POOC"

    fn magic(&self) -> &AtomicU32 {
        &self.magic
    }
}

#[repr(C)]
struct PoolBlock {
    magic: AtomicU32,
    id: AtomicU32,
    users: AtomicU32,
}

unsafe impl SharedBlock for PoolBlock {
    const MAGIC: u32 = 0x504f_4f4c; // "POOL"

    fn magic(&self) -> &AtomicU32 {
        &self.magic
    }
}

/// Surface pool lifecycle over an [`Arena`]
pub struct ArenaSurfacePools<'a> {
    arena: &'a Arena,
}

impl<'a> ArenaSurfacePools<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self { arena }
    }

    /// Number of processes using `pool`
    pub fn users(&self, pool: PoolId) -> Result<u32> {
        Ok(self.lookup(pool)?.users.load(Ordering::Relaxed))
    }

    fn next_id(&self) -> Result<u32> {
        let counter = match self.arena.lookup::<PoolCounterBlock>(POOL_COUNTER_FIELD) {
            Ok(counter) => counter,
            Err(Error::NotFound(_)) => {
                let mut counter = self.arena.allocate::<PoolCounterBlock>(POOL_COUNTER_FIELD)?;
                match self.arena.publish(&mut counter) {
                    Ok(()) => counter,
                    // another process published it first
                    Err(_) => self.arena.lookup::<PoolCounterBlock>(POOL_COUNTER_FIELD)?,
                }
            }
            Err(e) => return Err(e),
        };
        Ok(counter.next.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn lookup(&self, pool: PoolId) -> Result<SharedRegion<PoolBlock>> {
        self.arena
            .lookup::<PoolBlock>(&pool_field(pool))
            .map_err(|e| match e {
                Error::NotFound(_) => Error::SurfacePool(format!("pool {} does not exist", pool.0)),
                other => other,
            })
    }
}

fn pool_field(pool: PoolId) -> String {
    format!("pool-{}", pool.0)
}

impl SurfacePoolFuncs for ArenaSurfacePools<'_> {
    fn initialize(&self) -> Result<PoolId> {
        let pool = PoolId(self.next_id()?);
        let mut region = self.arena.allocate::<PoolBlock>(&pool_field(pool))?;
        region.id.store(pool.0, Ordering::Relaxed);
        region.users.store(1, Ordering::Relaxed);
        self.arena.publish(&mut region)?;
        info!("Surface pool {} created", pool.0);
        Ok(pool)
    }

    fn join(&self, pool: PoolId) -> Result<()> {
        let region = self.lookup(pool)?;
        let users = region.users.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Joined surface pool {} ({} users)", pool.0, users);
        Ok(())
    }

    fn destroy(&self, pool: PoolId) -> Result<()> {
        let region = self.lookup(pool)?;
        region.free()?;
        info!("Surface pool {} destroyed", pool.0);
        Ok(())
    }

    fn leave(&self, pool: PoolId) -> Result<()> {
        let region = self.lookup(pool)?;
        let users = region
            .users
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        debug!("Left surface pool {} ({} users)", pool.0, users);
        Ok(())
    }
}
