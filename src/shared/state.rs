//! Shared display state
//!
//! The block every process of a session agrees on: which device node to
//! open, the current logical mode, and the surface pool. Written by the
//! master before publishing; afterwards the mode is only changed through
//! the screen's output configuration, which the framework serializes.
//!
//! The block records the master's pid. A block whose master no longer
//! exists is stale: joins treat it as absent and the next master reclaims
//! the name.

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};

use super::arena::{Arena, SharedBlock, SharedRegion};
use crate::constants::{DEVICE_NAME_MAX, SHARED_FIELD};
use crate::error::{Error, Result};
use crate::framework::{Dimension, PoolId};
use crate::modes::{self, Resolution};

const DEVICE_NAME_CAPACITY: usize = DEVICE_NAME_MAX + 1;

#[repr(C)]
pub struct DisplayStateBlock {
    magic: AtomicU32,
    owner: AtomicU32,
    attached: AtomicU32,
    pool: AtomicU32,
    mode_w: AtomicI32,
    mode_h: AtomicI32,
    device_len: AtomicU32,
    device_name: [AtomicU8; DEVICE_NAME_CAPACITY],
}

unsafe impl SharedBlock for DisplayStateBlock {
    const MAGIC: u32 = 0x4547_4c53; // "EGLS"

    fn magic(&self) -> &AtomicU32 {
        &self.magic
    }
}

/// Current logical mode of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalMode {
    pub size: Dimension,
}

impl LogicalMode {
    /// Resolution value matching the mode, `UNKNOWN` for custom sizes
    pub fn resolution(&self) -> Resolution {
        modes::resolution_for(self.size)
    }
}

/// Handle to the shared display state of this session
pub struct SharedDisplay {
    region: SharedRegion<DisplayStateBlock>,
}

impl SharedDisplay {
    /// Allocate a fresh, unpublished block (master only)
    pub fn create(arena: &Arena, device: &str) -> Result<Self> {
        let region = arena.allocate::<DisplayStateBlock>(SHARED_FIELD)?;

        let bytes = &device.as_bytes()[..device.len().min(DEVICE_NAME_MAX)];
        for (slot, &byte) in region.device_name.iter().zip(bytes) {
            slot.store(byte, Ordering::Relaxed);
        }
        region.device_len.store(bytes.len() as u32, Ordering::Relaxed);
        region.attached.store(1, Ordering::Relaxed);
        region.owner.store(std::process::id(), Ordering::Relaxed);

        Ok(Self { region })
    }

    /// Unpublish a block left behind by a master that no longer runs.
    ///
    /// Returns the stale block's pool so the caller can destroy it. A live
    /// or missing block is left alone.
    pub fn reclaim_stale(arena: &Arena) -> Result<Option<PoolId>> {
        let region = match arena.lookup::<DisplayStateBlock>(SHARED_FIELD) {
            Ok(region) => region,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let stale = Self { region };
        if stale.owner_alive() {
            return Ok(None);
        }

        warn!(
            "Reclaiming shared display state of exited master (pid {})",
            stale.owner()
        );
        match arena.remove(SHARED_FIELD) {
            // another master got here first
            Ok(()) | Err(Error::NotFound(_)) => Ok(Some(stale.pool())),
            Err(e) => Err(e),
        }
    }

    /// Make the block visible to joiners
    pub fn publish(&mut self, arena: &Arena) -> Result<()> {
        arena.publish(&mut self.region)
    }

    /// Attach to the block published by the master
    pub fn join(arena: &Arena) -> Result<Self> {
        let region = arena.lookup::<DisplayStateBlock>(SHARED_FIELD)?;
        let shared = Self { region };
        if !shared.owner_alive() {
            debug!("Master (pid {}) of shared display state is gone", shared.owner());
            return Err(Error::NotFound(SHARED_FIELD.to_string()));
        }

        let attached = shared.region.attached.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Joined shared display state ({} attached)", attached);
        Ok(shared)
    }

    /// Detach a joiner; the block stays published
    pub fn detach(self) {
        let attached = self
            .region
            .attached
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        debug!("Left shared display state ({} attached)", attached);
    }

    /// Delete the block (master only)
    pub fn free(self) -> Result<()> {
        self.region.free()
    }

    pub fn is_published(&self) -> bool {
        self.region.is_published()
    }

    /// Pid of the master that created the block
    pub fn owner(&self) -> u32 {
        self.region.owner.load(Ordering::Relaxed)
    }

    fn owner_alive(&self) -> bool {
        let pid = match i32::try_from(self.owner()) {
            Ok(pid) if pid > 0 => pid,
            _ => return false,
        };
        // EPERM still means the process exists
        !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
    }

    /// Number of processes attached to the block
    pub fn attached(&self) -> u32 {
        self.region.attached.load(Ordering::Relaxed)
    }

    pub fn device_name(&self) -> String {
        let len = (self.region.device_len.load(Ordering::Relaxed) as usize).min(DEVICE_NAME_MAX);
        let bytes: Vec<u8> = self.region.device_name[..len]
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn mode(&self) -> LogicalMode {
        LogicalMode {
            size: Dimension::new(
                self.region.mode_w.load(Ordering::Relaxed),
                self.region.mode_h.load(Ordering::Relaxed),
            ),
        }
    }

    pub fn set_mode(&self, size: Dimension) {
        self.region.mode_w.store(size.w, Ordering::Relaxed);
        self.region.mode_h.store(size.h, Ordering::Relaxed);
        debug!("Logical mode set to {}x{}", size.w, size.h);
    }

    pub fn pool(&self) -> PoolId {
        PoolId(self.region.pool.load(Ordering::Relaxed))
    }

    pub fn set_pool(&self, pool: PoolId) {
        self.region.pool.store(pool.0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::arena::tests::test_arena;

    // above any pid_max the kernel accepts
    const EXITED_PID: u32 = i32::MAX as u32;

    #[test]
    fn test_master_and_joiner_share_mode() {
        let arena = test_arena("state-share");
        let mut master = SharedDisplay::create(&arena, "/dev/dri/card1").unwrap();
        master.set_mode(Dimension::new(1280, 720));
        master.set_pool(PoolId(3));
        master.publish(&arena).unwrap();

        let joiner = SharedDisplay::join(&arena).unwrap();
        assert_eq!(joiner.device_name(), "/dev/dri/card1");
        assert_eq!(joiner.mode().size, Dimension::new(1280, 720));
        assert_eq!(joiner.pool(), PoolId(3));
        assert_eq!(master.attached(), 2);

        joiner.set_mode(Dimension::new(1920, 1080));
        assert_eq!(master.mode().size, Dimension::new(1920, 1080));
        assert_eq!(master.mode().resolution().bits(), 1 << 12);

        joiner.detach();
        assert_eq!(master.attached(), 1);
        master.free().unwrap();
        assert!(matches!(SharedDisplay::join(&arena), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unpublished_state_is_not_joinable() {
        let arena = test_arena("state-unpublished");
        let master = SharedDisplay::create(&arena, "/dev/dri/card0").unwrap();
        assert!(!master.is_published());
        assert!(matches!(SharedDisplay::join(&arena), Err(Error::NotFound(_))));
        drop(master);
        assert!(!arena.contains(SHARED_FIELD));
    }

    #[test]
    fn test_master_pid_is_recorded() {
        let arena = test_arena("state-owner");
        let master = SharedDisplay::create(&arena, "/dev/dri/card0").unwrap();
        assert_eq!(master.owner(), std::process::id());
        assert!(master.owner_alive());
    }

    #[test]
    fn test_exited_master_is_not_joinable() {
        let arena = test_arena("state-exited");
        let mut master = SharedDisplay::create(&arena, "/dev/dri/card0").unwrap();
        master.publish(&arena).unwrap();
        master.region.owner.store(EXITED_PID, Ordering::Relaxed);

        assert!(matches!(SharedDisplay::join(&arena), Err(Error::NotFound(_))));
        assert_eq!(master.attached(), 1);
    }

    #[test]
    fn test_reclaim_stale_state() {
        let arena = test_arena("state-reclaim");
        let mut master = SharedDisplay::create(&arena, "/dev/dri/card0").unwrap();
        master.set_pool(PoolId(4));
        master.publish(&arena).unwrap();

        // live master keeps its block
        assert_eq!(SharedDisplay::reclaim_stale(&arena).unwrap(), None);
        assert!(arena.contains(SHARED_FIELD));

        master.region.owner.store(EXITED_PID, Ordering::Relaxed);
        assert_eq!(SharedDisplay::reclaim_stale(&arena).unwrap(), Some(PoolId(4)));
        assert!(!arena.contains(SHARED_FIELD));

        let mut next = SharedDisplay::create(&arena, "/dev/dri/card1").unwrap();
        next.publish(&arena).unwrap();
        assert_eq!(SharedDisplay::join(&arena).unwrap().device_name(), "/dev/dri/card1");
    }

    #[test]
    fn test_reclaim_without_state() {
        let arena = test_arena("state-reclaim-none");
        assert_eq!(SharedDisplay::reclaim_stale(&arena).unwrap(), None);
    }
}
