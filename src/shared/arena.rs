//! Shared arena
//!
//! Named memory regions shared between cooperating processes. Each region
//! is a file in the arena directory mapped with `memmap2`. A region is
//! allocated under a private name and only becomes visible to `lookup`
//! once published, so an aborted initialization never leaves a half
//! written block behind.

use log::debug;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{Error, Result};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fixed-layout block stored in a shared region.
///
/// # Safety
/// Implementors must be `#[repr(C)]`, valid when all bytes are zero, and
/// contain only atomics (or arrays of atomics) so concurrent access from
/// several mappings is sound.
pub unsafe trait SharedBlock: Sync {
    /// Tag written at offset 0 to recognize the block type
    const MAGIC: u32;

    fn magic(&self) -> &AtomicU32;
}

/// Directory of named shared regions
#[derive(Debug, Clone)]
pub struct Arena {
    dir: PathBuf,
}

impl Arena {
    /// Open (creating if needed) the arena directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::shared(format!("create {}", dir.display()), e))?;
        debug!("Arena at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a region is published under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Allocate a zeroed, unpublished region for a block of type `T`
    pub fn allocate<T: SharedBlock>(&self, name: &str) -> Result<SharedRegion<T>> {
        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&tmp)
            .map_err(|e| Error::shared(format!("allocate '{}'", name), e))?;

        let region = SharedRegion::<T>::map(file, name, tmp, false)?;
        region.block().magic().store(T::MAGIC, Ordering::Relaxed);
        Ok(region)
    }

    /// Make an allocated region visible under its name.
    ///
    /// Fails with `AlreadyExists` if another region holds the name.
    pub fn publish<T: SharedBlock>(&self, region: &mut SharedRegion<T>) -> Result<()> {
        if region.published {
            return Ok(());
        }

        let target = self.path(&region.name);
        // hard_link refuses to replace an existing name, unlike rename
        std::fs::hard_link(&region.path, &target)
            .map_err(|e| Error::shared(format!("publish '{}'", region.name), e))?;
        if let Err(e) = std::fs::remove_file(&region.path) {
            debug!("Stale arena file {}: {}", region.path.display(), e);
        }

        region.path = target;
        region.published = true;
        debug!("Published shared field '{}'", region.name);
        Ok(())
    }

    /// Map the region published under `name`
    pub fn lookup<T: SharedBlock>(&self, name: &str) -> Result<SharedRegion<T>> {
        let path = self.path(name);
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(name.to_string()))
            }
            Err(e) => return Err(Error::shared(format!("lookup '{}'", name), e)),
        };

        let region = SharedRegion::<T>::map(file, name, path, true)?;
        if region.block().magic().load(Ordering::Relaxed) != T::MAGIC {
            return Err(Error::shared(
                format!("lookup '{}'", name),
                std::io::Error::new(ErrorKind::InvalidData, "block type mismatch"),
            ));
        }
        Ok(region)
    }

    /// Unpublish `name` without touching existing mappings of it
    pub fn remove(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(Error::shared(format!("remove '{}'", name), e)),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// A mapped shared block.
///
/// Dropping an unpublished region deletes its backing file; dropping a
/// published one only unmaps it. Use [`SharedRegion::free`] to delete a
/// published region.
pub struct SharedRegion<T: SharedBlock> {
    map: MmapMut,
    name: String,
    path: PathBuf,
    published: bool,
    _block: PhantomData<T>,
}

impl<T: SharedBlock> SharedRegion<T> {
    fn map(file: File, name: &str, path: PathBuf, published: bool) -> Result<Self> {
        let size = std::mem::size_of::<T>() as u64;
        let len = file
            .metadata()
            .map_err(|e| Error::shared(format!("stat '{}'", name), e))?
            .len();
        if len == 0 && !published {
            file.set_len(size)
                .map_err(|e| Error::shared(format!("size '{}'", name), e))?;
        } else if len < size {
            return Err(Error::shared(
                format!("map '{}'", name),
                std::io::Error::new(ErrorKind::InvalidData, "region too small"),
            ));
        }

        // Safety: the file is owned by the arena and only accessed through
        // atomics in T
        let map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| Error::shared(format!("map '{}'", name), e))?;

        Ok(Self {
            map,
            name: name.to_string(),
            path,
            published,
            _block: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Unmap and delete the region
    pub fn free(mut self) -> Result<()> {
        let result = std::fs::remove_file(&self.path)
            .map_err(|e| Error::shared(format!("free '{}'", self.name), e));
        // already gone, nothing left for Drop to clean up
        self.published = true;
        debug!("Freed shared field '{}'", self.name);
        result
    }

    fn block(&self) -> &T {
        // Safety: the mapping is page aligned, at least size_of::<T>() long,
        // and T is valid for any bit pattern written through its atomics
        unsafe { &*(self.map.as_ptr() as *const T) }
    }
}

impl<T: SharedBlock> Deref for SharedRegion<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.block()
    }
}

impl<T: SharedBlock> Drop for SharedRegion<T> {
    fn drop(&mut self) {
        if !self.published {
            let _ = std::fs::remove_file(&self.path);
            debug!("Discarded unpublished shared field '{}'", self.name);
        }
    }
}
