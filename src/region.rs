//! POSIX shared memory region lifecycle
//!
//! A region is created once by exactly one builder process, mapped
//! read/write by every participant, and destroyed by an explicit unlink.
//! Attached processes keep operating on their mappings after an unlink
//! until they unmap.

use std::fs::File;

use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;

use crate::error::{BusError, Result};
use crate::layout::MIN_REGION_SIZE;

/// A named shared memory object mapped into this process
#[derive(Debug)]
pub struct SharedRegion {
    name: String,
    mmap: MmapMut,
    _file: File,
}

impl SharedRegion {
    /// Create a fresh region, replacing any prior object of the same name.
    ///
    /// The backing object is created exclusively, sized, mapped read/write
    /// and zeroed. On any failure after creation the object is unlinked so
    /// a half-initialized region is never left behind.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        if name.is_empty() {
            return Err(BusError::invalid_parameter(
                "name",
                "region name cannot be empty",
            ));
        }
        if size < MIN_REGION_SIZE {
            return Err(BusError::invalid_parameter(
                "size",
                format!("region size must be at least {} bytes", MIN_REGION_SIZE),
            ));
        }

        // Stale object from a previous run; absence is fine.
        let _ = shm_unlink(name);

        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_RDWR | OFlag::O_EXCL,
            Mode::from_bits_truncate(0o600),
        )
        .map_err(|e| BusError::create_failed(name, e))?;
        let file = File::from(fd);

        if let Err(e) = file.set_len(size as u64) {
            let _ = shm_unlink(name);
            return Err(BusError::resize_failed(name, e));
        }

        let mut mmap = match unsafe { MmapOptions::new().len(size).map_mut(&file) } {
            Ok(m) => m,
            Err(e) => {
                let _ = shm_unlink(name);
                return Err(BusError::map_failed(e));
            }
        };
        mmap.fill(0);

        Ok(Self {
            name: name.to_string(),
            mmap,
            _file: file,
        })
    }

    /// Map an existing region read/write. Idempotent: a process may open
    /// the same region any number of times.
    pub fn open(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(BusError::invalid_parameter(
                "name",
                "region name cannot be empty",
            ));
        }

        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|e| match e {
            Errno::ENOENT => BusError::region_not_found(name),
            other => BusError::platform(format!("shm_open({}) failed: {}", name, other)),
        })?;
        let file = File::from(fd);

        let size = file
            .metadata()
            .map_err(|e| BusError::from_io(e, "Failed to stat shared memory object"))?
            .len() as usize;
        if size == 0 {
            return Err(BusError::map_failed("shared memory object has zero size"));
        }

        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file) }
            .map_err(BusError::map_failed)?;

        Ok(Self {
            name: name.to_string(),
            mmap,
            _file: file,
        })
    }

    /// Remove the named object. Last-writer operation: existing mappings
    /// stay valid until their owners unmap.
    pub fn unlink(name: &str) -> Result<()> {
        shm_unlink(name).map_err(|e| match e {
            Errno::ENOENT => BusError::region_not_found(name),
            other => BusError::platform(format!("shm_unlink({}) failed: {}", name, other)),
        })
    }

    /// Base address of the mapping.
    ///
    /// Mutation through this pointer is governed by the ring protocol; the
    /// caller must follow the atomic/seqlock discipline of the layout.
    pub(crate) fn base(&self) -> *mut u8 {
        self.mmap.as_ptr() as *mut u8
    }

    /// The raw mapped bytes (read-only view)
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// Size of the mapping in bytes
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// Name the region was created or opened with
    pub fn name(&self) -> &str {
        &self.name
    }
}

// The mapping is shared between processes by construction; in-process
// sharing follows the same protocol.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}
