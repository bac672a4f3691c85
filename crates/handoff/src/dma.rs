use crate::errors::SyncError;
use memmap2::MmapMut;
use nix::errno::Errno;
use std::ops::{Deref, DerefMut};

/// Fixed-size frame memory: a page-aligned anonymous mapping, locked into RAM
/// when the process is allowed to.
///
/// The size is set at allocation and never changes.
pub struct DmaBuffer {
    mmap: MmapMut,
    locked: bool,
}

impl DmaBuffer {
    pub fn allocate(size: usize) -> Result<Self, SyncError> {
        if size == 0 {
            return Err(SyncError::ZeroSized);
        }

        let mmap = MmapMut::map_anon(size).map_err(|source| SyncError::Allocation { size, source })?;

        let ret = unsafe { libc::mlock(mmap.as_ptr() as *const libc::c_void, size) };
        let locked = ret == 0;
        if !locked {
            tracing::debug!(
                "Buffer of {} bytes stays pageable (mlock: {})",
                size,
                Errno::last()
            );
        }

        Ok(Self { mmap, locked })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Whether the pages are pinned in physical memory.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Deref for DmaBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.mmap
    }
}

impl DerefMut for DmaBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        if self.locked {
            unsafe {
                libc::munlock(self.mmap.as_ptr() as *const libc::c_void, self.mmap.len());
            }
        }
    }
}
