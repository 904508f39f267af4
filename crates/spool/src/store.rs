//! The page store: owns the fixed-size page table and the three page-state
//! transitions (`pin`, `unpin`, `free`) that drive the spool engine.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::ptr;

use crate::cursor::PAddr;
use crate::error::{SpoolError, SpoolResult};
use crate::page::{MAPPED, ON_DISK};
use crate::spoolpath::PathProvider;
use crate::telemetry;

/// Snapshot of the three population counts invariant 5 ties to the table's
/// actual state: mapped slots, disk-backed slots, and the remaining
/// in-memory allocation budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub nmapped: u64,
    pub nondisk: u64,
    pub nfree: u64,
}

/// Owns the page table: two parallel arrays (mapping base address, state
/// bits) indexed by page number, rather than a single `Vec` of a packed
/// struct. This keeps the per-slot footprint at 9 bytes instead of 16
/// after alignment padding, which matters at table sizes in the tens of
/// millions of slots.
pub struct PageStore {
    addr: Vec<usize>,
    state: Vec<u8>,
    page_size: u32,
    table_size: u64,
    path_provider: PathProvider,
    headroom: Option<Vec<u8>>,
    counters: Counters,
}

impl PageStore {
    /// `initial_budget` is the number of pages ("nfree") the store may
    /// allocate in anonymous memory before falling back to disk.
    /// `headroom_bytes` is the size of the reserve heap allocation held
    /// until the first allocation failure; pass 0 to disable it
    /// (used by tests that never expect to hit the OOM path).
    pub fn new(
        table_size: u64,
        page_size: u32,
        path_provider: PathProvider,
        initial_budget: u64,
        headroom_bytes: usize,
    ) -> Self {
        Self {
            addr: vec![0; table_size as usize],
            state: vec![0; table_size as usize],
            page_size,
            table_size,
            path_provider,
            headroom: if headroom_bytes > 0 {
                Some(vec![0u8; headroom_bytes])
            } else {
                None
            },
            counters: Counters {
                nmapped: 0,
                nondisk: 0,
                nfree: initial_budget,
            },
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn table_size(&self) -> u64 {
        self.table_size
    }

    fn is_mapped(&self, idx: u64) -> bool {
        self.state[idx as usize] & MAPPED != 0
    }

    fn is_on_disk(&self, idx: u64) -> bool {
        self.state[idx as usize] & ON_DISK != 0
    }

    /// Ensures slot `idx` is `MAPPED`. Idempotent: remaps an existing spool
    /// file, then tries an anonymous allocation while budget remains, and
    /// only spills to disk once both of those are unavailable.
    pub fn pin(&mut self, idx: u64) -> SpoolResult<()> {
        if self.is_mapped(idx) {
            return Ok(());
        }

        if self.is_on_disk(idx) {
            self.remap_existing_file(idx)?;
            return Ok(());
        }

        if self.counters.nfree > 0 {
            match self.try_anonymous_alloc() {
                Ok(addr) => {
                    self.addr[idx as usize] = addr;
                    self.state[idx as usize] |= MAPPED;
                    self.counters.nmapped += 1;
                    self.counters.nfree -= 1;
                    telemetry::log_counters(&self.counters);
                    return Ok(());
                }
                Err(e) if e.raw_os_error() == Some(libc::ENOMEM) => {
                    self.counters.nfree = 0;
                    if self.headroom.take().is_some() {
                        telemetry::log_headroom_released();
                    }
                    telemetry::log_oom_fallback();
                    // fall through to the disk-spill path below
                }
                Err(e) => {
                    return Err(SpoolError::Mmap { idx, source: e });
                }
            }
        }

        self.spill_to_disk(idx)
    }

    /// Releases the memory mapping while preserving any backing store.
    /// Idempotent on an unmapped slot. Memory-only pages are never
    /// unmapped here (invariant 4: they have nowhere to drain to).
    pub fn unpin(&mut self, idx: u64) -> SpoolResult<()> {
        if !self.is_mapped(idx) {
            return Ok(());
        }
        if self.is_on_disk(idx) {
            self.munmap_slot(idx)?;
            self.state[idx as usize] &= !MAPPED;
            self.counters.nmapped -= 1;
            telemetry::log_counters(&self.counters);
        }
        Ok(())
    }

    /// Releases the slot entirely: unlinks the spool file if on disk,
    /// else unmaps and returns the page's budget if memory-only.
    pub fn free(&mut self, idx: u64) -> SpoolResult<()> {
        if self.is_on_disk(idx) {
            debug_assert!(!self.is_mapped(idx), "on-disk page freed while still mapped");
            let path = self.path_provider.path_of(idx)?;
            std::fs::remove_file(&path).map_err(|source| SpoolError::SpoolFile { path, source })?;
            self.state[idx as usize] &= !ON_DISK;
            self.counters.nondisk -= 1;
            telemetry::log_counters(&self.counters);
        } else if self.is_mapped(idx) {
            self.munmap_slot(idx)?;
            self.state[idx as usize] &= !MAPPED;
            self.counters.nmapped -= 1;
            self.counters.nfree += 1;
            telemetry::log_counters(&self.counters);
        }
        Ok(())
    }

    /// Resolves a cursor address to a byte pointer usable as a `read`/
    /// `write` syscall buffer. Requires the slot to be mapped.
    pub fn ptr_of(&self, addr: PAddr) -> *mut u8 {
        debug_assert!(
            self.is_mapped(addr.idx),
            "ptr_of on unmapped slot {}",
            addr.idx
        );
        debug_assert!(addr.off < self.page_size, "offset past page boundary");
        (self.addr[addr.idx as usize] + addr.off as usize) as *mut u8
    }

    fn remap_existing_file(&mut self, idx: u64) -> SpoolResult<()> {
        let path = self.path_provider.path_of(idx)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| SpoolError::SpoolFile { path, source })?;
        let addr = unsafe { mmap_shared(file.as_raw_fd(), self.page_size as usize) }
            .map_err(|source| SpoolError::Mmap { idx, source })?;
        // file's fd is closed when it drops here; the mapping keeps the
        // file alive.
        self.addr[idx as usize] = addr;
        self.state[idx as usize] |= MAPPED;
        self.counters.nmapped += 1;
        telemetry::log_counters(&self.counters);
        Ok(())
    }

    fn try_anonymous_alloc(&self) -> io::Result<usize> {
        unsafe { mmap_anonymous(self.page_size as usize) }
    }

    fn spill_to_disk(&mut self, idx: u64) -> SpoolResult<()> {
        let path = self.path_provider.path_of(idx)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|source| SpoolError::SpoolFile {
                path: path.clone(),
                source,
            })?;
        file.set_len(self.page_size as u64)
            .map_err(|source| SpoolError::SpoolFile {
                path: path.clone(),
                source,
            })?;
        let addr = unsafe { mmap_shared(file.as_raw_fd(), self.page_size as usize) }
            .map_err(|source| SpoolError::Mmap { idx, source })?;
        self.addr[idx as usize] = addr;
        self.state[idx as usize] |= MAPPED | ON_DISK;
        self.counters.nmapped += 1;
        self.counters.nondisk += 1;
        telemetry::log_counters(&self.counters);
        Ok(())
    }

    fn munmap_slot(&self, idx: u64) -> SpoolResult<()> {
        let addr = self.addr[idx as usize];
        let ret = unsafe { libc::munmap(addr as *mut libc::c_void, self.page_size as usize) };
        if ret != 0 {
            return Err(SpoolError::Mmap {
                idx,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn debug_is_mapped(&self, idx: u64) -> bool {
        self.is_mapped(idx)
    }

    #[cfg(test)]
    pub(crate) fn debug_is_mapped_or_on_disk(&self, idx: u64) -> bool {
        self.is_mapped(idx) || self.is_on_disk(idx)
    }
}

unsafe fn mmap_anonymous(len: usize) -> io::Result<usize> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr as usize)
}

unsafe fn mmap_shared(fd: i32, len: usize) -> io::Result<usize> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr as usize)
}
