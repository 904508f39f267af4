//! Reports total installed physical memory, queried once at bootstrap.

use sysinfo::System;

use crate::error::SpoolResult;

/// Queries the OS for total installed RAM, in bytes.
///
/// Failure is fatal to the caller; this is queried exactly once, at
/// bootstrap, to size the in-memory page budget.
pub fn total_memory() -> SpoolResult<u64> {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return Err(crate::error::SpoolError::MemoryProbe(
            "reported 0 bytes of physical memory".to_string(),
        ));
    }
    Ok(total)
}

/// Derives the initial `nfree` budget (pages) from total physical memory:
/// half of physical RAM, in pages.
pub fn budget_pages(total_bytes: u64, page_size: u64) -> u64 {
    total_bytes / page_size / 2
}
