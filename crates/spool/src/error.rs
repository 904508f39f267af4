use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the paged spool engine.
///
/// Every variant here is fatal to the process that encounters it except
/// where noted: the out-of-memory path during page allocation is handled
/// inline by [`crate::store::PageStore::pin`] and never reaches a caller as
/// an error.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// The OS memory probe failed.
    #[error("probing total physical memory: {0}")]
    MemoryProbe(String),

    /// A spool file path would exceed the configured maximum length.
    #[error("spool path for page {idx} exceeds maximum length")]
    PathTooLong { idx: u64 },

    /// Opening, creating, truncating, or unlinking a spool file failed.
    #[error("spool file {path}: {source}")]
    SpoolFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `mmap`/`munmap` call failed for a reason other than allocation
    /// exhaustion (which is handled, not reported, by the allocator).
    #[error("mapping page {idx}: {source}")]
    Mmap { idx: u64, source: std::io::Error },

    /// `read`/`write`/`poll`/`fcntl` on a standard descriptor failed.
    #[error("{op} on fd {fd}: {source}")]
    Io {
        op: &'static str,
        fd: i32,
        #[source]
        source: std::io::Error,
    },

    /// The write cursor advanced past the last slot in the page table.
    #[error("out of pages: write cursor reached table size {table_size}")]
    OutOfPages { table_size: u64 },

    /// Readiness multiplexing was interrupted or otherwise failed.
    #[error("waiting for descriptor readiness: {0}")]
    Readiness(#[source] std::io::Error),
}

pub type SpoolResult<T> = Result<T, SpoolError>;
