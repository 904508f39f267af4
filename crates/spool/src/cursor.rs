//! The read/write cursor pair.
//!
//! "Read cursor" names the position bytes are written *from* into stdout;
//! "write cursor" names the position bytes are written *into* from stdin.
//! This matches the data direction, not the cursor's I/O verb.

use crate::error::{SpoolError, SpoolResult};
use crate::store::PageStore;

/// A page-table address: a page index plus a byte offset within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PAddr {
    pub idx: u64,
    pub off: u32,
}

impl PAddr {
    pub const ZERO: PAddr = PAddr { idx: 0, off: 0 };
}

/// Owns `rpos` and `wpos` and the invariant that `wpos >= rpos`.
#[derive(Debug, Clone, Copy)]
pub struct Cursors {
    pub rpos: PAddr,
    pub wpos: PAddr,
    page_size: u32,
    table_size: u64,
}

impl Cursors {
    pub fn new(page_size: u32, table_size: u64) -> Self {
        Self {
            rpos: PAddr::ZERO,
            wpos: PAddr::ZERO,
            page_size,
            table_size,
        }
    }

    /// Bytes the next `read` may accept into the current write page.
    /// Remains > 0 until end-of-input is latched by the caller.
    pub fn n_to_read(&self) -> u32 {
        self.page_size - self.wpos.off
    }

    /// Bytes available for the next `write`; zero iff the cursors are
    /// equal.
    pub fn n_to_write(&self) -> u32 {
        let bound = if self.wpos.idx == self.rpos.idx {
            self.wpos.off
        } else {
            self.page_size
        };
        bound - self.rpos.off
    }

    /// Advances the write cursor after a `read` of `k` bytes, pinning the
    /// next page on a page crossing. Skips unpinning the outgoing page
    /// when the read cursor still shares it.
    pub fn advance_write(&mut self, store: &mut PageStore, k: u32) -> SpoolResult<()> {
        self.wpos.off += k;
        if self.wpos.off == self.page_size {
            if self.wpos.idx != self.rpos.idx {
                store.unpin(self.wpos.idx)?;
            }
            let next = self.wpos.idx + 1;
            if next >= self.table_size {
                return Err(SpoolError::OutOfPages {
                    table_size: self.table_size,
                });
            }
            store.pin(next)?;
            self.wpos.idx = next;
            self.wpos.off = 0;
        }
        Ok(())
    }

    /// Advances the read cursor after a `write` of `k` bytes, freeing the
    /// outgoing page and pinning the next one on a page crossing.
    pub fn advance_read(&mut self, store: &mut PageStore, k: u32) -> SpoolResult<()> {
        self.rpos.off += k;
        if self.rpos.off == self.page_size {
            store.unpin(self.rpos.idx)?;
            store.free(self.rpos.idx)?;
            let next = self.rpos.idx + 1;
            store.pin(next)?;
            self.rpos.idx = next;
            self.rpos.off = 0;
        }
        Ok(())
    }
}
