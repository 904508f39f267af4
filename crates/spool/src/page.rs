//! Per-slot state bits for the page table.
//!
//! A slot's state is a bitset over two independent facts: whether it is
//! currently mapped into the process, and whether a spool file exists for
//! it. The four reachable combinations are `∅`, `MAPPED`, `ON_DISK`, and
//! `MAPPED | ON_DISK` — see [`crate::store::PageStore`] for the transitions
//! between them.

/// Resident in anonymous or file-backed memory right now.
pub const MAPPED: u8 = 0x1;
/// A spool file exists on disk for this page.
pub const ON_DISK: u8 = 0x2;
