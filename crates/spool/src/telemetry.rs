//! Diagnostic sink: counter and cursor snapshots, plus short narrative
//! lines, emitted via the `log` facade so the binary crate can wire them to
//! any subscriber. The binary wires this to `env_logger`, writing to
//! stderr by default — distinct from stdout, which carries only spooled
//! bytes.

use crate::cursor::Cursors;
use crate::store::Counters;

/// Emitted after every page-state transition (invariant 5).
pub fn log_counters(counters: &Counters) {
    log::debug!(
        "nmapped={} nondisk={} nfree={}",
        counters.nmapped,
        counters.nondisk,
        counters.nfree
    );
}

/// Emitted at the top of every loop iteration.
pub fn log_cursors(cursors: &Cursors) {
    log::debug!(
        "rpos={}+{} wpos={}+{}",
        cursors.rpos.idx,
        cursors.rpos.off,
        cursors.wpos.idx,
        cursors.wpos.off
    );
}

/// Startup line reporting detected memory and the chosen budget.
pub fn log_startup(total_memory_bytes: u64, budget_pages: u64, page_size: u32) {
    log::info!(
        "system reports {} bytes ({} GiB) of memory, using up to half: budget {} pages of {} bytes",
        total_memory_bytes,
        total_memory_bytes >> 30,
        budget_pages,
        page_size
    );
}

pub fn log_eof() {
    log::info!("end of input");
}

pub fn log_oom_fallback() {
    log::warn!("anonymous allocation failed with ENOMEM, falling back to disk for remaining pages");
}

pub fn log_headroom_released() {
    log::warn!("released headroom reserve to make room for the spill path");
}
