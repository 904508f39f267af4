// MODULE DECLARATIONS
// These files exist internally but we decide what to expose below.
mod cursor;
mod engine;
mod error;
mod memprobe;
mod page;
mod spoolpath;
mod store;
mod telemetry;

// PUBLIC API EXPORTS
// Users of this crate (the `petabuf` binary) access these directly.
pub use cursor::{Cursors, PAddr};
pub use engine::{Engine, EngineConfig};
pub use error::{SpoolError, SpoolResult};
pub use memprobe::{budget_pages, total_memory};
pub use spoolpath::{MAX_PATH_LEN, PathProvider};
pub use store::{Counters, PageStore};
