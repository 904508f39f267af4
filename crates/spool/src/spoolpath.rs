//! Deterministic mapping from a page index to the spool file that backs it.

use std::path::PathBuf;

use crate::error::{SpoolError, SpoolResult};

/// Compile-time maximum length, in bytes, for a rendered spool path.
/// Chosen generously above any reasonable directory depth; overflow is a
/// fatal configuration error rather than a silently truncated path.
pub const MAX_PATH_LEN: usize = 4096;

/// Maps a page index to a path under a configured spool directory, with a
/// configured filename prefix: `<dir>/<prefix>.<idx>`.
#[derive(Debug, Clone)]
pub struct PathProvider {
    dir: PathBuf,
    prefix: String,
}

impl PathProvider {
    pub fn new(dir: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            dir,
            prefix: prefix.into(),
        }
    }

    /// Renders the spool file path for `idx`. Deterministic and pure aside
    /// from the length check, which is the only way this can fail.
    pub fn path_of(&self, idx: u64) -> SpoolResult<PathBuf> {
        let name = format!("{}.{}", self.prefix, idx);
        let path = self.dir.join(name);
        if path.as_os_str().len() > MAX_PATH_LEN {
            return Err(SpoolError::PathTooLong { idx });
        }
        Ok(path)
    }
}
