//! The non-blocking I/O loop and bootstrap.

use std::io;
use std::path::PathBuf;

use crate::cursor::Cursors;
use crate::error::{SpoolError, SpoolResult};
use crate::memprobe;
use crate::spoolpath::PathProvider;
use crate::store::PageStore;
use crate::telemetry;

/// Runtime configuration for one spool engine instance, exposed as fields
/// so the binary crate can source them from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub page_size: u32,
    pub table_size: u64,
    pub spool_dir: PathBuf,
    pub spool_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 1 << 24, // 16 MiB
            table_size: 1 << 26,
            spool_dir: std::env::temp_dir(),
            spool_prefix: "petabuf".to_string(),
        }
    }
}

/// Owns the page store and cursor pair and drives bytes from stdin to
/// stdout in strict FIFO order.
pub struct Engine {
    store: PageStore,
    cursors: Cursors,
}

impl Engine {
    /// Allocates the page table and headroom reserve, probes memory, and
    /// pins page 0. Does not yet touch stdin/stdout flags; call [`run`]
    /// for that (separated so tests can drive the loop over plain pipes
    /// instead of the process's real standard descriptors).
    ///
    /// [`run`]: Engine::run
    pub fn bootstrap(config: EngineConfig) -> SpoolResult<Self> {
        let total_memory = memprobe::total_memory()?;
        let budget = memprobe::budget_pages(total_memory, config.page_size as u64);
        telemetry::log_startup(total_memory, budget, config.page_size);

        let path_provider = PathProvider::new(config.spool_dir, config.spool_prefix);
        let headroom_bytes = 4 * config.page_size as usize;
        let mut store = PageStore::new(
            config.table_size,
            config.page_size,
            path_provider,
            budget,
            headroom_bytes,
        );
        store.pin(0)?;

        Ok(Self {
            store,
            cursors: Cursors::new(config.page_size, config.table_size),
        })
    }

    /// Runs the loop over the process's real stdin/stdout, switching both
    /// to non-blocking first.
    pub fn run(&mut self) -> SpoolResult<()> {
        set_nonblocking(libc::STDIN_FILENO)?;
        set_nonblocking(libc::STDOUT_FILENO)?;
        self.run_fds(libc::STDIN_FILENO, libc::STDOUT_FILENO)
    }

    /// The loop itself, parameterized over the input/output descriptors so
    /// it can be exercised in tests against a pipe pair. Both descriptors
    /// must already be non-blocking.
    pub(crate) fn run_fds(&mut self, in_fd: i32, out_fd: i32) -> SpoolResult<()> {
        let mut n_to_read = self.cursors.n_to_read();
        let mut n_to_write = self.cursors.n_to_write();

        while n_to_read > 0 || n_to_write > 0 {
            telemetry::log_cursors(&self.cursors);

            let mut fds = [
                libc::pollfd {
                    fd: in_fd,
                    events: 0,
                    revents: 0,
                },
                libc::pollfd {
                    fd: out_fd,
                    events: 0,
                    revents: 0,
                },
            ];
            if n_to_read > 0 {
                fds[0].events = libc::POLLIN;
            }
            if n_to_write > 0 {
                fds[1].events = libc::POLLOUT;
            }

            let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if ready == -1 {
                return Err(SpoolError::Readiness(io::Error::last_os_error()));
            }

            // select() reports a descriptor ready on a pending error too;
            // poll() splits that into POLLERR/POLLHUP, so fold them back in
            // here or a closed stdout spins forever re-polling instead of
            // reaching the write() that would surface EPIPE.
            const ERR_BITS: i16 = libc::POLLERR | libc::POLLHUP;

            if n_to_read > 0 && fds[0].revents & (libc::POLLIN | ERR_BITS) != 0 {
                let ptr = self.store.ptr_of(self.cursors.wpos);
                let k = unsafe {
                    libc::read(in_fd, ptr as *mut libc::c_void, n_to_read as usize)
                };
                if k == -1 {
                    return Err(SpoolError::Io {
                        op: "read",
                        fd: in_fd,
                        source: io::Error::last_os_error(),
                    });
                } else if k == 0 {
                    telemetry::log_eof();
                    n_to_read = 0;
                } else {
                    self.cursors.advance_write(&mut self.store, k as u32)?;
                    n_to_read = self.cursors.n_to_read();
                }
            }

            if n_to_write > 0 && fds[1].revents & (libc::POLLOUT | ERR_BITS) != 0 {
                let ptr = self.store.ptr_of(self.cursors.rpos);
                let k = unsafe {
                    libc::write(out_fd, ptr as *const libc::c_void, n_to_write as usize)
                };
                if k == -1 {
                    return Err(SpoolError::Io {
                        op: "write",
                        fd: out_fd,
                        source: io::Error::last_os_error(),
                    });
                } else if k > 0 {
                    self.cursors.advance_read(&mut self.store, k as u32)?;
                }
                // k == 0: platforms that allow a zero-length successful
                // write get a no-op here; re-selecting avoids a spin on a
                // descriptor that reports writable but accepts nothing.
            }

            n_to_write = self.cursors.n_to_write();
        }

        Ok(())
    }
}

fn set_nonblocking(fd: i32) -> SpoolResult<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(SpoolError::Io {
            op: "fcntl(F_GETFL)",
            fd,
            source: io::Error::last_os_error(),
        });
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret == -1 {
        return Err(SpoolError::Io {
            op: "fcntl(F_SETFL)",
            fd,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}
