// SPDX-License-Identifier: AGPL-3.0-only

//! In-order execution stream.
//!
//! Kernels launched on a stream run on its dedicated rayon pool, one after
//! another; a kernel may itself fan out with rayon iterators, which then use
//! the same pool. Kernel errors are deferred to the next `synchronize`,
//! the visibility fence callers insert before reading kernel output.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::error::{HaloError, Result};

/// Execution queue backed by a rayon pool.
pub struct ExecStream {
    name: String,
    pool: ThreadPool,
    launched: AtomicUsize,
    fault: Mutex<Option<HaloError>>,
}

impl std::fmt::Debug for ExecStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecStream")
            .field("name", &self.name)
            .field("workers", &self.pool.current_num_threads())
            .field("launched", &self.launched())
            .finish()
    }
}

impl ExecStream {
    /// Stream named `name` with `workers` pool threads (at least one).
    ///
    /// # Errors
    ///
    /// `Stream` when the pool cannot be built.
    pub fn new(name: &str, workers: usize) -> Result<Self> {
        let prefix = name.to_owned();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| HaloError::Stream(format!("building {name} pool: {e}")))?;
        debug!(name, workers = pool.current_num_threads(), "execution stream");
        Ok(Self {
            name: name.to_owned(),
            pool,
            launched: AtomicUsize::new(0),
            fault: Mutex::new(None),
        })
    }

    /// Kernels launched so far.
    #[must_use]
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::Relaxed)
    }

    /// Run `kernel` on the stream. Its error, if any, is reported by the
    /// next [`synchronize`](Self::synchronize); later kernels still run.
    pub fn launch<F>(&self, kernel: F)
    where
        F: FnOnce() -> Result<()> + Send,
    {
        self.launched.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.pool.install(kernel) {
            warn!(stream = %self.name, error = %e, "kernel failed");
            if let Ok(mut slot) = self.fault.lock() {
                slot.get_or_insert(e);
            }
        }
    }

    /// Fence: every launched kernel has completed; report the first
    /// deferred kernel error.
    ///
    /// # Errors
    ///
    /// The first error of a kernel since the last fence, or `Stream` if the
    /// fault slot is poisoned.
    pub fn synchronize(&self) -> Result<()> {
        let mut slot = self
            .fault
            .lock()
            .map_err(|_| HaloError::Stream(format!("{} fault slot poisoned", self.name)))?;
        slot.take().map_or(Ok(()), Err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn kernels_run_in_order_and_may_fan_out() {
        let s = ExecStream::new("test", 2).expect("stream");
        let mut v = vec![0u64; 64];
        s.launch(|| {
            v.par_iter_mut().enumerate().for_each(|(i, x)| *x = i as u64);
            Ok(())
        });
        s.launch(|| {
            v.par_iter_mut().for_each(|x| *x *= 2);
            Ok(())
        });
        s.synchronize().expect("sync");
        assert_eq!(v[63], 126);
        assert_eq!(s.launched(), 2);
    }

    #[test]
    fn kernel_errors_surface_at_the_fence() {
        let s = ExecStream::new("test", 1).expect("stream");
        s.launch(|| Err(HaloError::NotPartitioned { dim: 1 }));
        s.launch(|| Err(HaloError::NotPartitioned { dim: 2 }));
        assert!(matches!(s.synchronize(), Err(HaloError::NotPartitioned { dim: 1 })));
        assert!(s.synchronize().is_ok());
    }
}
