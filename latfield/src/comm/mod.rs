// SPDX-License-Identifier: AGPL-3.0-only

//! Message transport between ranks.
//!
//! The exchange code talks to neighbors only through [`Communicator`]:
//! tagged non-blocking sends and receives per (dimension, direction), a
//! blocking `wait`, a max all-reduce and process exit. The transport behind
//! it is opaque; [`loopback`] provides an in-process one for tests and the
//! validation binary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// In-process transport with one thread per rank.
pub mod loopback;
/// Process grid and neighbor arithmetic.
pub mod topology;

pub use loopback::{run_ranks, LoopbackComm, LoopbackNetwork};
pub use topology::CommTopology;

/// Neighbor direction along one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NeighborDir {
    /// Toward lower coordinates.
    Backward,
    /// Toward higher coordinates.
    Forward,
}

impl NeighborDir {
    /// Both directions, backward first.
    pub const BOTH: [Self; 2] = [Self::Backward, Self::Forward];

    /// The other direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Backward => Self::Forward,
            Self::Forward => Self::Backward,
        }
    }

    /// Ghost block index: data from the backward neighbor comes first.
    #[must_use]
    pub const fn block(self) -> usize {
        match self {
            Self::Backward => 0,
            Self::Forward => 1,
        }
    }
}

impl fmt::Display for NeighborDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backward => write!(f, "backward"),
            Self::Forward => write!(f, "forward"),
        }
    }
}

/// Outstanding request returned by `isend`/`irecv`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "requests must be waited on"]
pub enum MsgHandle {
    /// Send whose buffer has already been handed to the transport.
    Send {
        /// Dimension of the exchange.
        dim: usize,
        /// Direction it was sent to.
        dir: NeighborDir,
    },
    /// Posted receive, matched in posting order per (dim, dir).
    Recv {
        /// Dimension of the exchange.
        dim: usize,
        /// Neighbor it is received from.
        dir: NeighborDir,
        /// Posting sequence number.
        seq: u64,
        /// Expected length in bytes.
        len: usize,
    },
}

/// Non-blocking tagged point-to-point messaging plus collectives.
pub trait Communicator: Send + Sync {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Number of processes.
    fn size(&self) -> usize;

    /// Process grid.
    fn topology(&self) -> &CommTopology;

    /// Start sending `buf` to the neighbor in `dir` along `dim`.
    ///
    /// # Errors
    ///
    /// Transport failures, or `NotPartitioned` for an unsplit dimension.
    fn isend(&self, buf: &[u8], dim: usize, dir: NeighborDir) -> Result<MsgHandle>;

    /// Post a receive of `len` bytes from the neighbor in `dir` along `dim`.
    ///
    /// # Errors
    ///
    /// Transport failures, or `NotPartitioned` for an unsplit dimension.
    fn irecv(&self, len: usize, dim: usize, dir: NeighborDir) -> Result<MsgHandle>;

    /// Block until `handle` completes; receives yield their payload.
    ///
    /// # Errors
    ///
    /// Transport failures or a payload of the wrong length.
    fn wait(&self, handle: MsgHandle) -> Result<Option<Vec<u8>>>;

    /// Maximum of `value` over all processes.
    ///
    /// # Errors
    ///
    /// Transport failures.
    fn allreduce_max(&self, value: f64) -> Result<f64>;

    /// Terminate the process with `code`.
    fn exit(&self, code: i32) -> !;
}
