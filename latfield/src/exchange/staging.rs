// SPDX-License-Identifier: AGPL-3.0-only

//! Pinned staging buffers for ghost messages.
//!
//! One send and one receive buffer per (partitioned dimension, direction),
//! allocated the first time that dimension is exchanged at the largest
//! element size so any precision of the same geometry fits, then reused. Norm buffers follow on
//! the first half-precision exchange. With [`TransferMode::Pageable`] a
//! second set of host buffers sits between the pinned ones and the
//! transport.
//!
//! Buffers are backed by `Vec<f64>` for alignment and viewed as bytes.

use tracing::info;

use crate::comm::NeighborDir;
use crate::error::{HaloError, Result};
use crate::field::alloc_zeroed;
use crate::field::layout::SpinorLayout;
use crate::halo::message_bytes;
use crate::lattice::constants::N_DIM;

use super::TransferMode;

/// Bytes per real at the largest precision.
pub const MAX_REAL_BYTES: usize = std::mem::size_of::<f64>();

fn words(bytes: usize) -> usize {
    bytes.div_ceil(MAX_REAL_BYTES)
}

fn view(v: &[f64], len: usize) -> &[u8] {
    &bytemuck::cast_slice(v)[..len]
}

fn view_mut(v: &mut [f64], len: usize) -> &mut [u8] {
    &mut bytemuck::cast_slice_mut(v)[..len]
}

/// Buffers of one (dimension, direction) pair.
#[derive(Debug, Default)]
pub struct FaceBuffers {
    send: Vec<f64>,
    recv: Vec<f64>,
    send_norm: Vec<f64>,
    recv_norm: Vec<f64>,
    host_send: Vec<f64>,
    host_recv: Vec<f64>,
    host_send_norm: Vec<f64>,
    host_recv_norm: Vec<f64>,
}

impl FaceBuffers {
    /// Pinned send buffers as pack targets.
    pub fn send_views(&mut self, len: usize, norm_len: usize) -> (&mut [u8], Option<&mut [u8]>) {
        let norm = (norm_len > 0).then(|| view_mut(&mut self.send_norm, norm_len));
        (view_mut(&mut self.send, len), norm)
    }

    /// Buffers handed to the transport, staged through host memory when
    /// pageable.
    pub fn wire_send(&mut self, mode: TransferMode, len: usize, norm_len: usize) -> (&[u8], Option<&[u8]>) {
        if mode == TransferMode::Pageable {
            view_mut(&mut self.host_send, len).copy_from_slice(view(&self.send, len));
            if norm_len > 0 {
                view_mut(&mut self.host_send_norm, norm_len).copy_from_slice(view(&self.send_norm, norm_len));
            }
            let norm = (norm_len > 0).then(|| view(&self.host_send_norm, norm_len));
            return (view(&self.host_send, len), norm);
        }
        let norm = (norm_len > 0).then(|| view(&self.send_norm, norm_len));
        (view(&self.send, len), norm)
    }

    /// Store a received payload in the pinned receive buffers.
    pub fn land(&mut self, mode: TransferMode, data: &[u8], norm: Option<&[u8]>) {
        if mode == TransferMode::Pageable {
            view_mut(&mut self.host_recv, data.len()).copy_from_slice(data);
            view_mut(&mut self.recv, data.len()).copy_from_slice(view(&self.host_recv, data.len()));
            if let Some(n) = norm {
                view_mut(&mut self.host_recv_norm, n.len()).copy_from_slice(n);
                view_mut(&mut self.recv_norm, n.len()).copy_from_slice(view(&self.host_recv_norm, n.len()));
            }
            return;
        }
        view_mut(&mut self.recv, data.len()).copy_from_slice(data);
        if let Some(n) = norm {
            view_mut(&mut self.recv_norm, n.len()).copy_from_slice(n);
        }
    }

    /// Pinned receive buffers as unpack sources.
    #[must_use]
    pub fn recv_views(&self, len: usize, norm_len: usize) -> (&[u8], Option<&[u8]>) {
        let norm = (norm_len > 0).then(|| view(&self.recv_norm, norm_len));
        (view(&self.recv, len), norm)
    }
}

const fn slot(d: usize, dir: NeighborDir) -> usize {
    2 * d + dir.block()
}

const fn slot_dir(i: usize) -> NeighborDir {
    if i % 2 == 0 {
        NeighborDir::Backward
    } else {
        NeighborDir::Forward
    }
}

/// Owner of every staging buffer of one process.
#[derive(Debug)]
pub struct StagingPool {
    mode: TransferMode,
    faces: Vec<FaceBuffers>,
    data_capacity: [usize; N_DIM],
    norm_capacity: [usize; N_DIM],
    allocations: usize,
}

impl StagingPool {
    /// Empty pool; nothing is allocated until the first exchange.
    #[must_use]
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            faces: (0..2 * N_DIM).map(|_| FaceBuffers::default()).collect(),
            data_capacity: [0; N_DIM],
            norm_capacity: [0; N_DIM],
            allocations: 0,
        }
    }

    /// Transfer mode the pool was built for.
    #[must_use]
    pub const fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Allocation rounds performed (data, then norms).
    #[must_use]
    pub const fn allocation_count(&self) -> usize {
        self.allocations
    }

    /// Bytes per data buffer of dimension `d`.
    #[must_use]
    pub fn data_capacity(&self, d: usize) -> usize {
        self.data_capacity[d]
    }

    /// Bytes per norm buffer of dimension `d`.
    #[must_use]
    pub fn norm_capacity(&self, d: usize) -> usize {
        self.norm_capacity[d]
    }

    fn alloc_pair(&self, bytes: usize, what: &'static str, host_what: &'static str) -> Result<[Vec<f64>; 2]> {
        let host = if self.mode == TransferMode::Pageable {
            alloc_zeroed(host_what, words(bytes))?
        } else {
            Vec::new()
        };
        Ok([alloc_zeroed(what, words(bytes))?, host])
    }

    /// Allocate buffers for dimensions seen for the first time and check
    /// that `layout`'s messages fit.
    ///
    /// # Errors
    ///
    /// `Allocation` on first use of a dimension, `StagingTooSmall` for a
    /// geometry larger than the one a dimension was sized for.
    pub fn ensure(&mut self, layout: &SpinorLayout) -> Result<()> {
        let g = &layout.ghost;
        let dims: Vec<usize> = (0..N_DIM).filter(|&d| g.is_active(d)).collect();

        let fresh: Vec<usize> = dims.iter().copied().filter(|&d| self.data_capacity[d] == 0).collect();
        if !fresh.is_empty() {
            for &d in &fresh {
                let bytes = layout.halves() * g.block_reals(d) * MAX_REAL_BYTES;
                for dir in NeighborDir::BOTH {
                    let [send, host_send] = self.alloc_pair(bytes, "pinned send buffer", "pageable send buffer")?;
                    let [recv, host_recv] = self.alloc_pair(bytes, "pinned receive buffer", "pageable receive buffer")?;
                    let f = &mut self.faces[slot(d, dir)];
                    (f.send, f.host_send, f.recv, f.host_recv) = (send, host_send, recv, host_recv);
                }
                self.data_capacity[d] = bytes;
            }
            self.allocations += 1;
            info!(capacity = ?self.data_capacity, mode = ?self.mode, "staging buffers allocated");
        }

        let fresh: Vec<usize> = if layout.precision.has_norm() {
            dims.iter().copied().filter(|&d| self.norm_capacity[d] == 0).collect()
        } else {
            Vec::new()
        };
        if !fresh.is_empty() {
            for &d in &fresh {
                let (_, bytes) = message_bytes(layout, d);
                for dir in NeighborDir::BOTH {
                    let [send, host_send] = self.alloc_pair(bytes, "pinned send norm", "pageable send norm")?;
                    let [recv, host_recv] = self.alloc_pair(bytes, "pinned receive norm", "pageable receive norm")?;
                    let f = &mut self.faces[slot(d, dir)];
                    (f.send_norm, f.host_send_norm, f.recv_norm, f.host_recv_norm) =
                        (send, host_send, recv, host_recv);
                }
                self.norm_capacity[d] = bytes;
            }
            self.allocations += 1;
            info!(capacity = ?self.norm_capacity, "staging norm buffers allocated");
        }

        for &d in &dims {
            let (need, need_norm) = message_bytes(layout, d);
            if need > self.data_capacity[d] {
                return Err(HaloError::StagingTooSmall {
                    what: format!("dimension {d} data"),
                    need,
                    have: self.data_capacity[d],
                });
            }
            if need_norm > self.norm_capacity[d] {
                return Err(HaloError::StagingTooSmall {
                    what: format!("dimension {d} norm"),
                    need: need_norm,
                    have: self.norm_capacity[d],
                });
            }
        }
        Ok(())
    }

    /// Buffers of `(d, dir)`.
    #[must_use]
    pub fn face(&self, d: usize, dir: NeighborDir) -> &FaceBuffers {
        &self.faces[slot(d, dir)]
    }

    /// Mutable buffers of `(d, dir)`.
    pub fn face_mut(&mut self, d: usize, dir: NeighborDir) -> &mut FaceBuffers {
        &mut self.faces[slot(d, dir)]
    }

    /// Every buffer set with its `(d, dir)`, as disjoint borrows.
    pub fn faces_mut(&mut self) -> impl Iterator<Item = (usize, NeighborDir, &mut FaceBuffers)> {
        self.faces
            .iter_mut()
            .enumerate()
            .map(|(i, f)| (i / 2, slot_dir(i), f))
    }
}
