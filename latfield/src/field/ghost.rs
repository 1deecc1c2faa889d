// SPDX-License-Identifier: AGPL-3.0-only

//! Ghost-zone sizing.
//!
//! For every dimension split across processes the field reserves, after the
//! padded body of each parity half, room for the boundary sites received
//! from both neighbors. Regions for successive dimensions are contiguous and
//! ordered by dimension index. Unsplit dimensions reserve nothing.
//!
//! A dimension's region holds two blocks, from-backward then from-forward.
//! Each block holds `n_face · ghost_face[d]` ghost sites in vector-of-N
//! order with the block's site count as stride:
//!
//! ```text
//! element(g, i) = block_base + ((i / N) · S + g) · N + i % N,   S = n_face · ghost_face[d]
//! ```
//!
//! Staggered fields carry three slices each way of full spinors. Spin-4
//! fields carry one slice each way of spin-projected half spinors, which is
//! why their face count is 1 while their norm-face count is 2.

use serde::{Deserialize, Serialize};

use crate::comm::NeighborDir;
use crate::error::{HaloError, Result};
use crate::lattice::constants::N_DIM;

use super::param::{Precision, SiteSubset, SpinorParam};

/// Ghost sizes and offsets for one field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostZone {
    /// Full-spinor site equivalents per boundary site per dimension.
    pub num_faces: usize,
    /// Norm entries per boundary site per dimension.
    pub num_norm_faces: usize,
    /// Slices exchanged each way.
    pub n_face: usize,
    /// Reals per ghost site (half of `site_len` for projected spin-4).
    pub ghost_site_len: usize,
    /// Checkerboarded boundary-face sites per dimension (0 if unsplit).
    pub ghost_face: [usize; N_DIM],
    /// Start of each dimension's data region, in full-site units.
    pub ghost_offset: [usize; N_DIM],
    /// Start of each dimension's norm region, in norm entries.
    pub ghost_norm_offset: [usize; N_DIM],
    /// Full-site units reserved for all data regions.
    pub ghost_volume: usize,
    /// Norm entries reserved for all norm regions.
    pub ghost_norm_volume: usize,
    /// Reals reserved for all data regions of one parity.
    pub ghost_length: usize,
    /// Norm entries reserved for one parity (0 unless half precision).
    pub ghost_norm_length: usize,
}

impl GhostZone {
    /// Face counts and depth for a field kind: `(num_faces, num_norm_faces, n_face)`.
    #[must_use]
    pub const fn faces_for_spin(n_spin: usize) -> (usize, usize, usize) {
        if n_spin == 1 {
            (6, 6, 3)
        } else {
            (1, 2, 1)
        }
    }

    /// Size the ghost zone of `param` for the partitioned dimensions.
    ///
    /// # Errors
    ///
    /// `FaceDeeperThanExtent` when a split dimension is thinner than the
    /// ghost depth, `OddCheckerboard` when a split dimension's face cannot
    /// be checkerboarded.
    pub fn compute(param: &SpinorParam, partition: &[bool; N_DIM]) -> Result<Self> {
        let (num_faces, num_norm_faces, n_face) = Self::faces_for_spin(param.n_spin);
        let site_len = param.n_color * param.n_spin * 2;
        let ghost_site_len = if param.n_spin == 4 {
            site_len / 2
        } else {
            site_len
        };

        // the fifth dimension multiplies faces but is never split
        let dims = if param.n_dim == 5 {
            4
        } else {
            param.n_dim.min(N_DIM)
        };
        let x5 = if param.n_dim == 5 { param.extent(4) } else { 1 };

        // parity fields store x[0] checkerboarded
        let full = |j: usize| {
            if j == 0 && param.site_subset == SiteSubset::Parity {
                2 * param.extent(0)
            } else {
                param.extent(j)
            }
        };

        let mut ghost_face = [0; N_DIM];
        for i in 0..dims {
            if !partition[i] {
                continue;
            }
            let full_extent = full(i);
            if full_extent < n_face {
                return Err(HaloError::FaceDeeperThanExtent {
                    dim: i,
                    extent: full_extent,
                    n_face,
                });
            }
            let fastest = usize::from(i == 0);
            if fastest < dims && full(fastest) % 2 != 0 {
                return Err(HaloError::OddCheckerboard {
                    what: "fastest face extent",
                    value: full(fastest),
                });
            }
            let full_face: usize = x5 * (0..dims).filter(|&j| j != i).map(full).product::<usize>();
            if full_face % 2 != 0 {
                return Err(HaloError::OddCheckerboard {
                    what: "face volume",
                    value: full_face,
                });
            }
            let mut face = x5;
            for j in (0..dims).filter(|&j| j != i) {
                face *= param.extent(j);
            }
            if i == 0 && param.site_subset != SiteSubset::Full {
                face /= 2;
            }
            if param.site_subset == SiteSubset::Full {
                face /= 2;
            }
            ghost_face[i] = face;
        }

        let mut ghost_offset = [0; N_DIM];
        let mut ghost_norm_offset = [0; N_DIM];
        for i in 1..N_DIM {
            ghost_offset[i] = ghost_offset[i - 1] + num_faces * ghost_face[i - 1];
            ghost_norm_offset[i] = ghost_norm_offset[i - 1] + num_norm_faces * ghost_face[i - 1];
        }

        let face_sum: usize = ghost_face.iter().sum();
        let ghost_volume = num_faces * face_sum;
        let ghost_norm_volume = num_norm_faces * face_sum;
        let ghost_length = ghost_volume * site_len;
        let ghost_norm_length = if param.precision == Precision::Half {
            ghost_norm_volume
        } else {
            0
        };

        Ok(Self {
            num_faces,
            num_norm_faces,
            n_face,
            ghost_site_len,
            ghost_face,
            ghost_offset,
            ghost_norm_offset,
            ghost_volume,
            ghost_norm_volume,
            ghost_length,
            ghost_norm_length,
        })
    }

    /// Whether dimension `d` has a ghost region.
    #[must_use]
    pub fn is_active(&self, d: usize) -> bool {
        d < N_DIM && self.ghost_face[d] > 0
    }

    /// Ghost sites in one block (one neighbor) of dimension `d`.
    #[must_use]
    pub fn block_sites(&self, d: usize) -> usize {
        self.n_face * self.ghost_face[d]
    }

    /// Reals in one block of dimension `d`.
    #[must_use]
    pub fn block_reals(&self, d: usize) -> usize {
        self.block_sites(d) * self.ghost_site_len
    }

    /// Vector width of ghost blocks for `precision`.
    #[must_use]
    pub fn vec_width(&self, precision: Precision) -> usize {
        if precision != Precision::Double && self.ghost_site_len % 4 == 0 {
            4
        } else {
            2
        }
    }

    /// Offset of element `(g, i)` within one block of dimension `d`.
    ///
    /// A message carries one block per parity in exactly this order.
    #[must_use]
    pub fn block_offset(&self, d: usize, g: usize, i: usize, n: usize) -> usize {
        ((i / n) * self.block_sites(d) + g) * n + i % n
    }

    /// Offset of element `(g, i)` from the start of dimension `d`'s data
    /// region, for the block received from `from`.
    #[must_use]
    pub fn element_offset(
        &self,
        d: usize,
        from: NeighborDir,
        g: usize,
        i: usize,
        n: usize,
    ) -> usize {
        from.block() * self.block_reals(d) + self.block_offset(d, g, i, n)
    }

    /// Offset of ghost site `g`'s norm from the start of dimension `d`'s
    /// norm region, for the block received from `from`.
    #[must_use]
    pub fn norm_offset(&self, d: usize, from: NeighborDir, g: usize) -> usize {
        from.block() * self.block_sites(d) + g
    }
}
