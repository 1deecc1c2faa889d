// SPDX-License-Identifier: AGPL-3.0-only

//! Process grid.
//!
//! Ranks are laid out lexicographically over a 4D grid, dimension 0
//! fastest. Neighbors wrap periodically. A dimension is partitioned when
//! the grid has more than one rank along it.

use serde::{Deserialize, Serialize};

use crate::error::{HaloError, Result};
use crate::lattice::constants::N_DIM;

use super::NeighborDir;

/// Position of one rank in the process grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommTopology {
    grid: [usize; N_DIM],
    coords: [usize; N_DIM],
    rank: usize,
}

impl CommTopology {
    /// Single-process topology.
    #[must_use]
    pub const fn single() -> Self {
        Self {
            grid: [1; N_DIM],
            coords: [0; N_DIM],
            rank: 0,
        }
    }

    /// Topology of `rank` in `grid`.
    ///
    /// # Errors
    ///
    /// `Unsupported` for an empty grid dimension or a rank outside the grid.
    pub fn new(grid: [usize; N_DIM], rank: usize) -> Result<Self> {
        let size: usize = grid.iter().product();
        if grid.contains(&0) || rank >= size {
            return Err(HaloError::Unsupported {
                what: "process grid",
                value: format!("rank {rank} in grid {grid:?}"),
            });
        }
        Ok(Self {
            grid,
            coords: Self::coords_of(&grid, rank),
            rank,
        })
    }

    fn coords_of(grid: &[usize; N_DIM], mut rank: usize) -> [usize; N_DIM] {
        let mut c = [0; N_DIM];
        for d in 0..N_DIM {
            c[d] = rank % grid[d];
            rank /= grid[d];
        }
        c
    }

    fn rank_of(&self, coords: &[usize; N_DIM]) -> usize {
        let mut r = 0;
        for d in (0..N_DIM).rev() {
            r = r * self.grid[d] + coords[d];
        }
        r
    }

    /// This rank.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Ranks in the grid.
    #[must_use]
    pub fn size(&self) -> usize {
        self.grid.iter().product()
    }

    /// Ranks along each dimension.
    #[must_use]
    pub const fn grid(&self) -> &[usize; N_DIM] {
        &self.grid
    }

    /// This rank's grid coordinates.
    #[must_use]
    pub const fn coords(&self) -> &[usize; N_DIM] {
        &self.coords
    }

    /// Whether dimension `d` is split across ranks.
    #[must_use]
    pub fn partitioned(&self, d: usize) -> bool {
        d < N_DIM && self.grid[d] > 1
    }

    /// Partition mask over all dimensions.
    #[must_use]
    pub fn partition(&self) -> [bool; N_DIM] {
        std::array::from_fn(|d| self.partitioned(d))
    }

    /// Rank of the neighbor in `dir` along `d` (periodic).
    #[must_use]
    pub fn neighbor(&self, d: usize, dir: NeighborDir) -> usize {
        let mut c = self.coords;
        let n = self.grid[d];
        c[d] = match dir {
            NeighborDir::Forward => (c[d] + 1) % n,
            NeighborDir::Backward => (c[d] + n - 1) % n,
        };
        self.rank_of(&c)
    }

    /// Global coordinate of local coordinate 0 along `d` for local extent `extent`.
    #[must_use]
    pub const fn global_offset(&self, d: usize, extent: usize) -> usize {
        self.coords[d] * extent
    }

    /// Global extent along `d` for local extent `extent`.
    #[must_use]
    pub const fn global_extent(&self, d: usize, extent: usize) -> usize {
        self.grid[d] * extent
    }
}

impl Default for CommTopology {
    fn default() -> Self {
        Self::single()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn single_process_is_unpartitioned() {
        let t = CommTopology::single();
        assert_eq!(t.partition(), [false; N_DIM]);
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn neighbors_wrap_periodically() {
        let t = CommTopology::new([1, 1, 2, 3], 5).expect("topology");
        assert_eq!(t.coords(), &[0, 0, 1, 2]);
        assert_eq!(t.neighbor(3, NeighborDir::Forward), 1);
        assert_eq!(t.neighbor(3, NeighborDir::Backward), 3);
        assert_eq!(t.neighbor(2, NeighborDir::Forward), 4);
        assert_eq!(t.neighbor(2, NeighborDir::Backward), 4);
    }

    #[test]
    fn global_offsets_scale_with_coords() {
        let t = CommTopology::new([1, 1, 1, 4], 2).expect("topology");
        assert_eq!(t.global_offset(3, 8), 16);
        assert_eq!(t.global_extent(3, 8), 32);
        assert!(t.partitioned(3));
        assert!(!t.partitioned(0));
    }

    #[test]
    fn rank_outside_grid_rejected() {
        assert!(CommTopology::new([1, 1, 1, 2], 2).is_err());
    }
}
