// SPDX-License-Identifier: AGPL-3.0-only

//! Neighbor addressing across ghost zones.
//!
//! The kernel-side view of a ghost zone: a hop that stays inside the local
//! lattice (or wraps around an unsplit dimension) resolves to a local site,
//! a hop off a partitioned edge resolves to a ghost site. Off the forward
//! edge, ghost slice `k` holds the forward neighbor's slice `k`; off the
//! backward edge it holds the backward neighbor's slice `X_d - n_face + k`.

use crate::comm::NeighborDir;
use crate::error::{HaloError, Result};
use crate::field::geometry::{Checkerboard, Coords};
use crate::field::SpinorField;
use crate::lattice::constants::N_DIM;

/// Where a neighbor site lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighbor {
    /// Local checkerboard site.
    Local {
        /// Checkerboard index.
        x: usize,
        /// Site parity.
        parity: usize,
    },
    /// Ghost site received from a neighbor.
    Ghost {
        /// Dimension crossed.
        dim: usize,
        /// Neighbor the data came from.
        from: NeighborDir,
        /// Parity as seen by this rank.
        parity: usize,
        /// Ghost site index within the block.
        g: usize,
    },
}

/// Neighbor resolution for one field's geometry.
#[derive(Clone, Debug)]
pub struct Stencil {
    cb: Checkerboard,
    partitioned: [bool; N_DIM],
    n_face: usize,
}

impl Stencil {
    /// Stencil over the geometry and ghost zone of `field`.
    ///
    /// # Errors
    ///
    /// `OddCheckerboard` from the site geometry.
    pub fn for_field(field: &SpinorField<'_>) -> Result<Self> {
        let ghost = &field.layout().ghost;
        Ok(Self {
            cb: field.checkerboard()?,
            partitioned: std::array::from_fn(|d| ghost.is_active(d)),
            n_face: ghost.n_face,
        })
    }

    /// Resolve the site `hop` steps from `coords` along `d`.
    ///
    /// # Errors
    ///
    /// `FaceDeeperThanExtent` for a hop past the ghost depth of a
    /// partitioned dimension or longer than an unsplit extent.
    pub fn neighbor(&self, coords: &Coords, d: usize, hop: isize) -> Result<Neighbor> {
        let extent = self.cb.extent(d);
        let too_deep = || HaloError::FaceDeeperThanExtent {
            dim: d,
            extent,
            n_face: hop.unsigned_abs(),
        };
        let y = coords[d] as isize + hop;
        let mut c = *coords;
        if (0..extent as isize).contains(&y) {
            c[d] = y as usize;
        } else if !self.partitioned[d] {
            if hop.unsigned_abs() > extent {
                return Err(too_deep());
            }
            c[d] = y.rem_euclid(extent as isize) as usize;
        } else {
            let (from, k) = if y < 0 {
                (NeighborDir::Backward, y + self.n_face as isize)
            } else {
                (NeighborDir::Forward, y - extent as isize)
            };
            if !(0..self.n_face as isize).contains(&k) {
                return Err(too_deep());
            }
            let parity = (Checkerboard::parity_of(coords) + hop.unsigned_abs()) % 2;
            let face = self.cb.face_volume_cb(d);
            return Ok(Neighbor::Ghost {
                dim: d,
                from,
                parity,
                g: k as usize * face + self.cb.face_index(coords, d),
            });
        }
        let (x, parity) = self.cb.index(&c);
        Ok(Neighbor::Local { x, parity })
    }
}

/// Load the neighbor site `n` of `field` into `out`.
pub fn load_neighbor(field: &SpinorField<'_>, n: Neighbor, out: &mut [f64]) {
    match n {
        Neighbor::Local { x, parity } => field.load_site(parity, x, out),
        Neighbor::Ghost {
            dim,
            from,
            parity,
            g,
        } => field.load_ghost_site(parity, dim, from, g, out),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::comm::CommTopology;
    use crate::field::param::{Precision, SiteSubset};
    use crate::field::SpinorParam;

    fn stencil(grid: [usize; N_DIM]) -> Stencil {
        let p = SpinorParam::staggered(&[4, 4, 4, 6], Precision::Double, SiteSubset::Full);
        let f = SpinorField::new(&p, &CommTopology::new(grid, 0).expect("topology")).expect("field");
        Stencil::for_field(&f).expect("stencil")
    }

    #[test]
    fn interior_hops_stay_local() {
        let s = stencil([1, 1, 1, 2]);
        let c = [1, 2, 3, 2, 0];
        let n = s.neighbor(&c, 3, 1).expect("neighbor");
        let mut want = c;
        want[3] = 3;
        let (x, parity) = s.cb.index(&want);
        assert_eq!(n, Neighbor::Local { x, parity });
    }

    #[test]
    fn unsplit_dimensions_wrap() {
        let s = stencil([1, 1, 1, 2]);
        let c = [3, 0, 0, 0, 0];
        let n = s.neighbor(&c, 0, 1).expect("neighbor");
        let (x, parity) = s.cb.index(&[0, 0, 0, 0, 0]);
        assert_eq!(n, Neighbor::Local { x, parity });
    }

    #[test]
    fn hops_off_split_edges_land_in_ghost_slices() {
        let s = stencil([1, 1, 1, 2]);
        let c = [1, 0, 0, 5, 0];
        let face = s.cb.face_index(&c, 3);
        assert_eq!(
            s.neighbor(&c, 3, 3).expect("neighbor"),
            Neighbor::Ghost {
                dim: 3,
                from: NeighborDir::Forward,
                parity: 1,
                g: 2 * 32 + face,
            }
        );
        let c = [1, 0, 0, 0, 0];
        assert_eq!(
            s.neighbor(&c, 3, -1).expect("neighbor"),
            Neighbor::Ghost {
                dim: 3,
                from: NeighborDir::Backward,
                parity: 0,
                g: 2 * 32 + face,
            }
        );
        assert!(s.neighbor(&c, 3, -4).is_err());
    }
}
