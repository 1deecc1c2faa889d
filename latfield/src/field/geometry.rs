// SPDX-License-Identifier: AGPL-3.0-only

//! Checkerboard site indexing.
//!
//! Sites are numbered lexicographically with `x[0]` fastest. The
//! checkerboard index of a site is its lexicographic index halved and its
//! parity is the coordinate sum modulo 2, so `lex = 2·x_cb + bit` where
//! `bit` is fixed by the parity. This needs `x[0]` even.
//!
//! Face sites of dimension `d` are numbered by the lexicographic index over
//! the remaining dimensions (fastest first) halved. For one slice and one
//! parity that is a bijection onto `0..face_volume/2` as long as the fastest
//! remaining extent is even.

use crate::error::{HaloError, Result};
use crate::lattice::constants::MAX_DIM;

/// Site coordinates, unused dimensions 0.
pub type Coords = [usize; MAX_DIM];

/// Full (non-checkerboarded) local extents with index helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkerboard {
    dims: [usize; MAX_DIM],
    n_dim: usize,
}

impl Checkerboard {
    /// Geometry of a lattice with full extents `x`.
    ///
    /// # Errors
    ///
    /// `TooManyDimensions` for more than `MAX_DIM` extents,
    /// `OddCheckerboard` when `x[0]` is odd.
    pub fn new(x: &[usize]) -> Result<Self> {
        if x.is_empty() || x.len() > MAX_DIM {
            return Err(HaloError::TooManyDimensions {
                n_dim: x.len(),
                max: MAX_DIM,
            });
        }
        if x[0] % 2 != 0 {
            return Err(HaloError::OddCheckerboard {
                what: "x[0]",
                value: x[0],
            });
        }
        let mut dims = [1; MAX_DIM];
        dims[..x.len()].copy_from_slice(x);
        Ok(Self {
            dims,
            n_dim: x.len(),
        })
    }

    /// Number of dimensions.
    #[must_use]
    pub const fn n_dim(&self) -> usize {
        self.n_dim
    }

    /// Extent of dimension `d` (1 beyond `n_dim`).
    #[must_use]
    pub const fn extent(&self, d: usize) -> usize {
        self.dims[d]
    }

    /// All extents.
    #[must_use]
    pub const fn dims(&self) -> &[usize; MAX_DIM] {
        &self.dims
    }

    /// Total sites.
    #[must_use]
    pub fn volume(&self) -> usize {
        self.dims.iter().product()
    }

    /// Sites per parity.
    #[must_use]
    pub fn volume_cb(&self) -> usize {
        self.volume() / 2
    }

    /// Parity of a coordinate tuple.
    #[must_use]
    pub fn parity_of(coords: &Coords) -> usize {
        coords.iter().sum::<usize>() % 2
    }

    fn lex(&self, coords: &Coords) -> usize {
        let mut idx = 0;
        for d in (0..self.n_dim).rev() {
            idx = idx * self.dims[d] + coords[d];
        }
        idx
    }

    fn from_lex(&self, mut lex: usize) -> Coords {
        let mut c = [0; MAX_DIM];
        for d in 0..self.n_dim {
            c[d] = lex % self.dims[d];
            lex /= self.dims[d];
        }
        c
    }

    /// `(x_cb, parity)` of a site.
    #[must_use]
    pub fn index(&self, coords: &Coords) -> (usize, usize) {
        (self.lex(coords) / 2, Self::parity_of(coords))
    }

    /// Coordinates of checkerboard site `x_cb` of `parity`.
    #[must_use]
    pub fn coords(&self, x_cb: usize, parity: usize) -> Coords {
        let mut c = self.from_lex(2 * x_cb);
        if Self::parity_of(&c) != parity {
            c[0] += 1;
        }
        c
    }

    /// Sites in one slice of dimension `d` (product of the other extents).
    #[must_use]
    pub fn face_volume(&self, d: usize) -> usize {
        self.volume() / self.dims[d]
    }

    /// Sites of one parity in one slice of dimension `d`.
    #[must_use]
    pub fn face_volume_cb(&self, d: usize) -> usize {
        self.face_volume(d) / 2
    }

    fn fastest_other(&self, d: usize) -> usize {
        if d == 0 {
            1
        } else {
            0
        }
    }

    /// Check that faces of `d` can be checkerboarded.
    ///
    /// # Errors
    ///
    /// `OddCheckerboard` when the fastest remaining extent is odd.
    pub fn check_face(&self, d: usize) -> Result<()> {
        let f = self.fastest_other(d);
        if self.dims[f] % 2 != 0 {
            return Err(HaloError::OddCheckerboard {
                what: "fastest face extent",
                value: self.dims[f],
            });
        }
        Ok(())
    }

    /// Face index of a site in dimension `d` (its coordinate along `d` ignored).
    #[must_use]
    pub fn face_index(&self, coords: &Coords, d: usize) -> usize {
        let mut idx = 0;
        for k in (0..self.n_dim).rev().filter(|&k| k != d) {
            idx = idx * self.dims[k] + coords[k];
        }
        idx / 2
    }

    fn face_lex_coords(&self, d: usize, slice: usize, mut lex: usize) -> Coords {
        let mut c = [0; MAX_DIM];
        for k in (0..self.n_dim).filter(|&k| k != d) {
            c[k] = lex % self.dims[k];
            lex /= self.dims[k];
        }
        c[d] = slice;
        c
    }

    /// Coordinates of face site `face_cb` of `parity` in slice `slice` of `d`.
    #[must_use]
    pub fn face_coords(&self, d: usize, slice: usize, face_cb: usize, parity: usize) -> Coords {
        let mut c = self.face_lex_coords(d, slice, 2 * face_cb);
        if Self::parity_of(&c) != parity {
            c[self.fastest_other(d)] += 1;
        }
        c
    }

    /// Checkerboard indices of the `parity` sites in slice `slice` of `d`,
    /// ordered by face index.
    #[must_use]
    pub fn face_sites(&self, d: usize, slice: usize, parity: usize) -> Vec<usize> {
        (0..self.face_volume_cb(d))
            .map(|f| self.index(&self.face_coords(d, slice, f, parity)).0)
            .collect()
    }
}
