// SPDX-License-Identifier: AGPL-3.0-only

//! Element placement for each gauge order.
//!
//! These are wire-format contracts: external codes read and write the
//! legacy orders directly, so every formula reproduces their flattening
//! exactly. Register element `r = 2·(3·row + col) + z`; the transposed orders
//! (CPS, BQCD) store `(col, row)` where the register holds `(row, col)`.

use crate::lattice::constants::{LINK_REALS, N_COLORS, N_DIM};

/// Split a register index into `(row, col, z)`.
#[inline]
#[must_use]
pub const fn split(r: usize) -> (usize, usize, usize) {
    (r / (2 * N_COLORS), (r / 2) % N_COLORS, r % 2)
}

/// QDP: one plane per direction, offset within plane `dir`.
#[inline]
#[must_use]
pub const fn qdp(x: usize, parity: usize, volume_cb: usize, r: usize) -> usize {
    (parity * volume_cb + x) * LINK_REALS + r
}

/// MILC: site-major with directions innermost.
#[inline]
#[must_use]
pub const fn milc(x: usize, dir: usize, parity: usize, volume_cb: usize, geometry: usize, r: usize) -> usize {
    ((parity * volume_cb + x) * geometry + dir) * LINK_REALS + r
}

/// CPS: MILC site ordering with each matrix transposed.
#[inline]
#[must_use]
pub const fn cps(x: usize, dir: usize, parity: usize, volume_cb: usize, geometry: usize, r: usize) -> usize {
    let (row, col, z) = split(r);
    ((((parity * volume_cb + x) * geometry + dir) * N_COLORS + col) * N_COLORS + row) * 2 + z
}

/// BQCD: direction and parity outermost over the halo-extended volume,
/// transposed.
#[inline]
#[must_use]
pub const fn bqcd(x: usize, dir: usize, parity: usize, ex_volume_cb: usize, r: usize) -> usize {
    let (row, col, z) = split(r);
    ((((dir * 2 + parity) * ex_volume_cb + x) * N_COLORS + col) * N_COLORS + row) * 2 + z
}

/// Checkerboarded volume of the BQCD halo-extended lattice.
#[must_use]
pub fn bqcd_ex_volume_cb(x: &[usize; N_DIM]) -> usize {
    (x[0] / 2 + 2) * (x[1] + 2) * (x[2] + 2) * (x[3] + 2)
}

/// Legacy ghost arrays: `ghost[dir]`, parity-major over `face_volume_cb`.
#[inline]
#[must_use]
pub const fn legacy_ghost(x: usize, parity: usize, face_volume_cb: usize, r: usize) -> usize {
    (parity * face_volume_cb + x) * LINK_REALS + r
}

/// FloatN placement within one parity half.
///
/// Each direction owns `stride · (len + phase)` elements: `len / n`
/// vectors of width `n` strided by `stride`, then one phase per site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloatN {
    /// Vector width.
    pub n: usize,
    /// Stored reals per link.
    pub len: usize,
    /// Sites between successive vectors of one link.
    pub stride: usize,
    /// Whether a phase slot follows the vectors.
    pub phase: bool,
}

impl FloatN {
    /// Elements per direction.
    #[must_use]
    pub const fn dir_block(&self) -> usize {
        self.stride * (self.len + self.phase as usize)
    }

    /// Elements in one parity half before alignment.
    #[must_use]
    pub const fn half_len(&self, geometry: usize) -> usize {
        geometry * self.dir_block()
    }

    /// Start of vector `k` of the link at `(dir, x)`.
    #[inline]
    #[must_use]
    pub const fn vector(&self, dir: usize, x: usize, k: usize) -> usize {
        dir * self.dir_block() + (k * self.stride + x) * self.n
    }

    /// Stored real `i` of the link at `(dir, x)`.
    #[inline]
    #[must_use]
    pub const fn element(&self, dir: usize, x: usize, i: usize) -> usize {
        self.vector(dir, x, i / self.n) + i % self.n
    }

    /// Phase slot of the link at `(dir, x)`.
    #[inline]
    #[must_use]
    pub const fn phase(&self, dir: usize, x: usize) -> usize {
        dir * self.dir_block() + self.stride * self.len + x
    }
}
