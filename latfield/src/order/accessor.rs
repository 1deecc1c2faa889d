// SPDX-License-Identifier: AGPL-3.0-only

//! FloatN fetch strategies.
//!
//! Device kernels either read element by element or fetch whole N-wide
//! vectors through the texture path. Both satisfy the same load contract and
//! differ only in access pattern, so the strategy is a runtime choice on the
//! gauge descriptor.

use serde::{Deserialize, Serialize};

use super::index::FloatN;
use super::real::StorageReal;

/// How FloatN links are read from storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessPath {
    /// One element at a time.
    #[default]
    Direct,
    /// Whole N-wide vectors.
    Texture,
}

/// Element-at-a-time reads.
#[derive(Clone, Copy, Debug)]
pub struct DirectAccess;

/// Vector-at-a-time reads.
#[derive(Clone, Copy, Debug)]
pub struct TexAccess;

/// Read the `out.len()` stored reals of the link at `(dir, x)` from a
/// parity half starting at `base`.
pub trait LinkFetch {
    /// Fill `out` in register order.
    fn fetch<T: StorageReal>(&self, buf: &[T], base: usize, idx: &FloatN, dir: usize, x: usize, out: &mut [f64]);
}

impl LinkFetch for DirectAccess {
    fn fetch<T: StorageReal>(&self, buf: &[T], base: usize, idx: &FloatN, dir: usize, x: usize, out: &mut [f64]) {
        for (i, o) in out.iter_mut().enumerate() {
            *o = buf[base + idx.element(dir, x, i)].to_reg();
        }
    }
}

impl LinkFetch for TexAccess {
    fn fetch<T: StorageReal>(&self, buf: &[T], base: usize, idx: &FloatN, dir: usize, x: usize, out: &mut [f64]) {
        for (k, chunk) in out.chunks_mut(idx.n).enumerate() {
            let start = base + idx.vector(dir, x, k);
            for (o, v) in chunk.iter_mut().zip(&buf[start..start + idx.n]) {
                *o = v.to_reg();
            }
        }
    }
}

impl AccessPath {
    /// Dispatch to the selected strategy.
    pub fn fetch<T: StorageReal>(self, buf: &[T], base: usize, idx: &FloatN, dir: usize, x: usize, out: &mut [f64]) {
        match self {
            Self::Direct => DirectAccess.fetch(buf, base, idx, dir, x, out),
            Self::Texture => TexAccess.fetch(buf, base, idx, dir, x, out),
        }
    }
}
