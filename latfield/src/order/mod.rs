// SPDX-License-Identifier: AGPL-3.0-only

//! Gauge-field memory layout strategies.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `index` | Pure element-placement formulas, one per order |
//! | `reconstruct` | 18/12/13/8/9 link codecs |
//! | `accessor` | Direct vs texture FloatN fetch |
//! | `real` | The closed set of storage element types |
//!
//! The combination space is closed: an order tag, a reconstruction tag and a
//! [`real::StorageReal`] element type. `GaugeField<T>` validates the tag pair
//! once at construction and dispatches on it per access.

use serde::{Deserialize, Serialize};

use crate::lattice::constants::LINK_REALS;

/// FloatN fetch strategies.
pub mod accessor;
/// Element placement per order.
pub mod index;
/// Storage element types.
pub mod real;
/// Link reconstruction codecs.
pub mod reconstruct;

pub use accessor::AccessPath;
pub use reconstruct::{Codec, Reconstruct};

/// A link in register form: 3×3 complex, row-major, re/im interleaved.
pub type Link = [f64; LINK_REALS];

/// Flattening of a gauge field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GaugeFieldOrder {
    /// Device order with optional reconstruction.
    FloatN,
    /// One array per direction.
    Qdp,
    /// Site-major, directions innermost.
    Milc,
    /// MILC ordering, transposed, anisotropy folded in.
    Cps,
    /// Halo-extended planes, transposed.
    Bqcd,
}

impl GaugeFieldOrder {
    /// Whether this is an external interchange order.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        !matches!(self, Self::FloatN)
    }
}

impl std::fmt::Display for GaugeFieldOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Load/store contract every gauge layout satisfies.
///
/// `x` is the checkerboard site index, `dir` the link direction. Ghost
/// accessors address the ghost region of dimension `dir` with `x` a ghost
/// face index.
pub trait GaugeOrder {
    /// Link at `(x, dir, parity)` in register form.
    fn load(&self, x: usize, dir: usize, parity: usize) -> Link;

    /// Store `link` at `(x, dir, parity)`.
    fn save(&mut self, link: &Link, x: usize, dir: usize, parity: usize);

    /// Ghost link `x` of dimension `dir`.
    fn load_ghost(&self, x: usize, dir: usize, parity: usize) -> Link;

    /// Store ghost link `x` of dimension `dir`.
    fn save_ghost(&mut self, link: &Link, x: usize, dir: usize, parity: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_float_n_is_native() {
        assert!(!GaugeFieldOrder::FloatN.is_legacy());
        for o in [
            GaugeFieldOrder::Qdp,
            GaugeFieldOrder::Milc,
            GaugeFieldOrder::Cps,
            GaugeFieldOrder::Bqcd,
        ] {
            assert!(o.is_legacy(), "{o}");
        }
    }
}
