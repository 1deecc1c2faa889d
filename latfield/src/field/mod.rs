// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice fields: descriptors, derived layouts and storage.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `param` | Configuration enums and the spinor descriptor |
//! | `geometry` | Checkerboard and face-site indexing |
//! | `ghost` | Ghost-zone sizing for partitioned dimensions |
//! | `layout` | Derived spinor layout (strides, offsets, bytes) |
//! | `half` | Fixed-point quantisation with per-site norms |
//! | `spinor` | Spinor field container and lifecycle |
//! | `gauge` | Gauge fields in every order |
//! | `blas` | Checked field arithmetic over real sites |

use crate::error::{HaloError, Result};

/// Field arithmetic.
pub mod blas;
/// Gauge field storage.
pub mod gauge;
/// Site indexing.
pub mod geometry;
/// Ghost-zone sizing.
pub mod ghost;
/// Half-precision quantisation.
pub mod half;
/// Spinor layout.
pub mod layout;
/// Field descriptors.
pub mod param;
/// Spinor field container.
pub mod spinor;

pub use gauge::{GaugeField, GaugeParam, LinkGeometry, TBoundary};
pub use geometry::{Checkerboard, Coords};
pub use ghost::GhostZone;
pub use layout::SpinorLayout;
pub use param::{
    FieldLocation, GammaBasis, Precision, SiteOrder, SiteSubset, SpinorOrder, SpinorParam,
    SpinorParamUpdate, TwistFlavor,
};
pub use spinor::{SpinorField, SpinorStorage};

/// Zeroed buffer of `n` elements, failing instead of aborting when the
/// allocator refuses.
pub(crate) fn alloc_zeroed<T: Default + Clone>(what: &'static str, n: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| HaloError::Allocation {
        what,
        bytes: n.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(n, T::default());
    Ok(v)
}
