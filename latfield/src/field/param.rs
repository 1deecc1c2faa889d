// SPDX-License-Identifier: AGPL-3.0-only

//! Field descriptor enums and the spinor-field parameter block.
//!
//! These are the externally visible configuration surface: a physics driver
//! builds a [`SpinorParam`], the layout is derived from it once, and
//! [`SpinorParamUpdate`] carries the partial overrides accepted by `reset`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lattice::constants::MAX_DIM;

/// Storage precision of field elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    /// 64-bit floats.
    Double,
    /// 32-bit floats.
    Single,
    /// 16-bit fixed point with a per-site f32 norm.
    Half,
}

impl Precision {
    /// Bytes per stored element.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Double => 8,
            Self::Single => 4,
            Self::Half => 2,
        }
    }

    /// Whether this precision carries a norm array.
    #[must_use]
    pub const fn has_norm(self) -> bool {
        matches!(self, Self::Half)
    }
}

/// Which checkerboard sublattices a field holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteSubset {
    /// Both parities, stored as two aligned halves.
    Full,
    /// One parity only.
    Parity,
}

/// Order of the parity halves within a full field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteOrder {
    /// Even sites first.
    EvenOdd,
    /// Odd sites first.
    OddEven,
    /// Lexicographic (host interchange only).
    Lexicographic,
}

/// In-memory order of a spinor site's internal degrees of freedom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpinorOrder {
    /// Device order: N-wide vectors strided by `stride`.
    FloatN,
    /// Host order: site-major, then spin, color, complex.
    SpaceSpinColor,
    /// Host order: site-major, then color, spin, complex.
    SpaceColorSpin,
}

/// Dirac matrix basis the spin components are expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GammaBasis {
    /// DeGrand-Rossi (host interchange).
    DegrandRossi,
    /// Non-relativistic UKQCD basis used by the device kernels.
    Ukqcd,
    /// Chiral basis.
    Chiral,
}

/// Twisted-mass flavor structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TwistFlavor {
    /// Not a twisted-mass field.
    NoTwist,
    /// Single flavor, positive twist.
    Plus,
    /// Single flavor, negative twist.
    Minus,
    /// Two-flavor doublet in a depth-2 fifth dimension.
    Doublet,
}

/// Where a field's storage lives.
///
/// Replaces the host/device subclass split: both share one layout module
/// and differ only in admissible orders and precisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldLocation {
    /// Host memory, legacy site-major orders.
    Host,
    /// Device memory, FloatN order.
    Device,
}

macro_rules! display_via_debug {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        })*
    };
}

display_via_debug!(
    Precision,
    SiteSubset,
    SiteOrder,
    SpinorOrder,
    GammaBasis,
    TwistFlavor,
    FieldLocation
);

/// Complete descriptor of a spinor field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpinorParam {
    /// Number of dimensions in `x`.
    pub n_dim: usize,
    /// Local extents; for a parity field `x[0]` is the checkerboarded extent.
    pub x: Vec<usize>,
    /// Colors per site.
    pub n_color: usize,
    /// Spins per site (1 staggered, 4 Wilson-like).
    pub n_spin: usize,
    /// Twisted-mass flavor structure.
    pub twist_flavor: TwistFlavor,
    /// Element precision.
    pub precision: Precision,
    /// Extra sites appended to each parity's body.
    pub pad: usize,
    /// Full or single-parity field.
    pub site_subset: SiteSubset,
    /// Parity ordering of a full field.
    pub site_order: SiteOrder,
    /// Internal degree-of-freedom order.
    pub field_order: SpinorOrder,
    /// Dirac basis.
    pub gamma_basis: GammaBasis,
    /// Host or device storage.
    pub location: FieldLocation,
}

impl SpinorParam {
    /// Device staggered (spin-1) field in FloatN order.
    #[must_use]
    pub fn staggered(x: &[usize], precision: Precision, site_subset: SiteSubset) -> Self {
        Self {
            n_dim: x.len(),
            x: x.to_vec(),
            n_color: 3,
            n_spin: 1,
            twist_flavor: TwistFlavor::NoTwist,
            precision,
            pad: 0,
            site_subset,
            site_order: SiteOrder::EvenOdd,
            field_order: SpinorOrder::FloatN,
            gamma_basis: GammaBasis::Ukqcd,
            location: FieldLocation::Device,
        }
    }

    /// Device Wilson-like (spin-4) field in FloatN order.
    #[must_use]
    pub fn wilson(x: &[usize], precision: Precision, site_subset: SiteSubset) -> Self {
        Self {
            n_spin: 4,
            ..Self::staggered(x, precision, site_subset)
        }
    }

    /// Extent of dimension `d`, 1 beyond `n_dim`.
    #[must_use]
    pub fn extent(&self, d: usize) -> usize {
        if d < self.n_dim {
            self.x.get(d).copied().unwrap_or(1)
        } else {
            1
        }
    }

    /// Extents padded with 1 to `MAX_DIM` entries.
    #[must_use]
    pub fn extents(&self) -> [usize; MAX_DIM] {
        std::array::from_fn(|d| self.extent(d))
    }
}

/// Partial descriptor for `reset`: only `Some` members override.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpinorParamUpdate {
    /// New dimensionality.
    pub n_dim: Option<usize>,
    /// New extents (replaces all of them).
    pub x: Option<Vec<usize>>,
    /// New color count.
    pub n_color: Option<usize>,
    /// New spin count.
    pub n_spin: Option<usize>,
    /// New twist flavor.
    pub twist_flavor: Option<TwistFlavor>,
    /// New precision.
    pub precision: Option<Precision>,
    /// New pad.
    pub pad: Option<usize>,
    /// New site subset.
    pub site_subset: Option<SiteSubset>,
    /// New site order.
    pub site_order: Option<SiteOrder>,
    /// New internal order.
    pub field_order: Option<SpinorOrder>,
    /// New Dirac basis.
    pub gamma_basis: Option<GammaBasis>,
}

impl SpinorParamUpdate {
    /// Apply the set members on top of `base`.
    #[must_use]
    pub fn merged_onto(&self, base: &SpinorParam) -> SpinorParam {
        let mut p = base.clone();
        if let Some(n) = self.n_dim {
            p.n_dim = n;
        }
        if let Some(x) = &self.x {
            p.x.clone_from(x);
        }
        if let Some(v) = self.n_color {
            p.n_color = v;
        }
        if let Some(v) = self.n_spin {
            p.n_spin = v;
        }
        if let Some(v) = self.twist_flavor {
            p.twist_flavor = v;
        }
        if let Some(v) = self.precision {
            p.precision = v;
        }
        if let Some(v) = self.pad {
            p.pad = v;
        }
        if let Some(v) = self.site_subset {
            p.site_subset = v;
        }
        if let Some(v) = self.site_order {
            p.site_order = v;
        }
        if let Some(v) = self.field_order {
            p.field_order = v;
        }
        if let Some(v) = self.gamma_basis {
            p.gamma_basis = v;
        }
        p
    }
}
