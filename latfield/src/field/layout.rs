// SPDX-License-Identifier: AGPL-3.0-only

//! Derived layout of a spinor field.
//!
//! Computed once per construction or reset from a [`SpinorParam`] and the
//! partition mask. Pure arithmetic: nothing here allocates or touches
//! storage, and two computations from the same inputs are equal.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comm::NeighborDir;
use crate::error::{HaloError, Result};
use crate::lattice::constants::{align_up, MAX_DIM, N_DIM};

use super::ghost::GhostZone;
use super::param::{FieldLocation, Precision, SiteSubset, SpinorOrder, SpinorParam, TwistFlavor};

/// Bytes per norm entry.
pub const NORM_BYTES: usize = 4;

/// Sizes, strides and ghost offsets of one spinor field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinorLayout {
    /// Element precision.
    pub precision: Precision,
    /// Full or single parity.
    pub site_subset: SiteSubset,
    /// Internal order.
    pub order: SpinorOrder,
    /// Colors per site.
    pub n_color: usize,
    /// Spins per site.
    pub n_spin: usize,
    /// Sites described by the extents.
    pub volume: usize,
    /// Sites per parity.
    pub volume_cb: usize,
    /// Padded per-parity site count used in addressing.
    pub stride: usize,
    /// Reals per site.
    pub site_len: usize,
    /// FloatN vector width (1 for host orders).
    pub vec_width: usize,
    /// Reals in the padded body.
    pub length: usize,
    /// Reals in the unpadded body.
    pub real_length: usize,
    /// Ghost sizes and offsets.
    pub ghost: GhostZone,
    /// Reals including ghosts.
    pub total_length: usize,
    /// Norm entries including ghosts (0 unless half).
    pub total_norm_length: usize,
    /// Aligned allocation size of the data buffer.
    pub bytes: usize,
    /// Aligned allocation size of the norm buffer.
    pub norm_bytes: usize,
}

fn check_param(param: &SpinorParam) -> Result<()> {
    if param.n_dim == 0 || param.n_dim > MAX_DIM {
        return Err(HaloError::TooManyDimensions {
            n_dim: param.n_dim,
            max: MAX_DIM,
        });
    }
    if param.x.len() != param.n_dim {
        return Err(HaloError::Unsupported {
            what: "extent count",
            value: format!("{} extents for nDim = {}", param.x.len(), param.n_dim),
        });
    }
    if param.x.contains(&0) {
        return Err(HaloError::Unsupported {
            what: "zero extent",
            value: format!("{:?}", param.x),
        });
    }
    if param.n_spin != 1 && param.n_spin != 4 {
        return Err(HaloError::Unsupported {
            what: "spin count",
            value: param.n_spin.to_string(),
        });
    }
    if param.n_color == 0 {
        return Err(HaloError::Unsupported {
            what: "color count",
            value: "0".into(),
        });
    }
    if param.twist_flavor == TwistFlavor::Doublet && (param.n_dim != 5 || param.extent(4) != 2) {
        return Err(HaloError::FlavorExtent {
            twist: param.twist_flavor.to_string(),
            extent: if param.n_dim == 5 { param.extent(4) } else { 0 },
        });
    }
    match (param.location, param.field_order, param.precision) {
        (FieldLocation::Host, _, Precision::Half) => Err(HaloError::Unsupported {
            what: "host precision",
            value: Precision::Half.to_string(),
        }),
        (FieldLocation::Host, SpinorOrder::FloatN, _)
        | (FieldLocation::Device, SpinorOrder::SpaceSpinColor | SpinorOrder::SpaceColorSpin, _) => {
            Err(HaloError::Unsupported {
                what: "field order for location",
                value: format!("{} on {}", param.field_order, param.location),
            })
        }
        _ => Ok(()),
    }
}

impl SpinorLayout {
    /// Derive the layout of `param` given which dimensions are split.
    ///
    /// # Errors
    ///
    /// Configuration errors: dimensionality, spin/color counts, doublet
    /// depth, odd checkerboard, order/location/precision combination, ghost
    /// depth.
    pub fn compute(param: &SpinorParam, partition: &[bool; N_DIM]) -> Result<Self> {
        check_param(param)?;

        let volume: usize = param.x.iter().product();
        let volume_cb = match param.site_subset {
            SiteSubset::Full => {
                if volume % 2 != 0 {
                    return Err(HaloError::OddCheckerboard {
                        what: "volume",
                        value: volume,
                    });
                }
                if param.x[0] % 2 != 0 {
                    return Err(HaloError::OddCheckerboard {
                        what: "x[0]",
                        value: param.x[0],
                    });
                }
                volume / 2
            }
            SiteSubset::Parity => volume,
        };
        let stride = volume_cb + param.pad;
        let site_len = param.n_color * param.n_spin * 2;
        let length = match param.site_subset {
            SiteSubset::Full => 2 * stride * site_len,
            SiteSubset::Parity => stride * site_len,
        };
        let real_length = volume * site_len;

        let vec_width = match param.field_order {
            SpinorOrder::FloatN if param.precision != Precision::Double && site_len % 4 == 0 => 4,
            SpinorOrder::FloatN => 2,
            SpinorOrder::SpaceSpinColor | SpinorOrder::SpaceColorSpin => 1,
        };

        let ghost = GhostZone::compute(param, partition)?;

        let half = param.precision == Precision::Half;
        let (total_length, total_norm_length) = match param.site_subset {
            SiteSubset::Full => (
                length + 2 * ghost.ghost_length,
                if half {
                    2 * (stride + ghost.ghost_norm_length)
                } else {
                    0
                },
            ),
            SiteSubset::Parity => (
                length + ghost.ghost_length,
                if half {
                    stride + ghost.ghost_norm_length
                } else {
                    0
                },
            ),
        };

        let raw_bytes = total_length * param.precision.bytes();
        let raw_norm_bytes = total_norm_length * NORM_BYTES;
        let (bytes, norm_bytes) = match param.site_subset {
            SiteSubset::Full => (
                2 * align_up(raw_bytes / 2),
                2 * align_up(raw_norm_bytes / 2),
            ),
            SiteSubset::Parity => (align_up(raw_bytes), align_up(raw_norm_bytes)),
        };

        let layout = Self {
            precision: param.precision,
            site_subset: param.site_subset,
            order: param.field_order,
            n_color: param.n_color,
            n_spin: param.n_spin,
            volume,
            volume_cb,
            stride,
            site_len,
            vec_width,
            length,
            real_length,
            ghost,
            total_length,
            total_norm_length,
            bytes,
            norm_bytes,
        };
        debug!(
            volume,
            stride,
            total_length,
            bytes,
            norm_bytes,
            ghost_length = layout.ghost.ghost_length,
            "spinor layout"
        );
        Ok(layout)
    }

    /// Number of parity halves stored (2 for full, 1 for parity).
    #[must_use]
    pub const fn halves(&self) -> usize {
        match self.site_subset {
            SiteSubset::Full => 2,
            SiteSubset::Parity => 1,
        }
    }

    /// Elements in the data buffer.
    #[must_use]
    pub const fn elements(&self) -> usize {
        self.bytes / self.precision.bytes()
    }

    /// Entries in the norm buffer.
    #[must_use]
    pub const fn norm_elements(&self) -> usize {
        self.norm_bytes / NORM_BYTES
    }

    /// First element of parity half `half`.
    #[must_use]
    pub const fn half_base(&self, half: usize) -> usize {
        half * self.elements() / self.halves()
    }

    /// First norm entry of parity half `half`.
    #[must_use]
    pub const fn norm_half_base(&self, half: usize) -> usize {
        half * self.norm_elements() / self.halves()
    }

    /// Element holding internal index `i` of site `x` in half `half`.
    ///
    /// `i = (s · n_color + c) · 2 + z`.
    #[must_use]
    pub fn body_index(&self, half: usize, x: usize, i: usize) -> usize {
        let base = self.half_base(half);
        match self.order {
            SpinorOrder::FloatN => {
                let n = self.vec_width;
                base + ((i / n) * self.stride + x) * n + i % n
            }
            SpinorOrder::SpaceSpinColor => base + x * self.site_len + i,
            SpinorOrder::SpaceColorSpin => {
                let z = i % 2;
                let c = (i / 2) % self.n_color;
                let s = i / (2 * self.n_color);
                base + x * self.site_len + (c * self.n_spin + s) * 2 + z
            }
        }
    }

    /// Norm entry of site `x` in half `half`.
    #[must_use]
    pub const fn norm_index(&self, half: usize, x: usize) -> usize {
        self.norm_half_base(half) + x
    }

    /// First element of dimension `d`'s ghost region in half `half`.
    #[must_use]
    pub fn ghost_base(&self, half: usize, d: usize) -> usize {
        self.half_base(half) + (self.stride + self.ghost.ghost_offset[d]) * self.site_len
    }

    /// First norm entry of dimension `d`'s ghost norm region in half `half`.
    #[must_use]
    pub fn ghost_norm_base(&self, half: usize, d: usize) -> usize {
        self.norm_half_base(half) + self.stride + self.ghost.ghost_norm_offset[d]
    }

    /// Element of internal index `i` of ghost site `g`.
    #[must_use]
    pub fn ghost_index(&self, half: usize, d: usize, from: NeighborDir, g: usize, i: usize) -> usize {
        let n = self.ghost.vec_width(self.precision);
        self.ghost_base(half, d) + self.ghost.element_offset(d, from, g, i, n)
    }

    /// Norm entry of ghost site `g`.
    #[must_use]
    pub fn ghost_norm_index(&self, half: usize, d: usize, from: NeighborDir, g: usize) -> usize {
        self.ghost_norm_base(half, d) + self.ghost.norm_offset(d, from, g)
    }
}

impl fmt::Display for SpinorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "volume = {}", self.volume)?;
        writeln!(f, "volumeCB = {}", self.volume_cb)?;
        writeln!(f, "stride = {}", self.stride)?;
        writeln!(f, "length = {}", self.length)?;
        writeln!(f, "real_length = {}", self.real_length)?;
        writeln!(f, "ghost_length = {}", self.ghost.ghost_length)?;
        writeln!(f, "total_length = {}", self.total_length)?;
        writeln!(f, "ghost_norm_length = {}", self.ghost.ghost_norm_length)?;
        writeln!(f, "total_norm_length = {}", self.total_norm_length)?;
        writeln!(f, "bytes = {}", self.bytes)?;
        write!(f, "norm_bytes = {}", self.norm_bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const UNSPLIT: [bool; N_DIM] = [false; N_DIM];

    #[test]
    fn single_process_layout_has_no_ghosts() {
        let p = SpinorParam::wilson(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
        let l = SpinorLayout::compute(&p, &UNSPLIT).expect("layout");
        assert_eq!(l.volume, 256);
        assert_eq!(l.volume_cb, 128);
        assert_eq!(l.stride, 128);
        assert_eq!(l.length, 2 * 128 * 24);
        assert_eq!(l.total_length, l.length);
        assert_eq!(l.ghost.ghost_length, 0);
        assert_eq!(l.bytes % 2048, 0);
    }

    #[test]
    fn stride_includes_pad() {
        let mut p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Single, SiteSubset::Parity);
        p.pad = 16;
        let l = SpinorLayout::compute(&p, &UNSPLIT).expect("layout");
        assert_eq!(l.volume_cb, 256);
        assert_eq!(l.stride, 272);
        assert!(l.stride >= l.volume_cb);
        assert_eq!(l.real_length, 256 * 6);
    }

    #[test]
    fn recompute_is_deterministic() {
        let mut p = SpinorParam::wilson(&[6, 4, 2, 8], Precision::Half, SiteSubset::Full);
        p.pad = 24;
        let part = [false, true, false, true];
        let a = SpinorLayout::compute(&p, &part).expect("layout");
        let b = SpinorLayout::compute(&p, &part).expect("layout");
        assert_eq!(a, b);
    }

    #[test]
    fn full_field_halves_are_aligned() {
        let p = SpinorParam::staggered(&[4, 4, 4, 6], Precision::Half, SiteSubset::Full);
        let l = SpinorLayout::compute(&p, &[false, false, false, true]).expect("layout");
        assert_eq!((l.bytes / 2) % 1024, 0);
        assert_eq!((l.norm_bytes / 2) % 1024, 0);
        assert_eq!(l.total_norm_length, 2 * (l.stride + l.ghost.ghost_norm_length));
        assert!(l.half_base(1) >= l.length / 2 + l.ghost.ghost_length);
    }

    #[test]
    fn too_many_dimensions_is_fatal() {
        let mut p = SpinorParam::wilson(&[2, 2, 2, 2], Precision::Double, SiteSubset::Full);
        p.n_dim = 6;
        p.x = vec![2; 6];
        assert!(matches!(
            SpinorLayout::compute(&p, &UNSPLIT),
            Err(HaloError::TooManyDimensions { n_dim: 6, .. })
        ));
    }

    #[test]
    fn doublet_needs_depth_two() {
        let mut p = SpinorParam::wilson(&[4, 4, 4, 4, 3], Precision::Double, SiteSubset::Full);
        p.twist_flavor = TwistFlavor::Doublet;
        assert!(matches!(
            SpinorLayout::compute(&p, &UNSPLIT),
            Err(HaloError::FlavorExtent { extent: 3, .. })
        ));
        p.x[4] = 2;
        assert!(SpinorLayout::compute(&p, &UNSPLIT).is_ok());
    }

    #[test]
    fn split_dimension_with_odd_face_is_rejected() {
        let p = SpinorParam::staggered(&[4, 3, 3, 3], Precision::Double, SiteSubset::Full);
        assert!(matches!(
            SpinorLayout::compute(&p, &[true, false, false, false]),
            Err(HaloError::OddCheckerboard { value: 3, .. })
        ));
        // parity field: the fastest face extent is twice the stored x[0]
        let q = SpinorParam::staggered(&[3, 4, 4, 4], Precision::Double, SiteSubset::Parity);
        assert!(SpinorLayout::compute(&q, &[false, false, false, true]).is_ok());
    }

    #[test]
    fn host_half_is_rejected() {
        let mut p = SpinorParam::wilson(&[4, 4, 4, 4], Precision::Half, SiteSubset::Full);
        p.location = FieldLocation::Host;
        p.field_order = SpinorOrder::SpaceSpinColor;
        assert!(matches!(
            SpinorLayout::compute(&p, &UNSPLIT),
            Err(HaloError::Unsupported { what: "host precision", .. })
        ));
    }

    #[test]
    fn float_n_index_strides_vectors() {
        let p = SpinorParam::wilson(&[4, 4, 4, 4], Precision::Single, SiteSubset::Parity);
        let l = SpinorLayout::compute(&p, &UNSPLIT).expect("layout");
        assert_eq!(l.vec_width, 4);
        assert_eq!(l.body_index(0, 5, 0), 20);
        assert_eq!(l.body_index(0, 5, 3), 23);
        assert_eq!(l.body_index(0, 5, 4), (l.stride + 5) * 4);
    }

    #[test]
    fn host_orders_permute_spin_and_color() {
        let mut p = SpinorParam::wilson(&[4, 4, 4, 4], Precision::Double, SiteSubset::Parity);
        p.location = FieldLocation::Host;
        p.field_order = SpinorOrder::SpaceColorSpin;
        let l = SpinorLayout::compute(&p, &UNSPLIT).expect("layout");
        // spin 1, color 2, imaginary part
        let i = (3 + 2) * 2 + 1;
        assert_eq!(l.body_index(0, 2, i), 2 * 24 + (2 * 4 + 1) * 2 + 1);
    }

    #[test]
    fn ghost_region_starts_after_padded_body() {
        let mut p = SpinorParam::staggered(&[4, 4, 4, 6], Precision::Double, SiteSubset::Parity);
        p.pad = 8;
        let l = SpinorLayout::compute(&p, &[false, false, true, true]).expect("layout");
        assert_eq!(l.ghost_base(0, 2), l.stride * 6);
        assert_eq!(l.ghost_base(0, 3), (l.stride + 6 * l.ghost.ghost_face[2]) * 6);
    }
}
