// SPDX-License-Identifier: AGPL-3.0-only

//! Ghost-zone packing and unpacking for spinor fields.
//!
//! A message toward neighbor `send` along `d` holds the sender's `n_face`
//! boundary slices on that side, already in the receiver's ghost-block
//! layout and storage precision, so unpacking is a straight copy. Full
//! fields send `[parity 0][parity 1]` blocks labelled by the receiver's
//! parity; half-precision messages carry a parallel buffer of one f32 norm
//! per ghost site.
//!
//! Parity swap: a ghost site sits `X_d` coordinates away from its source,
//! so for odd `X_d` the receiver's parity-`q` block comes from sender
//! parity `q ^ 1`. A single-parity field cannot honour that and is rejected.

use serde::{Deserialize, Serialize};

use crate::comm::NeighborDir;
use crate::error::{HaloError, Result};
use crate::field::half::{inverse_norm, site_norm};
use crate::field::layout::{SpinorLayout, NORM_BYTES};
use crate::field::param::{Precision, SiteSubset};
use crate::field::SpinorField;
use crate::order::real::{put_bytes, StorageReal};

use super::project::{projection_sign, spin_project};

/// Sites and projector carried by one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GhostSelection {
    /// The single parity held by a Parity field.
    Parity {
        /// Parity held by the field.
        parity: usize,
        /// Use the daggered projectors.
        dagger: bool,
    },
    /// Both parities of a Full field.
    Full {
        /// Use the daggered projectors.
        dagger: bool,
    },
}

impl GhostSelection {
    /// Whether the daggered projectors apply.
    #[must_use]
    pub const fn dagger(self) -> bool {
        match self {
            Self::Parity { dagger, .. } | Self::Full { dagger } => dagger,
        }
    }

    /// Parity tag for site access (Full fields ignore it).
    #[must_use]
    pub const fn parity(self) -> usize {
        match self {
            Self::Parity { parity, .. } => parity,
            Self::Full { .. } => 0,
        }
    }

    const fn subset(self) -> SiteSubset {
        match self {
            Self::Parity { .. } => SiteSubset::Parity,
            Self::Full { .. } => SiteSubset::Full,
        }
    }
}

/// Bytes of data and of norms in one message along `d`.
#[must_use]
pub fn message_bytes(layout: &SpinorLayout, d: usize) -> (usize, usize) {
    let g = &layout.ghost;
    let data = layout.halves() * g.block_reals(d) * layout.precision.bytes();
    let norm = if layout.precision.has_norm() {
        layout.halves() * g.block_sites(d) * NORM_BYTES
    } else {
        0
    };
    (data, norm)
}

fn check_buffers(layout: &SpinorLayout, d: usize, data: usize, norm: Option<usize>) -> Result<()> {
    let (need, need_norm) = message_bytes(layout, d);
    if data < need {
        return Err(HaloError::BufferTooSmall {
            what: "ghost message",
            need,
            have: data,
        });
    }
    let have_norm = norm.unwrap_or(0);
    if have_norm < need_norm {
        return Err(HaloError::BufferTooSmall {
            what: "ghost norm message",
            need: need_norm,
            have: have_norm,
        });
    }
    Ok(())
}

fn check_dim(field: &SpinorField<'_>, d: usize) -> Result<()> {
    if !field.layout().ghost.is_active(d) {
        return Err(HaloError::NotPartitioned { dim: d });
    }
    Ok(())
}

/// Store one site's reals at ghost site `g` of a message block.
fn put_site<T: StorageReal>(
    layout: &SpinorLayout,
    d: usize,
    block: &mut [u8],
    g: usize,
    values: &[f64],
    scale: f64,
) {
    let ghost = &layout.ghost;
    let n = ghost.vec_width(layout.precision);
    for (i, &v) in values.iter().enumerate() {
        put_bytes(block, ghost.block_offset(d, g, i, n), T::from_reg(v * scale));
    }
}

/// Pack the boundary slices of `field` bound for the neighbor in `send`
/// along `d` into `data` (and `norm` for half precision).
///
/// # Errors
///
/// `NotPartitioned`, `UnsupportedSiteSubset` when `selection` does not match
/// the field, `OddExtentParityField`, or `BufferTooSmall`.
pub fn pack_ghost(
    field: &SpinorField<'_>,
    d: usize,
    send: NeighborDir,
    selection: GhostSelection,
    data: &mut [u8],
    mut norm: Option<&mut [u8]>,
) -> Result<()> {
    check_dim(field, d)?;
    let layout = field.layout();
    if selection.subset() != layout.site_subset {
        return Err(HaloError::UnsupportedSiteSubset {
            call: "pack_ghost",
            subset: layout.site_subset.to_string(),
        });
    }
    check_buffers(layout, d, data.len(), norm.as_deref().map(<[u8]>::len))?;

    let cb = field.checkerboard()?;
    let extent = cb.extent(d);
    let odd = extent % 2;
    if odd == 1 && layout.site_subset == SiteSubset::Parity {
        return Err(HaloError::OddExtentParityField { dim: d, extent });
    }

    let ghost = &layout.ghost;
    let gf = ghost.ghost_face[d];
    let block_bytes = ghost.block_reals(d) * layout.precision.bytes();
    let block_norm_bytes = ghost.block_sites(d) * NORM_BYTES;
    let projected = layout.n_spin == 4;
    let sign = projection_sign(send, selection.dagger());

    let mut site = vec![0.0; layout.site_len];
    let mut half = vec![0.0; ghost.ghost_site_len];

    for (b, q) in field.held_parities(selection.parity()).enumerate() {
        let s = q ^ odd;
        let block = &mut data[b * block_bytes..(b + 1) * block_bytes];
        for k in 0..ghost.n_face {
            let slice = match send {
                NeighborDir::Forward => extent - ghost.n_face + k,
                NeighborDir::Backward => k,
            };
            for face_cb in 0..gf {
                let (x, _) = cb.index(&cb.face_coords(d, slice, face_cb, s));
                field.load_site(s, x, &mut site);
                let values: &[f64] = if projected {
                    spin_project(d, sign, &site, &mut half);
                    &half
                } else {
                    &site
                };
                let g = k * gf + face_cb;
                match layout.precision {
                    Precision::Double => put_site::<f64>(layout, d, block, g, values, 1.0),
                    Precision::Single => put_site::<f32>(layout, d, block, g, values, 1.0),
                    Precision::Half => {
                        let n = site_norm(values);
                        put_site::<i16>(layout, d, block, g, values, inverse_norm(n));
                        if let Some(nb) = norm.as_deref_mut() {
                            let nb = &mut nb[b * block_norm_bytes..(b + 1) * block_norm_bytes];
                            put_bytes(nb, g, n);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Copy a message received `from` along `d` into the field's ghost blocks.
///
/// # Errors
///
/// `NotPartitioned` or `BufferTooSmall`.
pub fn unpack_ghost(
    field: &mut SpinorField<'_>,
    d: usize,
    from: NeighborDir,
    data: &[u8],
    norm: Option<&[u8]>,
) -> Result<()> {
    check_dim(field, d)?;
    let layout = field.layout();
    check_buffers(layout, d, data.len(), norm.map(<[u8]>::len))?;
    let block_bytes = layout.ghost.block_reals(d) * layout.precision.bytes();
    let block_norm_bytes = layout.ghost.block_sites(d) * NORM_BYTES;

    for b in 0..layout.halves() {
        let (dst, dst_norm) = field.ghost_block_bytes_mut(b, d, from);
        dst.copy_from_slice(&data[b * block_bytes..(b + 1) * block_bytes]);
        if let (Some(dst_norm), Some(src)) = (dst_norm, norm) {
            dst_norm.copy_from_slice(&src[b * block_norm_bytes..(b + 1) * block_norm_bytes]);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::comm::CommTopology;
    use crate::field::geometry::Checkerboard;
    use crate::field::half::quantization_step;
    use crate::field::SpinorParam;

    fn topo_t() -> CommTopology {
        CommTopology::new([1, 1, 1, 2], 0).expect("topology")
    }

    fn site_value(c: &[usize], i: usize) -> f64 {
        (c[0] + 10 * c[1] + 100 * c[2] + 1000 * c[3]) as f64 + 0.01 * i as f64
    }

    /// Pack toward one side and unpack into the same field as if received
    /// from the other side: a one-rank periodic loop.
    fn self_loop(f: &mut SpinorField<'_>, d: usize, send: NeighborDir, sel: GhostSelection) {
        let (nd, nn) = message_bytes(f.layout(), d);
        let mut data = vec![0u8; nd];
        let mut norm = vec![0u8; nn];
        let norm_arg = (nn > 0).then_some(norm.as_mut_slice());
        pack_ghost(f, d, send, sel, &mut data, norm_arg).expect("pack");
        let norm_ref = (nn > 0).then_some(norm.as_slice());
        unpack_ghost(f, d, send.opposite(), &data, norm_ref).expect("unpack");
    }

    #[test]
    fn staggered_ghosts_hold_neighbor_slices() {
        let p = SpinorParam::staggered(&[4, 4, 4, 8], Precision::Double, SiteSubset::Full);
        let mut f = SpinorField::new(&p, &topo_t()).expect("field");
        f.fill_sites(0, |c, _, site| {
            for (i, s) in site.iter_mut().enumerate() {
                *s = site_value(c, i);
            }
        })
        .expect("fill");
        self_loop(&mut f, 3, NeighborDir::Forward, GhostSelection::Full { dagger: false });

        let cb = f.checkerboard().expect("geometry");
        let gf = f.layout().ghost.ghost_face[3];
        let mut out = vec![0.0; 6];
        for q in 0..2 {
            for k in 0..3 {
                for face_cb in 0..gf {
                    f.load_ghost_site(q, 3, NeighborDir::Backward, k * gf + face_cb, &mut out);
                    let c = cb.face_coords(3, 8 - 3 + k, face_cb, q);
                    for (i, v) in out.iter().enumerate() {
                        assert_eq!(*v, site_value(&c, i));
                    }
                }
            }
        }
    }

    #[test]
    fn odd_extent_swaps_parity_blocks() {
        // X3 = 3: even sites 0, odd sites 1
        let p = SpinorParam::staggered(&[4, 4, 4, 3], Precision::Double, SiteSubset::Full);
        let mut f = SpinorField::new(&p, &topo_t()).expect("field");
        f.fill_sites(0, |_, parity, site| site.fill(parity as f64)).expect("fill");
        self_loop(&mut f, 3, NeighborDir::Forward, GhostSelection::Full { dagger: false });
        let gf = f.layout().ghost.ghost_face[3];
        let mut out = vec![0.0; 6];
        for q in 0..2 {
            for g in 0..3 * gf {
                f.load_ghost_site(q, 3, NeighborDir::Backward, g, &mut out);
                assert!(out.iter().all(|&v| v == (q ^ 1) as f64), "q={q} g={g}");
            }
        }
    }

    #[test]
    fn parity_field_with_odd_extent_is_rejected() {
        let p = SpinorParam::staggered(&[2, 4, 4, 3], Precision::Single, SiteSubset::Parity);
        let f = SpinorField::new(&p, &topo_t()).expect("field");
        let (nd, _) = message_bytes(f.layout(), 3);
        let mut data = vec![0u8; nd];
        let sel = GhostSelection::Parity {
            parity: 0,
            dagger: false,
        };
        assert!(matches!(
            pack_ghost(&f, 3, NeighborDir::Forward, sel, &mut data, None),
            Err(HaloError::OddExtentParityField { dim: 3, extent: 3 })
        ));
    }

    #[test]
    fn wilson_ghosts_are_projected_half_spinors() {
        let p = SpinorParam::wilson(&[2, 4, 4, 4], Precision::Double, SiteSubset::Parity);
        let mut f = SpinorField::new(&p, &topo_t()).expect("field");
        f.fill_sites(1, |c, _, site| {
            for (i, s) in site.iter_mut().enumerate() {
                *s = site_value(c, i);
            }
        })
        .expect("fill");
        let sel = GhostSelection::Parity {
            parity: 1,
            dagger: false,
        };
        self_loop(&mut f, 3, NeighborDir::Backward, sel);

        let cb = Checkerboard::new(&[4, 4, 4, 4]).expect("geometry");
        let gf = f.layout().ghost.ghost_face[3];
        assert_eq!(f.layout().ghost.ghost_site_len, 12);
        let mut got = vec![0.0; 12];
        let mut site = vec![0.0; 24];
        let mut want = vec![0.0; 12];
        for face_cb in 0..gf {
            f.load_ghost_site(1, 3, NeighborDir::Forward, face_cb, &mut got);
            let c = cb.face_coords(3, 0, face_cb, 1);
            for (i, s) in site.iter_mut().enumerate() {
                *s = site_value(&c, i);
            }
            spin_project(3, -1.0, &site, &mut want);
            assert_eq!(got, want);
        }
    }

    #[test]
    fn half_messages_carry_one_norm_per_site() {
        let p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Half, SiteSubset::Full);
        let mut f = SpinorField::new(&p, &topo_t()).expect("field");
        f.fill_sites(0, |c, _, site| {
            for (i, s) in site.iter_mut().enumerate() {
                *s = site_value(c, i) * 1e-3;
            }
        })
        .expect("fill");
        let (_, nn) = message_bytes(f.layout(), 3);
        assert_eq!(nn / NORM_BYTES, 2 * f.layout().ghost.block_sites(3));
        self_loop(&mut f, 3, NeighborDir::Forward, GhostSelection::Full { dagger: false });

        let cb = f.checkerboard().expect("geometry");
        let gf = f.layout().ghost.ghost_face[3];
        let mut out = vec![0.0; 6];
        for q in 0..2 {
            for g in 0..3 * gf {
                f.load_ghost_site(q, 3, NeighborDir::Backward, g, &mut out);
                let c = cb.face_coords(3, 1 + g / gf, g % gf, q);
                let want: Vec<f64> = (0..6).map(|i| site_value(&c, i) * 1e-3).collect();
                let tol = 2.0 * quantization_step(site_norm(&want));
                for (a, b) in out.iter().zip(&want) {
                    assert!((a - b).abs() <= tol);
                }
            }
        }
    }

    #[test]
    fn short_buffers_and_unsplit_dimensions_are_errors() {
        let p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
        let f = SpinorField::new(&p, &topo_t()).expect("field");
        let sel = GhostSelection::Full { dagger: false };
        let mut small = vec![0u8; 8];
        assert!(matches!(
            pack_ghost(&f, 3, NeighborDir::Forward, sel, &mut small, None),
            Err(HaloError::BufferTooSmall { what: "ghost message", .. })
        ));
        assert!(matches!(
            pack_ghost(&f, 0, NeighborDir::Forward, sel, &mut small, None),
            Err(HaloError::NotPartitioned { dim: 0 })
        ));
    }
}
