// SPDX-License-Identifier: AGPL-3.0-only

//! Gauge-link ghost exchange.
//!
//! Links cross the wire in register form (18 f64 per link, native byte
//! order) whatever the storage order, so both ends may use different
//! orders or reconstructions. Messages are `[parity][slice][face]` with
//! the sender's parity outermost; the receiver applies the parity swap of
//! an odd extent when storing.
//!
//! - [`exchange_link_ghost`]: fat/long links, `n_face` slices forward into
//!   the field's own ghost arrays.
//! - [`exchange_extended_ghost`]: one slice each way of every direction,
//!   returned to the caller (staple and site-link builders).
//! - [`link_max`]: global largest link component.

use rayon::prelude::*;
use tracing::debug;

use crate::comm::{Communicator, MsgHandle, NeighborDir};
use crate::error::{HaloError, Result};
use crate::field::gauge::GaugeField;
use crate::lattice::constants::{LINK_REALS, N_DIM};
use crate::order::real::{get_bytes, StorageReal};
use crate::order::{GaugeOrder, Link};

const LINK_BYTES: usize = LINK_REALS * std::mem::size_of::<f64>();

fn encode(links: &[Link]) -> Vec<u8> {
    bytemuck::cast_slice::<Link, u8>(links).to_vec()
}

fn decode(bytes: &[u8]) -> Vec<Link> {
    bytes
        .chunks_exact(LINK_BYTES)
        .map(|c| std::array::from_fn(|r| get_bytes::<f64>(c, r)))
        .collect()
}

fn received(comm: &dyn Communicator, handle: MsgHandle) -> Result<Vec<u8>> {
    comm.wait(handle)?
        .ok_or_else(|| HaloError::Transport("receive completed without payload".into()))
}

/// Send `out` toward `to` and receive the same amount from the opposite side.
fn swap(comm: &dyn Communicator, d: usize, to: NeighborDir, out: &[Link]) -> Result<Vec<Link>> {
    let recv = comm.irecv(out.len() * LINK_BYTES, d, to.opposite())?;
    let send = comm.isend(&encode(out), d, to)?;
    let bytes = received(comm, recv)?;
    comm.wait(send)?;
    Ok(decode(&bytes))
}

/// Links along `dir` of `slices` in dimension `d`, `[parity][slice][face]`.
fn gather_slices<T: StorageReal>(
    field: &GaugeField<T>,
    d: usize,
    dir: usize,
    slices: impl Iterator<Item = usize> + Clone,
) -> Vec<Link> {
    let cb = field.checkerboard();
    let face = field.surface_cb(d);
    let mut out = Vec::new();
    for parity in 0..2 {
        for slice in slices.clone() {
            for f in 0..face {
                let (x, _) = cb.index(&cb.face_coords(d, slice, f, parity));
                out.push(field.load(x, dir, parity));
            }
        }
    }
    out
}

fn link_dir<T: StorageReal>(field: &GaugeField<T>, d: usize) -> usize {
    if field.n_dir() == 1 {
        0
    } else {
        d
    }
}

/// Fill the ghost links of every partitioned dimension `d` with the
/// backward neighbor's last `n_face` slices of links along `d`.
///
/// # Errors
///
/// Transport failures or `MessageLength`.
pub fn exchange_link_ghost<T: StorageReal>(field: &mut GaugeField<T>, comm: &dyn Communicator) -> Result<()> {
    for d in (0..N_DIM).filter(|&d| comm.topology().partitioned(d)) {
        let extent = field.param().x[d];
        let n_face = field.param().n_face;
        let odd = extent % 2;
        let out = gather_slices(field, d, link_dir(field, d), extent - n_face..extent);
        let got = swap(comm, d, NeighborDir::Forward, &out)?;

        let per_parity = field.face_volume_cb(d);
        for (i, link) in got.iter().enumerate() {
            let q = (i / per_parity) ^ odd;
            field.save_ghost(link, i % per_parity, d, q);
        }
        debug!(dim = d, links = got.len(), "link ghost exchanged");
    }
    Ok(())
}

/// Boundary links of one dimension received from both neighbors.
#[derive(Clone, Debug, PartialEq)]
pub struct GhostFaces {
    n_dir: usize,
    face: usize,
    back: Vec<Link>,
    fwd: Vec<Link>,
}

impl GhostFaces {
    fn index(&self, dir: usize, parity: usize, f: usize) -> usize {
        (dir * 2 + parity) * self.face + f
    }

    /// Checkerboarded sites per slice.
    #[must_use]
    pub const fn face(&self) -> usize {
        self.face
    }

    /// Directions per site.
    #[must_use]
    pub const fn n_dir(&self) -> usize {
        self.n_dir
    }

    /// Link `dir` of face site `f` (receiver parity) from the backward
    /// neighbor's last slice.
    #[must_use]
    pub fn back(&self, dir: usize, parity: usize, f: usize) -> &Link {
        &self.back[self.index(dir, parity, f)]
    }

    /// Link `dir` of face site `f` (receiver parity) from the forward
    /// neighbor's first slice.
    #[must_use]
    pub fn fwd(&self, dir: usize, parity: usize, f: usize) -> &Link {
        &self.fwd[self.index(dir, parity, f)]
    }
}

/// One-slice ghost links of every partitioned dimension.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtendedGhost {
    faces: [Option<GhostFaces>; N_DIM],
}

impl ExtendedGhost {
    /// Faces of dimension `d`, `None` when it is not partitioned.
    #[must_use]
    pub fn dim(&self, d: usize) -> Option<&GhostFaces> {
        self.faces.get(d).and_then(Option::as_ref)
    }
}

/// Reorder `[dir][parity][face]` blocks by the receiver's parity.
fn swap_parity(links: Vec<Link>, face: usize, odd: usize) -> Vec<Link> {
    if odd == 0 {
        return links;
    }
    let mut out = links.clone();
    for (i, l) in links.into_iter().enumerate() {
        let (dp, f) = (i / face, i % face);
        let (dir, parity) = (dp / 2, dp % 2);
        out[(dir * 2 + (parity ^ 1)) * face + f] = l;
    }
    out
}

/// Exchange one boundary slice each way of every stored direction across
/// every partitioned dimension.
///
/// # Errors
///
/// Transport failures or `MessageLength`.
pub fn exchange_extended_ghost<T: StorageReal>(
    field: &GaugeField<T>,
    comm: &dyn Communicator,
) -> Result<ExtendedGhost> {
    let mut ghost = ExtendedGhost::default();
    for d in (0..N_DIM).filter(|&d| comm.topology().partitioned(d)) {
        let extent = field.param().x[d];
        let face = field.surface_cb(d);
        let n_dir = field.n_dir();
        let slab = |slice: usize| -> Vec<Link> {
            (0..n_dir)
                .flat_map(|dir| gather_slices(field, d, dir, slice..slice + 1))
                .collect()
        };
        let to_fwd = slab(extent - 1);
        let to_back = slab(0);

        let recv_back = comm.irecv(to_fwd.len() * LINK_BYTES, d, NeighborDir::Backward)?;
        let recv_fwd = comm.irecv(to_back.len() * LINK_BYTES, d, NeighborDir::Forward)?;
        let send_fwd = comm.isend(&encode(&to_fwd), d, NeighborDir::Forward)?;
        let send_back = comm.isend(&encode(&to_back), d, NeighborDir::Backward)?;
        let back = decode(&received(comm, recv_back)?);
        let fwd = decode(&received(comm, recv_fwd)?);
        comm.wait(send_fwd)?;
        comm.wait(send_back)?;

        let odd = extent % 2;
        ghost.faces[d] = Some(GhostFaces {
            n_dir,
            face,
            back: swap_parity(back, face, odd),
            fwd: swap_parity(fwd, face, odd),
        });
        debug!(dim = d, n_dir, face, "extended ghost exchanged");
    }
    Ok(ghost)
}

/// Largest `|re|` or `|im|` over every stored link on every rank.
///
/// # Errors
///
/// Transport failures from the all-reduce.
pub fn link_max<T: StorageReal>(field: &GaugeField<T>, comm: &dyn Communicator) -> Result<f64> {
    let vcb = field.volume_cb();
    let n_dir = field.n_dir();
    let local = (0..2 * vcb * n_dir)
        .into_par_iter()
        .map(|i| {
            let (parity, rest) = (i / (vcb * n_dir), i % (vcb * n_dir));
            field
                .load(rest / n_dir, rest % n_dir, parity)
                .iter()
                .fold(f64::NEG_INFINITY, |m, v| m.max(v.abs()))
        })
        .reduce(|| f64::NEG_INFINITY, f64::max);
    comm.allreduce_max(local)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::comm::run_ranks;
    use crate::field::gauge::{GaugeParam, LinkGeometry, TBoundary};
    use crate::field::geometry::Coords;
    use crate::field::param::Precision;
    use crate::lattice::constants::HOT_START_EPSILON;
    use crate::lattice::su3::Su3Matrix;
    use crate::order::{GaugeFieldOrder, Reconstruct};
    use crate::tolerances::RECON_DOUBLE_ABS;

    const X: [usize; N_DIM] = [4, 4, 2, 3];

    /// Link encoding its global coordinates.
    fn tagged(rank_t: usize, c: &Coords, dir: usize) -> Link {
        let t = rank_t * X[3] + c[3];
        std::array::from_fn(|r| (c[0] + 10 * c[1] + 100 * c[2] + 1000 * t + 10_000 * dir) as f64 + r as f64 * 0.001)
    }

    fn field_on(comm: &dyn Communicator, order: GaugeFieldOrder, geometry: LinkGeometry) -> GaugeField<f64> {
        let mut p = GaugeParam::new(X, Precision::Double, order, Reconstruct::No);
        p.geometry = geometry;
        p.separate_ghost = true;
        let rank_t = comm.topology().coords()[3];
        let mut g = GaugeField::<f64>::new(&p, comm.topology()).expect("field");
        g.fill_with(|c, dir, _| tagged(rank_t, c, dir));
        g
    }

    #[test]
    fn link_ghost_holds_backward_neighbor_slice() {
        let ok = run_ranks([1, 1, 1, 2], |comm| {
            let mut g = field_on(&comm, GaugeFieldOrder::Milc, LinkGeometry::Vector);
            exchange_link_ghost(&mut g, &comm).expect("exchange");
            let back_t = (comm.topology().coords()[3] + 1) % 2;
            let cb = *g.checkerboard();
            let mut all = true;
            for q in 0..2 {
                for f in 0..g.face_volume_cb(3) {
                    // odd X3: sender parity is q ^ 1
                    let c = cb.face_coords(3, X[3] - 1, f, q ^ 1);
                    all &= g.load_ghost(f, 3, q) == tagged(back_t, &c, 3);
                }
            }
            all
        })
        .expect("ranks");
        assert!(ok.into_iter().all(|b| b));
    }

    /// Near-identity link of global site `g`, negated on the last global
    /// time slice of an antiperiodic field.
    fn boundary_link(g: &Coords, dir: usize, t_global: usize) -> Link {
        let mut seed = (((g[3] * 4 + g[2]) * 4 + g[1]) * 4 + g[0]) as u64 * 4 + dir as u64 + 1;
        let u = Su3Matrix::random_near_identity(&mut seed, HOT_START_EPSILON);
        let sign = if dir == 3 && g[3] + 1 == t_global { -1.0 } else { 1.0 };
        u.scale(sign).to_reals()
    }

    #[test]
    fn reconstructed_ghost_links_keep_the_antiperiodic_sign() {
        let x = [4, 4, 2, 4];
        for separate_ghost in [true, false] {
            let worst = run_ranks([1, 1, 1, 2], |comm| {
                let topo = comm.topology();
                let mut p = GaugeParam::new(x, Precision::Double, GaugeFieldOrder::FloatN, Reconstruct::Twelve);
                p.t_boundary = TBoundary::AntiPeriodic;
                p.separate_ghost = separate_ghost;
                p.pad = 16;
                let offset = topo.global_offset(3, x[3]);
                let t_global = topo.global_extent(3, x[3]);
                let mut g = GaugeField::<f64>::new(&p, topo).expect("field");
                g.fill_with(|c, dir, _| {
                    let mut gc = *c;
                    gc[3] += offset;
                    boundary_link(&gc, dir, t_global)
                });
                exchange_link_ghost(&mut g, &comm).expect("exchange");

                // the ghost holds the backward neighbor's last slice
                let back_t = (offset + t_global - 1) % t_global;
                let expected_sign = if back_t + 1 == t_global { -1.0 } else { 1.0 };
                assert_eq!(g.ghost_u0(0, 3), expected_sign);
                let cb = *g.checkerboard();
                let mut worst = 0.0_f64;
                for q in 0..2 {
                    for f in 0..g.face_volume_cb(3) {
                        let mut gc = cb.face_coords(3, x[3] - 1, f, q);
                        gc[3] = back_t;
                        let want = boundary_link(&gc, 3, t_global);
                        let got = g.load_ghost(f, 3, q);
                        for (a, b) in got.iter().zip(&want) {
                            worst = worst.max((a - b).abs());
                        }
                    }
                }
                worst
            })
            .expect("ranks");
            for w in worst {
                assert!(w < RECON_DOUBLE_ABS, "separate_ghost {separate_ghost}: {w}");
            }
        }
    }

    #[test]
    fn extended_ghost_covers_both_sides_and_all_directions() {
        let ok = run_ranks([1, 1, 1, 2], |comm| {
            let g = field_on(&comm, GaugeFieldOrder::Qdp, LinkGeometry::Vector);
            let ghost = exchange_extended_ghost(&g, &comm).expect("exchange");
            assert!(ghost.dim(0).is_none());
            let faces = ghost.dim(3).expect("t faces");
            let other_t = (comm.topology().coords()[3] + 1) % 2;
            let cb = *g.checkerboard();
            let mut all = true;
            for dir in 0..4 {
                for q in 0..2 {
                    for f in 0..faces.face() {
                        let last = cb.face_coords(3, X[3] - 1, f, q ^ 1);
                        let first = cb.face_coords(3, 0, f, q ^ 1);
                        all &= *faces.back(dir, q, f) == tagged(other_t, &last, dir);
                        all &= *faces.fwd(dir, q, f) == tagged(other_t, &first, dir);
                    }
                }
            }
            all
        })
        .expect("ranks");
        assert!(ok.into_iter().all(|b| b));
    }

    #[test]
    fn staple_fields_exchange_their_single_matrix() {
        let ok = run_ranks([1, 1, 1, 2], |comm| {
            let g = field_on(&comm, GaugeFieldOrder::Milc, LinkGeometry::Scalar);
            let ghost = exchange_extended_ghost(&g, &comm).expect("exchange");
            ghost.dim(3).expect("t faces").n_dir() == 1
        })
        .expect("ranks");
        assert!(ok.into_iter().all(|b| b));
    }

    #[test]
    fn link_max_is_global() {
        let maxima = run_ranks([1, 1, 1, 2], |comm| {
            let g = field_on(&comm, GaugeFieldOrder::Milc, LinkGeometry::Vector);
            link_max(&g, &comm).expect("max")
        })
        .expect("ranks");
        // rank 1, local t = 2, x = (3, 3, 1), dir 3, element 17
        let want = tagged(1, &[3, 3, 1, 2, 0], 3)[17];
        assert_eq!(maxima, vec![want, want]);
    }
}
