// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::expect_used)]

//! Integration tests: gauge storage orders and link reconstruction.
//!
//! Every order stores the same hot-start configuration and must hand back
//! the same links; compressed FloatN storage must rebuild them, including
//! the temporal boundary sign on the last global slice of a split lattice.

use hotspring_latfield::comm::CommTopology;
use hotspring_latfield::field::gauge::{GaugeField, GaugeParam, TBoundary};
use hotspring_latfield::field::Precision;
use hotspring_latfield::lattice::constants::{HOT_START_EPSILON, LINK_REALS};
use hotspring_latfield::lattice::su3::Su3Matrix;
use hotspring_latfield::order::real::StorageReal;
use hotspring_latfield::order::{AccessPath, GaugeFieldOrder, GaugeOrder, Link, Reconstruct};
use hotspring_latfield::tolerances;

const X: [usize; 4] = [4, 4, 2, 4];

fn max_diff(a: &Link, b: &Link) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

/// Hot-start links, one per (site, direction), in fill order.
fn hot_links(n: usize) -> Vec<Link> {
    let mut seed = 2024u64;
    (0..n)
        .map(|_| Su3Matrix::random_near_identity(&mut seed, HOT_START_EPSILON).to_reals())
        .collect()
}

fn filled<T: StorageReal>(param: &GaugeParam, topo: &CommTopology, links: &[Link]) -> GaugeField<T> {
    let mut g = GaugeField::<T>::new(param, topo).expect("gauge field");
    let mut it = links.iter();
    g.fill_with(|_, _, _| *it.next().expect("enough links"));
    g
}

fn all_links<T: StorageReal>(g: &GaugeField<T>) -> Vec<Link> {
    let mut out = Vec::new();
    for parity in 0..2 {
        for x in 0..g.volume_cb() {
            for dir in 0..g.n_dir() {
                out.push(g.load(x, dir, parity));
            }
        }
    }
    out
}

#[test]
fn twelve_reconstruct_recovers_identity_exactly() {
    let topo = CommTopology::single();
    let id = Su3Matrix::IDENTITY.to_reals();

    let p = GaugeParam::new([4; 4], Precision::Double, GaugeFieldOrder::FloatN, Reconstruct::Twelve);
    let mut g = GaugeField::<f64>::new(&p, &topo).expect("double");
    let cb = *g.checkerboard();
    let (x, parity) = cb.index(&[1, 2, 1, 1, 0]);
    for dir in 0..4 {
        g.save(&id, x, dir, parity);
        assert_eq!(g.load(x, dir, parity), id, "double dir {dir}");
    }

    let p = GaugeParam::new([4; 4], Precision::Single, GaugeFieldOrder::FloatN, Reconstruct::Twelve);
    let mut g = GaugeField::<f32>::new(&p, &topo).expect("single");
    for dir in 0..4 {
        g.save(&id, x, dir, parity);
        assert_eq!(g.load(x, dir, parity), id, "single dir {dir}");
    }
}

#[test]
fn every_legacy_order_returns_the_stored_links() {
    let topo = CommTopology::single();
    let links = hot_links(2 * X.iter().product::<usize>() / 2 * 4);
    let reference = {
        let p = GaugeParam::new(X, Precision::Double, GaugeFieldOrder::Qdp, Reconstruct::No);
        all_links(&filled::<f64>(&p, &topo, &links))
    };
    assert_eq!(reference, links);
    for order in [GaugeFieldOrder::Milc, GaugeFieldOrder::Cps, GaugeFieldOrder::Bqcd, GaugeFieldOrder::FloatN] {
        let p = GaugeParam::new(X, Precision::Double, order, Reconstruct::No);
        assert_eq!(all_links(&filled::<f64>(&p, &topo, &links)), reference, "{order}");
    }
}

#[test]
fn compressed_float_n_rebuilds_hot_links() {
    let topo = CommTopology::single();
    let links = hot_links(X.iter().product::<usize>() * 4);
    for recon in [Reconstruct::Twelve, Reconstruct::Thirteen] {
        for access in [AccessPath::Direct, AccessPath::Texture] {
            let mut p = GaugeParam::new(X, Precision::Double, GaugeFieldOrder::FloatN, recon);
            p.access = access;
            let g = filled::<f64>(&p, &topo, &links);
            let worst = all_links(&g)
                .iter()
                .zip(&links)
                .map(|(a, b)| max_diff(a, b))
                .fold(0.0, f64::max);
            assert!(worst < tolerances::RECON_DOUBLE_ABS, "{recon} {access:?}: {worst}");
        }
    }
}

#[test]
fn antiperiodic_sign_lives_on_the_last_global_slice() {
    // rank 1 of a time split holds global t = 4..8; only t = 7 carries the sign
    let topo = CommTopology::new([1, 1, 1, 2], 1).expect("topology");
    let mut p = GaugeParam::new(X, Precision::Double, GaugeFieldOrder::FloatN, Reconstruct::Twelve);
    p.t_boundary = TBoundary::AntiPeriodic;
    p.pad = X[0] * X[1] * X[2] / 2;
    let mut g = GaugeField::<f64>::new(&p, &topo).expect("gauge field");
    let cb = *g.checkerboard();
    let t_ext = topo.global_extent(3, X[3]);

    let mut seed = 5u64;
    for t in 0..X[3] {
        let (x, parity) = cb.index(&[1, 0, 1, t, 0]);
        assert_eq!(g.global_t(x), X[3] + t);
        let sign = if g.global_t(x) + 1 == t_ext { -1.0 } else { 1.0 };
        assert_eq!(g.u0(x, 3), sign);
        assert_eq!(g.u0(x, 0), 1.0);

        let u = Su3Matrix::random_near_identity(&mut seed, HOT_START_EPSILON);
        let stored = u.scale(sign).to_reals();
        g.save(&stored, x, 3, parity);
        let back = g.load(x, 3, parity);
        assert!(max_diff(&back, &stored) < tolerances::RECON_DOUBLE_ABS, "t = {t}");
    }
}

#[test]
fn half_links_are_bounded_by_the_scale() {
    let topo = CommTopology::single();
    let mut p = GaugeParam::new(X, Precision::Half, GaugeFieldOrder::FloatN, Reconstruct::No);
    p.scale = 2.0;
    let mut g = GaugeField::<i16>::new(&p, &topo).expect("gauge field");
    let fat: Link = std::array::from_fn(|r| (r as f64 - 8.5) / 5.0);
    g.save(&fat, 3, 1, 0);
    let back = g.load(3, 1, 0);
    // one i16 step of the scale
    let step = p.scale / 32767.0;
    for r in 0..LINK_REALS {
        assert!((back[r] - fat[r]).abs() <= step, "element {r}");
    }
}
