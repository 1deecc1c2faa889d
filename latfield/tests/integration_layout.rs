// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::expect_used)]

//! Integration tests: field descriptors, derived layout and ghost geometry.
//!
//! Exercises the descriptor → layout → storage path across process grids,
//! the way a physics driver builds fields before its first exchange.

use hotspring_latfield::comm::{CommTopology, LoopbackNetwork};
use hotspring_latfield::exchange::{ExchangeConfig, FaceExchange, GhostSelection, StagingPool, TransferMode};
use hotspring_latfield::field::blas;
use hotspring_latfield::field::layout::SpinorLayout;
use hotspring_latfield::field::{
    Precision, SiteSubset, SpinorField, SpinorParam, SpinorParamUpdate, TwistFlavor,
};
use hotspring_latfield::HaloError;

fn split_t(rank: usize) -> CommTopology {
    CommTopology::new([1, 1, 1, 2], rank).expect("topology")
}

#[test]
fn single_process_field_has_no_ghost_zone() {
    let p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
    let f = SpinorField::new(&p, &CommTopology::single()).expect("field");
    let l = f.layout();
    assert_eq!(l.ghost.ghost_face, [0; 4]);
    assert_eq!(l.ghost.ghost_length, 0);
    assert_eq!(l.total_length, l.length);
    for d in 0..4 {
        assert!(!l.ghost.is_active(d));
    }
}

#[test]
fn single_process_exchange_is_a_no_op() {
    let comms = LoopbackNetwork::build([1, 1, 1, 1]).expect("network");
    let p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
    let mut f = SpinorField::new(&p, &CommTopology::single()).expect("field");
    f.fill_sites(0, |c, _, site| site.fill((c[0] + c[3]) as f64)).expect("fill");
    let before = blas::norm2(&f).expect("norm");

    let mut pool = StagingPool::new(TransferMode::Pinned);
    let mut ex = FaceExchange::new(&comms[0], ExchangeConfig::default(), &mut pool).expect("exchange");
    ex.exchange(&mut f, GhostSelection::Full { dagger: false }).expect("exchange");
    for d in 0..4 {
        assert_eq!(ex.staging().data_capacity(d), 0);
    }
    assert_eq!(blas::norm2(&f).expect("norm"), before);
}

#[test]
fn time_split_staggered_face_is_half_a_slice() {
    // 4×4×4×8 over two ranks along t: 4×4×4×4 each
    for rank in 0..2 {
        let p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
        let f = SpinorField::new(&p, &split_t(rank)).expect("field");
        let g = &f.layout().ghost;
        assert_eq!(g.ghost_face, [0, 0, 0, 4 * 4 * 4 / 2]);
        assert_eq!(g.n_face, 3);
        assert_eq!(g.ghost_length, 6 * 32 * 6);
        assert_eq!(f.layout().total_length, f.layout().length + 2 * g.ghost_length);
    }
}

#[test]
fn wilson_half_parity_field_sizes_norm_regions() {
    let p = SpinorParam::wilson(&[2, 4, 4, 4], Precision::Half, SiteSubset::Parity);
    let topo = CommTopology::new([2, 1, 1, 2], 0).expect("topology");
    let f = SpinorField::new(&p, &topo).expect("field");
    let l = f.layout();
    // dimension 0 of a parity field is already checkerboarded
    assert_eq!(l.ghost.ghost_face, [32, 0, 0, 32]);
    assert_eq!(l.ghost.ghost_site_len, 12);
    assert_eq!(l.ghost.ghost_norm_length, 2 * 64);
    assert_eq!(l.total_norm_length, l.stride + 2 * 64);
    assert_eq!(l.vec_width, 4);

    let base0 = f.ghost(0).expect("parity field").expect("split");
    let base3 = f.ghost(3).expect("parity field").expect("split");
    assert_eq!(base0, l.stride * l.site_len);
    assert_eq!(base3, (l.stride + 32) * l.site_len);
    assert_eq!(f.ghost(1).expect("parity field"), None);
    assert_eq!(
        f.ghost_norm(3).expect("parity field"),
        Some(l.stride + 2 * 32)
    );
}

#[test]
fn full_fields_have_no_ghost_references() {
    let p = SpinorParam::wilson(&[4, 4, 4, 4], Precision::Single, SiteSubset::Full);
    let f = SpinorField::new(&p, &split_t(0)).expect("field");
    assert!(matches!(
        f.ghost(3),
        Err(HaloError::UnsupportedSiteSubset { call: "ghost", .. })
    ));
}

#[test]
fn doublet_faces_span_the_flavor_dimension() {
    let mut p = SpinorParam::wilson(&[4, 4, 4, 4, 2], Precision::Double, SiteSubset::Full);
    p.twist_flavor = TwistFlavor::Doublet;
    let f = SpinorField::new(&p, &split_t(1)).expect("field");
    assert_eq!(f.layout().ghost.ghost_face[3], 4 * 4 * 4 * 2 / 2);

    p.x[4] = 3;
    assert!(matches!(
        SpinorField::new(&p, &split_t(1)),
        Err(HaloError::FlavorExtent { extent: 3, .. })
    ));
}

#[test]
fn six_dimensions_are_rejected_with_the_count() {
    let p = SpinorParam::staggered(&[2, 2, 2, 2, 2, 2], Precision::Double, SiteSubset::Full);
    let err = SpinorField::new(&p, &CommTopology::single()).expect_err("too many");
    assert_eq!(err.to_string(), "Number of dimensions nDim = 6 too great (maximum 5)");
}

#[test]
fn staggered_split_needs_three_slices() {
    let p = SpinorParam::staggered(&[4, 4, 4, 2], Precision::Double, SiteSubset::Full);
    assert!(matches!(
        SpinorField::new(&p, &split_t(0)),
        Err(HaloError::FaceDeeperThanExtent { dim: 3, extent: 2, n_face: 3 })
    ));
}

#[test]
fn descriptor_round_trips_through_json() {
    let mut p = SpinorParam::wilson(&[4, 4, 2, 6], Precision::Single, SiteSubset::Full);
    p.pad = 7;
    let f = SpinorField::new(&p, &split_t(0)).expect("field");
    let json = serde_json::to_string(&f.fill()).expect("serialize");
    let back: SpinorParam = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, p);
    let again = SpinorLayout::compute(&back, f.partition()).expect("layout");
    assert_eq!(&again, f.layout());
}

#[test]
fn reset_to_half_adds_norms_and_keeps_geometry() {
    let p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
    let mut f = SpinorField::new(&p, &split_t(1)).expect("field");
    let ghost_face = f.layout().ghost.ghost_face;
    f.reset(&SpinorParamUpdate {
        precision: Some(Precision::Half),
        ..SpinorParamUpdate::default()
    })
    .expect("reset");
    assert_eq!(f.precision(), Precision::Half);
    assert_eq!(f.layout().ghost.ghost_face, ghost_face);
    assert!(f.storage().norm_len() > 0);
    assert_eq!(f.layout().ghost.ghost_norm_length, 6 * 32);

    f.destroy();
    assert!(matches!(
        f.reset(&SpinorParamUpdate::default()),
        Err(HaloError::ResetBeforeInit)
    ));
}

#[test]
fn blas_ignores_pad_and_ghosts() {
    let mut p = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
    p.pad = 3;
    let mut a = SpinorField::new(&p, &split_t(0)).expect("field");
    a.fill_sites(0, |_, _, site| site.fill(1.0)).expect("fill");
    // every real site contributes 6 ones
    assert_eq!(blas::norm2(&a).expect("norm"), (256 * 6) as f64);

    let q = SpinorParam::staggered(&[4, 4, 4, 4], Precision::Double, SiteSubset::Full);
    let b = SpinorField::new(&q, &split_t(0)).expect("field");
    assert!(matches!(
        blas::check_field(&a, &b),
        Err(HaloError::FieldMismatch { what: "length", .. })
    ));
}
