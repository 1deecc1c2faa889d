// SPDX-License-Identifier: AGPL-3.0-only

//! Halo exchange validation on loopback process grids.
//!
//! Every scenario fills fields with a function of the *global* site
//! coordinate, exchanges ghost zones between simulated ranks and compares
//! what the stencil reads across each boundary with that function at the
//! shifted global coordinate, i.e. the single-process answer.
//!
//! # Validation targets
//!
//! | Scenario | Grid | Expected |
//! |----------|------|----------|
//! | Single process 4⁴ | 1×1×1×1 | no ghost zone, exchange is a no-op |
//! | Split time 4×4×4×8 | 1×1×1×2 | `ghost_face[3] = 32`, ghosts bit-exact |
//! | Half precision | 1×1×1×2 | one norm per boundary site, `scale/32767` |
//! | 12-reconstruct identity | 1×1×1×1 | all 18 reals recovered exactly |
//! | Four-way split | 1×1×2×2 | every hop ±1..3 matches the global shift |
//! | Gauge links | 1×1×1×2 | link ghosts exact, link max global |
//!
//! Set `RUST_LOG=debug` for per-exchange timing.

use std::time::Instant;

use hotspring_latfield::comm::{run_ranks, CommTopology, Communicator, LoopbackComm};
use hotspring_latfield::exchange::{ExchangeConfig, FaceExchange, GhostSelection, StagingPool, TransferMode};
use hotspring_latfield::field::geometry::Coords;
use hotspring_latfield::field::gauge::{GaugeField, GaugeParam};
use hotspring_latfield::field::half::site_norm;
use hotspring_latfield::field::layout::NORM_BYTES;
use hotspring_latfield::field::{Precision, SiteSubset, SpinorField, SpinorParam};
use hotspring_latfield::halo::{exchange_link_ghost, link_max, load_neighbor, message_bytes, Stencil};
use hotspring_latfield::lattice::constants::{LINK_REALS, N_DIM};
use hotspring_latfield::lattice::su3::Su3Matrix;
use hotspring_latfield::order::{GaugeFieldOrder, GaugeOrder, Link, Reconstruct};
use hotspring_latfield::tolerances;
use hotspring_latfield::validation::ValidationHarness;
use hotspring_latfield::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Site value as a function of global coordinates.
fn site_value(g: &Coords, i: usize) -> f64 {
    (g[0] + 10 * g[1] + 100 * g[2] + 1000 * g[3]) as f64 + 0.01 * i as f64
}

fn global_coords(topo: &CommTopology, x: &[usize], c: &Coords) -> Coords {
    let mut g = *c;
    for d in 0..N_DIM {
        g[d] += topo.global_offset(d, x[d]);
    }
    g
}

fn staggered(topo: &CommTopology, x: &[usize], precision: Precision, scale: f64) -> Result<SpinorField<'static>> {
    let p = SpinorParam::staggered(x, precision, SiteSubset::Full);
    let mut f = SpinorField::new(&p, topo)?;
    f.fill_sites(0, |c, _, site| {
        let g = global_coords(topo, x, c);
        for (i, s) in site.iter_mut().enumerate() {
            *s = site_value(&g, i) * scale;
        }
    })?;
    Ok(f)
}

/// Worst deviation of a stencil read from the global shift.
struct ShiftReport {
    hops: usize,
    ghost_hops: usize,
    max_abs: f64,
    max_rel: f64,
}

fn shift_report(field: &SpinorField<'_>, topo: &CommTopology, x: &[usize], scale: f64) -> Result<ShiftReport> {
    let stencil = Stencil::for_field(field)?;
    let cb = field.checkerboard()?;
    let layout = field.layout();
    let n_face = layout.ghost.n_face as isize;
    let mut got = vec![0.0; layout.site_len];
    let mut want = vec![0.0; layout.site_len];
    let mut r = ShiftReport {
        hops: 0,
        ghost_hops: 0,
        max_abs: 0.0,
        max_rel: 0.0,
    };
    for parity in field.held_parities(0) {
        for x_cb in 0..layout.volume_cb {
            let c = cb.coords(x_cb, parity);
            let g = global_coords(topo, x, &c);
            for d in (0..N_DIM).filter(|&d| topo.partitioned(d)) {
                let extent = topo.global_extent(d, x[d]) as isize;
                for hop in (1..=n_face).flat_map(|h| [h, -h]) {
                    let n = stencil.neighbor(&c, d, hop)?;
                    load_neighbor(field, n, &mut got);
                    let mut shifted = g;
                    shifted[d] = (g[d] as isize + hop).rem_euclid(extent) as usize;
                    for (i, w) in want.iter_mut().enumerate() {
                        *w = site_value(&shifted, i) * scale;
                    }
                    let norm = f64::from(site_norm(&want)).max(f64::MIN_POSITIVE);
                    for (a, b) in got.iter().zip(&want) {
                        let e = (a - b).abs();
                        r.max_abs = r.max_abs.max(e);
                        r.max_rel = r.max_rel.max(e / norm);
                    }
                    r.hops += 1;
                    if !(0..x[d] as isize).contains(&(c[d] as isize + hop)) {
                        r.ghost_hops += 1;
                    }
                }
            }
        }
    }
    Ok(r)
}

fn exchanged(comm: &LoopbackComm, field: &mut SpinorField<'_>, config: ExchangeConfig) -> Result<usize> {
    let mut pool = StagingPool::new(config.transfer);
    let mut ex = FaceExchange::new(comm, config, &mut pool)?;
    ex.exchange(field, GhostSelection::Full { dagger: false })?;
    Ok(ex.staging().allocation_count())
}

fn rank_harness(comm: &LoopbackComm, scenario: &str) -> ValidationHarness {
    ValidationHarness::new(&format!("{scenario} r{}", comm.rank()))
}

fn single_process(comm: &LoopbackComm) -> Result<ValidationHarness> {
    let mut h = rank_harness(comm, "single 4^4");
    let x = [4, 4, 4, 4];
    let mut f = staggered(comm.topology(), &x, Precision::Double, 1.0)?;
    let layout = f.layout().clone();
    h.check_count("sum ghost_face", layout.ghost.ghost_face.iter().sum(), 0);
    h.check_count("ghost_length", layout.ghost.ghost_length, 0);
    h.check_count("total_length", layout.total_length, layout.length);
    exchanged(comm, &mut f, ExchangeConfig::default())?;
    h.check_bool("exchange leaves layout unchanged", *f.layout() == layout);
    Ok(h)
}

fn split_time(comm: &LoopbackComm) -> Result<ValidationHarness> {
    let mut h = rank_harness(comm, "split t 4x4x4x8");
    let x = [4, 4, 4, 4];
    let mut f = staggered(comm.topology(), &x, Precision::Double, 1.0)?;
    h.check_count("ghost_face[3]", f.layout().ghost.ghost_face[3], 4 * 4 * 4 / 2);
    let allocations = exchanged(comm, &mut f, ExchangeConfig::default())?;
    h.check_count("staging allocations", allocations, 1);
    let r = shift_report(&f, comm.topology(), &x, 1.0)?;
    h.check_count("ghost hops", r.ghost_hops, 2 * (1 + 2 + 3) * 4 * 4 * 4);
    h.check_abs("ghost max |diff|", r.max_abs, 0.0, tolerances::BIT_EXACT);
    Ok(h)
}

fn half_precision(comm: &LoopbackComm) -> Result<ValidationHarness> {
    let mut h = rank_harness(comm, "half split t");
    let x = [4, 4, 4, 4];
    let mut f = staggered(comm.topology(), &x, Precision::Half, 1e-3)?;
    let (_, norm_bytes) = message_bytes(f.layout(), 3);
    let boundary_sites = f.layout().halves() * f.layout().ghost.block_sites(3);
    h.check_count("norms per message", norm_bytes / NORM_BYTES, boundary_sites);
    let config = ExchangeConfig {
        transfer: TransferMode::Pageable,
        ..ExchangeConfig::default()
    };
    let allocations = exchanged(comm, &mut f, config)?;
    h.check_count("staging allocations (data + norm)", allocations, 2);
    let r = shift_report(&f, comm.topology(), &x, 1e-3)?;
    h.check_upper("ghost max rel", r.max_rel, tolerances::HALF_GHOST_REL);
    Ok(h)
}

fn split_four_ways(comm: &LoopbackComm) -> Result<ValidationHarness> {
    let mut h = rank_harness(comm, "split z,t");
    let x = [4, 2, 4, 6];
    let mut f = staggered(comm.topology(), &x, Precision::Double, 1.0)?;
    exchanged(comm, &mut f, ExchangeConfig::default())?;
    let r = shift_report(&f, comm.topology(), &x, 1.0)?;
    h.check_count("hops", r.hops, 2 * 2 * 3 * 4 * 2 * 4 * 6);
    h.check_abs("max |diff|", r.max_abs, 0.0, tolerances::BIT_EXACT);
    Ok(h)
}

fn reconstruct_identity() -> Result<ValidationHarness> {
    let mut h = ValidationHarness::new("12-reconstruct identity");
    let topo = CommTopology::single();
    let p = GaugeParam::new([4, 4, 4, 4], Precision::Double, GaugeFieldOrder::FloatN, Reconstruct::Twelve);
    let mut g = GaugeField::<f64>::new(&p, &topo)?;
    let identity = Su3Matrix::IDENTITY.to_reals();
    let cb = *g.checkerboard();
    let (x, parity) = cb.index(&[1, 2, 1, 1, 0]);
    let mut worst = 0.0_f64;
    for dir in 0..g.n_dir() {
        g.save(&identity, x, dir, parity);
        let back = g.load(x, dir, parity);
        for r in 0..LINK_REALS {
            worst = worst.max((back[r] - identity[r]).abs());
        }
    }
    h.check_abs("max |U - 1|", worst, 0.0, tolerances::BIT_EXACT);
    Ok(h)
}

fn tagged(g: &Coords, dir: usize) -> Link {
    std::array::from_fn(|r| (g[0] + 10 * g[1] + 100 * g[2] + 1000 * g[3] + 10_000 * dir) as f64 * 1e-5 + r as f64 * 1e-7)
}

fn gauge_links(comm: &LoopbackComm) -> Result<ValidationHarness> {
    let mut h = rank_harness(comm, "gauge links");
    let x = [4, 4, 2, 3];
    let topo = comm.topology();
    let mut p = GaugeParam::new(x, Precision::Double, GaugeFieldOrder::Milc, Reconstruct::No);
    p.separate_ghost = true;
    let mut g = GaugeField::<f64>::new(&p, topo)?;
    g.fill_with(|c, dir, _| tagged(&global_coords(topo, &x, c), dir));
    exchange_link_ghost(&mut g, comm)?;

    let cb = *g.checkerboard();
    let t_ext = topo.global_extent(3, x[3]);
    let back_t = (topo.global_offset(3, x[3]) + t_ext - 1) % t_ext;
    let mut mismatched = 0;
    for q in 0..2 {
        for f in 0..g.face_volume_cb(3) {
            // the backward neighbor's last slice, parity swapped for odd X3
            let mut gc = cb.face_coords(3, x[3] - 1, f, q ^ (x[3] % 2));
            gc[3] = back_t;
            if g.load_ghost(f, 3, q) != tagged(&gc, 3) {
                mismatched += 1;
            }
        }
    }
    h.check_count("link ghost mismatches", mismatched, 0);

    let max = link_max(&g, comm)?;
    let want = tagged(&[3, 3, 1, t_ext - 1, 0], 3)[LINK_REALS - 1];
    h.check_abs("global link max", max, want, tolerances::LINK_MAX_ABS);
    Ok(h)
}

/// Run one scenario on every rank of `grid`; a library error is fatal.
fn on_ranks(grid: [usize; N_DIM], scenario: fn(&LoopbackComm) -> Result<ValidationHarness>) -> Vec<ValidationHarness> {
    let t0 = Instant::now();
    let out = run_ranks(grid, |comm| match scenario(&comm) {
        Ok(h) => h,
        Err(e) => {
            error!(rank = comm.rank(), error = %e, "scenario failed");
            comm.exit(1)
        }
    });
    match out {
        Ok(hs) => {
            info!(?grid, elapsed = ?t0.elapsed(), "scenario complete");
            hs
        }
        Err(e) => {
            error!(error = %e, "cannot start loopback ranks");
            std::process::exit(1)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Halo exchange validation: checkerboarded ghost zones over loopback ranks");
    let mut harness = ValidationHarness::new("halo_exchange");

    let scenarios: [(&str, [usize; N_DIM], fn(&LoopbackComm) -> Result<ValidationHarness>); 5] = [
        ("single process", [1, 1, 1, 1], single_process),
        ("split time", [1, 1, 1, 2], split_time),
        ("half precision", [1, 1, 1, 2], half_precision),
        ("split z and t", [1, 1, 2, 2], split_four_ways),
        ("gauge links", [1, 1, 1, 2], gauge_links),
    ];
    for (name, grid, scenario) in scenarios {
        info!("═══ {name} ═══");
        for h in on_ranks(grid, scenario) {
            harness.absorb(h);
        }
    }

    info!("═══ reconstruction ═══");
    match reconstruct_identity() {
        Ok(h) => harness.absorb(h),
        Err(e) => {
            error!(error = %e, "reconstruction scenario failed");
            std::process::exit(1)
        }
    }

    harness.finish();
}
