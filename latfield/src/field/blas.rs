// SPDX-License-Identifier: AGPL-3.0-only

//! Field arithmetic over real sites.
//!
//! Padding and ghost zones never contribute. Every binary operation first
//! runs [`check_field`]. Reductions dispatch on [`FieldLocation`]: device
//! fields reduce in parallel over sites with rayon, host fields serially.

use rayon::prelude::*;

use crate::error::{HaloError, Result};
use crate::lattice::complex_f64::Complex64;

use super::param::FieldLocation;
use super::spinor::SpinorField;

/// Both fields must be live and agree on length, colors, spins and twist
/// flavor.
///
/// # Errors
///
/// `Uninitialized` for a destroyed operand, `FieldMismatch` naming the
/// first attribute that differs.
pub fn check_field(a: &SpinorField<'_>, b: &SpinorField<'_>) -> Result<()> {
    a.ensure_initialized("check_field")?;
    b.ensure_initialized("check_field")?;
    let (pa, pb) = (a.fill(), b.fill());
    let mismatch = |what: &'static str, x: String, y: String| HaloError::FieldMismatch { what, a: x, b: y };
    if a.layout().length != b.layout().length {
        return Err(mismatch(
            "length",
            a.layout().length.to_string(),
            b.layout().length.to_string(),
        ));
    }
    if pa.n_color != pb.n_color {
        return Err(mismatch("colors", pa.n_color.to_string(), pb.n_color.to_string()));
    }
    if pa.n_spin != pb.n_spin {
        return Err(mismatch("spins", pa.n_spin.to_string(), pb.n_spin.to_string()));
    }
    if pa.twist_flavor != pb.twist_flavor {
        return Err(mismatch(
            "twist flavor",
            pa.twist_flavor.to_string(),
            pb.twist_flavor.to_string(),
        ));
    }
    Ok(())
}

fn sites(f: &SpinorField<'_>) -> Vec<(usize, usize)> {
    f.held_parities(0)
        .flat_map(|p| (0..f.layout().volume_cb).map(move |x| (p, x)))
        .collect()
}

/// Σ |ψ|² over real sites.
///
/// # Errors
///
/// `Uninitialized` on a destroyed field.
pub fn norm2(f: &SpinorField<'_>) -> Result<f64> {
    f.ensure_initialized("norm2")?;
    let n = f.layout().site_len;
    let site_norm = |buf: &mut Vec<f64>, &(p, x): &(usize, usize)| {
        f.load_site(p, x, buf);
        buf.iter().map(|v| v * v).sum::<f64>()
    };
    Ok(match f.location() {
        FieldLocation::Device => sites(f)
            .par_iter()
            .map_init(|| vec![0.0; n], site_norm)
            .sum::<f64>(),
        FieldLocation::Host => {
            let mut buf = vec![0.0; n];
            sites(f).iter().map(|s| site_norm(&mut buf, s)).sum::<f64>()
        }
    })
}

/// ⟨a|b⟩ over real sites.
///
/// # Errors
///
/// `FieldMismatch` from [`check_field`].
pub fn cdot(a: &SpinorField<'_>, b: &SpinorField<'_>) -> Result<Complex64> {
    check_field(a, b)?;
    let n = a.layout().site_len;
    let (re, im) = sites(a)
        .par_iter()
        .map_init(
            || (vec![0.0; n], vec![0.0; n]),
            |(va, vb), &(p, x)| {
                a.load_site(p, x, va);
                b.load_site(p, x, vb);
                (0..n / 2).fold((0.0, 0.0), |acc, k| {
                    let z = Complex64::from_pair(va, k).conj() * Complex64::from_pair(vb, k);
                    (acc.0 + z.re, acc.1 + z.im)
                })
            },
        )
        .reduce(|| (0.0, 0.0), |l, r| (l.0 + r.0, l.1 + r.1));
    Ok(Complex64::new(re, im))
}

/// `y ← a·x + y`.
///
/// # Errors
///
/// `FieldMismatch` from [`check_field`].
pub fn axpy(a: f64, x: &SpinorField<'_>, y: &mut SpinorField<'_>) -> Result<()> {
    check_field(x, y)?;
    let n = x.layout().site_len;
    let (mut vx, mut vy) = (vec![0.0; n], vec![0.0; n]);
    for (p, s) in sites(y) {
        x.load_site(p, s, &mut vx);
        y.load_site(p, s, &mut vy);
        for (o, v) in vy.iter_mut().zip(&vx) {
            *o += a * v;
        }
        y.save_site(p, s, &vy);
    }
    Ok(())
}

/// `dst ← src`, converting precision.
///
/// # Errors
///
/// `FieldMismatch` from [`check_field`].
pub fn copy(dst: &mut SpinorField<'_>, src: &SpinorField<'_>) -> Result<()> {
    check_field(dst, src)?;
    let mut v = vec![0.0; src.layout().site_len];
    for (p, x) in sites(dst) {
        src.load_site(p, x, &mut v);
        dst.save_site(p, x, &v);
    }
    Ok(())
}

/// Zero every real site.
///
/// # Errors
///
/// `Uninitialized` on a destroyed field.
pub fn zero(f: &mut SpinorField<'_>) -> Result<()> {
    f.ensure_initialized("zero")?;
    let v = vec![0.0; f.layout().site_len];
    for (p, x) in sites(f) {
        f.save_site(p, x, &v);
    }
    Ok(())
}
