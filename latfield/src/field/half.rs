// SPDX-License-Identifier: AGPL-3.0-only

//! Half-precision fixed point.
//!
//! A half-precision site stores its reals as `i16` relative to a per-site
//! f32 norm: `v = s · norm / MAX_SHORT`. The norm is the largest magnitude in
//! the site, so every stored short lies in `[-MAX_SHORT, MAX_SHORT]`.

use crate::lattice::constants::MAX_SHORT;
use crate::order::real::StorageReal;

/// Norm for a site: its largest absolute value, rounded to f32.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn site_norm(values: &[f64]) -> f32 {
    values.iter().fold(0.0_f64, |m, v| m.max(v.abs())) as f32
}

/// Factor applied to register values before they are stored as shorts.
#[must_use]
pub fn inverse_norm(norm: f32) -> f64 {
    if norm == 0.0 {
        0.0
    } else {
        1.0 / f64::from(norm)
    }
}

/// Quantize `values` against `norm` into `out`.
pub fn quantize(values: &[f64], norm: f32, out: &mut [i16]) {
    let inv = inverse_norm(norm);
    for (o, &v) in out.iter_mut().zip(values) {
        *o = i16::from_reg(v * inv);
    }
}

/// Inverse of [`quantize`].
pub fn dequantize(shorts: &[i16], norm: f32, out: &mut [f64]) {
    let n = f64::from(norm);
    for (o, &s) in out.iter_mut().zip(shorts) {
        *o = s.to_reg() * n;
    }
}

/// Worst-case reconstruction error for a site with this norm.
#[must_use]
pub fn quantization_step(norm: f32) -> f64 {
    f64::from(norm) / MAX_SHORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_one_step() {
        let v = [0.3, -1.7, 2.25, 0.0, -0.001, 1.9999];
        let norm = site_norm(&v);
        assert_eq!(norm, 2.25);
        let mut s = [0i16; 6];
        quantize(&v, norm, &mut s);
        let mut back = [0.0; 6];
        dequantize(&s, norm, &mut back);
        for (a, b) in v.iter().zip(&back) {
            assert!((a - b).abs() <= quantization_step(norm), "{a} vs {b}");
        }
    }

    #[test]
    fn largest_value_maps_to_max_short() {
        let v = [-4.0, 1.0];
        let mut s = [0i16; 2];
        quantize(&v, site_norm(&v), &mut s);
        assert_eq!(s[0], -32767);
    }

    #[test]
    fn zero_site_stores_zeros() {
        let v = [0.0; 4];
        let mut s = [5i16; 4];
        quantize(&v, site_norm(&v), &mut s);
        assert_eq!(s, [0; 4]);
    }

    #[test]
    fn requantizing_with_same_norm_is_exact() {
        let shorts = [12, -32767, 400, 0];
        let norm = 0.75_f32;
        let mut v = [0.0; 4];
        dequantize(&shorts, norm, &mut v);
        let mut again = [0i16; 4];
        quantize(&v, norm, &mut again);
        assert_eq!(again, shorts);
    }
}
