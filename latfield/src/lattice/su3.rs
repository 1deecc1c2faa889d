// SPDX-License-Identifier: AGPL-3.0-only

//! SU(3) link matrices.
//!
//! Links are moved between layouts as 18 reals, row-major with `(re, im)`
//! interleaved: element `(i, j)` lives at `reals[2(3i + j)]`. This module
//! converts between that register form and [`Su3Matrix`], and generates the
//! random SU(3)/U(3) links used to exercise the reconstruction codecs.
//!
//! # References
//!
//! - Gattringer & Lang, "QCD on the Lattice" (2010), Ch. 2

use std::ops::Mul;

use super::complex_f64::Complex64;
use super::constants::{lcg_gaussian, lcg_uniform_f64, LATTICE_DIVISION_GUARD, LINK_REALS};

/// 3×3 complex matrix, row-major `m[row][col]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[must_use]
pub struct Su3Matrix {
    /// Matrix elements m[row][col].
    pub m: [[Complex64; 3]; 3],
}

impl Mul for Su3Matrix {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                let mut s = Complex64::ZERO;
                for k in 0..3 {
                    s += self.m[i][k] * rhs.m[k][j];
                }
                r.m[i][j] = s;
            }
        }
        r
    }
}

impl Su3Matrix {
    /// 3×3 identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            [Complex64::ONE, Complex64::ZERO, Complex64::ZERO],
            [Complex64::ZERO, Complex64::ONE, Complex64::ZERO],
            [Complex64::ZERO, Complex64::ZERO, Complex64::ONE],
        ],
    };

    /// Zero matrix.
    pub const ZERO: Self = Self {
        m: [[Complex64::ZERO; 3]; 3],
    };

    /// Unpack 18 register reals.
    pub fn from_reals(v: &[f64; LINK_REALS]) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                r.m[i][j] = Complex64::from_pair(v, 3 * i + j);
            }
        }
        r
    }

    /// Pack into 18 register reals.
    #[must_use]
    pub fn to_reals(&self) -> [f64; LINK_REALS] {
        let mut v = [0.0; LINK_REALS];
        for i in 0..3 {
            for j in 0..3 {
                self.m[i][j].write_pair(&mut v, 3 * i + j);
            }
        }
        v
    }

    /// Conjugate transpose.
    pub fn adjoint(self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                r.m[i][j] = self.m[j][i].conj();
            }
        }
        r
    }

    /// Determinant.
    pub fn det(self) -> Complex64 {
        let m = &self.m;
        let a = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]);
        let b = m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0]);
        let c = m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        a - b + c
    }

    /// Scale by a real number.
    pub fn scale(self, s: f64) -> Self {
        self.scale_complex(Complex64::new(s, 0.0))
    }

    /// Scale by a complex number.
    pub fn scale_complex(self, s: Complex64) -> Self {
        let mut r = self;
        for row in &mut r.m {
            for cell in row.iter_mut() {
                *cell *= s;
            }
        }
        r
    }

    /// Squared norm of one row.
    #[must_use]
    pub fn row_norm_sq(&self, row: usize) -> f64 {
        self.m[row].iter().map(|z| z.abs_sq()).sum()
    }

    /// Largest |U U† - I| element, a measure of distance from U(3).
    #[must_use]
    pub fn unitarity_deviation(&self) -> f64 {
        let p = *self * self.adjoint();
        let mut dev: f64 = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                let target = if i == j { Complex64::ONE } else { Complex64::ZERO };
                dev = dev.max((p.m[i][j] - target).abs());
            }
        }
        dev
    }

    /// Project onto SU(3): Gram-Schmidt on the first two rows, third row
    /// from the conjugate cross product (fixes det = 1).
    pub fn reunitarize(self) -> Self {
        let mut u = self;

        let n0 = u.row_norm_sq(0).sqrt();
        if n0 > LATTICE_DIVISION_GUARD {
            u.m[0] = u.m[0].map(|z| z.scale(1.0 / n0));
        }

        let mut dot01 = Complex64::ZERO;
        for j in 0..3 {
            dot01 += u.m[0][j].conj() * u.m[1][j];
        }
        for j in 0..3 {
            let sub = u.m[0][j] * dot01;
            u.m[1][j] -= sub;
        }
        let n1 = u.row_norm_sq(1).sqrt();
        if n1 > LATTICE_DIVISION_GUARD {
            u.m[1] = u.m[1].map(|z| z.scale(1.0 / n1));
        }

        u.m[2][0] = (u.m[0][1] * u.m[1][2] - u.m[0][2] * u.m[1][1]).conj();
        u.m[2][1] = (u.m[0][2] * u.m[1][0] - u.m[0][0] * u.m[1][2]).conj();
        u.m[2][2] = (u.m[0][0] * u.m[1][1] - u.m[0][1] * u.m[1][0]).conj();

        u
    }

    /// Random SU(3) matrix `≈ exp(i ε H)` with H traceless Hermitian.
    ///
    /// Small `epsilon` stays near the identity; `HOT_START_EPSILON` spreads
    /// links across the group.
    pub fn random_near_identity(seed: &mut u64, epsilon: f64) -> Self {
        let mut h = [[Complex64::ZERO; 3]; 3];
        let mut rand_gauss = || -> f64 { lcg_gaussian(seed) };

        let a3 = rand_gauss() * epsilon;
        let a8 = rand_gauss() * epsilon;
        h[0][0] = Complex64::new(a3 + a8 / 3.0_f64.sqrt(), 0.0);
        h[1][1] = Complex64::new(-a3 + a8 / 3.0_f64.sqrt(), 0.0);
        h[2][2] = Complex64::new(-2.0 * a8 / 3.0_f64.sqrt(), 0.0);

        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            let re = rand_gauss() * epsilon;
            let im = rand_gauss() * epsilon;
            h[i][j] = Complex64::new(re, im);
            h[j][i] = Complex64::new(re, -im);
        }

        // second-order expansion of exp(iH), projected back onto the group
        let mut result = Self::IDENTITY;
        for (i, row) in result.m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell += Complex64::I * h[i][j];
                let h2_ij = (0..3).fold(Complex64::ZERO, |acc, k| acc + h[i][k] * h[k][j]);
                *cell -= h2_ij.scale(0.5);
            }
        }

        result.reunitarize()
    }

    /// Random U(3) matrix: a random SU(3) element times a random U(1) phase.
    pub fn random_u3(seed: &mut u64, epsilon: f64) -> Self {
        let su3 = Self::random_near_identity(seed, epsilon);
        let phi = (2.0 * lcg_uniform_f64(seed) - 1.0) * std::f64::consts::PI;
        su3.scale_complex(Complex64::from_polar(phi))
    }
}
