// SPDX-License-Identifier: AGPL-3.0-only

//! Spin projection of spin-4 ghost sites (UKQCD basis).
//!
//! Only half of `(1 ± γ_μ)ψ` is independent, so spin-4 fields send two spin
//! components per boundary site. With `ψ = (u, v)` in 2-spinor blocks:
//!
//! ```text
//! γ_k = [[0, iσ_k], [-iσ_k, 0]]    k = 1, 2, 3
//! γ_4 = diag(1, 1, -1, -1)
//! (1 + sγ_k)ψ = (h, -s·iσ_k·h)     h = u + s·iσ_k·v
//! (1 + γ_4)ψ  = (2u, 0)
//! (1 - γ_4)ψ  = (0, 2v)
//! ```
//!
//! Site reals are ordered `(spin·n_color + color)·2 + re/im`.

use crate::comm::NeighborDir;
use crate::lattice::complex_f64::Complex64;

/// 4×4 Dirac matrix.
pub type Gamma = [[Complex64; 4]; 4];

/// `iσ_k` for `k = 0, 1, 2` (σ_x, σ_y, σ_z).
fn i_sigma(k: usize) -> [[Complex64; 2]; 2] {
    let z = Complex64::ZERO;
    let i = Complex64::I;
    match k {
        0 => [[z, i], [i, z]],
        1 => [[z, Complex64::ONE], [-Complex64::ONE, z]],
        _ => [[i, z], [z, -i]],
    }
}

/// `γ_μ` in the UKQCD basis, `mu = 0..4` with 3 the time direction.
#[must_use]
pub fn gamma(mu: usize) -> Gamma {
    let z = Complex64::ZERO;
    let mut g = [[z; 4]; 4];
    if mu == 3 {
        g[0][0] = Complex64::ONE;
        g[1][1] = Complex64::ONE;
        g[2][2] = -Complex64::ONE;
        g[3][3] = -Complex64::ONE;
        return g;
    }
    let s = i_sigma(mu);
    for a in 0..2 {
        for b in 0..2 {
            g[a][b + 2] = s[a][b];
            g[a + 2][b] = -s[a][b];
        }
    }
    g
}

/// Projector sign for data sent toward `send`: backward sends carry
/// `(1 - γ)ψ`, forward sends `(1 + γ)ψ`, reversed under `dagger`.
#[must_use]
pub const fn projection_sign(send: NeighborDir, dagger: bool) -> f64 {
    match (send, dagger) {
        (NeighborDir::Forward, false) | (NeighborDir::Backward, true) => 1.0,
        (NeighborDir::Backward, false) | (NeighborDir::Forward, true) => -1.0,
    }
}

/// First spin row of the kept pair.
const fn kept_rows(mu: usize, sign: f64) -> usize {
    if mu == 3 && sign < 0.0 {
        2
    } else {
        0
    }
}

fn spin(psi: &[f64], s: usize, c: usize, nc: usize) -> Complex64 {
    Complex64::from_pair(psi, s * nc + c)
}

/// Project the spin-4 site `psi` with `(1 + sign·γ_mu)` into the half
/// spinor `out` (`psi.len() / 2` reals).
pub fn spin_project(mu: usize, sign: f64, psi: &[f64], out: &mut [f64]) {
    let nc = psi.len() / 8;
    if mu == 3 {
        let r = kept_rows(mu, sign);
        for s in 0..2 {
            for c in 0..nc {
                spin(psi, r + s, c, nc).scale(2.0).write_pair(out, s * nc + c);
            }
        }
        return;
    }
    let m = i_sigma(mu);
    for a in 0..2 {
        for c in 0..nc {
            let mut h = spin(psi, a, c, nc);
            for b in 0..2 {
                h += (m[a][b] * spin(psi, b + 2, c, nc)).scale(sign);
            }
            h.write_pair(out, a * nc + c);
        }
    }
}

/// Expand a half spinor produced by [`spin_project`] back to
/// `(1 + sign·γ_mu)ψ` in `out` (`2 · half.len()` reals).
pub fn spin_reconstruct(mu: usize, sign: f64, half: &[f64], out: &mut [f64]) {
    let nc = half.len() / 4;
    out[..4 * nc * 2].fill(0.0);
    if mu == 3 {
        let r = kept_rows(mu, sign);
        for s in 0..2 {
            for c in 0..nc {
                spin(half, s, c, nc).write_pair(out, (r + s) * nc + c);
            }
        }
        return;
    }
    let m = i_sigma(mu);
    for a in 0..2 {
        for c in 0..nc {
            spin(half, a, c, nc).write_pair(out, a * nc + c);
            let mut lower = Complex64::ZERO;
            for b in 0..2 {
                lower -= (m[a][b] * spin(half, b, c, nc)).scale(sign);
            }
            lower.write_pair(out, (a + 2) * nc + c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::constants::lcg_gaussian;
    use crate::tolerances::SPIN_PROJECT_ABS;

    fn mat_mul(a: &Gamma, b: &Gamma) -> Gamma {
        let mut c = [[Complex64::ZERO; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    c[i][j] += a[i][k] * b[k][j];
                }
            }
        }
        c
    }

    #[test]
    fn gammas_anticommute() {
        for mu in 0..4 {
            for nu in 0..4 {
                let ab = mat_mul(&gamma(mu), &gamma(nu));
                let ba = mat_mul(&gamma(nu), &gamma(mu));
                for i in 0..4 {
                    for j in 0..4 {
                        let want = if mu == nu && i == j { 2.0 } else { 0.0 };
                        let got = ab[i][j] + ba[i][j];
                        assert!((got.re - want).abs() < SPIN_PROJECT_ABS, "mu={mu} nu={nu}");
                        assert!(got.im.abs() < SPIN_PROJECT_ABS, "mu={mu} nu={nu}");
                    }
                }
            }
        }
    }

    fn apply(mu: usize, sign: f64, psi: &[f64]) -> Vec<f64> {
        let nc = psi.len() / 8;
        let g = gamma(mu);
        let mut out = psi.to_vec();
        for a in 0..4 {
            for c in 0..nc {
                let mut v = spin(psi, a, c, nc);
                for b in 0..4 {
                    v += (g[a][b] * spin(psi, b, c, nc)).scale(sign);
                }
                v.write_pair(&mut out, a * nc + c);
            }
        }
        out
    }

    #[test]
    fn reconstruction_restores_projected_spinor() {
        let mut seed = 99u64;
        let psi: Vec<f64> = (0..24).map(|_| lcg_gaussian(&mut seed)).collect();
        for mu in 0..4 {
            for sign in [1.0, -1.0] {
                let mut half = [0.0; 12];
                let mut full = [0.0; 24];
                spin_project(mu, sign, &psi, &mut half);
                spin_reconstruct(mu, sign, &half, &mut full);
                let want = apply(mu, sign, &psi);
                for (a, b) in full.iter().zip(&want) {
                    assert!((a - b).abs() < SPIN_PROJECT_ABS, "mu={mu} sign={sign}");
                }
            }
        }
    }

    #[test]
    fn dagger_flips_projector() {
        assert_eq!(projection_sign(NeighborDir::Forward, false), 1.0);
        assert_eq!(projection_sign(NeighborDir::Backward, false), -1.0);
        assert_eq!(projection_sign(NeighborDir::Forward, true), -1.0);
        assert_eq!(projection_sign(NeighborDir::Backward, true), 1.0);
    }
}
