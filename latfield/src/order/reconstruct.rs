// SPDX-License-Identifier: AGPL-3.0-only

//! Gauge-link reconstruction codecs.
//!
//! A stored link is `W = U/u0` with `U` in SU(3) (12, 8) or U(3) (13, 9),
//! where `u0` is the anisotropy for spatial links and the temporal boundary
//! sign on the last global time slice. The codecs keep only what unitarity
//! cannot regenerate:
//!
//! | Codec | Stored reals | Regenerated |
//! |-------|--------------|-------------|
//! | 18 | all | nothing (optional link-max scale) |
//! | 12 | rows 0, 1 | row 2 = `u0 · conj(row0 × row1)` |
//! | 13 | rows 0, 1 + phase | row 2 rotated by `e^{iθ}` |
//! | 8  | `arg W00`, `arg W20`, `W01`, `W02`, `W10` | rows 1, 2 from column/row norms |
//! | 9  | 8 + phase | 8 on `e^{-iθ/3} W`, then rotated back |
//!
//! `θ = arg(det W / u0³)`. Half storage keeps angles as `θ/π`.
//!
//! # References
//!
//! - Clark et al., "Solving Lattice QCD systems of equations using mixed
//!   precision solvers on GPUs", Comput. Phys. Commun. 181, 1517 (2010)

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::field::param::Precision;
use crate::lattice::complex_f64::Complex64;
use crate::lattice::su3::Su3Matrix;

use super::Link;

/// Reconstruction level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reconstruct {
    /// All 18 reals.
    No,
    /// Two rows.
    Twelve,
    /// Two rows plus a U(1) phase.
    Thirteen,
    /// Two angles and three elements.
    Eight,
    /// Eight plus a U(1) phase.
    Nine,
}

impl Reconstruct {
    /// Reals stored per link, excluding the phase slot.
    #[must_use]
    pub const fn recon_len(self) -> usize {
        match self {
            Self::No => 18,
            Self::Twelve | Self::Thirteen => 12,
            Self::Eight | Self::Nine => 8,
        }
    }

    /// Whether a phase slot is stored.
    #[must_use]
    pub const fn has_phase(self) -> bool {
        matches!(self, Self::Thirteen | Self::Nine)
    }
}

impl std::fmt::Display for Reconstruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = match self {
            Self::No => 18,
            Self::Twelve => 12,
            Self::Thirteen => 13,
            Self::Eight => 8,
            Self::Nine => 9,
        };
        write!(f, "{n}")
    }
}

/// A reconstruction level bound to a storage precision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Codec {
    /// Reconstruction level.
    pub recon: Reconstruct,
    /// Divides stored reals of an 18-real link (1 unless half fat links).
    pub scale: f64,
    /// Multiplies stored angles (`1/π` for half).
    pub angle_scale: f64,
}

fn c(link: &Link, row: usize, col: usize) -> Complex64 {
    Complex64::from_pair(link, 3 * row + col)
}

fn phase_of(w: &Su3Matrix, u0: f64) -> f64 {
    w.det().scale(1.0 / (u0 * u0 * u0)).arg()
}

fn third_row(link: &mut Link, u0: f64, rotation: Complex64) {
    let a = [c(link, 0, 0), c(link, 0, 1), c(link, 0, 2)];
    let b = [c(link, 1, 0), c(link, 1, 1), c(link, 1, 2)];
    let row = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ];
    for (j, z) in row.into_iter().enumerate() {
        (z.conj().scale(u0) * rotation).write_pair(link, 6 + j);
    }
}

impl Codec {
    /// Codec for `recon` stored at `precision`.
    #[must_use]
    pub fn new(recon: Reconstruct, precision: Precision, scale: f64) -> Self {
        Self {
            recon,
            scale: if recon == Reconstruct::No { scale } else { 1.0 },
            angle_scale: if precision == Precision::Half { 1.0 / PI } else { 1.0 },
        }
    }

    /// Encode `link` into `out[..recon_len]`; returns the stored phase.
    pub fn pack(&self, link: &Link, u0: f64, out: &mut [f64]) -> f64 {
        match self.recon {
            Reconstruct::No => {
                let inv = 1.0 / self.scale;
                for (o, v) in out.iter_mut().zip(link) {
                    *o = v * inv;
                }
                0.0
            }
            Reconstruct::Twelve => {
                out[..12].copy_from_slice(&link[..12]);
                0.0
            }
            Reconstruct::Thirteen => {
                out[..12].copy_from_slice(&link[..12]);
                phase_of(&Su3Matrix::from_reals(link), u0) * self.angle_scale
            }
            Reconstruct::Eight => {
                self.pack8(link, out);
                0.0
            }
            Reconstruct::Nine => {
                let w = Su3Matrix::from_reals(link);
                let theta = phase_of(&w, u0);
                let v = w.scale_complex(Complex64::from_polar(-theta / 3.0));
                self.pack8(&v.to_reals(), out);
                theta * self.angle_scale
            }
        }
    }

    fn pack8(&self, link: &Link, out: &mut [f64]) {
        out[0] = c(link, 0, 0).arg() * self.angle_scale;
        out[1] = c(link, 2, 0).arg() * self.angle_scale;
        out[2..6].copy_from_slice(&link[2..6]);
        out[6..8].copy_from_slice(&link[6..8]);
    }

    /// Decode `packed[..recon_len]` with its stored `phase`.
    #[must_use]
    pub fn unpack(&self, packed: &[f64], phase: f64, u0: f64) -> Link {
        let mut link = [0.0; 18];
        match self.recon {
            Reconstruct::No => {
                for (l, v) in link.iter_mut().zip(packed) {
                    *l = v * self.scale;
                }
            }
            Reconstruct::Twelve => {
                link[..12].copy_from_slice(&packed[..12]);
                third_row(&mut link, u0, Complex64::ONE);
            }
            Reconstruct::Thirteen => {
                link[..12].copy_from_slice(&packed[..12]);
                third_row(&mut link, u0, Complex64::from_polar(phase / self.angle_scale));
            }
            Reconstruct::Eight => self.unpack8(packed, u0, &mut link),
            Reconstruct::Nine => {
                self.unpack8(packed, u0, &mut link);
                let rot = Complex64::from_polar(phase / self.angle_scale / 3.0);
                link = Su3Matrix::from_reals(&link).scale_complex(rot).to_reals();
            }
        }
        link
    }

    fn unpack8(&self, packed: &[f64], u0: f64, link: &mut Link) {
        link[2..8].copy_from_slice(&packed[2..8]);
        let a1 = c(link, 0, 1);
        let a2 = c(link, 0, 2);
        let b0 = c(link, 1, 0);

        let inv_u0_sq = 1.0 / (u0 * u0);
        let row_sum = a1.abs_sq() + a2.abs_sq();
        let a0_abs_sq = (inv_u0_sq - row_sum).max(0.0);
        let a0 = Complex64::from_polar(packed[0] / self.angle_scale).scale(a0_abs_sq.sqrt());
        let c0_abs_sq = (inv_u0_sq - (a0_abs_sq + b0.abs_sq())).max(0.0);
        let c0 = Complex64::from_polar(packed[1] / self.angle_scale).scale(c0_abs_sq.sqrt());

        let r_inv2 = 1.0 / (u0 * row_sum);
        let a0c = a0.conj();
        let b1 = -(c0.conj() * a2.conj() + a0c * b0 * a1.scale(u0)).scale(r_inv2);
        let b2 = (c0.conj() * a1.conj() - a0c * b0 * a2.scale(u0)).scale(r_inv2);
        let c1 = (b0.conj() * a2.conj() - a0c * c0 * a1.scale(u0)).scale(r_inv2);
        let c2 = -(b0.conj() * a1.conj() + a0c * c0 * a2.scale(u0)).scale(r_inv2);

        a0.write_pair(link, 0);
        b1.write_pair(link, 4);
        b2.write_pair(link, 5);
        c0.write_pair(link, 6);
        c1.write_pair(link, 7);
        c2.write_pair(link, 8);
    }
}
