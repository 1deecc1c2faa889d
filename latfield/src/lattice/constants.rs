// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized constants for field layout and test-field generation.
//!
//! Collects the alignment and fixed-point constants shared by the layout,
//! ghost and order modules, plus the LCG used to build deterministic
//! SU(3) configurations and spinors.

/// Number of colors in QCD (SU(3)).
pub const N_COLORS: usize = 3;

/// Number of space-time dimensions that can be partitioned.
pub const N_DIM: usize = 4;

/// Largest supported field dimensionality (4D plus a 5th depth/flavor axis).
pub const MAX_DIM: usize = 5;

/// Reals per full 3×3 complex link.
pub const LINK_REALS: usize = 2 * N_COLORS * N_COLORS;

/// Largest magnitude of a half-precision (i16) element.
pub const MAX_SHORT: f64 = 32767.0;

/// Alignment of each parity half of a field allocation, in bytes.
///
/// Twice the texture-unit requirement so either half can be bound by a
/// pointer offset alone.
pub const TEX_ALIGN_REQ: usize = 512 * 2;

/// Round `bytes` up to the next multiple of [`TEX_ALIGN_REQ`].
#[inline]
#[must_use]
pub const fn align_up(bytes: usize) -> usize {
    bytes.div_ceil(TEX_ALIGN_REQ) * TEX_ALIGN_REQ
}

/// LCG multiplier (Knuth MMIX).
pub const LCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;

/// LCG increment (Knuth MMIX).
pub const LCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// Divisor for 53-bit LCG → uniform [0, 1) conversion.
pub const LCG_53_DIVISOR: f64 = (1u64 << 53) as f64;

/// Division guard for Gram-Schmidt and logarithms.
pub const LATTICE_DIVISION_GUARD: f64 = 1e-30;

/// Perturbation scale for random SU(3) links far from the identity.
pub const HOT_START_EPSILON: f64 = 1.5;

/// Advance the LCG state by one step.
#[inline]
pub fn lcg_step(seed: &mut u64) {
    *seed = seed
        .wrapping_mul(LCG_MULTIPLIER)
        .wrapping_add(LCG_INCREMENT);
}

/// Uniform f64 in [0, 1) from 53 bits of LCG state.
#[inline]
pub fn lcg_uniform_f64(seed: &mut u64) -> f64 {
    lcg_step(seed);
    (*seed >> 11) as f64 / LCG_53_DIVISOR
}

/// Box-Muller Gaussian deviate N(0, 1) from two LCG draws.
#[inline]
pub fn lcg_gaussian(seed: &mut u64) -> f64 {
    let u1 = lcg_uniform_f64(seed);
    let u2 = lcg_uniform_f64(seed);
    (-2.0 * u1.max(LATTICE_DIVISION_GUARD).ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
