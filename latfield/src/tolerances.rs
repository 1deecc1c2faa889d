// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized validation tolerances with numerical justification.
//!
//! Every threshold used by the halo-exchange validation binary and the test
//! suites is defined here with the reason for its value.
//!
//! # Tolerance categories
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Bit-exact | Data movement only | 0.0 for double-precision ghosts |
//! | Machine precision | IEEE 754 f64 | 1e-10 for link reconstruction |
//! | Storage precision | 16-bit fixed point | 1e-3 for half-precision fields |

// ═══════════════════════════════════════════════════════════════════
// Data movement (no arithmetic on the exchanged values)
// ═══════════════════════════════════════════════════════════════════

/// Ghost zones received in double precision without spin projection, and
/// links whose reconstruction involves only exact products (the identity).
///
/// Packing, transport and unpacking only copy reals, so the ghost must equal
/// the neighbor's interior bit for bit.
pub const BIT_EXACT: f64 = 0.0;

/// Ghost zones received in single precision.
///
/// The storage round trip f64 → f32 → f64 happens once on both sides, so a
/// ghost equals the neighbor's stored value exactly; the bound only covers
/// comparison against an f64 reference field.
pub const GHOST_SINGLE_REL: f64 = 1e-6;

// ═══════════════════════════════════════════════════════════════════
// Machine-precision tolerances (IEEE 754 f64)
// ═══════════════════════════════════════════════════════════════════

/// Reconstructing compressed SU(3) links in double precision.
///
/// The third row is a cross product of two stored rows; 8-parameter
/// reconstruction adds a square root and a handful of trig calls. 1e-10
/// leaves five digits for that accumulation.
pub const RECON_DOUBLE_ABS: f64 = 1e-10;

/// Angle parameters of 8/9/13 reconstruction scaled into `[-1, 1]`.
///
/// Scaling by 1/π and back is two roundings per angle; the trig functions
/// that rebuild the link amplify that by at most a small constant.
pub const RECON_HALF_ANGLE_ABS: f64 = 1e-6;

/// Spin projection followed by reconstruction.
///
/// Every γ entry is 0, ±1 or ±i, so the only rounding is one addition per
/// component.
pub const SPIN_PROJECT_ABS: f64 = 1e-12;

/// Largest link magnitude compared across ranks.
///
/// The maximum is a pure comparison reduction and must agree exactly on every
/// rank; the bound only absorbs the f32 storage of single-precision fields.
pub const LINK_MAX_ABS: f64 = 1e-7;

// ═══════════════════════════════════════════════════════════════════
// Storage-precision tolerances (16-bit fixed point)
// ═══════════════════════════════════════════════════════════════════

/// Relative error of a half-precision field against its double source.
///
/// Each real is stored as `i16` against the per-site maximum, a relative
/// step of 1/32767 ≈ 3e-5 of the site norm. Squared norms summed over the
/// field stay well inside 1e-3.
pub const HALF_FIELD_REL: f64 = 1e-3;

/// Absolute error of one half-precision ghost real against the sender's
/// double-precision interior, relative to that site's norm.
///
/// One quantization step is 1/32767 of the norm; the norm itself is rounded
/// to f32. Twice the step covers both.
pub const HALF_GHOST_REL: f64 = 2.0 / 32767.0;
