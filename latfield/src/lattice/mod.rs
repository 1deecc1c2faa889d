// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice primitives shared by the field, order and halo modules.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `complex_f64` | Register-form complex arithmetic |
//! | `su3` | SU(3)/U(3) links and their 18-real register form |
//! | `constants` | Alignment, fixed-point scale, LCG |

/// Complex f64 arithmetic.
pub mod complex_f64;
/// Alignment, fixed-point and LCG constants.
pub mod constants;
/// SU(3) link matrices.
pub mod su3;
