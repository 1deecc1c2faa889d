// SPDX-License-Identifier: AGPL-3.0-only

//! Halo pack/unpack and neighbor addressing.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `project` | Spin projection of spin-4 boundary sites |
//! | `pack` | Spinor ghost messages and the parity-swap rule |
//! | `stencil` | Local-or-ghost neighbor resolution |
//! | `links` | Gauge-link ghost exchange and link maximum |

/// Gauge-link exchange helpers.
pub mod links;
/// Spinor ghost packing.
pub mod pack;
/// Spin projectors.
pub mod project;
/// Neighbor resolution.
pub mod stencil;

pub use links::{exchange_extended_ghost, exchange_link_ghost, link_max, ExtendedGhost, GhostFaces};
pub use pack::{message_bytes, pack_ghost, unpack_ghost, GhostSelection};
pub use stencil::{load_neighbor, Neighbor, Stencil};
