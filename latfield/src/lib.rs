// SPDX-License-Identifier: AGPL-3.0-only

//! hotSpring lattice fields: checkerboarded layout, ghost zones and halo
//! exchange for distributed lattice QCD.
//!
//! A 4-D (optionally 5-D) lattice is split across a process grid. Each
//! process holds its local sub-lattice plus ghost zones, copies of the
//! neighbors' boundary slices, refreshed by a halo exchange before every
//! stencil application.
//!
//! ## Modules
//!   - `field` — spinor/gauge descriptors, layout, ghost-zone geometry, BLAS
//!   - `order` — gauge storage orders, link reconstruction, fetch paths
//!   - `halo` — pack/unpack, spin projection, stencil addressing, link ghosts
//!   - `exchange` — staging buffers, execution stream, `FaceExchange`
//!   - `comm` — process grid and message transport
//!   - `lattice` — complex and SU(3) primitives, constants
//!   - `tolerances` / `validation` — acceptance thresholds and harness
//!
//! ## Validation binaries
//!   - `validate_halo_exchange` — loopback exchanges on split process grids
//!     checked against a single-process reference

/// Message transport and process grid.
pub mod comm;
/// Typed errors.
pub mod error;
/// Ghost-zone exchange orchestration.
pub mod exchange;
/// Field descriptors and layout.
pub mod field;
/// Halo packing and neighbor addressing.
pub mod halo;
/// Lattice primitives.
pub mod lattice;
/// Gauge storage orders.
pub mod order;
/// Validation tolerances.
pub mod tolerances;
/// Validation harness.
pub mod validation;

pub use error::{HaloError, Result};
