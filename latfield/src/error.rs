// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for field layout, ghost zones and halo exchange.
//!
//! Every variant carries the offending values so a caller that terminates on
//! error can report which invariant was violated without re-deriving it.

use thiserror::Error;

/// Errors arising from layout computation, field access, or exchange.
#[derive(Debug, Error)]
pub enum HaloError {
    /// Dimensionality outside `1..=MAX_DIM`.
    #[error("Number of dimensions nDim = {n_dim} too great (maximum {max})")]
    TooManyDimensions {
        /// Requested dimensionality.
        n_dim: usize,
        /// Largest supported dimensionality.
        max: usize,
    },

    /// A two-flavor doublet needs a fifth dimension of extent 2.
    #[error("Twist flavor {twist} requires a 5th dimension of extent 2, found {extent}")]
    FlavorExtent {
        /// Twist flavor requested.
        twist: String,
        /// Extent found in the 5th dimension (0 when absent).
        extent: usize,
    },

    /// Checkerboarding needs an even site count and an even fastest extent.
    #[error("Checkerboarded field needs even {what}, found {value}")]
    OddCheckerboard {
        /// Quantity that must be even.
        what: &'static str,
        /// Value found.
        value: usize,
    },

    /// A descriptor attribute is outside the supported set.
    #[error("Unsupported {what}: {value}")]
    Unsupported {
        /// Attribute name.
        what: &'static str,
        /// Offending value.
        value: String,
    },

    /// Two fields combined in one operation disagree on an attribute.
    #[error("Field mismatch in {what}: {a} != {b}")]
    FieldMismatch {
        /// Attribute that differs.
        what: &'static str,
        /// Value on the left operand.
        a: String,
        /// Value on the right operand.
        b: String,
    },

    /// Addressing call not defined for this site subset.
    #[error("{call} is not defined for site subset {subset}")]
    UnsupportedSiteSubset {
        /// Accessor that was called.
        call: &'static str,
        /// Subset of the field.
        subset: String,
    },

    /// `reset` called on a field that was never constructed or was destroyed.
    #[error("Cannot reset a field that has not been initialized")]
    ResetBeforeInit,

    /// Site data accessed on a field whose storage was released.
    #[error("{call} on a destroyed field")]
    Uninitialized {
        /// Operation that was called.
        call: &'static str,
    },

    /// Ghost depth deeper than the local extent it is cut from.
    #[error("Ghost depth {n_face} exceeds local extent {extent} in dimension {dim}")]
    FaceDeeperThanExtent {
        /// Partitioned dimension.
        dim: usize,
        /// Local extent along it.
        extent: usize,
        /// Requested ghost depth.
        n_face: usize,
    },

    /// A single-parity field cannot honour the parity swap of an odd extent.
    #[error("Parity field cannot be exchanged across odd local extent {extent} in dimension {dim}")]
    OddExtentParityField {
        /// Partitioned dimension.
        dim: usize,
        /// Odd local extent.
        extent: usize,
    },

    /// Pad too small to hold the ghost links stored in it.
    #[error("Pad {pad} too small for ghost face volume {required}")]
    PadTooSmall {
        /// Requested pad.
        pad: usize,
        /// Largest ghost face volume that must fit.
        required: usize,
    },

    /// A caller-supplied buffer cannot hold the layout.
    #[error("{what} buffer holds {have} elements, layout needs {need}")]
    BufferTooSmall {
        /// Buffer role.
        what: &'static str,
        /// Elements required.
        need: usize,
        /// Elements available.
        have: usize,
    },

    /// Host or staging allocation failed.
    #[error("Allocation of {bytes} bytes for {what} failed")]
    Allocation {
        /// Buffer role.
        what: &'static str,
        /// Requested size in bytes.
        bytes: usize,
    },

    /// Staging buffers were sized for a smaller geometry.
    #[error("Staging buffer for {what} holds {have} bytes, exchange needs {need}")]
    StagingTooSmall {
        /// Buffer role.
        what: String,
        /// Bytes needed.
        need: usize,
        /// Bytes allocated.
        have: usize,
    },

    /// Exchange API called out of order.
    #[error("Exchange is {state}, cannot {action}")]
    ExchangeState {
        /// Current state.
        state: &'static str,
        /// Attempted action.
        action: &'static str,
    },

    /// Received message length differs from the posted receive.
    #[error("Message from {dir} neighbor in dimension {dim} has {got} bytes, expected {expected}")]
    MessageLength {
        /// Dimension of the exchange.
        dim: usize,
        /// Neighbor direction.
        dir: String,
        /// Posted length.
        expected: usize,
        /// Delivered length.
        got: usize,
    },

    /// Dimension is not split across processes.
    #[error("Dimension {dim} is not partitioned")]
    NotPartitioned {
        /// Dimension requested.
        dim: usize,
    },

    /// Opaque failure reported by the messaging layer.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The execution stream could not be created or a kernel panicked.
    #[error("Execution stream failure: {0}")]
    Stream(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HaloError>;
