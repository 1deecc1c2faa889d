// SPDX-License-Identifier: AGPL-3.0-only

//! Ghost-zone exchange orchestration.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `staging` | Pinned (and pageable) message buffers, allocated once |
//! | `stream` | In-order execution stream on a rayon pool |
//! | `orchestrator` | `FaceExchange` state machine: start / wait / exchange |

use serde::{Deserialize, Serialize};

/// Exchange state machine.
pub mod orchestrator;
/// Staging buffers.
pub mod staging;
/// Execution stream.
pub mod stream;

pub use crate::halo::GhostSelection;
pub use orchestrator::{ExchangePhase, FaceExchange};
pub use staging::StagingPool;
pub use stream::ExecStream;

/// How staged messages reach the transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    /// The transport reads the pinned buffers directly.
    #[default]
    Pinned,
    /// Messages are copied through pageable host buffers.
    Pageable,
}

/// Orchestrator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Pinned or pageable transfers.
    pub transfer: TransferMode,
    /// Worker threads of the execution stream.
    pub stream_workers: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            transfer: TransferMode::Pinned,
            stream_workers: 2,
        }
    }
}
