// SPDX-License-Identifier: AGPL-3.0-only

//! Split-phase ghost exchange of one spinor field.
//!
//! ```text
//! Idle --start--> Packing --sync--> InFlight --wait--> Unpacking --sync--> Idle
//! ```
//!
//! `start` packs every partitioned dimension both ways on the stream,
//! fences, posts the receives (backward then forward, data then norms) and
//! the sends (forward then backward). `wait` completes every request before
//! any unpack begins, then unpacks and fences again. Between the two the
//! caller is free to run interior work. A failed transport or kernel drops
//! the exchange back to `Idle`.

use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::comm::{Communicator, MsgHandle, NeighborDir};
use crate::error::{HaloError, Result};
use crate::field::layout::SpinorLayout;
use crate::field::SpinorField;
use crate::halo::{message_bytes, pack_ghost, unpack_ghost, GhostSelection};
use crate::lattice::constants::N_DIM;

use super::staging::{FaceBuffers, StagingPool};
use super::stream::ExecStream;
use super::ExchangeConfig;

/// Exchange state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangePhase {
    /// Nothing in flight.
    Idle,
    /// Pack kernels running.
    Packing,
    /// Sends and receives posted.
    InFlight,
    /// Unpack kernels running.
    Unpacking,
}

impl ExchangePhase {
    /// Lower-case name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Packing => "packing",
            Self::InFlight => "in flight",
            Self::Unpacking => "unpacking",
        }
    }
}

struct PendingRecv {
    dim: usize,
    from: NeighborDir,
    data: MsgHandle,
    norm: Option<MsgHandle>,
}

fn active_dims(layout: &SpinorLayout) -> Vec<usize> {
    (0..N_DIM).filter(|&d| layout.ghost.is_active(d)).collect()
}

fn payload(comm: &dyn Communicator, h: MsgHandle) -> Result<Vec<u8>> {
    comm.wait(h)?
        .ok_or_else(|| HaloError::Transport("receive completed without payload".into()))
}

/// Ghost exchange driver for one messaging endpoint.
pub struct FaceExchange<'a> {
    comm: &'a dyn Communicator,
    config: ExchangeConfig,
    staging: &'a mut StagingPool,
    stream: ExecStream,
    phase: ExchangePhase,
    recvs: Vec<PendingRecv>,
    sends: Vec<MsgHandle>,
    packed: Option<SpinorLayout>,
}

impl<'a> FaceExchange<'a> {
    /// Driver over `comm` using the buffers of `staging`.
    ///
    /// # Errors
    ///
    /// `Unsupported` when `staging` was built for a different transfer
    /// mode, or `Stream` when the execution stream cannot start.
    pub fn new(comm: &'a dyn Communicator, config: ExchangeConfig, staging: &'a mut StagingPool) -> Result<Self> {
        if staging.mode() != config.transfer {
            return Err(HaloError::Unsupported {
                what: "staging pool transfer mode",
                value: format!("{:?} for {:?} exchange", staging.mode(), config.transfer),
            });
        }
        let stream = ExecStream::new(&format!("halo-r{}", comm.rank()), config.stream_workers)?;
        Ok(Self {
            comm,
            config,
            staging,
            stream,
            phase: ExchangePhase::Idle,
            recvs: Vec::new(),
            sends: Vec::new(),
            packed: None,
        })
    }

    /// Current state.
    #[must_use]
    pub const fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Staging buffers in use.
    #[must_use]
    pub fn staging(&self) -> &StagingPool {
        &*self.staging
    }

    /// Execution stream in use.
    #[must_use]
    pub const fn stream(&self) -> &ExecStream {
        &self.stream
    }

    fn expect_phase(&self, want: ExchangePhase, action: &'static str) -> Result<()> {
        if self.phase != want {
            return Err(HaloError::ExchangeState {
                state: self.phase.name(),
                action,
            });
        }
        Ok(())
    }

    fn abandon(&mut self) {
        self.recvs.clear();
        self.sends.clear();
        self.packed = None;
        self.phase = ExchangePhase::Idle;
    }

    /// Pack and post every message of `field`'s ghost zone.
    ///
    /// # Errors
    ///
    /// `ExchangeState` unless idle; staging, packing and transport errors.
    pub fn start(&mut self, field: &SpinorField<'_>, selection: GhostSelection) -> Result<()> {
        self.expect_phase(ExchangePhase::Idle, "start")?;
        let r = self.start_inner(field, selection);
        if r.is_err() {
            self.abandon();
        }
        r
    }

    fn start_inner(&mut self, field: &SpinorField<'_>, selection: GhostSelection) -> Result<()> {
        let t0 = Instant::now();
        self.phase = ExchangePhase::Packing;
        let layout = field.layout();
        self.staging.ensure(layout)?;
        let dims = active_dims(layout);
        let sizes: [(usize, usize); N_DIM] =
            std::array::from_fn(|d| if layout.ghost.is_active(d) { message_bytes(layout, d) } else { (0, 0) });

        let targets: Vec<(usize, NeighborDir, &mut FaceBuffers)> = self
            .staging
            .faces_mut()
            .filter(|(d, _, _)| layout.ghost.is_active(*d))
            .collect();
        self.stream.launch(move || {
            targets.into_par_iter().try_for_each(|(d, dir, buf)| {
                let (len, norm_len) = sizes[d];
                let (data, norm) = buf.send_views(len, norm_len);
                pack_ghost(field, d, dir, selection, data, norm)
            })
        });
        self.stream.synchronize()?;
        let packed = t0.elapsed();

        for &d in &dims {
            let (len, norm_len) = sizes[d];
            let data: Vec<MsgHandle> = NeighborDir::BOTH
                .iter()
                .map(|&from| self.comm.irecv(len, d, from))
                .collect::<Result<_>>()?;
            for (from, data) in NeighborDir::BOTH.into_iter().zip(data) {
                self.recvs.push(PendingRecv {
                    dim: d,
                    from,
                    data,
                    norm: None,
                });
            }
            if norm_len > 0 {
                let n = self.recvs.len();
                for p in &mut self.recvs[n - 2..] {
                    p.norm = Some(self.comm.irecv(norm_len, d, p.from)?);
                }
            }
        }

        let mode = self.config.transfer;
        for &d in &dims {
            let (len, norm_len) = sizes[d];
            for to in [NeighborDir::Forward, NeighborDir::Backward] {
                let (data, norm) = self.staging.face_mut(d, to).wire_send(mode, len, norm_len);
                self.sends.push(self.comm.isend(data, d, to)?);
                if let Some(norm) = norm {
                    self.sends.push(self.comm.isend(norm, d, to)?);
                }
            }
        }

        self.packed = Some(layout.clone());
        self.phase = ExchangePhase::InFlight;
        debug!(
            rank = self.comm.rank(),
            ?dims,
            pack = ?packed,
            posted = ?t0.elapsed(),
            "halo exchange started"
        );
        Ok(())
    }

    /// Complete the exchange started on a field of the same geometry and
    /// unpack into `field`'s ghost zone.
    ///
    /// # Errors
    ///
    /// `ExchangeState` unless in flight, `FieldMismatch` for a different
    /// geometry, transport and unpacking errors.
    pub fn wait(&mut self, field: &mut SpinorField<'_>) -> Result<()> {
        self.expect_phase(ExchangePhase::InFlight, "wait")?;
        if let Some(packed) = &self.packed {
            if packed != field.layout() {
                return Err(HaloError::FieldMismatch {
                    what: "ghost geometry",
                    a: format!("{:?} {}", packed.ghost.ghost_face, packed.precision),
                    b: format!("{:?} {}", field.layout().ghost.ghost_face, field.layout().precision),
                });
            }
        }
        let r = self.wait_inner(field);
        if r.is_err() {
            self.abandon();
        }
        r
    }

    fn wait_inner(&mut self, field: &mut SpinorField<'_>) -> Result<()> {
        let t0 = Instant::now();
        let mode = self.config.transfer;
        for p in std::mem::take(&mut self.recvs) {
            let data = payload(self.comm, p.data)?;
            let norm = p.norm.map(|h| payload(self.comm, h)).transpose()?;
            self.staging.face_mut(p.dim, p.from).land(mode, &data, norm.as_deref());
        }
        for s in std::mem::take(&mut self.sends) {
            self.comm.wait(s)?;
        }
        let transferred = t0.elapsed();

        self.phase = ExchangePhase::Unpacking;
        let layout = field.layout().clone();
        let staging: &StagingPool = &*self.staging;
        self.stream.launch(|| {
            for d in active_dims(&layout) {
                let (len, norm_len) = message_bytes(&layout, d);
                for from in NeighborDir::BOTH {
                    let (data, norm) = staging.face(d, from).recv_views(len, norm_len);
                    unpack_ghost(field, d, from, data, norm)?;
                }
            }
            Ok(())
        });
        self.stream.synchronize()?;

        self.packed = None;
        self.phase = ExchangePhase::Idle;
        debug!(
            rank = self.comm.rank(),
            transfer = ?transferred,
            total = ?t0.elapsed(),
            "halo exchange complete"
        );
        Ok(())
    }

    /// Blocking exchange: `start` then `wait` on the same field.
    ///
    /// # Errors
    ///
    /// As [`start`](Self::start) and [`wait`](Self::wait).
    pub fn exchange(&mut self, field: &mut SpinorField<'_>, selection: GhostSelection) -> Result<()> {
        self.start(field, selection)?;
        self.wait(field)
    }
}
