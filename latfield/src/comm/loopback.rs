// SPDX-License-Identifier: AGPL-3.0-only

//! In-process loopback transport.
//!
//! Every rank is an endpoint in the same process. Each (rank, dimension,
//! direction) owns one mpsc channel whose receiving end sits in the
//! neighbor's inbox, keyed by the direction the message arrives *from*.
//! Sends are buffered and complete immediately; receives are matched in
//! posting order per inbox, so a rank may wait on them in any order.
//! `allreduce_max` uses a barrier-guarded slot array shared by all ranks.

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex, PoisonError};
use std::thread;

use tracing::{debug, warn};

use crate::error::{HaloError, Result};
use crate::lattice::constants::N_DIM;

use super::{CommTopology, Communicator, MsgHandle, NeighborDir};

type Key = (usize, NeighborDir);

struct Envelope {
    seq: u64,
    payload: Vec<u8>,
}

struct Outbox {
    tx: Sender<Envelope>,
    next_seq: u64,
}

struct Inbox {
    rx: Receiver<Envelope>,
    next_post: u64,
    stash: BTreeMap<u64, Vec<u8>>,
}

struct ReduceSlots {
    barrier: Barrier,
    values: Mutex<Vec<f64>>,
}

fn poisoned<T>(_: PoisonError<T>) -> HaloError {
    HaloError::Transport("loopback mutex poisoned".into())
}

/// One rank's endpoint on a [`LoopbackNetwork`].
pub struct LoopbackComm {
    topo: CommTopology,
    outboxes: HashMap<Key, Mutex<Outbox>>,
    inboxes: HashMap<Key, Mutex<Inbox>>,
    reduce: Arc<ReduceSlots>,
}

/// Builder for a fully wired set of loopback endpoints.
pub struct LoopbackNetwork;

impl LoopbackNetwork {
    /// One endpoint per rank of `grid`, indexed by rank.
    ///
    /// # Errors
    ///
    /// `Unsupported` for an empty grid dimension.
    pub fn build(grid: [usize; N_DIM]) -> Result<Vec<LoopbackComm>> {
        let size: usize = grid.iter().product();
        let topos = (0..size)
            .map(|r| CommTopology::new(grid, r))
            .collect::<Result<Vec<_>>>()?;

        let reduce = Arc::new(ReduceSlots {
            barrier: Barrier::new(size),
            values: Mutex::new(vec![f64::NEG_INFINITY; size]),
        });

        let mut outboxes: Vec<HashMap<Key, Mutex<Outbox>>> =
            (0..size).map(|_| HashMap::new()).collect();
        let mut inboxes: Vec<HashMap<Key, Mutex<Inbox>>> =
            (0..size).map(|_| HashMap::new()).collect();

        for (rank, topo) in topos.iter().enumerate() {
            for d in (0..N_DIM).filter(|&d| topo.partitioned(d)) {
                for dir in NeighborDir::BOTH {
                    let (tx, rx) = mpsc::channel();
                    let dest = topo.neighbor(d, dir);
                    outboxes[rank].insert((d, dir), Mutex::new(Outbox { tx, next_seq: 0 }));
                    inboxes[dest].insert(
                        (d, dir.opposite()),
                        Mutex::new(Inbox {
                            rx,
                            next_post: 0,
                            stash: BTreeMap::new(),
                        }),
                    );
                }
            }
        }

        Ok(topos
            .into_iter()
            .zip(outboxes.into_iter().zip(inboxes))
            .map(|(topo, (outboxes, inboxes))| LoopbackComm {
                topo,
                outboxes,
                inboxes,
                reduce: Arc::clone(&reduce),
            })
            .collect())
    }
}

impl Communicator for LoopbackComm {
    fn rank(&self) -> usize {
        self.topo.rank()
    }

    fn size(&self) -> usize {
        self.topo.size()
    }

    fn topology(&self) -> &CommTopology {
        &self.topo
    }

    fn isend(&self, buf: &[u8], dim: usize, dir: NeighborDir) -> Result<MsgHandle> {
        let outbox = self
            .outboxes
            .get(&(dim, dir))
            .ok_or(HaloError::NotPartitioned { dim })?;
        let mut outbox = outbox.lock().map_err(poisoned)?;
        let seq = outbox.next_seq;
        outbox.next_seq += 1;
        outbox
            .tx
            .send(Envelope {
                seq,
                payload: buf.to_vec(),
            })
            .map_err(|_| HaloError::Transport(format!("{dir} neighbor in dim {dim} hung up")))?;
        Ok(MsgHandle::Send { dim, dir })
    }

    fn irecv(&self, len: usize, dim: usize, dir: NeighborDir) -> Result<MsgHandle> {
        let inbox = self
            .inboxes
            .get(&(dim, dir))
            .ok_or(HaloError::NotPartitioned { dim })?;
        let mut inbox = inbox.lock().map_err(poisoned)?;
        let seq = inbox.next_post;
        inbox.next_post += 1;
        Ok(MsgHandle::Recv { dim, dir, seq, len })
    }

    fn wait(&self, handle: MsgHandle) -> Result<Option<Vec<u8>>> {
        let MsgHandle::Recv { dim, dir, seq, len } = handle else {
            return Ok(None);
        };
        let inbox = self
            .inboxes
            .get(&(dim, dir))
            .ok_or(HaloError::NotPartitioned { dim })?;
        let mut inbox = inbox.lock().map_err(poisoned)?;
        let payload = loop {
            if let Some(p) = inbox.stash.remove(&seq) {
                break p;
            }
            let env = inbox
                .rx
                .recv()
                .map_err(|_| HaloError::Transport(format!("{dir} neighbor in dim {dim} hung up")))?;
            inbox.stash.insert(env.seq, env.payload);
        };
        if payload.len() != len {
            return Err(HaloError::MessageLength {
                dim,
                dir: dir.to_string(),
                expected: len,
                got: payload.len(),
            });
        }
        Ok(Some(payload))
    }

    fn allreduce_max(&self, value: f64) -> Result<f64> {
        self.reduce.values.lock().map_err(poisoned)?[self.rank()] = value;
        self.reduce.barrier.wait();
        let max = self
            .reduce
            .values
            .lock()
            .map_err(poisoned)?
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        // nobody may overwrite a slot before every rank has read
        self.reduce.barrier.wait();
        Ok(max)
    }

    fn exit(&self, code: i32) -> ! {
        warn!(rank = self.rank(), code, "terminating process");
        std::process::exit(code)
    }
}

/// Run `f` on one named thread per rank of `grid` and gather results by rank.
///
/// A panicking rank re-raises its panic on the calling thread.
///
/// # Errors
///
/// Grid errors from [`LoopbackNetwork::build`], or a thread that cannot be
/// spawned.
pub fn run_ranks<F, R>(grid: [usize; N_DIM], f: F) -> Result<Vec<R>>
where
    F: Fn(LoopbackComm) -> R + Sync,
    R: Send,
{
    let endpoints = LoopbackNetwork::build(grid)?;
    debug!(ranks = endpoints.len(), ?grid, "starting loopback ranks");
    let f = &f;
    thread::scope(|s| {
        let handles = endpoints
            .into_iter()
            .map(|comm| {
                thread::Builder::new()
                    .name(format!("rank-{}", comm.rank()))
                    .spawn_scoped(s, move || f(comm))
                    .map_err(|e| HaloError::Transport(format!("spawn rank thread: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(r) => r,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect())
    })
}
