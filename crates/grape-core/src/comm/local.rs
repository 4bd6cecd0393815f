//! In-process communicator group
//!
//! One unbounded channel per worker carries frames; a mutex/condvar
//! generation counter implements the all-reduce.

use super::Communicator;
use crate::fragment::FragId;
use crate::{Error, Result};
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ReduceState {
    generation: u64,
    arrived: FragId,
    acc: u64,
    result: u64,
    aborted: Option<String>,
}

#[derive(Debug)]
struct Group {
    fnum: FragId,
    state: Mutex<ReduceState>,
    cond: Condvar,
}

impl Group {
    fn abort(&self, reason: &str) {
        let mut state = self.state.lock();
        if state.aborted.is_none() {
            state.aborted = Some(reason.to_string());
        }
        self.cond.notify_all();
    }
}

/// Aborts a [`LocalCommunicator`] group from outside a worker.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    group: Arc<Group>,
}

impl AbortHandle {
    /// Poison the group
    pub fn abort(&self, reason: &str) {
        self.group.abort(reason);
    }

    /// Whether the group has been aborted
    pub fn is_aborted(&self) -> bool {
        self.group.state.lock().aborted.is_some()
    }
}

/// Communicator for workers running as threads of one process.
#[derive(Debug)]
pub struct LocalCommunicator {
    fid: FragId,
    senders: Vec<Sender<Bytes>>,
    receiver: Receiver<Bytes>,
    group: Arc<Group>,
}

impl LocalCommunicator {
    /// Create a connected group of `fnum` communicators, indexed by fid
    pub fn group(fnum: FragId) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..fnum).map(|_| unbounded()).unzip();
        let group = Arc::new(Group {
            fnum,
            state: Mutex::new(ReduceState::default()),
            cond: Condvar::new(),
        });

        receivers
            .into_iter()
            .enumerate()
            .map(|(fid, receiver)| Self {
                fid: fid as FragId,
                senders: senders.clone(),
                receiver,
                group: Arc::clone(&group),
            })
            .collect()
    }

    /// Handle that can abort this communicator's group
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            group: Arc::clone(&self.group),
        }
    }

    fn aborted_error(reason: &str) -> Error {
        Error::aborted(reason.to_string())
    }
}

impl Communicator for LocalCommunicator {
    fn fid(&self) -> FragId {
        self.fid
    }

    fn fnum(&self) -> FragId {
        self.group.fnum
    }

    fn send(&self, dst: FragId, frame: Bytes) -> Result<()> {
        let sender = self.senders.get(dst as usize).ok_or_else(|| {
            Error::transport(format!(
                "destination {} out of range for {} fragments",
                dst, self.group.fnum
            ))
        })?;
        sender
            .send(frame)
            .map_err(|_| Error::transport(format!("fragment {} is no longer receiving", dst)))
    }

    fn try_recv(&self) -> Result<Option<Bytes>> {
        match self.receiver.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn all_reduce_sum(&self, value: u64) -> Result<u64> {
        let mut state = self.group.state.lock();
        if let Some(reason) = &state.aborted {
            return Err(Self::aborted_error(reason));
        }

        state.acc = state.acc.wrapping_add(value);
        state.arrived += 1;
        let generation = state.generation;

        if state.arrived == self.group.fnum {
            state.result = state.acc;
            state.acc = 0;
            state.arrived = 0;
            state.generation += 1;
            self.group.cond.notify_all();
            return Ok(state.result);
        }

        while state.generation == generation {
            if let Some(reason) = &state.aborted {
                return Err(Self::aborted_error(reason));
            }
            self.group.cond.wait(&mut state);
        }
        Ok(state.result)
    }

    fn abort(&self, reason: &str) {
        tracing::error!(fid = self.fid, reason, "Aborting communicator group");
        self.group.abort(reason);
    }
}
