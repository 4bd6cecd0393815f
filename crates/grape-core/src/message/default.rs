//! Round-framed base message manager

use super::WireMessage;
use super::frame::Frame;
use crate::comm::Communicator;
use crate::config::WorkerConfig;
use crate::fragment::{FragId, Fragment, Vertex};
use crate::value::SyncValue;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::collections::VecDeque;

/// Traffic counters of one worker for one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessageStats {
    /// Rounds finished
    pub rounds: u32,
    /// Frames flushed to other fragments
    pub frames_sent: u64,
    /// Encoded bytes flushed
    pub bytes_sent: u64,
    /// Frames delivered to this fragment
    pub frames_received: u64,
    /// Encoded bytes delivered
    pub bytes_received: u64,
    /// Rounds kept alive by a force-continue vote
    pub force_continues: u64,
}

/// Buffers outgoing messages per destination and exchanges them once per
/// round.
///
/// Within a round, messages to one destination are concatenated into a
/// single frame tagged with the round number. `finish_a_round` flushes the
/// frames and casts this worker's termination vote; `start_a_round` delivers
/// the frames sent in the previous round.
pub struct DefaultMessageManager {
    comm: Box<dyn Communicator>,
    fid: FragId,
    fnum: FragId,
    verify_frames: bool,
    log_rounds: bool,
    round: u32,
    started: bool,
    to_send: Vec<BytesMut>,
    incoming: VecDeque<(FragId, Bytes)>,
    stashed: Vec<Frame>,
    force_continue: bool,
    to_terminate: bool,
    stats: MessageStats,
}

impl DefaultMessageManager {
    /// Create a manager on top of `comm`
    pub fn new(comm: Box<dyn Communicator>, config: &WorkerConfig) -> Self {
        let fid = comm.fid();
        let fnum = comm.fnum();
        Self {
            comm,
            fid,
            fnum,
            verify_frames: config.verify_frames,
            log_rounds: config.log_rounds,
            round: 0,
            started: false,
            to_send: (0..fnum).map(|_| BytesMut::new()).collect(),
            incoming: VecDeque::new(),
            stashed: Vec::new(),
            force_continue: false,
            to_terminate: false,
            stats: MessageStats::default(),
        }
    }

    /// Fragment id of this worker
    pub fn fid(&self) -> FragId {
        self.fid
    }

    /// Number of fragments
    pub fn fnum(&self) -> FragId {
        self.fnum
    }

    /// Current round; 0 is the PEval round
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Whether `start` has been called and `finalize` has not
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Counters for the current query
    pub fn stats(&self) -> MessageStats {
        self.stats
    }

    /// Prepare for a new query
    pub fn start(&mut self) {
        self.round = 0;
        self.started = true;
        self.to_terminate = false;
        self.force_continue = false;
        self.stats = MessageStats::default();
        self.incoming.clear();
        self.stashed.clear();
        for buf in &mut self.to_send {
            buf.clear();
        }
    }

    /// Deliver the frames sent to this fragment during the previous round
    pub fn start_a_round(&mut self) -> Result<()> {
        if !self.started {
            return Err(Error::internal("start_a_round called before start"));
        }
        if !self.incoming.is_empty() {
            tracing::debug!(
                fid = self.fid,
                round = self.round,
                leftover = self.incoming.len(),
                "Dropping unread payloads from previous round"
            );
            self.incoming.clear();
        }
        if self.round == 0 {
            return Ok(());
        }

        let expected = self.round - 1;
        let stashed = std::mem::take(&mut self.stashed);
        for frame in stashed {
            self.accept(frame, expected)?;
        }
        while let Some(raw) = self.comm.try_recv()? {
            let len = raw.len() as u64;
            let frame = Frame::decode(raw, self.verify_frames).inspect_err(|e| {
                tracing::error!(fid = self.fid, round = self.round, error = %e, "Corrupt frame");
            })?;
            self.stats.frames_received += 1;
            self.stats.bytes_received += len;
            self.accept(frame, expected)?;
        }
        Ok(())
    }

    fn accept(&mut self, frame: Frame, expected: u32) -> Result<()> {
        if frame.round == expected {
            if !frame.payload.is_empty() {
                self.incoming.push_back((frame.src, frame.payload));
            }
        } else if frame.round > expected {
            self.stashed.push(frame);
        } else {
            return Err(Error::protocol(format!(
                "fragment {} received a round {} frame from fragment {} during round {}",
                self.fid, frame.round, frame.src, self.round
            )));
        }
        Ok(())
    }

    /// Flush this round's send buffers and vote on termination.
    ///
    /// The worker stays active if it sent any frame or called
    /// [`force_continue`](Self::force_continue) during the round; the query
    /// terminates once no worker is active.
    pub fn finish_a_round(&mut self) -> Result<()> {
        if !self.started {
            return Err(Error::internal("finish_a_round called before start"));
        }

        let mut frames_sent = 0u64;
        let mut bytes_sent = 0u64;
        for dst in 0..self.fnum {
            let buf = &mut self.to_send[dst as usize];
            if buf.is_empty() {
                continue;
            }
            let frame = Frame::new(self.fid, self.round, buf.split().freeze());
            let encoded = frame.encode()?;
            bytes_sent += encoded.len() as u64;
            frames_sent += 1;
            self.comm.send(dst, encoded)?;
        }

        let active = frames_sent > 0 || self.force_continue;
        if self.force_continue {
            self.stats.force_continues += 1;
        }
        let active_workers = self.comm.all_reduce_sum(active as u64)?;
        self.to_terminate = active_workers == 0;

        self.stats.frames_sent += frames_sent;
        self.stats.bytes_sent += bytes_sent;
        self.stats.rounds += 1;

        if self.log_rounds {
            tracing::debug!(
                fid = self.fid,
                round = self.round,
                frames_sent,
                bytes_sent,
                force_continue = self.force_continue,
                active_workers,
                to_terminate = self.to_terminate,
                "Round finished"
            );
        }

        self.force_continue = false;
        self.round += 1;
        Ok(())
    }

    /// Whether the last finished round was globally silent
    pub fn to_terminate(&self) -> bool {
        self.to_terminate
    }

    /// Keep the query alive for at least one more round
    pub fn force_continue(&mut self) {
        self.force_continue = true;
    }

    /// End the query and return its counters
    pub fn finalize(&mut self) -> MessageStats {
        if !self.stashed.is_empty() || !self.incoming.is_empty() {
            tracing::warn!(
                fid = self.fid,
                stashed = self.stashed.len(),
                unread = self.incoming.len(),
                "Finalizing with undelivered messages"
            );
        }
        self.started = false;
        self.incoming.clear();
        self.stashed.clear();
        self.stats
    }

    /// Send buffer for `dst`, for callers that encode records directly
    pub fn send_buffer(&mut self, dst: FragId) -> Result<&mut BytesMut> {
        let fnum = self.fnum;
        self.to_send.get_mut(dst as usize).ok_or_else(|| {
            Error::transport(format!(
                "destination {} out of range for {} fragments",
                dst, fnum
            ))
        })
    }

    /// Next undelivered payload and its source fragment
    pub fn next_payload(&mut self) -> Option<(FragId, Bytes)> {
        self.incoming.pop_front()
    }

    /// Queue `msg` for `dst`
    pub fn send_to_fragment<M: WireMessage>(&mut self, dst: FragId, msg: &M) -> Result<()> {
        msg.encode(self.send_buffer(dst)?)
    }

    /// Read the next message delivered this round.
    ///
    /// Every payload delivered in a round must be read with the same
    /// message type it was sent with.
    pub fn get_message<M: WireMessage>(&mut self) -> Result<Option<M>> {
        while let Some((_, payload)) = self.incoming.front_mut() {
            if payload.is_empty() {
                self.incoming.pop_front();
                continue;
            }
            return M::decode(payload).map(Some);
        }
        Ok(None)
    }

    /// Send the value of mirror `v` to the fragment that owns it
    pub fn sync_state_on_outer_vertex<F, T>(&mut self, frag: &F, v: Vertex, value: &T) -> Result<()>
    where
        F: Fragment + ?Sized,
        T: SyncValue,
    {
        if !frag.is_outer_vertex(v) {
            return Err(Error::fragment(format!(
                "vertex {:?} is not an outer vertex of fragment {}",
                v,
                frag.fid()
            )));
        }
        let dst = frag.get_frag_id(v);
        let gid = frag.vertex_to_gid(v);
        self.send_to_fragment(dst, &(gid, value.clone()))
    }

    /// Read the next vertex-addressed message, resolved to a local vertex
    pub fn get_vertex_message<F, T>(&mut self, frag: &F) -> Result<Option<(Vertex, T)>>
    where
        F: Fragment + ?Sized,
        T: SyncValue,
    {
        let Some((gid, value)) = self.get_message::<(u64, T)>()? else {
            return Ok(None);
        };
        let v = frag.gid_to_vertex(gid).ok_or_else(|| {
            Error::protocol(format!(
                "global id {:#x} is unknown on fragment {}",
                gid,
                frag.fid()
            ))
        })?;
        Ok(Some((v, value)))
    }

    /// Sum `value` over every worker
    pub fn all_reduce_sum(&self, value: u64) -> Result<u64> {
        self.comm.all_reduce_sum(value)
    }

    /// Global barrier
    pub fn barrier(&self) -> Result<()> {
        self.comm.barrier()
    }

    /// Abort every worker of the query
    pub fn abort(&self, reason: &str) {
        self.comm.abort(reason);
    }
}

impl std::fmt::Debug for DefaultMessageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMessageManager")
            .field("fid", &self.fid)
            .field("fnum", &self.fnum)
            .field("round", &self.round)
            .field("to_terminate", &self.to_terminate)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalCommunicator;
    use crate::fragment::{EdgeCutFragment, FragmentBuilder};
    use std::thread;

    fn managers(fnum: FragId) -> Vec<DefaultMessageManager> {
        LocalCommunicator::group(fnum)
            .into_iter()
            .map(|comm| DefaultMessageManager::new(Box::new(comm), &WorkerConfig::default()))
            .collect()
    }

    /// Run `body` on one thread per manager and collect the results by fid
    fn on_each<R, B>(managers: &mut [DefaultMessageManager], body: B) -> Vec<R>
    where
        R: Send,
        B: Fn(&mut DefaultMessageManager) -> R + Sync,
    {
        thread::scope(|s| {
            let handles: Vec<_> = managers
                .iter_mut()
                .map(|mm| {
                    let body = &body;
                    s.spawn(move || body(mm))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_silent_round_terminates() {
        let mut mms = managers(2);
        let results = on_each(&mut mms, |mm| {
            mm.start();
            mm.start_a_round().unwrap();
            mm.finish_a_round().unwrap();
            mm.to_terminate()
        });
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn test_message_delivered_next_round() {
        let mut mms = managers(2);
        let results = on_each(&mut mms, |mm| {
            mm.start();
            mm.start_a_round().unwrap();
            if mm.fid() == 0 {
                mm.send_to_fragment(1, &41u64).unwrap();
                mm.send_to_fragment(1, &42u64).unwrap();
            }
            mm.finish_a_round().unwrap();
            let first_vote = mm.to_terminate();

            mm.start_a_round().unwrap();
            let mut received = Vec::new();
            while let Some(m) = mm.get_message::<u64>().unwrap() {
                received.push(m);
            }
            mm.finish_a_round().unwrap();
            (first_vote, received, mm.to_terminate(), mm.finalize())
        });

        let (vote0, recv0, term0, stats0) = &results[0];
        let (vote1, recv1, term1, stats1) = &results[1];
        assert!(!vote0 && !vote1);
        assert!(recv0.is_empty());
        assert_eq!(recv1, &vec![41, 42]);
        assert!(*term0 && *term1);
        assert_eq!(stats0.frames_sent, 1);
        assert_eq!(stats1.frames_received, 1);
        assert_eq!(stats0.rounds, 2);
    }

    #[test]
    fn test_force_continue_defers_termination_once() {
        let mut mms = managers(2);
        let results = on_each(&mut mms, |mm| {
            mm.start();
            mm.start_a_round().unwrap();
            if mm.fid() == 1 {
                mm.force_continue();
            }
            mm.finish_a_round().unwrap();
            let first = mm.to_terminate();
            mm.start_a_round().unwrap();
            mm.finish_a_round().unwrap();
            (first, mm.to_terminate(), mm.stats().force_continues)
        });
        assert_eq!(results[0], (false, true, 0));
        assert_eq!(results[1], (false, true, 1));
    }

    #[test]
    fn test_sync_state_on_outer_vertex() {
        let mut builder = FragmentBuilder::new(2);
        for oid in 0..4 {
            builder.add_vertex(oid);
        }
        builder.add_edge(0, 1, 1.0);
        let frags: Vec<EdgeCutFragment> = builder.build().unwrap();

        let mut mms = managers(2);
        let frags = &frags;
        let results = on_each(&mut mms, |mm| {
            let frag = &frags[mm.fid() as usize];
            mm.start();
            mm.start_a_round().unwrap();
            if mm.fid() == 0 {
                let mirror = frag.oid_to_vertex(0, 1).unwrap();
                assert!(frag.is_outer_vertex(mirror));
                mm.sync_state_on_outer_vertex(frag, mirror, &2.5f64).unwrap();

                let inner = frag.get_inner_vertex(0, 0).unwrap();
                assert!(mm.sync_state_on_outer_vertex(frag, inner, &1.0f64).is_err());
            }
            mm.finish_a_round().unwrap();
            mm.start_a_round().unwrap();
            let msg = mm.get_vertex_message::<_, f64>(frag).unwrap();
            msg.map(|(v, value)| (frag.get_id(v), value))
        });
        assert_eq!(results[0], None);
        assert_eq!(results[1], Some((1, 2.5)));
    }

    #[test]
    fn test_future_round_frames_are_stashed() {
        let mut mms = managers(2);
        let mut mm1 = mms.pop().unwrap();
        let mut mm0 = mms.pop().unwrap();
        mm0.start();
        mm1.start();

        // Round 0 finishes on both sides with mm0 sending.
        thread::scope(|s| {
            s.spawn(|| {
                mm0.start_a_round().unwrap();
                mm0.send_to_fragment(1, &1u32).unwrap();
                mm0.finish_a_round().unwrap();
                // mm0 runs ahead into round 1 and sends again before mm1
                // has drained round 0.
                mm0.start_a_round().unwrap();
                mm0.send_to_fragment(1, &2u32).unwrap();
            });
            s.spawn(|| {
                mm1.start_a_round().unwrap();
                mm1.finish_a_round().unwrap();
            });
        });
        // Flush mm0's round 1 frame without blocking on the collective yet.
        let buffered = mm0.send_buffer(1).unwrap().split().freeze();
        let early = Frame::new(0, 1, buffered).encode().unwrap();
        mm1.comm.send(1, early).unwrap();

        mm1.start_a_round().unwrap();
        assert_eq!(mm1.get_message::<u32>().unwrap(), Some(1));
        assert_eq!(mm1.get_message::<u32>().unwrap(), None);
        assert_eq!(mm1.stashed.len(), 1);
    }

    #[test]
    fn test_stale_frame_is_protocol_error() {
        let mut mms = managers(1);
        let mm = &mut mms[0];
        mm.start();
        mm.start_a_round().unwrap();
        mm.finish_a_round().unwrap();
        mm.start_a_round().unwrap();
        mm.finish_a_round().unwrap();

        mm.comm
            .send(0, Frame::new(0, 0, Bytes::from_static(b"late")).encode().unwrap())
            .unwrap();
        let err = mm.start_a_round().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_round_before_start_is_error() {
        let mut mms = managers(1);
        assert!(mms[0].start_a_round().is_err());
        assert!(mms[0].finish_a_round().is_err());
    }

    #[test]
    fn test_send_to_unknown_fragment() {
        let mut mms = managers(2);
        let err = mms[0].send_to_fragment(7, &1u64).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
