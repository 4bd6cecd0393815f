//! Automatic synchronization of vertex state
//!
//! Apps register their per-vertex [`SyncBuffer`]s once per query and never
//! send messages by hand. At the end of every round the manager ships the
//! dirty mirrors of each buffer to the fragments that own them; at the start
//! of the next round it merges what it received into the owners' buffers
//! with the buffer's combine function.
//!
//! Each registered buffer is a *sync event* addressed on the wire by its
//! dense event id. A record on the wire is
//!
//! ```text
//! [event_id:i32][count:u64] then count x [gid:u64][value]
//! ```
//!
//! with the value encoded by its [`SyncValue`] codec. The manager consumes
//! every payload delivered to it; apps using it do not exchange other
//! messages through the same base manager.

use super::default::{DefaultMessageManager, MessageStats};
use crate::comm::Communicator;
use crate::config::WorkerConfig;
use crate::fragment::{FragId, Fragment, Gid, LabelId, Vertex};
use crate::sync_buffer::{AnySyncBuffer, SyncBuffer, dispatch_buffer};
use crate::value::SyncValue;
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Dense id of a sync event; the routing key on the wire
pub type EventId = i32;

const SYNC_HEADER_LEN: usize = 4 + 8;

/// Which vertices of a buffer are shipped and to whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStrategy {
    /// Gather at a coordinator and scatter back
    GatherScatter,
    /// Along outgoing edges to outer vertices
    AlongOutgoingEdgeToOuterVertex,
    /// Along incoming edges to outer vertices
    AlongIncomingEdgeToOuterVertex,
    /// Along all edges to outer vertices
    AlongEdgeToOuterVertex,
    /// Dirty mirrors are sent to the fragment owning the vertex
    SyncOnOuterVertex,
}

impl MessageStrategy {
    /// Every declared strategy
    pub const ALL: [MessageStrategy; 5] = [
        Self::GatherScatter,
        Self::AlongOutgoingEdgeToOuterVertex,
        Self::AlongIncomingEdgeToOuterVertex,
        Self::AlongEdgeToOuterVertex,
        Self::SyncOnOuterVertex,
    ];

    /// Whether the manager can route buffers registered with this strategy
    pub fn is_dispatchable(&self) -> bool {
        self.route().is_some()
    }

    fn route(&self) -> Option<Route> {
        match self {
            Self::SyncOnOuterVertex => Some(Route::OuterToOwner),
            Self::GatherScatter
            | Self::AlongOutgoingEdgeToOuterVertex
            | Self::AlongIncomingEdgeToOuterVertex
            | Self::AlongEdgeToOuterVertex => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::GatherScatter => "GatherScatter",
            Self::AlongOutgoingEdgeToOuterVertex => "AlongOutgoingEdgeToOuterVertex",
            Self::AlongIncomingEdgeToOuterVertex => "AlongIncomingEdgeToOuterVertex",
            Self::AlongEdgeToOuterVertex => "AlongEdgeToOuterVertex",
            Self::SyncOnOuterVertex => "SyncOnOuterVertex",
        }
    }
}

impl fmt::Display for MessageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MessageStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::configuration(format!("unknown message strategy: {}", s)))
    }
}

/// Resolved routing of a registered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    OuterToOwner,
}

#[derive(Debug)]
struct SyncEvent {
    event_id: EventId,
    label: LabelId,
    strategy: MessageStrategy,
    route: Route,
    buffer: AnySyncBuffer,
}

/// Typed handle to a registered sync buffer.
pub struct SyncBufferHandle<T> {
    event_id: EventId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SyncBufferHandle<T> {
    /// Event id of the buffer
    pub fn event_id(&self) -> EventId {
        self.event_id
    }
}

impl<T> Clone for SyncBufferHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SyncBufferHandle<T> {}

impl<T> fmt::Debug for SyncBufferHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBufferHandle")
            .field("event_id", &self.event_id)
            .finish()
    }
}

/// One sync record merged during a receive phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceivedBatch {
    /// Round whose receive phase merged the batch
    pub round: u32,
    /// Sending fragment
    pub src: FragId,
    /// Event the batch belongs to
    pub event_id: EventId,
    /// Number of vertex values in the batch
    pub count: u64,
}

/// Message manager that keeps registered sync buffers consistent across
/// fragments.
pub struct AutoMessageManager {
    base: DefaultMessageManager,
    events: Vec<SyncEvent>,
    received: Vec<ReceivedBatch>,
}

impl AutoMessageManager {
    /// Create a manager on top of `comm`
    pub fn new(comm: Box<dyn Communicator>, config: &WorkerConfig) -> Self {
        Self {
            base: DefaultMessageManager::new(comm, config),
            events: Vec::new(),
            received: Vec::new(),
        }
    }

    /// Underlying round-framed manager
    pub fn base(&self) -> &DefaultMessageManager {
        &self.base
    }

    /// Fragment id of this worker
    pub fn fid(&self) -> FragId {
        self.base.fid()
    }

    /// Number of fragments
    pub fn fnum(&self) -> FragId {
        self.base.fnum()
    }

    /// Current round; 0 is the PEval round
    pub fn round(&self) -> u32 {
        self.base.round()
    }

    /// Register a typed buffer for synchronization.
    ///
    /// The buffer must cover exactly `frag.vertices(label)`. Strategies other
    /// than [`MessageStrategy::SyncOnOuterVertex`] are rejected here with a
    /// configuration error, before any round runs.
    pub fn register_sync_buffer<F, T>(
        &mut self,
        frag: &F,
        label: LabelId,
        buffer: SyncBuffer<T>,
        strategy: MessageStrategy,
    ) -> Result<SyncBufferHandle<T>>
    where
        F: Fragment + ?Sized,
        T: SyncValue,
    {
        let event_id = self.register_any(frag, label, AnySyncBuffer::new(buffer), strategy)?;
        Ok(SyncBufferHandle {
            event_id,
            _marker: PhantomData,
        })
    }

    /// Register a buffer whose value type is only known at runtime
    pub fn register_any<F>(
        &mut self,
        frag: &F,
        label: LabelId,
        buffer: AnySyncBuffer,
        strategy: MessageStrategy,
    ) -> Result<EventId>
    where
        F: Fragment + ?Sized,
    {
        if self.base.is_started() {
            return Err(Error::internal(
                "sync buffers must be registered before the query starts",
            ));
        }
        if label >= frag.vertex_label_num() {
            return Err(Error::fragment(format!(
                "label {} out of range: fragment {} has {} labels",
                label,
                frag.fid(),
                frag.vertex_label_num()
            )));
        }
        if buffer.label() != label {
            return Err(Error::fragment(format!(
                "buffer covers label {} but was registered for label {}",
                buffer.label(),
                label
            )));
        }
        let expected = frag.vertices(label);
        if buffer.range() != expected {
            return Err(Error::fragment(format!(
                "buffer of {} vertices does not cover the {} vertices of label {} on fragment {}",
                buffer.len(),
                expected.len(),
                label,
                frag.fid()
            )));
        }
        let Some(route) = strategy.route() else {
            tracing::error!(
                fid = frag.fid(),
                label,
                %strategy,
                value_type = %buffer.value_type(),
                "Message strategy is not dispatchable"
            );
            return Err(Error::configuration(format!(
                "message strategy {} is not supported for {} buffers",
                strategy,
                buffer.value_type()
            )));
        };

        let event_id = EventId::try_from(self.events.len())
            .map_err(|_| Error::internal("too many sync events"))?;
        tracing::debug!(
            fid = frag.fid(),
            event_id,
            label,
            %strategy,
            value_type = %buffer.value_type(),
            aggregate = %buffer.aggregate_kind(),
            "Registered sync buffer"
        );
        self.events.push(SyncEvent {
            event_id,
            label,
            strategy,
            route,
            buffer,
        });
        Ok(event_id)
    }

    /// Number of registered events
    pub fn event_num(&self) -> usize {
        self.events.len()
    }

    /// Strategy an event was registered with
    pub fn strategy(&self, event_id: EventId) -> Option<MessageStrategy> {
        self.event(event_id).map(|e| e.strategy)
    }

    fn event(&self, event_id: EventId) -> Option<&SyncEvent> {
        usize::try_from(event_id)
            .ok()
            .and_then(|i| self.events.get(i))
    }

    fn event_mut(&mut self, event_id: EventId) -> Option<&mut SyncEvent> {
        usize::try_from(event_id)
            .ok()
            .and_then(|i| self.events.get_mut(i))
    }

    /// Untyped view of a registered buffer
    pub fn any_buffer(&self, event_id: EventId) -> Option<&AnySyncBuffer> {
        self.event(event_id).map(|e| &e.buffer)
    }

    /// Borrow a registered buffer
    pub fn buffer<T: SyncValue>(&self, handle: SyncBufferHandle<T>) -> Result<&SyncBuffer<T>> {
        self.event(handle.event_id)
            .ok_or_else(|| unknown_event(handle.event_id))?
            .buffer
            .downcast_ref()
    }

    /// Mutably borrow a registered buffer
    pub fn buffer_mut<T: SyncValue>(
        &mut self,
        handle: SyncBufferHandle<T>,
    ) -> Result<&mut SyncBuffer<T>> {
        self.event_mut(handle.event_id)
            .ok_or_else(|| unknown_event(handle.event_id))?
            .buffer
            .downcast_mut()
    }

    /// Drop every registered event; ids restart at 0 for the next query
    pub fn clear_events(&mut self) -> Result<()> {
        if self.base.is_started() {
            return Err(Error::internal("cannot clear sync events during a query"));
        }
        self.events.clear();
        self.received.clear();
        Ok(())
    }

    /// Prepare for a new query
    pub fn start(&mut self) {
        self.base.start();
        self.received.clear();
    }

    /// Deliver the previous round's frames and merge every sync record into
    /// the owners' buffers
    pub fn start_a_round<F>(&mut self, frag: &F) -> Result<()>
    where
        F: Fragment + ?Sized,
    {
        self.base.start_a_round()?;
        self.received.clear();
        let round = self.base.round();

        while let Some((src, mut payload)) = self.base.next_payload() {
            while payload.has_remaining() {
                let batch = self.receive_record(frag, src, round, &mut payload)?;
                self.received.push(batch);
            }
        }
        Ok(())
    }

    fn receive_record<F>(
        &mut self,
        frag: &F,
        src: FragId,
        round: u32,
        payload: &mut Bytes,
    ) -> Result<ReceivedBatch>
    where
        F: Fragment + ?Sized,
    {
        if payload.remaining() < SYNC_HEADER_LEN {
            return Err(Error::protocol(format!(
                "truncated sync header from fragment {}: {} bytes",
                src,
                payload.remaining()
            )));
        }
        let event_id = payload.get_i32_le();
        let count = payload.get_u64_le();
        let event = self.event_mut(event_id).ok_or_else(|| {
            tracing::error!(src, event_id, "Sync record for unknown event");
            unknown_event(event_id)
        })?;

        let label = event.label;
        dispatch_buffer!(
            &mut event.buffer,
            buffer => merge_records(frag, label, buffer, payload, count)
        )?;

        Ok(ReceivedBatch {
            round,
            src,
            event_id,
            count,
        })
    }

    /// Ship every dirty mirror to its owner, then flush and vote on
    /// termination
    pub fn finish_a_round<F>(&mut self, frag: &F) -> Result<()>
    where
        F: Fragment + ?Sized,
    {
        let mut unflushed = false;
        for event in &mut self.events {
            let sent = match event.route {
                Route::OuterToOwner => dispatch_buffer!(
                    &mut event.buffer,
                    buffer => send_outer_updates(
                        frag,
                        &mut self.base,
                        event.event_id,
                        event.label,
                        buffer
                    )
                )?,
            };
            if sent > 0 {
                tracing::trace!(
                    fid = frag.fid(),
                    round = self.base.round(),
                    event_id = event.event_id,
                    sent,
                    "Sent mirror updates"
                );
            }
            // A route must clear every flag it is responsible for; state left
            // dirty here would never be shipped.
            unflushed |= event.buffer.has_updates();
        }

        if unflushed {
            tracing::warn!(
                fid = frag.fid(),
                round = self.base.round(),
                "Sync buffers hold unflushed updates; forcing another round"
            );
            self.base.force_continue();
        }
        self.base.finish_a_round()
    }

    /// Batches merged by the most recent receive phase
    pub fn received_batches(&self) -> &[ReceivedBatch] {
        &self.received
    }

    /// Whether the last finished round was globally silent
    pub fn to_terminate(&self) -> bool {
        self.base.to_terminate()
    }

    /// Keep the query alive for at least one more round
    pub fn force_continue(&mut self) {
        self.base.force_continue();
    }

    /// Sum `value` over every fragment; every worker must call it in the
    /// same round
    pub fn sum_across_fragments(&self, value: u64) -> Result<u64> {
        self.base.all_reduce_sum(value)
    }

    /// Global barrier
    pub fn barrier(&self) -> Result<()> {
        self.base.barrier()
    }

    /// Abort every worker of the query
    pub fn abort(&self, reason: &str) {
        self.base.abort(reason);
    }

    /// Traffic counters for the current query
    pub fn stats(&self) -> MessageStats {
        self.base.stats()
    }

    /// End the query and return its counters
    pub fn finalize(&mut self) -> MessageStats {
        self.base.finalize()
    }
}

impl fmt::Debug for AutoMessageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoMessageManager")
            .field("base", &self.base)
            .field("events", &self.events)
            .finish()
    }
}

fn unknown_event(event_id: EventId) -> Error {
    Error::protocol(format!("unknown sync event {}", event_id))
}

fn merge_records<F, T>(
    frag: &F,
    label: LabelId,
    buffer: &mut SyncBuffer<T>,
    payload: &mut Bytes,
    count: u64,
) -> Result<()>
where
    F: Fragment + ?Sized,
    T: SyncValue,
{
    for _ in 0..count {
        let gid = <Gid as SyncValue>::decode(payload)?;
        let value = T::decode(payload)?;
        let v = frag
            .gid_to_vertex(gid)
            .filter(|v| v.label() == label && frag.is_inner_vertex(*v))
            .ok_or_else(|| {
                Error::protocol(format!(
                    "global id {:#x} is not an inner vertex of label {} on fragment {}",
                    gid,
                    label,
                    frag.fid()
                ))
            })?;
        buffer.aggregate(v, value);
    }
    Ok(())
}

fn send_outer_updates<F, T>(
    frag: &F,
    base: &mut DefaultMessageManager,
    event_id: EventId,
    label: LabelId,
    buffer: &mut SyncBuffer<T>,
) -> Result<u64>
where
    F: Fragment + ?Sized,
    T: SyncValue,
{
    buffer.reset_range(frag.inner_vertices(label));

    let mut batches: Vec<Vec<Vertex>> = vec![Vec::new(); frag.fnum() as usize];
    for v in buffer.updated_in(frag.outer_vertices(label)) {
        let owner = frag.get_frag_id(v) as usize;
        match batches.get_mut(owner) {
            Some(batch) => batch.push(v),
            None => {
                return Err(Error::fragment(format!(
                    "outer vertex {:?} has owner {} outside {} fragments",
                    v,
                    owner,
                    frag.fnum()
                )));
            }
        }
    }

    let mut sent = 0u64;
    for (dst, batch) in batches.into_iter().enumerate() {
        if batch.is_empty() {
            continue;
        }
        let buf = base.send_buffer(dst as FragId)?;
        buf.put_i32_le(event_id);
        buf.put_u64_le(batch.len() as u64);
        for &v in &batch {
            buf.put_u64_le(frag.vertex_to_gid(v));
            buffer.get(v).encode(buf)?;
            buffer.reset(v);
        }
        sent += batch.len() as u64;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateKind;
    use crate::comm::LocalCommunicator;
    use crate::fragment::{EdgeCutFragment, FragmentBuilder};
    use bytes::BytesMut;

    fn path_fragments() -> Vec<EdgeCutFragment> {
        let mut builder = FragmentBuilder::new(2);
        for oid in 0..4 {
            builder.add_vertex(oid);
        }
        builder.add_edge(0, 1, 1.0).add_edge(1, 2, 1.0).add_edge(2, 3, 1.0);
        builder.build().unwrap()
    }

    fn single_manager() -> AutoMessageManager {
        let comm = LocalCommunicator::group(1).pop().unwrap();
        AutoMessageManager::new(Box::new(comm), &WorkerConfig::default())
    }

    fn buffer_for(frag: &EdgeCutFragment, kind: AggregateKind) -> SyncBuffer<f64> {
        SyncBuffer::with_kind(frag.vertices(0), 0.0, kind).unwrap()
    }

    #[test]
    fn test_event_ids_are_dense() {
        let frags = path_fragments();
        let mut mm = single_manager();
        let a = mm
            .register_sync_buffer(
                &frags[0],
                0,
                buffer_for(&frags[0], AggregateKind::Min),
                MessageStrategy::SyncOnOuterVertex,
            )
            .unwrap();
        let b = mm
            .register_sync_buffer(
                &frags[0],
                0,
                SyncBuffer::with_kind(frags[0].vertices(0), 0u64, AggregateKind::Sum).unwrap(),
                MessageStrategy::SyncOnOuterVertex,
            )
            .unwrap();
        assert_eq!(a.event_id(), 0);
        assert_eq!(b.event_id(), 1);
        assert_eq!(mm.event_num(), 2);
        assert_eq!(mm.strategy(1), Some(MessageStrategy::SyncOnOuterVertex));
        assert_eq!(mm.buffer(b).unwrap().aggregate_kind(), AggregateKind::Sum);
    }

    #[test]
    fn test_undispatchable_strategies_rejected() {
        let frags = path_fragments();
        for strategy in MessageStrategy::ALL {
            let mut mm = single_manager();
            let result = mm.register_sync_buffer(
                &frags[0],
                0,
                buffer_for(&frags[0], AggregateKind::Min),
                strategy,
            );
            if strategy == MessageStrategy::SyncOnOuterVertex {
                assert!(result.is_ok());
            } else {
                let err = result.unwrap_err();
                assert!(matches!(err, Error::Configuration(_)), "{}", strategy);
                assert!(err.to_string().contains(strategy.name()));
                assert_eq!(mm.event_num(), 0);
            }
        }
    }

    #[test]
    fn test_buffer_must_cover_label() {
        let frags = path_fragments();
        let mut mm = single_manager();
        let short = SyncBuffer::with_kind(frags[0].inner_vertices(0), 0.0, AggregateKind::Min)
            .unwrap();
        let err = mm
            .register_sync_buffer(&frags[0], 0, short, MessageStrategy::SyncOnOuterVertex)
            .unwrap_err();
        assert!(matches!(err, Error::Fragment(_)));

        let err = mm
            .register_sync_buffer(
                &frags[0],
                3,
                buffer_for(&frags[0], AggregateKind::Min),
                MessageStrategy::SyncOnOuterVertex,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Fragment(_)));
    }

    #[test]
    fn test_registration_after_start_rejected() {
        let frags = path_fragments();
        let mut mm = single_manager();
        mm.start();
        let err = mm
            .register_sync_buffer(
                &frags[0],
                0,
                buffer_for(&frags[0], AggregateKind::Min),
                MessageStrategy::SyncOnOuterVertex,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(mm.clear_events().is_err());
    }

    #[test]
    fn test_wrong_handle_type() {
        let frags = path_fragments();
        let mut mm = single_manager();
        let handle = mm
            .register_sync_buffer(
                &frags[0],
                0,
                buffer_for(&frags[0], AggregateKind::Min),
                MessageStrategy::SyncOnOuterVertex,
            )
            .unwrap();
        let forged: SyncBufferHandle<u64> = SyncBufferHandle {
            event_id: handle.event_id(),
            _marker: PhantomData,
        };
        assert!(matches!(
            mm.buffer(forged),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_send_phase_encodes_records() {
        let frags = path_fragments();
        let frag = &frags[0];
        let mut buffer = buffer_for(frag, AggregateKind::Overwrite);
        let inner = frag.get_inner_vertex(0, 0).unwrap();
        let mirror = frag.oid_to_vertex(0, 1).unwrap();
        buffer.set_value(inner, 1.0);
        buffer.set_value(mirror, 7.0);

        let comm = LocalCommunicator::group(2).into_iter().next().unwrap();
        let mut base = DefaultMessageManager::new(Box::new(comm), &WorkerConfig::default());
        let sent = send_outer_updates(frag, &mut base, 3, 0, &mut buffer).unwrap();
        assert_eq!(sent, 1);
        assert!(!buffer.has_updates());
        assert_eq!(buffer[inner], 1.0);

        let mut expected = BytesMut::new();
        expected.put_i32_le(3);
        expected.put_u64_le(1);
        expected.put_u64_le(frag.vertex_to_gid(mirror));
        expected.put_f64_le(7.0);
        assert_eq!(&base.send_buffer(1).unwrap()[..], &expected[..]);
        assert!(base.send_buffer(0).unwrap().is_empty());
    }

    #[test]
    fn test_send_phase_leaves_nothing_dirty() {
        let mut builder = FragmentBuilder::new(1);
        for oid in 0..3 {
            builder.add_vertex(oid);
        }
        builder.add_edge(0, 1, 1.0);
        let frag = builder.build().unwrap().pop().unwrap();

        let mut mm = single_manager();
        let handle = mm
            .register_sync_buffer(
                &frag,
                0,
                buffer_for(&frag, AggregateKind::Overwrite),
                MessageStrategy::SyncOnOuterVertex,
            )
            .unwrap();
        mm.start();
        mm.start_a_round(&frag).unwrap();
        let v = frag.oid_to_vertex(0, 2).unwrap();
        mm.buffer_mut(handle).unwrap().set_value(v, 5.0);
        mm.finish_a_round(&frag).unwrap();

        let buffer = mm.buffer(handle).unwrap();
        assert_eq!(buffer[v], 5.0);
        assert!(!buffer.has_updates());
        assert!(mm.to_terminate());
        assert_eq!(mm.stats().force_continues, 0);
    }

    #[test]
    fn test_receive_rejects_foreign_gid() {
        let frags = path_fragments();
        let frag = &frags[1];
        let mut buffer = buffer_for(frag, AggregateKind::Min);

        // vertex 0 is owned by fragment 0, so fragment 1 cannot merge it
        let gid = frags[0].vertex_to_gid(frags[0].get_inner_vertex(0, 0).unwrap());
        let mut raw = BytesMut::new();
        raw.put_u64_le(gid);
        raw.put_f64_le(1.0);
        let err = merge_records(frag, 0, &mut buffer, &mut raw.freeze(), 1).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "synconoutervertex".parse::<MessageStrategy>().unwrap(),
            MessageStrategy::SyncOnOuterVertex
        );
        assert!("broadcast".parse::<MessageStrategy>().is_err());
        assert!(!MessageStrategy::GatherScatter.is_dispatchable());
    }
}
