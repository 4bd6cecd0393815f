//! Context holding one synchronized value per vertex

use crate::aggregate::AggregateKind;
use crate::fragment::{Fragment, LabelId, Oid, Vertex};
use crate::message::{AutoMessageManager, MessageStrategy, SyncBufferHandle};
use crate::sync_buffer::SyncBuffer;
use crate::value::SyncValue;
use crate::{Error, Result};
use serde::Serialize;

/// Final value of one inner vertex
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexValue<T> {
    /// Vertex label
    pub label: LabelId,
    /// Original id
    pub oid: Oid,
    /// Value
    pub value: T,
}

/// One sync buffer per vertex label, all using the same combine kind.
///
/// The buffers are owned by the [`AutoMessageManager`]; the context only
/// keeps their handles.
#[derive(Debug)]
pub struct VertexDataContext<T: SyncValue> {
    handles: Vec<SyncBufferHandle<T>>,
}

impl<T: SyncValue> Default for VertexDataContext<T> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<T: SyncValue> VertexDataContext<T> {
    /// Allocate and register a buffer over every label of `frag`, every
    /// value set to `default`
    pub fn init_partial_results<F>(
        &mut self,
        frag: &F,
        messages: &mut AutoMessageManager,
        default: T,
        kind: AggregateKind,
    ) -> Result<()>
    where
        F: Fragment + ?Sized,
    {
        self.handles.clear();
        for label in 0..frag.vertex_label_num() {
            let buffer = SyncBuffer::with_kind(frag.vertices(label), default.clone(), kind)?;
            let handle = messages.register_sync_buffer(
                frag,
                label,
                buffer,
                MessageStrategy::SyncOnOuterVertex,
            )?;
            self.handles.push(handle);
        }
        Ok(())
    }

    /// Number of labels with a registered buffer
    pub fn label_num(&self) -> usize {
        self.handles.len()
    }

    /// Handle of the buffer for `label`
    pub fn handle(&self, label: LabelId) -> Result<SyncBufferHandle<T>> {
        self.handles.get(label as usize).copied().ok_or_else(|| {
            Error::fragment(format!(
                "no partial result registered for label {}",
                label
            ))
        })
    }

    /// Values of every vertex of `label`
    pub fn partial_result<'a>(
        &self,
        messages: &'a AutoMessageManager,
        label: LabelId,
    ) -> Result<&'a SyncBuffer<T>> {
        messages.buffer(self.handle(label)?)
    }

    /// Mutable values of every vertex of `label`
    pub fn partial_result_mut<'a>(
        &self,
        messages: &'a mut AutoMessageManager,
        label: LabelId,
    ) -> Result<&'a mut SyncBuffer<T>> {
        messages.buffer_mut(self.handle(label)?)
    }

    /// Current value of `v`
    pub fn value(&self, messages: &AutoMessageManager, v: Vertex) -> Result<T> {
        Ok(self.partial_result(messages, v.label())?.get(v).clone())
    }

    /// Values of the inner vertices of every label, keyed by original id
    pub fn collect<F>(&self, frag: &F, messages: &AutoMessageManager) -> Result<Vec<VertexValue<T>>>
    where
        F: Fragment + ?Sized,
    {
        let mut values = Vec::new();
        for label in 0..frag.vertex_label_num() {
            let buffer = self.partial_result(messages, label)?;
            for v in frag.inner_vertices(label) {
                values.push(VertexValue {
                    label,
                    oid: frag.get_id(v),
                    value: buffer.get(v).clone(),
                });
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalCommunicator;
    use crate::config::WorkerConfig;
    use crate::fragment::FragmentBuilder;

    #[test]
    fn test_one_buffer_per_label() {
        let mut builder = FragmentBuilder::new(1).with_label_num(2);
        builder.add_labeled_vertex(0, 10).add_labeled_vertex(1, 20);
        builder.add_labeled_vertex(1, 21);
        let frags = builder.build().unwrap();
        let frag = &frags[0];

        let comm = LocalCommunicator::group(1).pop().unwrap();
        let mut mm = AutoMessageManager::new(Box::new(comm), &WorkerConfig::default());
        let mut ctx = VertexDataContext::<u64>::default();
        ctx.init_partial_results(frag, &mut mm, 5, AggregateKind::Sum)
            .unwrap();
        assert_eq!(ctx.label_num(), 2);
        assert_eq!(mm.event_num(), 2);

        let v = frag.get_inner_vertex(1, 21).unwrap();
        ctx.partial_result_mut(&mut mm, 1).unwrap().aggregate(v, 3);
        assert_eq!(ctx.value(&mm, v).unwrap(), 8);

        let mut values = ctx.collect(frag, &mm).unwrap();
        values.sort_by_key(|value| value.oid);
        assert_eq!(
            values,
            vec![
                VertexValue { label: 0, oid: 10, value: 5 },
                VertexValue { label: 1, oid: 20, value: 5 },
                VertexValue { label: 1, oid: 21, value: 8 },
            ]
        );
        assert!(ctx.handle(2).is_err());
    }
}
