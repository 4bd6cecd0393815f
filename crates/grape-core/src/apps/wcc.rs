//! Weakly connected components
//!
//! Every vertex starts with its own original id as component id and the
//! minimum id is propagated along edges in both directions. Original ids are
//! assumed unique across labels.

use crate::Result;
use crate::aggregate::AggregateKind;
use crate::app::{App, Context, ParallelEngine, VertexDataContext, VertexValue};
use crate::fragment::{Fragment, Oid, Vertex};
use crate::message::AutoMessageManager;
use std::collections::VecDeque;

/// Per-fragment component ids
#[derive(Debug, Default)]
pub struct WccContext {
    comp: VertexDataContext<Oid>,
}

impl<F: Fragment> Context<F> for WccContext {
    type Args = ();
    type Output = Vec<VertexValue<Oid>>;

    fn init(&mut self, frag: &F, messages: &mut AutoMessageManager, _args: &()) -> Result<()> {
        self.comp
            .init_partial_results(frag, messages, Oid::MAX, AggregateKind::Min)
    }

    fn output(&self, frag: &F, messages: &AutoMessageManager) -> Result<Self::Output> {
        self.comp.collect(frag, messages)
    }
}

/// Min-label propagation ignoring edge direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wcc;

impl<F: Fragment> App<F> for Wcc {
    type Context = WccContext;

    fn name(&self) -> &'static str {
        "wcc"
    }

    fn peval(
        &self,
        frag: &F,
        ctx: &mut WccContext,
        messages: &mut AutoMessageManager,
        engine: &ParallelEngine,
    ) -> Result<()> {
        let mut seeds = Vec::new();
        for label in 0..frag.vertex_label_num() {
            let inner = frag.inner_vertices(label);
            let comp = ctx.comp.partial_result_mut(messages, label)?;
            engine.par_update(comp, inner, |v, value| {
                *value = frag.get_id(v);
                true
            });
            seeds.extend(inner);
        }
        propagate(frag, &ctx.comp, messages, seeds)
    }

    fn inc_eval(
        &self,
        frag: &F,
        ctx: &mut WccContext,
        messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> Result<()> {
        let mut seeds = Vec::new();
        for label in 0..frag.vertex_label_num() {
            let comp = ctx.comp.partial_result(messages, label)?;
            seeds.extend(comp.updated_in(frag.inner_vertices(label)));
        }
        propagate(frag, &ctx.comp, messages, seeds)
    }
}

fn propagate<F: Fragment>(
    frag: &F,
    comp: &VertexDataContext<Oid>,
    messages: &mut AutoMessageManager,
    seeds: Vec<Vertex>,
) -> Result<()> {
    let mut queue = VecDeque::from(seeds);
    while let Some(u) = queue.pop_front() {
        let id = comp.value(messages, u)?;
        let neighbors = frag
            .outgoing_edges(u)
            .iter()
            .chain(frag.incoming_edges(u))
            .map(|nbr| nbr.neighbor);
        for v in neighbors {
            let target = comp.partial_result_mut(messages, v.label())?;
            if target.aggregate(v, id) && frag.is_inner_vertex(v) {
                queue.push_back(v);
            }
        }
    }
    Ok(())
}
