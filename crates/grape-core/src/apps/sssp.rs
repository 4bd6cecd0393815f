//! Single-source shortest paths
//!
//! Each fragment runs Dijkstra over its own edges. Distances reaching a
//! mirror are shipped to the owner, merged with `Min`, and the owner resumes
//! Dijkstra from every inner vertex whose distance improved.

use crate::Result;
use crate::aggregate::AggregateKind;
use crate::app::{App, Context, ParallelEngine, VertexDataContext, VertexValue};
use crate::fragment::{Fragment, LabelId, Oid, Vertex};
use crate::message::AutoMessageManager;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Source vertex of a shortest-path query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SsspArgs {
    /// Label of the source
    pub label: LabelId,
    /// Original id of the source
    pub source: Oid,
}

impl SsspArgs {
    /// Source `oid` with label 0
    pub fn new(source: Oid) -> Self {
        Self { label: 0, source }
    }
}

/// Per-fragment distances
#[derive(Debug, Default)]
pub struct SsspContext {
    dist: VertexDataContext<f64>,
    args: SsspArgs,
}

impl<F: Fragment> Context<F> for SsspContext {
    type Args = SsspArgs;
    type Output = Vec<VertexValue<f64>>;

    fn init(&mut self, frag: &F, messages: &mut AutoMessageManager, args: &SsspArgs) -> Result<()> {
        self.args = *args;
        self.dist
            .init_partial_results(frag, messages, f64::INFINITY, AggregateKind::Min)
    }

    fn output(&self, frag: &F, messages: &AutoMessageManager) -> Result<Self::Output> {
        self.dist.collect(frag, messages)
    }
}

/// Single-source shortest paths over weighted outgoing edges.
///
/// Unreachable vertices keep an infinite distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sssp;

impl<F: Fragment> App<F> for Sssp {
    type Context = SsspContext;

    fn name(&self) -> &'static str {
        "sssp"
    }

    fn peval(
        &self,
        frag: &F,
        ctx: &mut SsspContext,
        messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> Result<()> {
        let Some(source) = frag.get_inner_vertex(ctx.args.label, ctx.args.source) else {
            return Ok(());
        };
        ctx.dist
            .partial_result_mut(messages, source.label())?
            .set_value(source, 0.0);
        dijkstra(frag, &ctx.dist, messages, vec![source])
    }

    fn inc_eval(
        &self,
        frag: &F,
        ctx: &mut SsspContext,
        messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> Result<()> {
        let mut seeds = Vec::new();
        for label in 0..frag.vertex_label_num() {
            let dist = ctx.dist.partial_result(messages, label)?;
            seeds.extend(dist.updated_in(frag.inner_vertices(label)));
        }
        dijkstra(frag, &ctx.dist, messages, seeds)
    }
}

fn dijkstra<F: Fragment>(
    frag: &F,
    dist: &VertexDataContext<f64>,
    messages: &mut AutoMessageManager,
    seeds: Vec<Vertex>,
) -> Result<()> {
    // Priority queue item (reversed for min-heap behavior)
    #[derive(PartialEq)]
    struct QueueItem(f64, Vertex);

    impl Eq for QueueItem {}

    impl PartialOrd for QueueItem {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for QueueItem {
        fn cmp(&self, other: &Self) -> Ordering {
            other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
        }
    }

    let mut heap = BinaryHeap::with_capacity(seeds.len());
    for v in seeds {
        heap.push(QueueItem(dist.value(messages, v)?, v));
    }

    while let Some(QueueItem(d, u)) = heap.pop() {
        if d > dist.value(messages, u)? {
            continue;
        }
        for nbr in frag.outgoing_edges(u) {
            let new_dist = d + nbr.weight;
            let target = dist.partial_result_mut(messages, nbr.neighbor.label())?;
            if target.aggregate(nbr.neighbor, new_dist) && frag.is_inner_vertex(nbr.neighbor) {
                heap.push(QueueItem(new_dist, nbr.neighbor));
            }
        }
    }
    Ok(())
}
