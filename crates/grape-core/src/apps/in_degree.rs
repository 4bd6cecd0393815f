//! In-degree counted on the source side of each edge
//!
//! Every edge is counted once by the fragment owning its source. Counts for
//! mirrors are shipped to the owner and added with `Sum`, so the query takes
//! exactly one round after PEval.

use crate::Result;
use crate::aggregate::AggregateKind;
use crate::app::{App, Context, ParallelEngine, VertexDataContext, VertexValue};
use crate::fragment::Fragment;
use crate::message::AutoMessageManager;

/// Per-fragment in-degree counters
#[derive(Debug, Default)]
pub struct InDegreeContext {
    degree: VertexDataContext<u64>,
}

impl<F: Fragment> Context<F> for InDegreeContext {
    type Args = ();
    type Output = Vec<VertexValue<u64>>;

    fn init(&mut self, frag: &F, messages: &mut AutoMessageManager, _args: &()) -> Result<()> {
        self.degree
            .init_partial_results(frag, messages, 0, AggregateKind::Sum)
    }

    fn output(&self, frag: &F, messages: &AutoMessageManager) -> Result<Self::Output> {
        self.degree.collect(frag, messages)
    }
}

/// Number of incoming edges of every vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct InDegree;

impl<F: Fragment> App<F> for InDegree {
    type Context = InDegreeContext;

    fn name(&self) -> &'static str {
        "in_degree"
    }

    fn peval(
        &self,
        frag: &F,
        ctx: &mut InDegreeContext,
        messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> Result<()> {
        for label in 0..frag.vertex_label_num() {
            for u in frag.inner_vertices(label) {
                for nbr in frag.outgoing_edges(u) {
                    ctx.degree
                        .partial_result_mut(messages, nbr.neighbor.label())?
                        .aggregate(nbr.neighbor, 1);
                }
            }
        }
        Ok(())
    }

    fn inc_eval(
        &self,
        _frag: &F,
        _ctx: &mut InDegreeContext,
        _messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> Result<()> {
        Ok(())
    }
}
