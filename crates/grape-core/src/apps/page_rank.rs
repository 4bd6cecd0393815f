//! PageRank with a fixed number of iterations
//!
//! Contributions `rank / out_degree` are accumulated into a `Sum` buffer;
//! contributions landing on mirrors reach their owner one round later. The
//! buffer is zeroed without marking anything dirty before every scatter, so
//! each round ships only that round's contributions. Rank held by vertices
//! without outgoing edges is not redistributed.

use crate::aggregate::AggregateKind;
use crate::app::{App, Context, ParallelEngine, VertexDataContext, VertexValue};
use crate::fragment::{Fragment, Vertex};
use crate::message::AutoMessageManager;
use crate::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// PageRank parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRankArgs {
    /// Damping factor
    pub damping: f64,
    /// Number of rank updates after the initial assignment
    pub max_round: u32,
}

impl Default for PageRankArgs {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_round: 10,
        }
    }
}

impl PageRankArgs {
    /// Parameters with the given iteration count
    pub fn with_max_round(mut self, max_round: u32) -> Self {
        self.max_round = max_round;
        self
    }

    /// Parameters with the given damping factor
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }
}

/// Per-fragment ranks and pending contributions
#[derive(Debug, Default)]
pub struct PageRankContext {
    next: VertexDataContext<f64>,
    rank: Vec<Vec<f64>>,
    args: PageRankArgs,
    total_vertices: u64,
}

impl<F: Fragment> Context<F> for PageRankContext {
    type Args = PageRankArgs;
    type Output = Vec<VertexValue<f64>>;

    fn init(
        &mut self,
        frag: &F,
        messages: &mut AutoMessageManager,
        args: &PageRankArgs,
    ) -> Result<()> {
        if !(0.0..=1.0).contains(&args.damping) {
            return Err(Error::app(format!(
                "damping factor {} outside [0, 1]",
                args.damping
            )));
        }
        self.args = *args;
        self.rank = (0..frag.vertex_label_num())
            .map(|label| vec![0.0; frag.inner_vertices(label).len()])
            .collect();
        self.next
            .init_partial_results(frag, messages, 0.0, AggregateKind::Sum)
    }

    fn output(&self, frag: &F, _messages: &AutoMessageManager) -> Result<Self::Output> {
        let mut values = Vec::new();
        for (label, ranks) in (0..frag.vertex_label_num()).zip(&self.rank) {
            for (v, &value) in frag.inner_vertices(label).into_iter().zip(ranks) {
                values.push(VertexValue {
                    label,
                    oid: frag.get_id(v),
                    value,
                });
            }
        }
        Ok(values)
    }
}

/// Fixed-iteration PageRank over outgoing edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRank;

impl<F: Fragment> App<F> for PageRank {
    type Context = PageRankContext;

    fn name(&self) -> &'static str {
        "page_rank"
    }

    fn peval(
        &self,
        frag: &F,
        ctx: &mut PageRankContext,
        messages: &mut AutoMessageManager,
        _engine: &ParallelEngine,
    ) -> Result<()> {
        let local: usize = ctx.rank.iter().map(Vec::len).sum();
        ctx.total_vertices = messages.sum_across_fragments(local as u64)?;
        if ctx.total_vertices == 0 {
            return Ok(());
        }

        let initial = 1.0 / ctx.total_vertices as f64;
        for ranks in &mut ctx.rank {
            ranks.fill(initial);
        }
        if ctx.args.max_round > 0 {
            scatter(frag, ctx, messages)?;
            messages.force_continue();
        }
        Ok(())
    }

    fn inc_eval(
        &self,
        frag: &F,
        ctx: &mut PageRankContext,
        messages: &mut AutoMessageManager,
        engine: &ParallelEngine,
    ) -> Result<()> {
        if ctx.total_vertices == 0 {
            return Ok(());
        }
        let damping = ctx.args.damping;
        let base = (1.0 - damping) / ctx.total_vertices as f64;

        for label in 0..frag.vertex_label_num() {
            let next = ctx.next.partial_result_mut(messages, label)?;
            let Some(ranks) = ctx.rank.get_mut(label as usize) else {
                continue;
            };
            {
                let next = &*next;
                engine.install(|| {
                    ranks.par_iter_mut().enumerate().for_each(|(offset, rank)| {
                        *rank = base + damping * next[Vertex::new(label, offset)];
                    })
                });
            }
            let range = next.range();
            engine.par_update(next, range, |_, value| {
                *value = 0.0;
                false
            });
        }

        if messages.round() < ctx.args.max_round {
            scatter(frag, ctx, messages)?;
            messages.force_continue();
        }
        Ok(())
    }
}

fn scatter<F: Fragment>(
    frag: &F,
    ctx: &PageRankContext,
    messages: &mut AutoMessageManager,
) -> Result<()> {
    for (label, ranks) in (0..frag.vertex_label_num()).zip(&ctx.rank) {
        for (u, &rank) in frag.inner_vertices(label).into_iter().zip(ranks) {
            let edges = frag.outgoing_edges(u);
            if edges.is_empty() {
                continue;
            }
            let share = rank / edges.len() as f64;
            for nbr in edges {
                ctx.next
                    .partial_result_mut(messages, nbr.neighbor.label())?
                    .aggregate(nbr.neighbor, share);
            }
        }
    }
    Ok(())
}
