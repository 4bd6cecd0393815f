//! App and context interfaces
//!
//! An app is a pair of callbacks run by the worker on every fragment:
//! `peval` once in round 0 and `inc_eval` in every later round, until a
//! round passes in which no fragment sent anything or asked to continue.
//! Per-query state lives in the app's [`Context`], whose sync buffers are
//! registered with the [`AutoMessageManager`] during `init`.

pub mod context;
pub mod parallel;

pub use context::{VertexDataContext, VertexValue};
pub use parallel::ParallelEngine;

use crate::Result;
use crate::fragment::Fragment;
use crate::message::AutoMessageManager;

/// Per-query, per-fragment state of an app.
pub trait Context<F: Fragment>: Send {
    /// Query arguments, shared by every fragment
    type Args: Clone + Send + Sync;

    /// Result produced by one fragment once the query terminates
    type Output: Send;

    /// Allocate state and register sync buffers; runs before round 0
    fn init(&mut self, frag: &F, messages: &mut AutoMessageManager, args: &Self::Args)
    -> Result<()>;

    /// Extract this fragment's result
    fn output(&self, frag: &F, messages: &AutoMessageManager) -> Result<Self::Output>;
}

/// A vertex-centric algorithm driven by the worker's superstep loop.
///
/// Both callbacks run strictly between round boundaries; any parallel work
/// submitted to the [`ParallelEngine`] must have joined before they return.
/// An error from either aborts the query on every fragment.
pub trait App<F: Fragment>: Send + Sync {
    /// Per-query state
    type Context: Context<F> + Default;

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Partial evaluation over the local fragment (round 0)
    fn peval(
        &self,
        frag: &F,
        ctx: &mut Self::Context,
        messages: &mut AutoMessageManager,
        engine: &ParallelEngine,
    ) -> Result<()>;

    /// Incremental evaluation after the receive phase of a later round
    fn inc_eval(
        &self,
        frag: &F,
        ctx: &mut Self::Context,
        messages: &mut AutoMessageManager,
        engine: &ParallelEngine,
    ) -> Result<()>;
}
