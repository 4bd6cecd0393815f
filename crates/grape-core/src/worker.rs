//! Superstep driver for one fragment
//!
//! ```text
//! barrier → Context::init → start
//!   round 0:  start_a_round → peval    → finish_a_round
//!   round k:  start_a_round → inc_eval → finish_a_round   (until to_terminate)
//! barrier → finalize
//! ```

use crate::app::{App, Context, ParallelEngine};
use crate::comm::Communicator;
use crate::config::WorkerConfig;
use crate::fragment::Fragment;
use crate::message::{AutoMessageManager, MessageStats};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Query arguments of an app
pub type AppArgs<F, A> = <<A as App<F>>::Context as Context<F>>::Args;

/// Query output of an app
pub type AppOutput<F, A> = <<A as App<F>>::Context as Context<F>>::Output;

/// Summary of one finished query on one fragment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryStats {
    /// Rounds run, PEval included
    pub rounds: u32,
    /// Traffic counters
    pub messages: MessageStats,
    /// Wall time from the first barrier to finalize
    pub elapsed: Duration,
}

/// Runs an app's queries over one fragment.
pub struct Worker<F: Fragment, A: App<F>> {
    app: Arc<A>,
    fragment: Arc<F>,
    messages: AutoMessageManager,
    context: A::Context,
    engine: ParallelEngine,
}

impl<F: Fragment, A: App<F>> Worker<F, A> {
    /// Create a worker for `fragment` connected through `comm`
    pub fn new(
        app: Arc<A>,
        fragment: Arc<F>,
        comm: Box<dyn Communicator>,
        config: &WorkerConfig,
    ) -> Result<Self> {
        config.validate().map_err(Error::configuration)?;
        if comm.fid() != fragment.fid() || comm.fnum() != fragment.fnum() {
            return Err(Error::configuration(format!(
                "communicator {}/{} does not match fragment {}/{}",
                comm.fid(),
                comm.fnum(),
                fragment.fid(),
                fragment.fnum()
            )));
        }
        let engine = ParallelEngine::new(fragment.fid(), config.thread_num)?;
        Ok(Self {
            app,
            fragment,
            messages: AutoMessageManager::new(comm, config),
            context: A::Context::default(),
            engine,
        })
    }

    /// Run one query to termination.
    ///
    /// A failure on this worker aborts the query on every other worker; a
    /// failure elsewhere surfaces here as [`Error::Aborted`].
    pub fn query(&mut self, args: &AppArgs<F, A>) -> Result<QueryStats> {
        match self.run_query(args) {
            Ok(stats) => Ok(stats),
            Err(e) => {
                if !e.is_aborted() {
                    tracing::error!(
                        fid = self.fragment.fid(),
                        app = self.app.name(),
                        round = self.messages.round(),
                        error = %e,
                        "Query failed"
                    );
                    self.messages
                        .abort(&format!("fragment {} failed: {}", self.fragment.fid(), e));
                }
                self.messages.finalize();
                Err(e)
            }
        }
    }

    fn run_query(&mut self, args: &AppArgs<F, A>) -> Result<QueryStats> {
        let started = Instant::now();
        let frag = self.fragment.as_ref();

        self.messages.barrier()?;
        tracing::info!(
            fid = frag.fid(),
            fnum = frag.fnum(),
            app = self.app.name(),
            threads = self.engine.thread_num(),
            "Query started"
        );

        self.messages.clear_events()?;
        self.context = A::Context::default();
        self.context.init(frag, &mut self.messages, args)?;
        self.messages.start();

        self.messages.start_a_round(frag)?;
        self.app
            .peval(frag, &mut self.context, &mut self.messages, &self.engine)?;
        self.messages.finish_a_round(frag)?;

        while !self.messages.to_terminate() {
            self.messages.start_a_round(frag)?;
            self.app
                .inc_eval(frag, &mut self.context, &mut self.messages, &self.engine)?;
            self.messages.finish_a_round(frag)?;
        }

        self.messages.barrier()?;
        let messages = self.messages.finalize();
        let stats = QueryStats {
            rounds: messages.rounds,
            messages,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            fid = frag.fid(),
            app = self.app.name(),
            rounds = stats.rounds,
            frames_sent = messages.frames_sent,
            bytes_sent = messages.bytes_sent,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Query finished"
        );
        Ok(stats)
    }

    /// Result of the last query on this fragment
    pub fn output(&self) -> Result<AppOutput<F, A>> {
        self.context.output(&self.fragment, &self.messages)
    }

    /// The fragment this worker runs on
    pub fn fragment(&self) -> &Arc<F> {
        &self.fragment
    }

    /// Context of the last query
    pub fn context(&self) -> &A::Context {
        &self.context
    }

    /// The worker's message manager
    pub fn messages(&self) -> &AutoMessageManager {
        &self.messages
    }
}

impl<F: Fragment, A: App<F>> std::fmt::Debug for Worker<F, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("app", &self.app.name())
            .field("fid", &self.fragment.fid())
            .field("messages", &self.messages)
            .finish()
    }
}
