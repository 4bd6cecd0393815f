//! All fragments of a graph queried on threads of one process

use crate::app::App;
use crate::comm::{AbortHandle, LocalCommunicator};
use crate::config::WorkerConfig;
use crate::fragment::{FragId, Fragment};
use crate::worker::{AppArgs, AppOutput, QueryStats, Worker};
use crate::{Error, Result};
use std::sync::Arc;
use std::thread;

/// Result of a query on one fragment
#[derive(Debug)]
pub struct QueryOutcome<O> {
    /// Fragment the result belongs to
    pub fid: FragId,
    /// Round and traffic summary
    pub stats: QueryStats,
    /// App output
    pub output: O,
}

/// Aborts the group unless the worker finished cleanly, including when the
/// worker thread panics.
struct AbortGuard {
    fid: FragId,
    handle: AbortHandle,
    armed: bool,
}

impl AbortGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            self.handle
                .abort(&format!("worker for fragment {} stopped", self.fid));
        }
    }
}

/// Runs one worker thread per fragment over a [`LocalCommunicator`] group.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCluster;

impl LocalCluster {
    /// Query every fragment with `app` and return the outcomes ordered by
    /// fid.
    ///
    /// `fragments[i]` must be fragment `i` of a graph split into
    /// `fragments.len()` parts. If any worker fails, the whole query fails
    /// with the first error that did not merely report the abort.
    pub fn run<F, A>(
        fragments: &[Arc<F>],
        app: Arc<A>,
        args: &AppArgs<F, A>,
        config: &WorkerConfig,
    ) -> Result<Vec<QueryOutcome<AppOutput<F, A>>>>
    where
        F: Fragment,
        A: App<F>,
    {
        validate_fragments(fragments)?;
        let fnum = fragments.len() as FragId;
        let comms = LocalCommunicator::group(fnum);
        let group = comms[0].abort_handle();

        tracing::info!(fnum, app = app.name(), "Running query on local cluster");

        let results: Vec<Result<QueryOutcome<AppOutput<F, A>>>> = thread::scope(|s| {
            let mut handles = Vec::with_capacity(fragments.len());
            for (frag, comm) in fragments.iter().zip(comms) {
                let fid = frag.fid();
                let mut guard = AbortGuard {
                    fid,
                    handle: comm.abort_handle(),
                    armed: true,
                };
                let app = Arc::clone(&app);
                let frag = Arc::clone(frag);
                let spawned = thread::Builder::new()
                    .name(format!("grape-frag-{}", fid))
                    .spawn_scoped(s, move || -> Result<QueryOutcome<AppOutput<F, A>>> {
                        let mut worker = Worker::new(app, frag, Box::new(comm), config)?;
                        let stats = worker.query(args)?;
                        let output = worker.output()?;
                        guard.disarm();
                        Ok(QueryOutcome { fid, stats, output })
                    });
                match spawned {
                    Ok(handle) => handles.push((fid, Some(handle))),
                    Err(e) => {
                        group.abort(&format!("failed to spawn worker {}: {}", fid, e));
                        handles.push((fid, None));
                    }
                }
            }

            handles
                .into_iter()
                .map(|(fid, handle)| match handle {
                    Some(handle) => handle.join().unwrap_or_else(|_| {
                        Err(Error::internal(format!(
                            "worker for fragment {} panicked",
                            fid
                        )))
                    }),
                    None => Err(Error::internal(format!(
                        "worker for fragment {} was not started",
                        fid
                    ))),
                })
                .collect()
        });

        let mut outcomes = Vec::with_capacity(results.len());
        let mut first_aborted = None;
        let mut first_failure = None;
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_aborted() => {
                    first_aborted.get_or_insert(e);
                }
                Err(e) => {
                    first_failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_failure.or(first_aborted) {
            return Err(e);
        }
        Ok(outcomes)
    }
}

fn validate_fragments<F: Fragment>(fragments: &[Arc<F>]) -> Result<()> {
    if fragments.is_empty() {
        return Err(Error::configuration("no fragments to query"));
    }
    let fnum = fragments.len();
    for (i, frag) in fragments.iter().enumerate() {
        if frag.fid() as usize != i || frag.fnum() as usize != fnum {
            return Err(Error::fragment(format!(
                "fragment at position {} is {}/{}, expected {}/{}",
                i,
                frag.fid(),
                frag.fnum(),
                i,
                fnum
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::InDegree;
    use crate::fragment::{EdgeCutFragment, FragmentBuilder};

    fn fragments(fnum: FragId) -> Vec<Arc<EdgeCutFragment>> {
        let mut builder = FragmentBuilder::new(fnum);
        for oid in 0..6 {
            builder.add_vertex(oid);
        }
        builder
            .build()
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect()
    }

    #[test]
    fn test_fragments_out_of_order_rejected() {
        let mut frags = fragments(2);
        frags.swap(0, 1);
        assert!(matches!(
            validate_fragments(&frags),
            Err(Error::Fragment(_))
        ));
        assert!(validate_fragments::<EdgeCutFragment>(&[]).is_err());
        assert!(validate_fragments(&fragments(3)).is_ok());
    }

    #[test]
    fn test_clean_run_keeps_group_alive() {
        for fnum in 1..=3 {
            let outcomes = LocalCluster::run(
                &fragments(fnum),
                Arc::new(InDegree),
                &(),
                &WorkerConfig::default(),
            )
            .unwrap();
            let fids: Vec<FragId> = outcomes.iter().map(|o| o.fid).collect();
            assert_eq!(fids, (0..fnum).collect::<Vec<_>>());
            assert!(outcomes.iter().all(|o| o.stats.rounds == 1));
        }
    }
}
