//! Per-worker thread pool for vertex loops

use crate::fragment::{FragId, Vertex, VertexRange};
use crate::sync_buffer::SyncBuffer;
use crate::value::SyncValue;
use crate::{Error, Result};

/// Thread pool owned by one worker.
///
/// Every method blocks until the submitted work has finished, so writes made
/// through it are complete before the round closes.
#[derive(Debug)]
pub struct ParallelEngine {
    pool: rayon::ThreadPool,
    thread_num: usize,
}

impl ParallelEngine {
    /// Build a pool of `thread_num` threads for fragment `fid`
    pub fn new(fid: FragId, thread_num: usize) -> Result<Self> {
        if thread_num == 0 {
            return Err(Error::configuration("thread_num must be at least 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_num)
            .thread_name(move |i| format!("grape-{}-worker-{}", fid, i))
            .build()
            .map_err(|e| Error::internal(format!("failed to build thread pool: {}", e)))?;
        Ok(Self { pool, thread_num })
    }

    /// Number of threads
    pub fn thread_num(&self) -> usize {
        self.thread_num
    }

    /// Run `op` inside the pool
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// [`SyncBuffer::par_update`] on this pool
    pub fn par_update<T, U>(&self, buffer: &mut SyncBuffer<T>, range: VertexRange, update: U)
    where
        T: SyncValue,
        U: Fn(Vertex, &mut T) -> bool + Send + Sync,
    {
        self.pool.install(|| buffer.par_update(range, update));
    }
}
