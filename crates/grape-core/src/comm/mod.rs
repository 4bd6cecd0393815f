//! Point-to-point frames and round barriers between workers
//!
//! The message managers only need three things from the transport: send a
//! frame to one fragment, poll for frames addressed to this fragment, and a
//! collective that doubles as the round barrier.
//!
//! # Delivery contract
//!
//! - Frames between one pair of fragments arrive in send order.
//! - A frame sent before the sender enters [`Communicator::all_reduce_sum`]
//!   is visible to the receiver's [`Communicator::try_recv`] once the
//!   receiver's matching `all_reduce_sum` has returned.
//! - Failures are not retried. [`Communicator::abort`] poisons the whole
//!   group so that every peer blocked in a collective returns
//!   [`Error::Aborted`](crate::Error::Aborted).

pub mod local;

pub use local::{AbortHandle, LocalCommunicator};

use crate::Result;
use crate::fragment::FragId;
use bytes::Bytes;

/// Transport used by one worker to reach the others of its group.
pub trait Communicator: Send {
    /// Id of this worker's fragment
    fn fid(&self) -> FragId;

    /// Number of workers in the group
    fn fnum(&self) -> FragId;

    /// Queue a frame for `dst`
    fn send(&self, dst: FragId, frame: Bytes) -> Result<()>;

    /// Next frame addressed to this worker, if one is available
    fn try_recv(&self) -> Result<Option<Bytes>>;

    /// Sum `value` over every worker; blocks until all have contributed
    fn all_reduce_sum(&self, value: u64) -> Result<u64>;

    /// Block until every worker has reached the barrier
    fn barrier(&self) -> Result<()> {
        self.all_reduce_sum(0).map(|_| ())
    }

    /// Abort the group; blocked and future collectives fail on every worker
    fn abort(&self, reason: &str);
}
