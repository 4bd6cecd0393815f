//! Message managers
//!
//! Two layers sit between the worker and the [`Communicator`](crate::comm::Communicator):
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │ AutoMessageManager                               │
//! │   sync events: buffer + strategy + event id      │
//! │   receive phase (start of round)                 │
//! │   send phase (end of round)                      │
//! ├──────────────────────────────────────────────────┤
//! │ DefaultMessageManager                            │
//! │   per-destination send buffers, round framing,   │
//! │   termination vote, force-continue               │
//! ├──────────────────────────────────────────────────┤
//! │ Communicator (frames + all-reduce)               │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! A value written into a send buffer during round *k* is flushed when round
//! *k* finishes and delivered when round *k+1* starts.

pub mod auto;
pub mod default;
pub mod frame;

pub use auto::{AutoMessageManager, MessageStrategy, ReceivedBatch, SyncBufferHandle};
pub use default::{DefaultMessageManager, MessageStats};
pub use frame::Frame;

use crate::Result;
use crate::fragment::Gid;
use crate::value::SyncValue;
use bytes::{Bytes, BytesMut};

/// A value that can be written into a send buffer and read back from an
/// incoming payload.
pub trait WireMessage: Sized + Send {
    /// Append the encoding of `self`
    fn encode(&self, buf: &mut BytesMut) -> Result<()>;

    /// Read one message from the front of `buf`
    fn decode(buf: &mut Bytes) -> Result<Self>;
}

macro_rules! impl_scalar_wire_message {
    ($($ty:ty),*) => {
        $(
            impl WireMessage for $ty {
                fn encode(&self, buf: &mut BytesMut) -> Result<()> {
                    SyncValue::encode(self, buf)
                }

                fn decode(buf: &mut Bytes) -> Result<Self> {
                    <$ty as SyncValue>::decode(buf)
                }
            }
        )*
    };
}

impl_scalar_wire_message!(f64, i32, i64, u32, u64, String);

/// Vertex-addressed message: global id of the vertex and its value
impl<T: SyncValue> WireMessage for (Gid, T) {
    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        SyncValue::encode(&self.0, buf)?;
        SyncValue::encode(&self.1, buf)
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        let gid = <Gid as SyncValue>::decode(buf)?;
        let value = <T as SyncValue>::decode(buf)?;
        Ok((gid, value))
    }
}
