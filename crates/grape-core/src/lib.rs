//! Grape Core - partition-parallel graph analytics
//!
//! This crate runs vertex-centric apps over an edge-cut partitioned graph,
//! one worker per fragment, implementing:
//! - Fragments with inner (owned) and outer (mirror) vertices
//! - Per-vertex sync buffers with dirty tracking and pluggable combine
//!   functions (min/max/sum/product/overwrite/append)
//! - An auto message manager that ships dirty mirrors to their owners at
//!   every round boundary and merges them on arrival
//! - A superstep worker (PEval, then IncEval until a silent round) with
//!   all-or-nothing failure handling
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Apps / LocalCluster              │
//! │     (Sssp, Wcc, InDegree, PageRank)         │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │                 Worker                      │
//! │   (superstep loop, ParallelEngine, abort)   │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │          AutoMessageManager                 │
//! │  (sync events, send/receive phases)         │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │  DefaultMessageManager + Communicator       │
//! │  (round frames, termination vote, CRC)      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use grape_core::apps::{Sssp, SsspArgs};
//! use grape_core::{FragmentBuilder, LocalCluster, WorkerConfig};
//! use std::sync::Arc;
//!
//! let mut builder = FragmentBuilder::new(2);
//! for oid in 0..3 {
//!     builder.add_vertex(oid);
//! }
//! builder.add_edge(0, 1, 1.0).add_edge(1, 2, 2.0);
//! let fragments: Vec<_> = builder.build()?.into_iter().map(Arc::new).collect();
//!
//! let outcomes = LocalCluster::run(
//!     &fragments,
//!     Arc::new(Sssp),
//!     &SsspArgs::new(0),
//!     &WorkerConfig::default(),
//! )?;
//! let dist: f64 = outcomes
//!     .iter()
//!     .flat_map(|o| &o.output)
//!     .find(|v| v.oid == 2)
//!     .map(|v| v.value)
//!     .unwrap();
//! assert_eq!(dist, 3.0);
//! # Ok::<(), grape_core::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod app;
pub mod apps;
pub mod cluster;
pub mod comm;
pub mod config;
pub mod error;
pub mod fragment;
pub mod message;
pub mod sync_buffer;
pub mod value;
pub mod worker;

pub use aggregate::{AggregateFactory, AggregateKind, Combine, CombineFn};
pub use app::{App, Context, ParallelEngine, VertexDataContext, VertexValue};
pub use cluster::{LocalCluster, QueryOutcome};
pub use comm::{Communicator, LocalCommunicator};
pub use config::WorkerConfig;
pub use error::{Error, Result};
pub use fragment::{
    EdgeCutFragment, FragId, Fragment, FragmentBuilder, Gid, LabelId, Oid, Vertex, VertexRange,
};
pub use message::{AutoMessageManager, DefaultMessageManager, MessageStats, MessageStrategy};
pub use sync_buffer::{AnySyncBuffer, SyncBuffer};
pub use value::{DataType, SyncValue, ValueType};
pub use worker::{QueryStats, Worker};
