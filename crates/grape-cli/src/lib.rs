//! Grape command-line runner
//!
//! Loads an edge list, partitions it into fragments, runs one of the bundled
//! apps on a [`grape_core::LocalCluster`] and prints the per-vertex results.

pub mod cli;
pub mod config;
pub mod loader;
pub mod output;
pub mod runner;

pub use cli::{Cli, Commands, RunArgs};
pub use config::{AppKind, OutputFormat, RunConfig};
pub use loader::{EdgeList, LoadError};
pub use output::{ResultRow, render};
pub use runner::{RunReport, run};
