//! Command-line arguments

use crate::config::{AppKind, OutputFormat, RunConfig};
use clap::{Args, Parser, Subcommand};
use grape_core::Oid;
use std::path::PathBuf;

/// Run Grape analytical apps on an in-process cluster
#[derive(Parser, Debug)]
#[command(name = "grape")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML run configuration
    #[arg(long, env = "GRAPE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load an edge list and run an app on it
    Run(RunArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Flags of `grape run`; each one overrides the configuration file
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Edge-list file
    pub input: Option<PathBuf>,

    /// App to run
    #[arg(long, value_enum)]
    pub app: Option<AppKind>,

    /// Number of fragments
    #[arg(long)]
    pub fnum: Option<u32>,

    /// Threads per fragment
    #[arg(long)]
    pub threads: Option<usize>,

    /// Source vertex for sssp
    #[arg(long, allow_negative_numbers = true)]
    pub source: Option<Oid>,

    /// Treat edges as undirected
    #[arg(long)]
    pub undirected: bool,

    /// Damping factor for page_rank
    #[arg(long)]
    pub damping: Option<f64>,

    /// Rank updates for page_rank
    #[arg(long)]
    pub max_round: Option<u32>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Skip frame checksum verification
    #[arg(long)]
    pub no_verify: bool,

    /// Print round and traffic totals after the results
    #[arg(long)]
    pub stats: bool,
}

impl RunArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(input) = &self.input {
            config.input = Some(input.clone());
        }
        if let Some(app) = self.app {
            config.app = app;
        }
        if let Some(fnum) = self.fnum {
            config.fnum = fnum;
        }
        if let Some(threads) = self.threads {
            config.thread_num = threads;
        }
        if let Some(source) = self.source {
            config.source = source;
        }
        if self.undirected {
            config.directed = false;
        }
        if let Some(damping) = self.damping {
            config.damping = damping;
        }
        if let Some(max_round) = self.max_round {
            config.max_round = max_round;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.no_verify {
            config.verify_frames = false;
        }
    }
}
