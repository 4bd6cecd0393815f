//! Run configuration loaded from TOML and overridden from the command line

use anyhow::{Context, Result};
use clap::ValueEnum;
use grape_core::apps::{PageRankArgs, SsspArgs};
use grape_core::{Oid, WorkerConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Bundled app to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum AppKind {
    /// Single-source shortest paths
    Sssp,
    /// Weakly connected components
    Wcc,
    /// In-degree of every vertex
    InDegree,
    /// Fixed-iteration PageRank
    PageRank,
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sssp => "sssp",
            Self::Wcc => "wcc",
            Self::InDegree => "in_degree",
            Self::PageRank => "page_rank",
        };
        f.write_str(name)
    }
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Boxed table
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// Comma-separated values with a header
    Csv,
}

/// Everything needed to run one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// App to run
    pub app: AppKind,
    /// Edge-list file
    pub input: Option<PathBuf>,
    /// Number of fragments (worker threads)
    pub fnum: u32,
    /// Threads per worker
    pub thread_num: usize,
    /// Treat edges as directed
    pub directed: bool,
    /// Source vertex for sssp
    pub source: Oid,
    /// Damping factor for page_rank
    pub damping: f64,
    /// Rank updates for page_rank
    pub max_round: u32,
    /// Verify frame checksums
    pub verify_frames: bool,
    /// Output format
    pub format: OutputFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        let page_rank = PageRankArgs::default();
        Self {
            app: AppKind::Wcc,
            input: None,
            fnum: 2,
            thread_num: 1,
            directed: true,
            source: 0,
            damping: page_rank.damping,
            max_round: page_rank.max_round,
            verify_frames: true,
            format: OutputFormat::Table,
        }
    }
}

impl RunConfig {
    /// Load from a TOML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: RunConfig = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Write as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.fnum == 0 {
            return Err("fnum must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(format!("damping {} must be within [0, 1]", self.damping));
        }
        self.worker_config().validate()
    }

    /// Per-worker settings
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::new(self.thread_num).with_verify_frames(self.verify_frames)
    }

    /// Arguments for sssp
    pub fn sssp_args(&self) -> SsspArgs {
        SsspArgs::new(self.source)
    }

    /// Arguments for page_rank
    pub fn page_rank_args(&self) -> PageRankArgs {
        PageRankArgs::default()
            .with_damping(self.damping)
            .with_max_round(self.max_round)
    }
}
