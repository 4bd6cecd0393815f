//! Edge-list input
//!
//! One edge per line: `src dst [weight]`, separated by whitespace or commas.
//! A line with a single id declares an isolated vertex. Lines starting with
//! `#` or `%` are comments. Missing weights default to 1.0.

use grape_core::{EdgeCutFragment, FragmentBuilder, Oid};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Edge-list parse errors
#[derive(Error, Debug)]
pub enum LoadError {
    /// I/O failure reading the file
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed line
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },
}

/// Vertices and weighted edges of a single-label graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList {
    /// Every vertex id, sorted
    pub vertices: BTreeSet<Oid>,
    /// `(src, dst, weight)` in file order
    pub edges: Vec<(Oid, Oid, f64)>,
}

impl EdgeList {
    /// Parse edge-list text
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let mut list = EdgeList::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
                continue;
            }
            let fields: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|f| !f.is_empty())
                .collect();
            let parse_error = |message: String| LoadError::Parse {
                line: index + 1,
                message,
            };
            let parse_id = |field: &str| {
                field
                    .parse::<Oid>()
                    .map_err(|e| parse_error(format!("invalid vertex id '{}': {}", field, e)))
            };

            match fields.as_slice() {
                [id] => {
                    list.vertices.insert(parse_id(*id)?);
                }
                [src, dst] | [src, dst, _] => {
                    let weight = match fields.get(2) {
                        Some(w) => w
                            .parse::<f64>()
                            .map_err(|e| parse_error(format!("invalid weight '{}': {}", w, e)))?,
                        None => 1.0,
                    };
                    let (src, dst) = (parse_id(*src)?, parse_id(*dst)?);
                    list.vertices.insert(src);
                    list.vertices.insert(dst);
                    list.edges.push((src, dst, weight));
                }
                _ => {
                    return Err(parse_error(format!(
                        "expected 1 to 3 fields, found {}",
                        fields.len()
                    )));
                }
            }
        }
        Ok(list)
    }

    /// Read and parse an edge-list file
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let list = Self::parse(&text)?;
        tracing::debug!(
            path = %path.display(),
            vertices = list.vertices.len(),
            edges = list.edges.len(),
            "Loaded edge list"
        );
        Ok(list)
    }

    /// Partition into `fnum` fragments
    pub fn build_fragments(
        &self,
        fnum: u32,
        directed: bool,
    ) -> grape_core::Result<Vec<Arc<EdgeCutFragment>>> {
        let mut builder = FragmentBuilder::new(fnum).with_directed(directed);
        for &oid in &self.vertices {
            builder.add_vertex(oid);
        }
        for &(src, dst, weight) in &self.edges {
            builder.add_edge(src, dst, weight);
        }
        Ok(builder.build()?.into_iter().map(Arc::new).collect())
    }
}
