//! In-memory edge-cut fragments
//!
//! Vertices are assigned to fragments by a [`HashPartitioner`]. An edge
//! `(u, v)` is stored as an outgoing edge of `u` on `u`'s fragment and as an
//! incoming edge of `v` on `v`'s fragment; whichever endpoint is not owned
//! there becomes an outer vertex of that fragment.

use super::{FragId, Fragment, Gid, IdParser, LabelId, Nbr, Oid, Vertex, VertexRange};
use crate::{Error, Result};
use std::collections::HashMap;

/// Assigns original ids to fragments by `oid mod fnum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPartitioner {
    fnum: FragId,
}

impl HashPartitioner {
    /// Create a partitioner over `fnum` fragments
    pub fn new(fnum: FragId) -> Self {
        Self { fnum: fnum.max(1) }
    }

    /// Fragment owning `oid`
    pub fn get_partition(&self, oid: Oid) -> FragId {
        oid.rem_euclid(self.fnum as i64) as FragId
    }
}

#[derive(Debug, Default)]
struct LabelData {
    inner_oids: Vec<Oid>,
    inner_index: HashMap<Oid, usize>,
    outer_oids: Vec<Oid>,
    outer_gids: Vec<Gid>,
    outer_index: HashMap<Gid, usize>,
    outgoing: Vec<Vec<Nbr>>,
    incoming: Vec<Vec<Nbr>>,
}

impl LabelData {
    fn ivnum(&self) -> usize {
        self.inner_oids.len()
    }

    /// Local vertex for an outer gid, creating the mirror on first use
    fn outer_vertex(&mut self, label: LabelId, gid: Gid, oid: Oid) -> Vertex {
        let ivnum = self.ivnum();
        let index = match self.outer_index.get(&gid) {
            Some(&index) => index,
            None => {
                let index = self.outer_gids.len();
                self.outer_gids.push(gid);
                self.outer_oids.push(oid);
                self.outer_index.insert(gid, index);
                index
            }
        };
        Vertex::new(label, ivnum + index)
    }
}

/// One partition of an edge-cut graph, held in memory.
#[derive(Debug)]
pub struct EdgeCutFragment {
    fid: FragId,
    fnum: FragId,
    id_parser: IdParser,
    labels: Vec<LabelData>,
}

impl EdgeCutFragment {
    fn label_data(&self, label: LabelId) -> Option<&LabelData> {
        self.labels.get(label as usize)
    }

    /// Number of mirrors held by this fragment across all labels
    pub fn outer_vertex_num(&self) -> usize {
        self.labels.iter().map(|l| l.outer_gids.len()).sum()
    }

    /// Number of vertices owned by this fragment across all labels
    pub fn inner_vertex_num(&self) -> usize {
        self.labels.iter().map(|l| l.ivnum()).sum()
    }

    /// Local vertex for an original id, if owned by or mirrored on this fragment
    pub fn oid_to_vertex(&self, label: LabelId, oid: Oid) -> Option<Vertex> {
        if let Some(v) = self.get_inner_vertex(label, oid) {
            return Some(v);
        }
        let data = self.label_data(label)?;
        data.outer_oids
            .iter()
            .position(|&o| o == oid)
            .map(|index| Vertex::new(label, data.ivnum() + index))
    }
}

impl Fragment for EdgeCutFragment {
    fn fid(&self) -> FragId {
        self.fid
    }

    fn fnum(&self) -> FragId {
        self.fnum
    }

    fn vertex_label_num(&self) -> LabelId {
        self.labels.len() as LabelId
    }

    fn inner_vertices(&self, label: LabelId) -> VertexRange {
        let ivnum = self.label_data(label).map_or(0, |d| d.ivnum());
        VertexRange::new(label, 0, ivnum)
    }

    fn outer_vertices(&self, label: LabelId) -> VertexRange {
        match self.label_data(label) {
            Some(d) => VertexRange::new(label, d.ivnum(), d.ivnum() + d.outer_gids.len()),
            None => VertexRange::new(label, 0, 0),
        }
    }

    fn get_frag_id(&self, v: Vertex) -> FragId {
        match self.label_data(v.label()) {
            Some(d) if v.offset() >= d.ivnum() => d
                .outer_gids
                .get(v.offset() - d.ivnum())
                .map_or(self.fid, |&gid| self.id_parser.fid(gid)),
            _ => self.fid,
        }
    }

    fn vertex_to_gid(&self, v: Vertex) -> Gid {
        match self.label_data(v.label()) {
            Some(d) if v.offset() >= d.ivnum() => d
                .outer_gids
                .get(v.offset() - d.ivnum())
                .copied()
                .unwrap_or(Gid::MAX),
            _ => self.id_parser.generate(self.fid, v.label(), v.offset()),
        }
    }

    fn gid_to_vertex(&self, gid: Gid) -> Option<Vertex> {
        let label = self.id_parser.label(gid);
        let data = self.label_data(label)?;
        if self.id_parser.fid(gid) == self.fid {
            let offset = self.id_parser.offset(gid);
            return (offset < data.ivnum()).then(|| Vertex::new(label, offset));
        }
        data.outer_index
            .get(&gid)
            .map(|&index| Vertex::new(label, data.ivnum() + index))
    }

    fn get_id(&self, v: Vertex) -> Oid {
        let Some(data) = self.label_data(v.label()) else {
            return Oid::MIN;
        };
        if v.offset() < data.ivnum() {
            data.inner_oids[v.offset()]
        } else {
            data.outer_oids
                .get(v.offset() - data.ivnum())
                .copied()
                .unwrap_or(Oid::MIN)
        }
    }

    fn get_inner_vertex(&self, label: LabelId, oid: Oid) -> Option<Vertex> {
        self.label_data(label)?
            .inner_index
            .get(&oid)
            .map(|&offset| Vertex::new(label, offset))
    }

    fn outgoing_edges(&self, v: Vertex) -> &[Nbr] {
        self.label_data(v.label())
            .and_then(|d| d.outgoing.get(v.offset()))
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    fn incoming_edges(&self, v: Vertex) -> &[Nbr] {
        self.label_data(v.label())
            .and_then(|d| d.incoming.get(v.offset()))
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy)]
struct EdgeRecord {
    src_label: LabelId,
    src: Oid,
    dst_label: LabelId,
    dst: Oid,
    weight: f64,
}

/// Builds every fragment of a graph from labeled vertex and edge lists.
#[derive(Debug, Clone)]
pub struct FragmentBuilder {
    fnum: FragId,
    label_num: LabelId,
    directed: bool,
    vertices: Vec<(LabelId, Oid)>,
    edges: Vec<EdgeRecord>,
}

impl FragmentBuilder {
    /// Create a builder for `fnum` fragments with a single vertex label
    pub fn new(fnum: FragId) -> Self {
        Self {
            fnum,
            label_num: 1,
            directed: true,
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Set the number of vertex labels
    pub fn with_label_num(mut self, label_num: LabelId) -> Self {
        self.label_num = label_num;
        self
    }

    /// Store every edge in both directions when `directed` is false
    pub fn with_directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    /// Add a vertex of label 0
    pub fn add_vertex(&mut self, oid: Oid) -> &mut Self {
        self.add_labeled_vertex(0, oid)
    }

    /// Add a vertex of the given label
    pub fn add_labeled_vertex(&mut self, label: LabelId, oid: Oid) -> &mut Self {
        self.vertices.push((label, oid));
        self
    }

    /// Add an edge between two vertices of label 0
    pub fn add_edge(&mut self, src: Oid, dst: Oid, weight: f64) -> &mut Self {
        self.add_labeled_edge(0, src, 0, dst, weight)
    }

    /// Add an edge between two labeled vertices
    pub fn add_labeled_edge(
        &mut self,
        src_label: LabelId,
        src: Oid,
        dst_label: LabelId,
        dst: Oid,
        weight: f64,
    ) -> &mut Self {
        self.edges.push(EdgeRecord {
            src_label,
            src,
            dst_label,
            dst,
            weight,
        });
        self
    }

    /// Partition the graph and build one fragment per partition
    pub fn build(&self) -> Result<Vec<EdgeCutFragment>> {
        if self.fnum == 0 {
            return Err(Error::fragment("fnum must be at least 1"));
        }
        if self.label_num == 0 {
            return Err(Error::fragment("label_num must be at least 1"));
        }

        let partitioner = HashPartitioner::new(self.fnum);
        let id_parser = IdParser::new(self.fnum, self.label_num);
        let mut fragments: Vec<EdgeCutFragment> = (0..self.fnum)
            .map(|fid| EdgeCutFragment {
                fid,
                fnum: self.fnum,
                id_parser,
                labels: (0..self.label_num).map(|_| LabelData::default()).collect(),
            })
            .collect();

        // (label, oid) -> (owner fid, inner offset)
        let mut placement: HashMap<(LabelId, Oid), (FragId, usize)> = HashMap::new();
        for &(label, oid) in &self.vertices {
            if label >= self.label_num {
                return Err(Error::fragment(format!(
                    "vertex {} has label {} but only {} labels are declared",
                    oid, label, self.label_num
                )));
            }
            let fid = partitioner.get_partition(oid);
            let data = &mut fragments[fid as usize].labels[label as usize];
            let offset = data.inner_oids.len();
            if offset > id_parser.max_offset() {
                return Err(Error::fragment("too many vertices for the gid layout"));
            }
            if placement.insert((label, oid), (fid, offset)).is_some() {
                return Err(Error::fragment(format!(
                    "duplicate vertex {} with label {}",
                    oid, label
                )));
            }
            data.inner_oids.push(oid);
            data.inner_index.insert(oid, offset);
        }

        for fragment in &mut fragments {
            for data in &mut fragment.labels {
                data.outgoing = vec![Vec::new(); data.ivnum()];
                data.incoming = vec![Vec::new(); data.ivnum()];
            }
        }

        let resolve = |label: LabelId, oid: Oid| -> Result<(FragId, usize)> {
            placement.get(&(label, oid)).copied().ok_or_else(|| {
                Error::fragment(format!(
                    "edge references unknown vertex {} with label {}",
                    oid, label
                ))
            })
        };

        let mut edges = self.edges.clone();
        if !self.directed {
            edges.extend(self.edges.iter().map(|e| EdgeRecord {
                src_label: e.dst_label,
                src: e.dst,
                dst_label: e.src_label,
                dst: e.src,
                weight: e.weight,
            }));
        }

        for edge in &edges {
            let (src_fid, src_offset) = resolve(edge.src_label, edge.src)?;
            let (dst_fid, dst_offset) = resolve(edge.dst_label, edge.dst)?;
            let src_gid = id_parser.generate(src_fid, edge.src_label, src_offset);
            let dst_gid = id_parser.generate(dst_fid, edge.dst_label, dst_offset);

            // Outgoing copy on the source's fragment
            let dst_vertex = if dst_fid == src_fid {
                Vertex::new(edge.dst_label, dst_offset)
            } else {
                fragments[src_fid as usize].labels[edge.dst_label as usize].outer_vertex(
                    edge.dst_label,
                    dst_gid,
                    edge.dst,
                )
            };
            fragments[src_fid as usize].labels[edge.src_label as usize].outgoing[src_offset].push(
                Nbr {
                    neighbor: dst_vertex,
                    weight: edge.weight,
                },
            );

            // Incoming copy on the destination's fragment
            let src_vertex = if src_fid == dst_fid {
                Vertex::new(edge.src_label, src_offset)
            } else {
                fragments[dst_fid as usize].labels[edge.src_label as usize].outer_vertex(
                    edge.src_label,
                    src_gid,
                    edge.src,
                )
            };
            fragments[dst_fid as usize].labels[edge.dst_label as usize].incoming[dst_offset].push(
                Nbr {
                    neighbor: src_vertex,
                    weight: edge.weight,
                },
            );
        }

        tracing::debug!(
            fnum = self.fnum,
            vertices = self.vertices.len(),
            edges = edges.len(),
            "Built edge-cut fragments"
        );

        Ok(fragments)
    }
}
