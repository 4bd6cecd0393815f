//! Graph fragments
//!
//! A graph is split into `fnum` fragments, one per worker. Each fragment
//! owns its *inner* vertices and keeps read-only *outer* (mirror) copies of
//! the vertices at the other end of its cut edges.
//!
//! Local vertex ids are dense per label: inner vertices occupy
//! `[0, ivnum)` and outer vertices `[ivnum, ivnum + ovnum)`, so a per-vertex
//! array over [`Fragment::vertices`] covers both.
//!
//! ```text
//!        fragment 0                       fragment 1
//!  ┌───────────────────────┐       ┌───────────────────────┐
//!  │ inner: a b c          │       │ inner: d e            │
//!  │ outer: d  (mirror) ───┼──────►│ d is owned here       │
//!  └───────────────────────┘       └───────────────────────┘
//! ```

pub mod edge_cut;
pub mod id_parser;

pub use edge_cut::{EdgeCutFragment, FragmentBuilder, HashPartitioner};
pub use id_parser::IdParser;

/// Fragment (partition) identifier
pub type FragId = u32;

/// Vertex label identifier
pub type LabelId = u32;

/// Original (user-facing) vertex id
pub type Oid = i64;

/// Global vertex id, resolvable by every fragment
pub type Gid = u64;

/// A vertex local to one fragment, scoped to its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vertex {
    label: LabelId,
    offset: usize,
}

impl Vertex {
    /// Create a vertex handle
    pub fn new(label: LabelId, offset: usize) -> Self {
        Self { label, offset }
    }

    /// Vertex label
    pub fn label(&self) -> LabelId {
        self.label
    }

    /// Local id within the label's range (inner first, then outer)
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Half-open range of local vertices of one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexRange {
    label: LabelId,
    begin: usize,
    end: usize,
}

impl VertexRange {
    /// Create a range `[begin, end)` of vertices with the given label
    pub fn new(label: LabelId, begin: usize, end: usize) -> Self {
        Self {
            label,
            begin,
            end: end.max(begin),
        }
    }

    /// Label of every vertex in the range
    pub fn label(&self) -> LabelId {
        self.label
    }

    /// First offset in the range
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// One past the last offset in the range
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of vertices in the range
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    /// Whether the range is empty
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Whether `v` lies within this range
    pub fn contains(&self, v: Vertex) -> bool {
        v.label == self.label && v.offset >= self.begin && v.offset < self.end
    }

    /// Iterate over the vertices of the range
    pub fn iter(&self) -> VertexIter {
        VertexIter {
            label: self.label,
            next: self.begin,
            end: self.end,
        }
    }
}

impl IntoIterator for VertexRange {
    type Item = Vertex;
    type IntoIter = VertexIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`VertexRange`]
#[derive(Debug, Clone)]
pub struct VertexIter {
    label: LabelId,
    next: usize,
    end: usize,
}

impl Iterator for VertexIter {
    type Item = Vertex;

    fn next(&mut self) -> Option<Vertex> {
        if self.next >= self.end {
            return None;
        }
        let v = Vertex::new(self.label, self.next);
        self.next += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for VertexIter {}

/// Adjacent vertex and the weight of the connecting edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nbr {
    /// Vertex at the other end of the edge (inner or outer)
    pub neighbor: Vertex,
    /// Edge weight
    pub weight: f64,
}

/// Read-only view of one partition of the graph.
///
/// This is the only graph surface the message managers and the worker
/// depend on.
pub trait Fragment: Send + Sync {
    /// Id of this fragment
    fn fid(&self) -> FragId;

    /// Total number of fragments
    fn fnum(&self) -> FragId;

    /// Number of vertex labels
    fn vertex_label_num(&self) -> LabelId;

    /// Vertices of `label` owned by this fragment
    fn inner_vertices(&self, label: LabelId) -> VertexRange;

    /// Mirrors of `label` owned by other fragments
    fn outer_vertices(&self, label: LabelId) -> VertexRange;

    /// Inner followed by outer vertices of `label`
    fn vertices(&self, label: LabelId) -> VertexRange {
        let inner = self.inner_vertices(label);
        let outer = self.outer_vertices(label);
        VertexRange::new(label, inner.begin(), outer.end().max(inner.end()))
    }

    /// Whether `v` is owned by this fragment
    fn is_inner_vertex(&self, v: Vertex) -> bool {
        self.inner_vertices(v.label()).contains(v)
    }

    /// Whether `v` is a mirror of a vertex owned elsewhere
    fn is_outer_vertex(&self, v: Vertex) -> bool {
        self.outer_vertices(v.label()).contains(v)
    }

    /// Fragment owning `v`
    fn get_frag_id(&self, v: Vertex) -> FragId;

    /// Global id of a local vertex
    fn vertex_to_gid(&self, v: Vertex) -> Gid;

    /// Local vertex for a global id, if present on this fragment
    fn gid_to_vertex(&self, gid: Gid) -> Option<Vertex>;

    /// Original id of a local vertex
    fn get_id(&self, v: Vertex) -> Oid;

    /// Inner vertex with the given original id, if owned by this fragment
    fn get_inner_vertex(&self, label: LabelId, oid: Oid) -> Option<Vertex>;

    /// Outgoing edges of an inner vertex
    fn outgoing_edges(&self, v: Vertex) -> &[Nbr];

    /// Incoming edges of an inner vertex
    fn incoming_edges(&self, v: Vertex) -> &[Nbr];
}
