//! Graph Vertices
//!
//! This module defines the per-vertex and per-edge records that live in the
//! dependency graph.

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

use super::order::Position;

/// Generation-checked identifier of a vertex in the dependency graph.
///
/// The index addresses a slot in the vertex arena; the generation is bumped
/// every time the slot is reused, so a stale identifier never aliases a newer
/// vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VertexId {
    index: u32,
    generation: u32,
}

impl VertexId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the arena slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the slot generation this identifier was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// The role an edge plays for its source vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// A declared dependency whose value may be fed into the source's update.
    Data,

    /// The ordering anchor of an active vertex, pointing at its activator.
    /// An active non-constant vertex has exactly one, always stored last.
    Logical,
}

/// A directed edge from a consumer to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    target: VertexId,
    kind: EdgeKind,
    enabled: bool,
}

impl Edge {
    pub(crate) fn new(target: VertexId, kind: EdgeKind) -> Self {
        Self {
            target,
            kind,
            enabled: false,
        }
    }

    /// The dependency this edge points at.
    pub fn target(&self) -> VertexId {
        self.target
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Whether this edge currently carries data. Only enabled data edges
    /// register the source in the target's consumers.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_data(&self) -> bool {
        self.kind == EdgeKind::Data
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Static role flags of a vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VertexFlags {
    /// Active from creation; an observation root.
    pub eager: bool,

    /// Only one of its branch edges is enabled at a time.
    pub conditional: bool,

    /// Permanently active at the head of the order, never updated.
    pub constant: bool,

    /// The root sentinel owned by the engine itself.
    pub hidden: bool,
}

/// A vertex in the dependency graph.
#[derive(Debug)]
pub struct Vertex<N> {
    payload: N,
    pub(crate) ref_count: usize,
    pub(crate) position: Option<Position>,
    pub(crate) initialized: bool,
    pub(crate) flags: VertexFlags,
    pub(crate) edges: SmallVec<[Edge; 4]>,

    /// Consumers reading this vertex through enabled edges, with the number
    /// of such edges per consumer (a consumer may depend on us twice).
    pub(crate) consumers: IndexMap<VertexId, usize>,
}

impl<N> Vertex<N> {
    pub(crate) fn new(payload: N) -> Self {
        Self {
            payload,
            ref_count: 0,
            position: None,
            initialized: false,
            flags: VertexFlags::default(),
            edges: SmallVec::new(),
            consumers: IndexMap::new(),
        }
    }

    pub fn payload(&self) -> &N {
        &self.payload
    }

    pub(crate) fn into_payload(self) -> N {
        self.payload
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// Current slot in the topological order, if the vertex is active.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn flags(&self) -> VertexFlags {
        self.flags
    }

    pub fn out_edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn consumers(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.consumers.keys().copied()
    }

    pub fn has_consumers(&self) -> bool {
        !self.consumers.is_empty()
    }

    /// Index of the logical edge, which is always the last out-edge.
    pub(crate) fn logical_edge(&self) -> Option<usize> {
        match self.edges.last() {
            Some(edge) if edge.kind == EdgeKind::Logical => Some(self.edges.len() - 1),
            _ => None,
        }
    }

    /// Indices of the data edges, in declaration order.
    pub(crate) fn data_edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.is_data())
            .map(|(index, _)| index)
    }
}
