//! Dependency Graph
//!
//! Structural storage for vertices and their dependency edges. Vertices live
//! in an arena addressed by generation-checked [`VertexId`]s; edges are
//! stored in per-vertex adjacency lists and addressed by `(source, index)`.
//!
//! No policy lives here: activation, ordering and teardown decisions are made
//! by the engine. The only bookkeeping the graph does on its own is keeping
//! each vertex's consumer set in sync with the enabled edges pointing at it.

use std::ops::{Index, IndexMut};

use super::vertex::{Edge, EdgeKind, Vertex, VertexId};

#[derive(Debug)]
struct Slot<N> {
    generation: u32,
    vertex: Option<Vertex<N>>,
}

/// Arena of vertices with their out-edges.
#[derive(Debug)]
pub struct DependencyGraph<N> {
    slots: Vec<Slot<N>>,
    free: Vec<u32>,
    len: usize,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<N> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Number of live vertices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn add_vertex(&mut self, payload: N) -> VertexId {
        self.len += 1;

        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.vertex = Some(Vertex::new(payload));
                VertexId::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    vertex: Some(Vertex::new(payload)),
                });
                VertexId::new((self.slots.len() - 1) as u32, 0)
            }
        }
    }

    /// Remove a vertex and hand back its record. Edges pointing at it from
    /// other vertices are not touched; the caller guarantees there are none.
    pub fn remove_vertex(&mut self, id: VertexId) -> Vertex<N> {
        let slot = &mut self.slots[id.index() as usize];
        assert_eq!(slot.generation, id.generation(), "stale vertex id {:?}", id);

        let vertex = slot.vertex.take().expect("vertex already removed");
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        vertex
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: VertexId) -> Option<&Vertex<N>> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.vertex.as_ref())
    }

    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut Vertex<N>> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.vertex.as_mut())
    }

    /// Add a disabled edge from `source` to `target` and return its index in
    /// the source's adjacency list.
    pub fn add_edge(&mut self, source: VertexId, target: VertexId, kind: EdgeKind) -> usize {
        debug_assert!(self.contains(target), "edge to missing vertex {:?}", target);

        let edges = &mut self[source].edges;
        edges.push(Edge::new(target, kind));
        edges.len() - 1
    }

    /// Remove the edge at `index`. Enabled edges must be disabled first.
    pub fn remove_edge(&mut self, source: VertexId, index: usize) -> Edge {
        let edge = self[source].edges.remove(index);
        assert!(!edge.is_enabled(), "removing an enabled edge");
        edge
    }

    pub fn out_edges(&self, id: VertexId) -> &[Edge] {
        self[id].out_edges()
    }

    pub fn edge(&self, source: VertexId, index: usize) -> Edge {
        self[source].edges[index]
    }

    /// The vertex an edge points at.
    pub fn target(&self, source: VertexId, index: usize) -> VertexId {
        self[source].edges[index].target()
    }

    /// Mark an edge enabled and register its source as a consumer of the
    /// target.
    pub fn enable(&mut self, source: VertexId, index: usize) -> VertexId {
        let edge = &mut self[source].edges[index];
        assert!(edge.is_data(), "only data edges can be enabled");
        assert!(!edge.is_enabled(), "edge already enabled");
        edge.set_enabled(true);

        let target = edge.target();
        *self[target].consumers.entry(source).or_insert(0) += 1;
        target
    }

    /// Mark an edge disabled and unregister its source from the target's
    /// consumers.
    pub fn disable(&mut self, source: VertexId, index: usize) -> VertexId {
        let edge = &mut self[source].edges[index];
        assert!(edge.is_enabled(), "edge already disabled");
        edge.set_enabled(false);

        let target = edge.target();
        let consumers = &mut self[target].consumers;
        let count = consumers
            .get_mut(&source)
            .expect("enabled edge without consumer entry");
        *count -= 1;
        if *count == 0 {
            consumers.swap_remove(&source);
        }
        target
    }

    /// Identifiers of all live vertices, in arena order.
    pub fn ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.vertex
                .as_ref()
                .map(|_| VertexId::new(index as u32, slot.generation))
        })
    }
}

impl<N> Index<VertexId> for DependencyGraph<N> {
    type Output = Vertex<N>;

    fn index(&self, id: VertexId) -> &Self::Output {
        self.get(id)
            .unwrap_or_else(|| panic!("access to missing vertex {:?}", id))
    }
}

impl<N> IndexMut<VertexId> for DependencyGraph<N> {
    fn index_mut(&mut self, id: VertexId) -> &mut Self::Output {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("access to missing vertex {:?}", id))
    }
}
