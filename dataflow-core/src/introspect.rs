//! Introspection
//!
//! Read-only views of an engine's graph for diagnostics and tests.
//!
//! # Example
//!
//! ```
//! use dataflow_core::{introspect, Engine};
//!
//! let engine = Engine::new();
//! let x = engine.var(1);
//! let y = engine.lift("inc", &x, |x| x + 1).unwrap();
//! let _observed = y.observe().unwrap();
//!
//! assert!(introspect::graph_invariant_holds(&engine));
//! let snapshot = introspect::snapshot(&engine);
//! assert_eq!(snapshot.order.len(), engine.num_active_nodes());
//! println!("{}", snapshot.to_json().unwrap());
//! ```

use serde::Serialize;

use crate::graph::{EdgeKind, VertexFlags, VertexId};
use crate::reactive::{Engine, PumpStats};

/// The state of every vertex of an engine at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub stats: PumpStats,

    /// Active vertices in topological order, the root sentinel first.
    /// Constants share the root's entry and are not listed.
    pub order: Vec<VertexId>,

    pub vertices: Vec<VertexSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VertexSnapshot {
    pub id: VertexId,
    pub label: String,
    pub ref_count: usize,
    pub active: bool,
    pub initialized: bool,
    pub flags: VertexFlags,
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub target: VertexId,
    pub kind: EdgeKind,
    pub enabled: bool,
}

impl GraphSnapshot {
    /// Render the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&VertexSnapshot> {
        self.vertices.iter().find(|vertex| vertex.id == id)
    }
}

/// Capture the current graph of `engine`.
///
/// A node that is being updated while the snapshot is taken is labelled
/// `<updating>`.
pub fn snapshot(engine: &Engine) -> GraphSnapshot {
    let network = engine.shared().network.borrow();

    let order = network.order.iter().map(|(_, v)| v).collect();
    let vertices = network
        .graph
        .ids()
        .map(|id| {
            let vertex = &network.graph[id];
            let label = match vertex.payload().try_borrow() {
                Ok(node) => node.label(),
                Err(_) => "<updating>".to_string(),
            };

            VertexSnapshot {
                id,
                label,
                ref_count: vertex.ref_count(),
                active: vertex.position().is_some(),
                initialized: vertex.is_initialized(),
                flags: vertex.flags(),
                edges: vertex
                    .out_edges()
                    .iter()
                    .map(|edge| EdgeSnapshot {
                        target: edge.target(),
                        kind: edge.kind(),
                        enabled: edge.is_enabled(),
                    })
                    .collect(),
            }
        })
        .collect();

    GraphSnapshot {
        stats: network.stats,
        order,
        vertices,
    }
}

/// Describe the first broken structural invariant of `engine`'s graph.
pub fn invariant_violation(engine: &Engine) -> Option<String> {
    engine.shared().network.borrow().invariant_violation()
}

/// Check the structural invariants of `engine`'s graph: enabled edges run
/// from later to earlier positions, consumer lists match the enabled edges,
/// every active vertex is anchored by a trailing logical edge, conditionals
/// read a single branch and inactive vertices keep no enabled edges.
pub fn graph_invariant_holds(engine: &Engine) -> bool {
    invariant_violation(engine).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lists_the_order_and_every_vertex() {
        let engine = Engine::new();
        let c = engine.constant(2);
        let x = engine.var(3);
        let y = engine.lift2("mul", &c, &x, |c, x| c * x).unwrap();
        let z = y.observe().unwrap();

        let snapshot = snapshot(&engine);
        assert_eq!(snapshot.vertices.len(), engine.num_vertices());
        assert_eq!(snapshot.order.len(), 4);
        assert_eq!(&snapshot.order[1..], &[x.id(), y.id(), z.id()]);

        let mul = snapshot.vertex(y.id()).unwrap();
        assert_eq!(mul.label, "mul");
        assert!(mul.active && mul.initialized);
        assert_eq!(mul.edges.len(), 3);
        assert_eq!(mul.edges[2].kind, EdgeKind::Logical);
        assert!(mul.edges.iter().all(|edge| edge.enabled || edge.kind == EdgeKind::Logical));

        let constant = snapshot.vertex(c.id()).unwrap();
        assert!(constant.flags.constant);
        assert!(!snapshot.order.contains(&c.id()));
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let engine = Engine::new();
        let x = engine.var(1);
        let _a = x.observe().unwrap();

        let json = snapshot(&engine).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stats"]["pumps"], 1);
        assert_eq!(value["vertices"].as_array().unwrap().len(), 3);
        assert!(json.contains("\"logical\""));
        assert!(json.contains("\"eager\""));
    }

    #[test]
    fn a_fresh_engine_is_consistent() {
        let engine = Engine::new();
        assert!(graph_invariant_holds(&engine));
        assert_eq!(invariant_violation(&engine), None);
    }
}
