//! Reference counting and teardown.
//!
//! Every handle and every consumer edge holds one reference on its vertex.
//! Releasing the last one removes the vertex at once, and with it every
//! dependency that only it kept alive.

use smallvec::SmallVec;
use tracing::debug;

use crate::graph::VertexId;

use super::network::Network;
use super::node::NodeCell;

impl Network {
    pub(crate) fn add_ref(&mut self, v: VertexId) {
        self.graph[v].ref_count += 1;
    }

    /// Drop one reference on `v`. Returns whether it was the last one; the
    /// nodes of removed vertices are moved to `garbage` so the caller can
    /// drop them once the network is no longer borrowed.
    pub(crate) fn release(&mut self, v: VertexId, garbage: &mut Vec<NodeCell>) -> bool {
        let vertex = &mut self.graph[v];
        assert!(vertex.ref_count > 0, "releasing unreferenced {:?}", v);
        assert!(!vertex.flags.hidden, "releasing the root sentinel");

        vertex.ref_count -= 1;
        if vertex.ref_count > 0 {
            return false;
        }

        self.remove_subgraph(v, garbage);
        true
    }

    /// Remove the unreferenced vertex `v` and every dependency whose count
    /// drops to zero with it. Dependents are deleted before their
    /// dependencies.
    fn remove_subgraph(&mut self, v: VertexId, garbage: &mut Vec<NodeCell>) {
        let mut stack = vec![v];
        let mut doomed = Vec::new();

        while let Some(w) = stack.pop() {
            debug_assert_eq!(self.graph[w].ref_count(), 0);

            if self.graph[w].flags().eager && self.is_active(w) {
                self.retire_observer(w);
            }
            debug_assert!(self.enabled_edges(w).is_empty());

            let targets: SmallVec<[VertexId; 4]> = self.graph[w]
                .out_edges()
                .iter()
                .filter(|edge| edge.is_data())
                .map(|edge| edge.target())
                .collect();

            for target in targets {
                let vertex = &mut self.graph[target];
                vertex.ref_count -= 1;
                if vertex.ref_count == 0 {
                    stack.push(target);
                }
            }

            doomed.push(w);
        }

        debug!(removed = doomed.len(), "subgraph removed");

        for w in doomed {
            self.forget(w);
            garbage.push(self.graph.remove_vertex(w).into_payload());
        }
    }

    /// Tear down an observation root: drop its anchor, stop reading its
    /// target, and leave the order.
    fn retire_observer(&mut self, v: VertexId) {
        let logical = self.graph[v]
            .logical_edge()
            .unwrap_or_else(|| panic!("observer {:?} has no logical edge", v));
        self.graph.remove_edge(v, logical);

        for index in self.enabled_edges(v) {
            self.disable_edge(v, index);
        }

        let position = self.position(v);
        self.order.erase(position);
        self.graph[v].position = None;
    }
}
