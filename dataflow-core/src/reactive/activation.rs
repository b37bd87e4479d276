//! Activation
//!
//! Enabling and disabling dependency edges, and with them moving vertices in
//! and out of the topological order.
//!
//! # Algorithm
//!
//! Enabling an edge `u -> v` from an active consumer `u`:
//!
//! 1. Register `u` as a consumer of `v`.
//! 2. If `v` is inert, insert it just before `u`, anchor it to the implied
//!    activator and mark it. Then enable its own edges: only the selector of
//!    a conditional, every data edge otherwise.
//! 3. If `v` is already active, rebase it when the implied activator comes
//!    earlier than its current one, and move it before `u` when it is not
//!    already there. Either change is pushed down to `v`'s enabled edges.
//!
//! Disabling is the inverse: a vertex left without consumers is deactivated
//! and its own edges disabled, and a vertex whose remaining consumers do not
//! share its activator is moved to just before the earliest of them.
//!
//! Both walks use an explicit stack, so deep chains cannot overflow.

use smallvec::SmallVec;
use tracing::trace;

use crate::graph::{EdgeKind, Position, VertexId};

use super::network::Network;

/// An edge waiting to be processed by [`Network::enable_edge`].
#[derive(Debug, Clone, Copy)]
struct Pending {
    source: VertexId,
    index: usize,

    /// The edge was just enabled, as opposed to revisited after its source
    /// moved.
    enabled: bool,
    rebased: bool,
    repositioned: bool,
}

impl Pending {
    fn enabled(source: VertexId, index: usize) -> Self {
        Self {
            source,
            index,
            enabled: true,
            rebased: false,
            repositioned: false,
        }
    }
}

impl Network {
    /// Enable the data edge `index` of the active vertex `u`, activating and
    /// repositioning whatever it reaches.
    pub(crate) fn enable_edge(&mut self, u: VertexId, index: usize) {
        assert!(self.is_active(u), "enabling an edge of inactive {:?}", u);

        self.graph.enable(u, index);
        let mut stack = vec![Pending::enabled(u, index)];

        while let Some(pending) = stack.pop() {
            let u = pending.source;
            let v = self.graph.target(u, pending.index);

            if pending.enabled && self.requires_activation(v) {
                let activator = self.implied_activator(u, pending.index);
                self.activate_vertex(v, self.position(u), activator);
                self.order.mark(self.position(v));

                let edges: SmallVec<[usize; 4]> = if self.graph[v].flags().conditional {
                    SmallVec::from_slice(&[0])
                } else {
                    self.graph[v].data_edges().collect()
                };

                for index in edges {
                    self.graph.enable(v, index);
                    stack.push(Pending::enabled(v, index));
                }
                continue;
            }

            let vertex = &self.graph[v];
            if vertex.flags().constant || vertex.position().is_none() {
                continue;
            }

            let implied = self.implied_activator(u, pending.index);
            let rebased = (pending.enabled || pending.rebased)
                && self
                    .order
                    .precedes(self.position(implied), self.position(self.activator(v)));

            if rebased {
                let activator = if pending.enabled {
                    implied
                } else {
                    self.activator(u)
                };
                self.reset_activator(v, activator);
            }

            let repositioned = (pending.enabled || pending.repositioned)
                && self.order.precedes(self.position(u), self.position(v));

            if repositioned {
                self.reposition(v, self.position(u));
            }

            if rebased || repositioned {
                for index in self.enabled_edges(v) {
                    stack.push(Pending {
                        source: v,
                        index,
                        enabled: false,
                        rebased,
                        repositioned,
                    });
                }
            }
        }
    }

    /// Disable the data edge `index` of `u`, deactivating or repositioning
    /// whatever loses a consumer.
    pub(crate) fn disable_edge(&mut self, u: VertexId, index: usize) {
        let v = self.graph.disable(u, index);
        let mut stack = vec![v];

        while let Some(w) = stack.pop() {
            let vertex = &self.graph[w];
            let flags = vertex.flags();

            // Observation roots stay active for as long as they exist.
            if flags.constant || flags.eager || vertex.position().is_none() {
                continue;
            }

            if !vertex.has_consumers() {
                self.deactivate_vertex(w);

                for index in self.enabled_edges(w) {
                    stack.push(self.graph.disable(w, index));
                }
                continue;
            }

            let activator = self.activator(w);
            let consumers: SmallVec<[VertexId; 4]> = vertex.consumers().collect();

            if consumers.iter().any(|&c| self.activator(c) == activator) {
                continue;
            }

            let earliest = consumers
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    if self.order.precedes(self.position(a), self.position(b)) {
                        std::cmp::Ordering::Less
                    } else {
                        std::cmp::Ordering::Greater
                    }
                })
                .expect("consumers are not empty");

            self.reposition(w, self.position(earliest));
            self.reset_activator(w, self.activator(earliest));

            for index in self.enabled_edges(w) {
                stack.push(self.graph.target(w, index));
            }
        }
    }

    /// The vertex that anchors `v` when it is reached through edge `index`
    /// of the active vertex `u`.
    ///
    /// Branches of a conditional are anchored by its selector; everything
    /// else, the selector itself included, inherits `u`'s own activator.
    pub(crate) fn implied_activator(&self, u: VertexId, index: usize) -> VertexId {
        assert!(self.is_active(u), "implied activator of inactive {:?}", u);

        if self.graph[u].flags().conditional {
            let selector = self.graph.target(u, 0);
            if self.graph.target(u, index) != selector {
                return selector;
            }
        }
        self.activator(u)
    }

    fn activate_vertex(&mut self, v: VertexId, anchor: Position, activator: VertexId) {
        debug_assert!(self.requires_activation(v));

        let position = self.order.insert_before(anchor, v);
        self.graph[v].position = Some(position);
        self.graph.add_edge(v, activator, EdgeKind::Logical);

        trace!(vertex = ?v, activator = ?activator, "activated");
        debug_assert!(!self.graph[v].is_initialized());
    }

    fn deactivate_vertex(&mut self, v: VertexId) {
        debug_assert!(!self.graph[v].has_consumers());

        let position = self.position(v);
        self.order.erase(position);

        let logical = self.graph[v]
            .logical_edge()
            .unwrap_or_else(|| panic!("active {:?} has no logical edge", v));
        self.graph.remove_edge(v, logical);

        let vertex = &mut self.graph[v];
        vertex.position = None;
        vertex.initialized = false;
        vertex.payload().borrow_mut().deactivate();
        self.branches.remove(&v);
        self.clear_metadata(v);

        trace!(vertex = ?v, "deactivated");
    }

    fn reset_activator(&mut self, v: VertexId, activator: VertexId) {
        let logical = self.graph[v]
            .logical_edge()
            .unwrap_or_else(|| panic!("active {:?} has no logical edge", v));
        self.graph.remove_edge(v, logical);
        self.graph.add_edge(v, activator, EdgeKind::Logical);
    }

    /// Move `v` to just before `anchor`, keeping its mark.
    fn reposition(&mut self, v: VertexId, anchor: Position) {
        let position = self.position(v);
        let marked = self.order.is_marked(position);

        self.order.erase(position);
        let position = self.order.insert_before(anchor, v);
        if marked {
            self.order.mark(position);
        }
        self.graph[v].position = Some(position);

        trace!(vertex = ?v, "repositioned");
    }
}
