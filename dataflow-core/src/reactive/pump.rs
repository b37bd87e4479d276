//! Propagation
//!
//! A pump settles every pending change in one pass over the marked part of
//! the topological order.
//!
//! # Algorithm
//!
//! 1. Take the earliest marked position and unmark it.
//! 2. For a conditional, resolve its branch first. Switching branches may
//!    activate vertices in front of it; if any of them are marked, the
//!    conditional is marked again and revisited after them.
//! 3. Lend the node and its enabled dependencies out of the network and run
//!    the update with the network released.
//! 4. On a change, mark every consumer.
//!
//! Because dependencies always precede their consumers and new vertices are
//! inserted just in front of the vertex that needs them, no vertex is
//! updated twice for the same mark.

use std::any::Any;
use std::cell::Ref;

use serde::Serialize;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Error, NodeError, Result};
use crate::graph::VertexId;

use super::network::Network;
use super::node::{Node, NodeCell, UpdateStatus};

/// Cumulative propagation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpStats {
    /// Completed or aborted passes. A pump runs several passes when its
    /// updates schedule vertices the running pass already went past.
    pub pumps: u64,

    /// Node updates performed.
    pub updated_nodes: u64,

    /// Updates that reported a change.
    pub changed_nodes: u64,
}

/// What the pump should do next.
pub(crate) enum Step {
    /// Nothing is marked.
    Idle,

    /// The visited vertex went back into the queue behind other work.
    Requeued,

    Update(Update),
}

/// A node update lent out of the network.
pub(crate) struct Update {
    vertex: VertexId,
    node: NodeCell,
    initialized: bool,
    args: SmallVec<[NodeCell; 4]>,

    /// Branch read by a conditional.
    branch: Option<VertexId>,
}

impl Update {
    pub(crate) fn vertex(&self) -> VertexId {
        self.vertex
    }

    /// Run the node's update. The network must not be borrowed.
    pub(crate) fn run(&self) -> Result<UpdateStatus, NodeError> {
        let guards: SmallVec<[Ref<'_, dyn Node>; 4]> =
            self.args.iter().map(|arg| arg.borrow()).collect();
        let values: SmallVec<[&dyn Any; 4]> = guards
            .iter()
            .map(|guard| {
                guard.value().unwrap_or_else(|| {
                    panic!("{:?} reads an uninitialized dependency", self.vertex)
                })
            })
            .collect();

        self.node.borrow_mut().update(self.initialized, &values)
    }
}

enum Selection {
    Ready(VertexId),
    Requeued,
}

impl Network {
    /// Mark `v` for the next pass if it is active.
    pub(crate) fn schedule(&mut self, v: VertexId) {
        if let Some(position) = self.graph.get(v).and_then(|vertex| vertex.position()) {
            if !self.graph[v].flags().constant {
                self.order.mark(position);
            }
        }
    }

    /// Mark `v` in the running pass if the pass has not reached it yet,
    /// that is if it lies after `cursor`, the vertex updated last. Returns
    /// false when `v` has to wait for the next pass.
    pub(crate) fn schedule_ahead(&mut self, v: VertexId, cursor: VertexId) -> bool {
        let Some(position) = self.graph.get(v).and_then(|vertex| vertex.position()) else {
            return true;
        };
        if self.graph[v].flags().constant {
            return true;
        }

        let cursor = self.graph.get(cursor).and_then(|vertex| vertex.position());
        if cursor.is_some_and(|cursor| !self.order.precedes(cursor, position)) {
            return false;
        }

        self.order.mark(position);
        true
    }

    /// Pick the next update of the current pass.
    pub(crate) fn next_step(&mut self) -> Step {
        let Some(position) = self.order.first_marked() else {
            return Step::Idle;
        };
        self.order.unmark(position);
        let u = self.order.vertex(position);

        let branch = if self.graph[u].flags().conditional {
            match self.select_branch(u) {
                Selection::Ready(branch) => Some(branch),
                Selection::Requeued => return Step::Requeued,
            }
        } else {
            None
        };

        let edges = self.enabled_edges(u);

        // A dependency left behind by an aborted pass is brought up to date
        // before it is read.
        let stale: SmallVec<[VertexId; 4]> = edges
            .iter()
            .map(|&index| self.graph.target(u, index))
            .filter(|&v| !self.graph[v].is_initialized())
            .collect();
        if !stale.is_empty() {
            for v in stale {
                self.order.mark(self.position(v));
            }
            self.order.mark(position);
            return Step::Requeued;
        }

        let vertex = &self.graph[u];
        Step::Update(Update {
            vertex: u,
            node: vertex.payload().clone(),
            initialized: vertex.is_initialized(),
            args: edges
                .iter()
                .map(|&index| self.node(self.graph.target(u, index)))
                .collect(),
            branch,
        })
    }

    /// Record the outcome of an update.
    pub(crate) fn finish(
        &mut self,
        update: Update,
        result: Result<UpdateStatus, NodeError>,
    ) -> Result<UpdateStatus> {
        let u = update.vertex;
        self.stats.updated_nodes += 1;

        let status = match result {
            Ok(status) => status,
            Err(source) => {
                let label = update.node.borrow().label();
                return Err(Error::UpdateFailed { label, source });
            }
        };

        if self.options.trace_updates {
            trace!(
                vertex = ?u,
                label = %update.node.borrow().label(),
                changed = status.is_changed(),
                "updated"
            );
        }

        let was_initialized = update.initialized;
        self.graph[u].initialized = true;

        if let Some(branch) = update.branch {
            let previous = self.branches.insert(u, branch);
            if was_initialized && previous == Some(branch) {
                if let Some(metadata) = self.metadata(branch) {
                    self.set_metadata(u, metadata);
                }
            }
        }

        if status.is_changed() {
            self.stats.changed_nodes += 1;

            let consumers: SmallVec<[VertexId; 4]> = self.graph[u].consumers().collect();
            for consumer in consumers {
                self.order.mark(self.position(consumer));
            }
        }

        Ok(status)
    }

    /// Make the branch edge picked by the selector the only enabled one.
    fn select_branch(&mut self, u: VertexId) -> Selection {
        let selector = self.graph.target(u, 0);
        let position = self.position(u);

        if !self.graph[selector].is_initialized() {
            self.order.mark(self.position(selector));
            self.order.mark(position);
            return Selection::Requeued;
        }

        let branches = self.graph[u].data_edges().count() - 1;
        let choice = {
            let node = self.graph[u].payload().borrow();
            let selector = self.graph[selector].payload().borrow();
            let value = selector
                .value()
                .unwrap_or_else(|| panic!("selector of {:?} has no value", u));
            node.select(value, branches)
        };
        assert!(choice < branches, "branch {} out of {}", choice, branches);

        let chosen = 1 + choice;
        let current = (1..=branches).find(|&index| self.graph.edge(u, index).is_enabled());

        if current != Some(chosen) {
            self.enable_edge(u, chosen);
            if let Some(index) = current {
                self.disable_edge(u, index);
            }

            let position = self.position(u);
            let behind = self
                .order
                .first_marked()
                .is_some_and(|marked| self.order.precedes(marked, position));
            if behind {
                self.order.mark(position);
                return Selection::Requeued;
            }
        }

        Selection::Ready(self.graph.target(u, chosen))
    }
}
