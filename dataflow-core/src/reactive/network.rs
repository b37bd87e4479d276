//! Dependency Network
//!
//! The engine's state: the dependency graph of node cells, the topological
//! order over active vertices, and the root sentinel that heads the order.
//!
//! # Overview
//!
//! `Network` owns every vertex. Node registration lives here; the algorithms
//! that move vertices in and out of the order are split across sibling
//! modules, each adding an `impl Network` block:
//!
//! - `activation`: enabling and disabling dependency edges
//! - `lifecycle`: reference counting and subgraph teardown
//! - `pump`: propagation passes
//!
//! # Design Decisions
//!
//! - Constants share the root's position. They are active without occupying
//!   an order entry, so they never move and never count as active nodes.
//! - Observation roots are appended at the back of the order and anchored to
//!   the root by their logical edge.
//! - A network never calls node hooks that could re-enter the engine while
//!   it is borrowed; see `pump` for how updates are lent out.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::config::EngineOptions;
use crate::graph::{DependencyGraph, EdgeKind, Position, TopologicalOrder, VertexId};

use super::node::{cell, Metadata, NodeCell, Root};
use super::pump::PumpStats;

pub(crate) struct Network {
    pub(crate) graph: DependencyGraph<NodeCell>,
    pub(crate) order: TopologicalOrder,
    pub(crate) root: VertexId,
    pub(crate) options: EngineOptions,
    pub(crate) stats: PumpStats,

    /// Branch each conditional vertex read on its last update.
    pub(crate) branches: HashMap<VertexId, VertexId>,
    metadata: HashMap<VertexId, Metadata>,

    /// Passes run so far, shared with the time node.
    pub(crate) ticks: Rc<Cell<u64>>,

    /// The time node, while one exists.
    pub(crate) time: Option<VertexId>,
}

impl Network {
    pub(crate) fn new(options: EngineOptions) -> Self {
        let mut graph = DependencyGraph::with_capacity(options.capacity);
        let mut order = TopologicalOrder::with_capacity(options.capacity);

        let root = graph.add_vertex(cell(Root));
        let vertex = &mut graph[root];
        vertex.flags.hidden = true;
        vertex.initialized = true;
        vertex.position = Some(order.push_back(root));

        Self {
            graph,
            order,
            root,
            options,
            stats: PumpStats::default(),
            branches: HashMap::new(),
            metadata: HashMap::new(),
            ticks: Rc::new(Cell::new(0)),
            time: None,
        }
    }

    /// Register an inert vertex with disabled edges to `args`, taking a
    /// reference on each of them.
    pub(crate) fn add_node(&mut self, node: NodeCell, args: &[VertexId]) -> VertexId {
        let v = self.graph.add_vertex(node);

        for &w in args {
            assert!(w != self.root, "the root sentinel cannot be a dependency");
            self.graph.add_edge(v, w, EdgeKind::Data);
            self.add_ref(w);
        }

        debug_assert!(!self.is_active(v));
        debug_assert_eq!(self.graph.out_edges(v).len(), args.len());
        v
    }

    /// Register an inert conditional vertex. `args[0]` is the selector, the
    /// rest are the branches.
    pub(crate) fn add_conditional_node(&mut self, node: NodeCell, args: &[VertexId]) -> VertexId {
        assert!(args.len() >= 2, "a conditional needs a selector and a branch");

        let v = self.add_node(node, args);
        self.graph[v].flags.conditional = true;
        v
    }

    /// Register a constant: active and initialized from the start, at the
    /// root's position.
    pub(crate) fn add_constant_node(&mut self, node: NodeCell) -> VertexId {
        let root_position = self.position(self.root);
        let v = self.graph.add_vertex(node);

        let vertex = &mut self.graph[v];
        vertex.flags.constant = true;
        vertex.initialized = true;
        vertex.position = Some(root_position);
        v
    }

    /// Register an observation root of `target` at the back of the order and
    /// activate everything it needs. The caller pumps it afterwards.
    pub(crate) fn add_active_node(&mut self, node: NodeCell, target: VertexId) -> VertexId {
        assert!(target != self.root, "the root sentinel cannot be observed");

        let v = self.graph.add_vertex(node);
        let data = self.graph.add_edge(v, target, EdgeKind::Data);
        self.add_ref(target);

        let position = self.order.push_back(v);
        let vertex = &mut self.graph[v];
        vertex.flags.eager = true;
        vertex.position = Some(position);
        self.graph.add_edge(v, self.root, EdgeKind::Logical);

        self.enable_edge(v, data);

        debug_assert!(self.is_active(v));
        debug_assert_eq!(self.graph.out_edges(v).len(), 2);
        v
    }

    pub(crate) fn is_active(&self, v: VertexId) -> bool {
        self.graph[v].position.is_some()
    }

    /// Does `v` need a position before it can be read?
    pub(crate) fn requires_activation(&self, v: VertexId) -> bool {
        self.graph[v].position.is_none()
    }

    /// Position of an active vertex.
    pub(crate) fn position(&self, v: VertexId) -> Position {
        self.graph[v]
            .position
            .unwrap_or_else(|| panic!("vertex {:?} is not active", v))
    }

    /// The vertex anchoring `v` through its logical edge.
    pub(crate) fn activator(&self, v: VertexId) -> VertexId {
        let vertex = &self.graph[v];
        let edge = vertex
            .logical_edge()
            .unwrap_or_else(|| panic!("vertex {:?} has no activator", v));
        vertex.out_edges()[edge].target()
    }

    /// Indices of the enabled data edges of `v`.
    pub(crate) fn enabled_edges(&self, v: VertexId) -> SmallVec<[usize; 4]> {
        self.graph[v]
            .out_edges()
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.is_data() && edge.is_enabled())
            .map(|(index, _)| index)
            .collect()
    }

    pub(crate) fn node(&self, v: VertexId) -> NodeCell {
        self.graph[v].payload().clone()
    }

    pub(crate) fn contains(&self, v: VertexId) -> bool {
        self.graph.contains(v)
    }

    /// Entries in the order: the root plus every active non-constant vertex.
    pub(crate) fn num_active_nodes(&self) -> usize {
        self.order.len()
    }

    /// All vertices, the root included.
    pub(crate) fn num_vertices(&self) -> usize {
        self.graph.len()
    }

    /// Sum of node sizes. Nodes that are being updated are skipped.
    pub(crate) fn memory_consumption(&self) -> usize {
        self.graph
            .ids()
            .filter_map(|v| {
                let node = self.graph[v].payload().try_borrow().ok()?;
                Some(node.mem_info().0)
            })
            .sum()
    }

    /// Attach metadata to an active vertex. Inactive vertices ignore it.
    pub(crate) fn set_metadata(&mut self, v: VertexId, metadata: Metadata) {
        if self.is_active(v) {
            self.metadata.insert(v, metadata);
        }
    }

    pub(crate) fn metadata(&self, v: VertexId) -> Option<Metadata> {
        self.metadata.get(&v).cloned()
    }

    pub(crate) fn clear_metadata(&mut self, v: VertexId) {
        self.metadata.remove(&v);
    }

    pub(crate) fn forget(&mut self, v: VertexId) {
        self.metadata.remove(&v);
        self.branches.remove(&v);
        if self.time == Some(v) {
            self.time = None;
        }
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Start a new tick of discrete time. The time node, if active, is
    /// marked so that it reports the new tick in the coming pass.
    pub(crate) fn advance_time(&mut self) {
        self.ticks.set(self.ticks.get() + 1);
        if let Some(time) = self.time {
            self.schedule(time);
        }
    }

    /// Describe the first broken structural invariant, if any.
    pub(crate) fn invariant_violation(&self) -> Option<String> {
        let mut consumers: HashMap<(VertexId, VertexId), usize> = HashMap::new();

        for v in self.graph.ids() {
            let vertex = &self.graph[v];
            let flags = vertex.flags();
            let edges = vertex.out_edges();

            if v == self.root {
                if !edges.is_empty() {
                    return Some("root has out-edges".to_string());
                }
                continue;
            }

            if vertex.ref_count() == 0 {
                return Some(format!("{:?} is unreferenced", v));
            }

            for edge in edges.iter().filter(|edge| edge.is_enabled()) {
                let Some(source) = vertex.position() else {
                    return Some(format!("inactive {:?} has an enabled edge", v));
                };
                let Some(target) = self.graph[edge.target()].position() else {
                    return Some(format!("{:?} reads inactive {:?}", v, edge.target()));
                };
                if !self.order.precedes(target, source) {
                    let dependency = edge.target();
                    return Some(format!("{:?} is ordered before its consumer {:?}", dependency, v));
                }
                *consumers.entry((edge.target(), v)).or_insert(0) += 1;
            }

            let logical = edges.iter().filter(|edge| !edge.is_data()).count();

            match vertex.position() {
                Some(_) if flags.constant => {
                    if !edges.is_empty() {
                        return Some(format!("constant {:?} has out-edges", v));
                    }
                }
                Some(position) => {
                    if self.order.vertex(position) != v {
                        return Some(format!("{:?} has a stale position", v));
                    }
                    if logical != 1 || vertex.logical_edge().is_none() {
                        return Some(format!("active {:?} lacks a single trailing logical edge", v));
                    }
                    if !flags.eager && !vertex.has_consumers() {
                        return Some(format!("active {:?} has no consumers", v));
                    }
                    if flags.conditional {
                        let branches = edges[1..].iter().filter(|e| e.is_data() && e.is_enabled());
                        if !edges[0].is_enabled() || branches.count() > 1 {
                            return Some(format!("conditional {:?} has a bad branch set", v));
                        }
                    }
                }
                None => {
                    if logical != 0 {
                        return Some(format!("inactive {:?} keeps a logical edge", v));
                    }
                    if vertex.has_consumers() {
                        return Some(format!("inactive {:?} has consumers", v));
                    }
                }
            }
        }

        for v in self.graph.ids() {
            for (consumer, &count) in &self.graph[v].consumers {
                if consumers.remove(&(v, *consumer)) != Some(count) {
                    return Some(format!("consumers of {:?} are out of sync", v));
                }
            }
        }
        if !consumers.is_empty() {
            return Some("enabled edges without consumer entries".to_string());
        }

        for (position, v) in self.order.iter() {
            if self.graph.get(v).and_then(|vertex| vertex.position()) != Some(position) {
                return Some(format!("order entry of {:?} is stale", v));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::constant::ConstNode;
    use crate::reactive::lift::LiftNode;
    use crate::reactive::eager::EagerNode;

    fn increment(network: &mut Network, arg: VertexId) -> VertexId {
        let node = LiftNode::new("inc", |args| Ok(*crate::reactive::node::arg::<i32>(args, 0) + 1));
        network.add_node(cell(node), &[arg])
    }

    #[test]
    fn new_network_holds_only_the_root() {
        let network = Network::new(EngineOptions::default());
        assert_eq!(network.num_vertices(), 1);
        assert_eq!(network.num_active_nodes(), 1);
        assert!(network.is_active(network.root));
        assert_eq!(network.invariant_violation(), None);
    }

    #[test]
    fn nodes_start_inert_and_hold_their_dependencies() {
        let mut network = Network::new(EngineOptions::default());
        let c = network.add_constant_node(cell(ConstNode::new(1)));
        network.add_ref(c);
        let x = increment(&mut network, c);
        network.add_ref(x);

        assert!(network.is_active(c));
        assert!(!network.is_active(x));
        assert_eq!(network.graph[c].ref_count(), 2);
        assert_eq!(network.num_active_nodes(), 1);
        assert_eq!(network.invariant_violation(), None);
    }

    #[test]
    fn active_node_activates_its_chain() {
        let mut network = Network::new(EngineOptions::default());
        let c = network.add_constant_node(cell(ConstNode::new(1)));
        network.add_ref(c);
        let x = increment(&mut network, c);
        network.add_ref(x);
        let y = increment(&mut network, x);
        network.add_ref(y);

        let e = network.add_active_node(cell(EagerNode::<i32>::new()), y);
        network.add_ref(e);

        // root, x, y, eager
        assert_eq!(network.num_active_nodes(), 4);
        assert!(network.order.precedes(network.position(x), network.position(y)));
        assert!(network.order.precedes(network.position(y), network.position(e)));
        assert_eq!(network.activator(e), network.root);
        assert_eq!(network.activator(x), network.root);
        assert!(network.order.is_marked(network.position(x)));
        assert_eq!(network.invariant_violation(), None);
    }

    #[test]
    fn metadata_requires_an_active_vertex() {
        let mut network = Network::new(EngineOptions::default());
        let c = network.add_constant_node(cell(ConstNode::new(1)));
        network.add_ref(c);
        let x = increment(&mut network, c);
        network.add_ref(x);

        network.set_metadata(x, std::rc::Rc::new("ignored"));
        assert!(network.metadata(x).is_none());

        network.set_metadata(c, std::rc::Rc::new("kept"));
        let metadata = network.metadata(c).unwrap();
        assert_eq!(metadata.downcast_ref::<&str>(), Some(&"kept"));
    }
}
