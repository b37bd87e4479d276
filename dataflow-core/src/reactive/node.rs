//! Node capability interface.
//!
//! A node is the unit of computation the engine schedules. The engine never
//! looks at a node's value type: it hands each node the type-erased values of
//! its enabled dependencies and asks whether its own value changed.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{NodeError, Result};
use crate::graph::VertexId;

use super::handle::Ref;
use super::runtime::Engine;

/// Outcome of a node update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The observable value is the same as before.
    Unchanged,

    /// The value changed; consumers must be updated in this pass.
    Changed,
}

impl UpdateStatus {
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }

    pub fn is_changed(self) -> bool {
        self == Self::Changed
    }
}

/// Values a node can carry.
pub trait Value: Clone + PartialEq + 'static {}

impl<T: Clone + PartialEq + 'static> Value for T {}

/// The hooks the engine calls on a node.
///
/// Hooks other than [`update`](Node::update) run while the engine is busy
/// and must not call back into it.
pub trait Node: 'static {
    /// Recompute the value from the values of the enabled dependencies, in
    /// edge order. `initialized` is false on the first update after
    /// activation.
    fn update(&mut self, initialized: bool, args: &[&dyn Any]) -> Result<UpdateStatus, NodeError>;

    /// The current value, once the node has been updated.
    fn value(&self) -> Option<&dyn Any>;

    fn label(&self) -> String;

    /// Called when the node leaves the topological order.
    fn deactivate(&mut self) {}

    /// For conditional nodes: the branch picked by the selector value, as an
    /// index into the branch edges (which follow the selector edge).
    fn select(&self, _selector: &dyn Any, _branches: usize) -> usize {
        0
    }

    /// Size and alignment of the node, for memory accounting.
    fn mem_info(&self) -> (usize, usize) {
        (std::mem::size_of_val(self), std::mem::align_of_val(self))
    }
}

/// Shared cell a node lives in. The engine lends nodes out of the graph
/// through these so that update hooks run without the graph borrowed.
pub type NodeCell = Rc<RefCell<dyn Node>>;

/// Opaque data carried alongside a node.
pub type Metadata = Rc<dyn Any>;

pub(crate) fn cell<N: Node>(node: N) -> NodeCell {
    Rc::new(RefCell::new(node))
}

/// Downcast a dependency value. A mismatch means a typed constructor wired
/// the graph wrongly.
pub(crate) fn arg<'a, T: 'static>(args: &[&'a dyn Any], index: usize) -> &'a T {
    args[index]
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("argument {} has unexpected type", index))
}

/// Node of the root sentinel. It anchors the logical edges of observation
/// roots and is never updated.
pub(crate) struct Root;

impl Node for Root {
    fn update(&mut self, _: bool, _: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        unreachable!("the root sentinel is never scheduled")
    }

    fn value(&self) -> Option<&dyn Any> {
        None
    }

    fn label(&self) -> String {
        "root".to_string()
    }
}

impl Engine {
    /// Register a node kind of your own, reading `dependencies` in order.
    ///
    /// The node starts inert. Its value must be of type `T`; reading it
    /// through an observer panics otherwise.
    ///
    /// # Panics
    ///
    /// Panics if a dependency does not belong to this engine.
    pub fn add_node<T: Value, N: Node>(&self, node: N, dependencies: &[VertexId]) -> Ref<T> {
        let v = self.shared().update(|network, _| {
            for &w in dependencies {
                assert!(network.contains(w), "dependency {:?} is not in this engine", w);
            }
            let v = network.add_node(cell(node), dependencies);
            network.add_ref(v);
            v
        });
        Ref::adopt(self.shared(), v)
    }

    /// Request an update of `node`, as a variable does when it is set.
    pub fn schedule<T>(&self, node: &Ref<T>) -> Result<()> {
        let v = node.id_in(self.shared())?;
        self.shared().schedule(v)
    }
}
