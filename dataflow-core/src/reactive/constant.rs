//! Constant nodes.

use std::any::Any;

use crate::error::NodeError;

use super::handle::Ref;
use super::node::{cell, Node, UpdateStatus, Value};
use super::runtime::Engine;

/// A value fixed at construction. Constants are permanently active and are
/// never scheduled.
pub(crate) struct ConstNode<T> {
    value: T,
}

impl<T> ConstNode<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Value> Node for ConstNode<T> {
    fn update(&mut self, _: bool, _: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        unreachable!("constants are never updated")
    }

    fn value(&self) -> Option<&dyn Any> {
        Some(&self.value)
    }

    fn label(&self) -> String {
        "const".to_string()
    }
}

impl Engine {
    /// Create a constant node.
    pub fn constant<T: Value>(&self, value: T) -> Ref<T> {
        let v = self.shared().update(|network, _| {
            let v = network.add_constant_node(cell(ConstNode::new(value)));
            network.add_ref(v);
            v
        });
        Ref::adopt(self.shared(), v)
    }
}
