//! Variables
//!
//! A variable is the mutable input of a dataflow graph. Setting it stores
//! the next value and schedules the variable; the value is applied by the
//! variable's own update, inside a pump.
//!
//! # Design Decisions
//!
//! - The next value lives in a cell shared by the handle and the node, so
//!   setting a variable never touches the node while it may be updating.
//! - Setting an inactive variable only stores the value. It is picked up
//!   when the variable is next activated.
//! - A deactivated variable keeps its last value.

use std::any::Any;
use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use crate::error::{NodeError, Result};

use super::handle::Ref;
use super::node::{cell, Node, UpdateStatus, Value};
use super::runtime::Engine;

/// Slot holding a value that has been set but not yet applied.
pub(crate) type NextValue<T> = Rc<RefCell<Option<T>>>;

pub(crate) struct VarNode<T> {
    value: Option<T>,
    next: NextValue<T>,
}

impl<T> VarNode<T> {
    pub(crate) fn new(value: T) -> (Self, NextValue<T>) {
        let next = Rc::new(RefCell::new(Some(value)));
        let node = Self {
            value: None,
            next: next.clone(),
        };
        (node, next)
    }
}

impl<T: Value> Node for VarNode<T> {
    fn update(&mut self, initialized: bool, _: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        let changed = match self.next.borrow_mut().take() {
            Some(next) => {
                let changed = !initialized || self.value.as_ref() != Some(&next);
                self.value = Some(next);
                changed
            }
            None => !initialized,
        };

        Ok(UpdateStatus::from_changed(changed))
    }

    fn value(&self) -> Option<&dyn Any> {
        self.value.as_ref().map(|value| value as &dyn Any)
    }

    fn label(&self) -> String {
        "var".to_string()
    }
}

/// Handle to a variable.
///
/// Dereferences to the variable's [`Ref`], so it can feed other nodes.
pub struct Var<T> {
    node: Ref<T>,
    next: NextValue<T>,
}

impl<T: Value> Var<T> {
    /// Assign a new value.
    ///
    /// If the variable is active this pumps the change through every
    /// observed node before returning, unless a pump is already running, in
    /// which case the change joins it. Errors from the pump are returned.
    pub fn set(&self, value: T) -> Result<()> {
        let engine = self.node.engine()?;
        *self.next.borrow_mut() = Some(value);
        engine.schedule(self.node.id())
    }
}

impl<T> Deref for Var<T> {
    type Target = Ref<T>;

    fn deref(&self) -> &Ref<T> {
        &self.node
    }
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            next: self.next.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Var").field(&self.node).finish()
    }
}

impl Engine {
    /// Create a variable holding `value`.
    pub fn var<T: Value>(&self, value: T) -> Var<T> {
        let (node, next) = VarNode::new(value);
        let v = self.shared().update(|network, _| {
            let v = network.add_node(cell(node), &[]);
            network.add_ref(v);
            v
        });

        Var {
            node: Ref::adopt(self.shared(), v),
            next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn set_propagates_to_observers() {
        let engine = Engine::new();
        let x = engine.var(1);
        let a = x.observe().unwrap();

        x.set(2).unwrap();
        assert_eq!(a.get().unwrap(), 2);
        assert_eq!(engine.stats().pumps, 2);
    }

    #[test]
    fn setting_the_same_value_changes_nothing() {
        let engine = Engine::new();
        let x = engine.var(1);
        let _a = x.observe().unwrap();
        let before = engine.stats();

        x.set(1).unwrap();
        let after = engine.stats();
        assert_eq!(after.updated_nodes - before.updated_nodes, 1);
        assert_eq!(after.changed_nodes, before.changed_nodes);
    }

    #[test]
    fn inactive_variable_keeps_the_latest_value() {
        let engine = Engine::new();
        let x = engine.var(1);
        x.set(2).unwrap();
        x.set(3).unwrap();

        let a = x.observe().unwrap();
        assert_eq!(a.get().unwrap(), 3);
        drop(a);

        // Deactivation keeps the value for the next activation.
        let b = x.observe().unwrap();
        assert_eq!(b.get().unwrap(), 3);
    }

    #[test]
    fn clones_share_the_variable() {
        let engine = Engine::new();
        let x = engine.var(1);
        let y = x.clone();
        let a = x.observe().unwrap();

        y.set(8).unwrap();
        assert_eq!(a.get().unwrap(), 8);
        assert_eq!(x.ref_count().unwrap(), 3);
    }

    #[test]
    fn handles_outliving_the_engine_report_it() {
        let slot = RefCell::new(None);

        // Stopping with a live handle is a leak and panics.
        let stopped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let engine = Engine::new();
            *slot.borrow_mut() = Some(engine.var(1));
        }));
        assert!(stopped.is_err());

        let x = slot.into_inner().unwrap();
        assert!(matches!(x.set(2), Err(Error::EngineStopped)));
        assert!(matches!(x.is_active(), Err(Error::EngineStopped)));
        assert!(matches!(x.observe(), Err(Error::EngineStopped)));
    }
}
