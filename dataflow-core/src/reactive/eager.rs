//! Observation roots.
//!
//! Observing a node creates an eager vertex at the back of the order that
//! reads it. The eager vertex is active from creation, so everything it
//! depends on is activated and pumped right away, and stays up to date until
//! the [`Eager`] handle is dropped.

use std::any::Any;
use std::ops::Deref;
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, NodeError, Result};
use crate::graph::VertexId;

use super::handle::Ref;
use super::node::{arg, cell, Node, UpdateStatus, Value};
use super::runtime::{Engine, Shared};

/// Node of an observation root: a copy of the observed value.
pub(crate) struct EagerNode<T> {
    value: Option<T>,
}

impl<T> EagerNode<T> {
    pub(crate) fn new() -> Self {
        Self { value: None }
    }
}

impl<T: Value> Node for EagerNode<T> {
    fn update(&mut self, initialized: bool, args: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        let next = arg::<T>(args, 0);
        let changed = !initialized || self.value.as_ref() != Some(next);
        if changed {
            self.value = Some(next.clone());
        }
        Ok(UpdateStatus::from_changed(changed))
    }

    fn value(&self) -> Option<&dyn Any> {
        self.value.as_ref().map(|value| value as &dyn Any)
    }

    fn label(&self) -> String {
        "eager".to_string()
    }
}

/// Handle to an observation root.
///
/// Dereferences to a [`Ref`] of the observation root itself, so an observed
/// value can feed other nodes.
pub struct Eager<T> {
    node: Ref<T>,
}

impl<T: Value> Eager<T> {
    pub(crate) fn create(engine: &Rc<Shared>, target: VertexId) -> Result<Self> {
        if engine.is_pumping() {
            return Err(Error::PumpInProgress);
        }

        let v = engine.update(|network, _| {
            let v = network.add_active_node(cell(EagerNode::<T>::new()), target);
            network.add_ref(v);
            v
        });

        // On failure the handle is dropped, which tears the root down again.
        let node = Ref::adopt(engine, v);
        engine.pump(Some(v))?;

        debug!(vertex = ?v, observed = ?target, "observing");
        Ok(Self { node })
    }

    /// The current value of the observed node.
    pub fn get(&self) -> Result<T> {
        let engine = self.node.engine()?;
        let node = engine.network.borrow().node(self.node.id());
        let node = node.borrow();

        let value = node
            .value()
            .and_then(|value| value.downcast_ref::<T>())
            .unwrap_or_else(|| panic!("observer {:?} has no value", self.node.id()));
        Ok(value.clone())
    }
}

impl<T> Deref for Eager<T> {
    type Target = Ref<T>;

    fn deref(&self) -> &Ref<T> {
        &self.node
    }
}

impl<T> Clone for Eager<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Eager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Eager").field(&self.node).finish()
    }
}

impl Engine {
    /// Observe `node`. Same as [`Ref::observe`], checked against this
    /// engine.
    pub fn observe<T: Value>(&self, node: &Ref<T>) -> Result<Eager<T>> {
        let target = node.id_in(self.shared())?;
        Eager::create(self.shared(), target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observing_activates_and_pumps() {
        let engine = Engine::new();
        let x = engine.var(10);
        assert!(!x.is_active().unwrap());

        let a = engine.observe(&x).unwrap();
        assert!(x.is_active().unwrap());
        assert_eq!(a.get().unwrap(), 10);
        assert_eq!(a.label().unwrap(), "eager");
        assert_eq!(engine.num_active_nodes(), 3);
        assert_eq!(engine.stats().pumps, 1);
    }

    #[test]
    fn dropping_the_observer_deactivates() {
        let engine = Engine::new();
        let x = engine.var(10);
        {
            let _a = x.observe().unwrap();
            assert!(x.is_active().unwrap());
        }
        assert!(!x.is_active().unwrap());
        assert_eq!(engine.num_active_nodes(), 1);
        assert_eq!(engine.num_vertices(), 2);
    }

    #[test]
    fn observing_twice_shares_the_target() {
        let engine = Engine::new();
        let x = engine.var(1);
        let a = x.observe().unwrap();
        let b = x.observe().unwrap();

        assert_eq!(x.ref_count().unwrap(), 3);
        drop(a);
        assert!(x.is_active().unwrap());
        assert_eq!(b.get().unwrap(), 1);
    }

    #[test]
    fn observing_from_an_update_is_refused() {
        let engine = Engine::new();
        let x = engine.var(1);
        let attempts = Rc::new(std::cell::RefCell::new(Vec::new()));

        let seen = attempts.clone();
        let inner = x.clone();
        let y = engine
            .lift("observe-inside", &x, move |x| {
                seen.borrow_mut().push(inner.observe().map(|_| ()).map_err(|e| e.to_string()));
                *x
            })
            .unwrap();
        let _z = y.observe().unwrap();

        assert_eq!(
            *attempts.borrow(),
            vec![Err("cannot observe a node while a pump is in progress".to_string())]
        );
    }
}
