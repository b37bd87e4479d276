//! Lifted Functions
//!
//! A lift is a pure function of its dependencies. It recomputes whenever one
//! of them changes and reports a change only when its result differs from
//! the previous one.
//!
//! # Example
//!
//! ```
//! use dataflow_core::Engine;
//!
//! let engine = Engine::new();
//! let width = engine.var(3);
//! let height = engine.var(4);
//! let area = engine.lift2("area", &width, &height, |w, h| w * h).unwrap();
//!
//! let observed = area.observe().unwrap();
//! assert_eq!(observed.get().unwrap(), 12);
//!
//! width.set(5).unwrap();
//! assert_eq!(observed.get().unwrap(), 20);
//! ```

use std::any::Any;

use crate::error::{NodeError, Result};
use crate::graph::VertexId;

use super::handle::Ref;
use super::node::{arg, cell, Node, UpdateStatus, Value};
use super::runtime::Engine;

type LiftFn<R> = Box<dyn Fn(&[&dyn Any]) -> Result<R, NodeError>>;

pub(crate) struct LiftNode<R> {
    label: String,
    f: LiftFn<R>,
    value: Option<R>,
}

impl<R> LiftNode<R> {
    pub(crate) fn new(
        label: impl Into<String>,
        f: impl Fn(&[&dyn Any]) -> Result<R, NodeError> + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            f: Box::new(f),
            value: None,
        }
    }
}

impl<R: Value> Node for LiftNode<R> {
    fn update(&mut self, initialized: bool, args: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        let next = (self.f)(args)?;
        let changed = !initialized || self.value.as_ref() != Some(&next);
        self.value = Some(next);
        Ok(UpdateStatus::from_changed(changed))
    }

    fn value(&self) -> Option<&dyn Any> {
        self.value.as_ref().map(|value| value as &dyn Any)
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn deactivate(&mut self) {
        self.value = None;
    }
}

impl Engine {
    /// Register a lift node over already-resolved dependencies.
    pub(crate) fn add_lift<R: Value>(&self, node: LiftNode<R>, args: &[VertexId]) -> Ref<R> {
        let v = self.shared().update(|network, _| {
            let v = network.add_node(cell(node), args);
            network.add_ref(v);
            v
        });
        Ref::adopt(self.shared(), v)
    }

    /// Apply `f` to the value of `a`.
    pub fn lift<A, R, F>(&self, label: &str, a: &Ref<A>, f: F) -> Result<Ref<R>>
    where
        A: Value,
        R: Value,
        F: Fn(&A) -> R + 'static,
    {
        let args = [a.id_in(self.shared())?];
        let node = LiftNode::new(label, move |args| Ok(f(arg::<A>(args, 0))));
        Ok(self.add_lift(node, &args))
    }

    /// Apply `f` to the values of `a` and `b`.
    pub fn lift2<A, B, R, F>(&self, label: &str, a: &Ref<A>, b: &Ref<B>, f: F) -> Result<Ref<R>>
    where
        A: Value,
        B: Value,
        R: Value,
        F: Fn(&A, &B) -> R + 'static,
    {
        let args = [a.id_in(self.shared())?, b.id_in(self.shared())?];
        let node = LiftNode::new(label, move |args| {
            Ok(f(arg::<A>(args, 0), arg::<B>(args, 1)))
        });
        Ok(self.add_lift(node, &args))
    }

    /// Apply a fallible `f` to the value of `a`. A failure aborts the pump
    /// that ran it and is returned as [`Error::UpdateFailed`].
    ///
    /// [`Error::UpdateFailed`]: crate::Error::UpdateFailed
    pub fn try_lift<A, R, E, F>(&self, label: &str, a: &Ref<A>, f: F) -> Result<Ref<R>>
    where
        A: Value,
        R: Value,
        E: Into<NodeError>,
        F: Fn(&A) -> Result<R, E> + 'static,
    {
        let args = [a.id_in(self.shared())?];
        let node = LiftNode::new(label, move |args| f(arg::<A>(args, 0)).map_err(Into::into));
        Ok(self.add_lift(node, &args))
    }

    /// Forward the value of `a` unchanged, calling `f` with every value it
    /// receives.
    pub fn inspect<T, F>(&self, label: &str, a: &Ref<T>, f: F) -> Result<Ref<T>>
    where
        T: Value,
        F: Fn(&T) + 'static,
    {
        self.lift(label, a, move |value: &T| {
            f(value);
            value.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn lift_is_inert_until_observed() {
        let engine = Engine::new();
        let x = engine.var(10);
        let y = engine.lift("inc", &x, |x| x + 1).unwrap();

        assert!(!x.is_active().unwrap());
        assert!(!y.is_active().unwrap());
        assert_eq!(y.label().unwrap(), "inc");
        assert_eq!(engine.num_active_nodes(), 1);
        assert_eq!(engine.stats().pumps, 0);
    }

    #[test]
    fn lift2_reads_both_dependencies() {
        let engine = Engine::new();
        let x = engine.var(2);
        let y = engine.var("ab".to_string());
        let z = engine.lift2("repeat", &y, &x, |s, n| s.repeat(*n as usize)).unwrap();

        let a = z.observe().unwrap();
        assert_eq!(a.get().unwrap(), "abab");

        x.set(3).unwrap();
        assert_eq!(a.get().unwrap(), "ababab");
    }

    #[test]
    fn deactivation_forgets_the_value() {
        let engine = Engine::new();
        let calls = Rc::new(RefCell::new(0));
        let x = engine.var(1);

        let counter = calls.clone();
        let y = engine
            .lift("count", &x, move |x| {
                *counter.borrow_mut() += 1;
                *x
            })
            .unwrap();

        drop(y.observe().unwrap());
        drop(y.observe().unwrap());
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn inspect_sees_every_value() {
        let engine = Engine::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let x = engine.var('a');

        let log = seen.clone();
        let y = engine.inspect("log", &x, move |c| log.borrow_mut().push(*c)).unwrap();
        let _a = y.observe().unwrap();

        x.set('b').unwrap();
        x.set('c').unwrap();
        assert_eq!(*seen.borrow(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn try_lift_failure_carries_the_source() {
        let engine = Engine::new();
        let x = engine.var("1".to_string());
        let y = engine
            .try_lift("parse", &x, |s| s.parse::<i32>())
            .unwrap();
        let a = y.observe().unwrap();
        assert_eq!(a.get().unwrap(), 1);

        let error = x.set("one".to_string()).unwrap_err();
        assert_eq!(error.to_string(), "update of node `parse` failed");
        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.to_string(), "invalid digit found in string");
    }
}
