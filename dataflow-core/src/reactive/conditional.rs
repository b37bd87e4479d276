//! Conditional nodes.
//!
//! A conditional reads a selector and exactly one of its branches. Only the
//! selected branch is active; the others stay inert until the selector
//! picks them.

use std::any::Any;

use crate::error::{NodeError, Result};

use super::handle::Ref;
use super::node::{arg, cell, Node, UpdateStatus, Value};
use super::runtime::Engine;

/// Maps a selector value to a branch index.
type Choose = fn(&dyn Any, usize) -> usize;

pub(crate) struct ConditionalNode<T> {
    label: &'static str,
    choose: Choose,
    value: Option<T>,
}

impl<T> ConditionalNode<T> {
    pub(crate) fn new(label: &'static str, choose: Choose) -> Self {
        Self {
            label,
            choose,
            value: None,
        }
    }
}

impl<T: Value> Node for ConditionalNode<T> {
    /// `args` holds the selector and the selected branch.
    fn update(&mut self, initialized: bool, args: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        let next = arg::<T>(args, 1);
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
        self.label.to_string()
    }

    fn deactivate(&mut self) {
        self.value = None;
    }

    fn select(&self, selector: &dyn Any, branches: usize) -> usize {
        (self.choose)(selector, branches)
    }
}

fn choose_if(selector: &dyn Any, _: usize) -> usize {
    if *arg::<bool>(&[selector], 0) {
        0
    } else {
        1
    }
}

fn choose_index(selector: &dyn Any, branches: usize) -> usize {
    (*arg::<usize>(&[selector], 0)).min(branches - 1)
}

impl Engine {
    /// `then` while `cond` holds, `otherwise` when it does not.
    pub fn if_else<T: Value>(
        &self,
        cond: &Ref<bool>,
        then: &Ref<T>,
        otherwise: &Ref<T>,
    ) -> Result<Ref<T>> {
        let args = [
            cond.id_in(self.shared())?,
            then.id_in(self.shared())?,
            otherwise.id_in(self.shared())?,
        ];

        let v = self.shared().update(|network, _| {
            let node = ConditionalNode::<T>::new("if", choose_if);
            let v = network.add_conditional_node(cell(node), &args);
            network.add_ref(v);
            v
        });
        Ok(Ref::adopt(self.shared(), v))
    }

    /// The value paired with the first condition that holds, or `default`
    /// when none does.
    ///
    /// Conditions are evaluated by a selector node; only the chosen value
    /// is active.
    pub fn switch<T: Value>(
        &self,
        cases: &[(&Ref<bool>, &Ref<T>)],
        default: &Ref<T>,
    ) -> Result<Ref<T>> {
        let mut conditions = Vec::with_capacity(cases.len());
        let mut branches = Vec::with_capacity(cases.len() + 1);
        for (cond, value) in cases {
            conditions.push(cond.id_in(self.shared())?);
            branches.push(value.id_in(self.shared())?);
        }
        branches.push(default.id_in(self.shared())?);

        let selector = super::lift::LiftNode::new("switch-selector", |args| {
            let first = (0..args.len()).find(|&index| *arg::<bool>(args, index));
            Ok(first.unwrap_or(args.len()))
        });
        let selector = self.add_lift(selector, &conditions);

        let mut args = vec![selector.id()];
        args.extend(branches);

        let v = self.shared().update(|network, _| {
            let node = ConditionalNode::<T>::new("switch", choose_index);
            let v = network.add_conditional_node(cell(node), &args);
            network.add_ref(v);
            v
        });
        Ok(Ref::adopt(self.shared(), v))
    }
}
