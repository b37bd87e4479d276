//! State machines.
//!
//! A state machine folds the values of its input into a state. The first
//! update after activation produces the initial state; each later update
//! applies the transition to the current state and the new input.

use std::any::Any;

use crate::error::{NodeError, Result};

use super::handle::Ref;
use super::node::{arg, cell, Node, UpdateStatus, Value};
use super::runtime::Engine;

type Transition<S, I> = Box<dyn Fn(&S, &I) -> S>;

pub(crate) struct StateMachineNode<S, I> {
    initial: S,
    transition: Transition<S, I>,
    state: Option<S>,
}

impl<S: Value, I: Value> Node for StateMachineNode<S, I> {
    fn update(&mut self, initialized: bool, args: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        let next = match &self.state {
            Some(state) if initialized => (self.transition)(state, arg::<I>(args, 0)),
            _ => self.initial.clone(),
        };
        self.state = Some(next);

        // A transition is an event even when it lands on the same state.
        Ok(UpdateStatus::Changed)
    }

    fn value(&self) -> Option<&dyn Any> {
        self.state.as_ref().map(|state| state as &dyn Any)
    }

    fn label(&self) -> String {
        "state-machine".to_string()
    }

    fn deactivate(&mut self) {
        self.state = None;
    }
}

impl Engine {
    /// A node that starts in `initial` and moves to `transition(state, input)`
    /// whenever `input` changes.
    pub fn state_machine<S, I, F>(
        &self,
        initial: S,
        input: &Ref<I>,
        transition: F,
    ) -> Result<Ref<S>>
    where
        S: Value,
        I: Value,
        F: Fn(&S, &I) -> S + 'static,
    {
        let args = [input.id_in(self.shared())?];
        let node = StateMachineNode {
            initial,
            transition: Box::new(transition),
            state: None,
        };

        let v = self.shared().update(|network, _| {
            let v = network.add_node(cell(node), &args);
            network.add_ref(v);
            v
        });
        Ok(Ref::adopt(self.shared(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Door {
        Closed,
        Open,
        Locked,
    }

    fn step(door: &Door, input: &char) -> Door {
        match (door, input) {
            (Door::Closed, 'o') => Door::Open,
            (Door::Open, 'c') => Door::Closed,
            (Door::Closed, 'l') => Door::Locked,
            (Door::Locked, 'u') => Door::Closed,
            (door, _) => *door,
        }
    }

    #[test]
    fn transitions_follow_the_input() {
        let engine = Engine::new();
        let input = engine.var(' ');
        let door = engine.state_machine(Door::Closed, &input, step).unwrap();
        assert_eq!(door.label().unwrap(), "state-machine");

        let observed = door.observe().unwrap();
        assert_eq!(observed.get().unwrap(), Door::Closed);

        input.set('o').unwrap();
        assert_eq!(observed.get().unwrap(), Door::Open);
        input.set('l').unwrap();
        assert_eq!(observed.get().unwrap(), Door::Open);
        input.set('c').unwrap();
        input.set('l').unwrap();
        assert_eq!(observed.get().unwrap(), Door::Locked);
    }

    #[test]
    fn every_transition_reaches_the_observers() {
        let engine = Engine::new();
        let input = engine.var('a');
        let count = engine.state_machine(0, &input, |count, _| count + 1).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let logged = engine
            .inspect("log", &count, move |count| sink.borrow_mut().push(*count))
            .unwrap();
        let _observed = logged.observe().unwrap();

        input.set('b').unwrap();
        input.set('c').unwrap();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn reactivation_restarts_from_the_initial_state() {
        let engine = Engine::new();
        let input = engine.var(1);
        let total = engine.state_machine(100, &input, |total, x| total + x).unwrap();

        let observed = total.observe().unwrap();
        input.set(2).unwrap();
        assert_eq!(observed.get().unwrap(), 102);
        drop(observed);

        let observed = total.observe().unwrap();
        assert_eq!(observed.get().unwrap(), 100);
    }
}
