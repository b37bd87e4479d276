//! Discrete Time
//!
//! Every pass of a pump is one tick. The engine counts ticks and exposes the
//! count as a node, so that nodes can react to time passing, and provides
//! signals: nodes that carry no value of their own and report a change each
//! time they are emitted.
//!
//! # Example
//!
//! ```
//! use dataflow_core::Engine;
//!
//! let engine = Engine::new();
//! let clicks = engine.signal();
//! let count = engine.state_machine(0, &clicks, |n, _| n + 1).unwrap();
//! let observed = count.observe().unwrap();
//!
//! clicks.emit().unwrap();
//! clicks.emit().unwrap();
//! assert_eq!(observed.get().unwrap(), 2);
//! ```

use std::any::Any;
use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;

use crate::error::{NodeError, Result};

use super::handle::Ref;
use super::node::{cell, Node, UpdateStatus};
use super::runtime::Engine;

/// Reads the engine's tick counter.
pub(crate) struct TimeNode {
    ticks: Rc<Cell<u64>>,
    value: Option<u64>,
}

impl Node for TimeNode {
    fn update(&mut self, initialized: bool, _: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        let now = self.ticks.get();
        let changed = !initialized || self.value != Some(now);
        self.value = Some(now);
        Ok(UpdateStatus::from_changed(changed))
    }

    fn value(&self) -> Option<&dyn Any> {
        self.value.as_ref().map(|value| value as &dyn Any)
    }

    fn label(&self) -> String {
        "time".to_string()
    }

    fn deactivate(&mut self) {
        self.value = None;
    }
}

pub(crate) struct SignalNode {
    value: bool,
}

impl Node for SignalNode {
    fn update(&mut self, _: bool, _: &[&dyn Any]) -> Result<UpdateStatus, NodeError> {
        Ok(UpdateStatus::Changed)
    }

    fn value(&self) -> Option<&dyn Any> {
        Some(&self.value)
    }

    fn label(&self) -> String {
        "signal".to_string()
    }
}

/// Handle to a signal.
///
/// Dereferences to the signal's [`Ref`], whose value is always `true`.
pub struct Signal {
    node: Ref<bool>,
}

impl Signal {
    /// Fire the signal: its consumers update as if its value had changed.
    pub fn emit(&self) -> Result<()> {
        let engine = self.node.engine()?;
        engine.schedule(self.node.id())
    }
}

impl Deref for Signal {
    type Target = Ref<bool>;

    fn deref(&self) -> &Ref<bool> {
        &self.node
    }
}

impl Clone for Signal {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signal").field(&self.node).finish()
    }
}

impl Engine {
    /// Ticks elapsed: one per pass run by this engine.
    pub fn ticks(&self) -> u64 {
        self.shared().network.borrow().ticks()
    }

    /// The current tick as a node. All calls share one node, which is
    /// updated at the start of every pass while it is active.
    pub fn current_time(&self) -> Ref<u64> {
        let v = self.shared().update(|network, _| {
            let v = match network.time {
                Some(v) => v,
                None => {
                    let node = TimeNode {
                        ticks: network.ticks.clone(),
                        value: None,
                    };
                    let v = network.add_node(cell(node), &[]);
                    network.time = Some(v);
                    v
                }
            };
            network.add_ref(v);
            v
        });
        Ref::adopt(self.shared(), v)
    }

    /// Create a signal.
    pub fn signal(&self) -> Signal {
        let v = self.shared().update(|network, _| {
            let v = network.add_node(cell(SignalNode { value: true }), &[]);
            network.add_ref(v);
            v
        });

        Signal {
            node: Ref::adopt(self.shared(), v),
        }
    }
}
