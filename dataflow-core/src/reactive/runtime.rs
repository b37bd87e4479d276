//! Reactive Runtime
//!
//! The runtime is the engine context every handle and node kind goes
//! through. It owns the [`Network`] and drives pumps over it.
//!
//! # How It Works
//!
//! 1. Node kinds register vertices through [`Engine`]; each registration
//!    hands back a counted handle.
//!
//! 2. Handles keep a weak link to the shared state. Cloning one adds a
//!    reference, dropping one releases it.
//!
//! 3. Setting a variable schedules its vertex:
//!    a. Inactive vertices are ignored.
//!    b. Outside a pump, a new pump starts from the vertex.
//!    c. Inside a pump, a vertex the running pass has not reached yet joins
//!       it. One the pass already visited waits for the next pass of the
//!       same pump, so no vertex is updated twice in one pass.
//!
//! # Re-entrancy
//!
//! Node updates run with the network released, so they may create nodes,
//! set variables, and clone or drop handles. Releases that arrive while a
//! pump runs or while the network is borrowed are queued and applied once
//! the engine is idle again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::EngineOptions;
use crate::error::Result;
use crate::graph::VertexId;

use super::context::EngineContext;
use super::network::Network;
use super::node::NodeCell;
use super::pump::{PumpStats, Step};

/// State shared between an engine and its handles.
pub(crate) struct Shared {
    pub(crate) network: RefCell<Network>,
    pumping: Cell<bool>,

    /// Vertices scheduled from inside a pump.
    scheduled: RefCell<Vec<VertexId>>,

    /// Vertices scheduled behind the cursor of the running pass.
    next_pass: RefCell<Vec<VertexId>>,

    /// Releases waiting for the engine to become idle.
    deferred: RefCell<Vec<VertexId>>,
}

/// Clears the pumping flag when a pump ends, also by unwinding.
struct Pumping<'a>(&'a Cell<bool>);

impl<'a> Pumping<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        assert!(!flag.replace(true), "pump started while pumping");
        Self(flag)
    }
}

impl Drop for Pumping<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Shared {
    fn new(options: EngineOptions) -> Self {
        Self {
            network: RefCell::new(Network::new(options)),
            pumping: Cell::new(false),
            scheduled: RefCell::new(Vec::new()),
            next_pass: RefCell::new(Vec::new()),
            deferred: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn is_pumping(&self) -> bool {
        self.pumping.get()
    }

    /// Mutate the network. Nodes removed on the way are dropped after the
    /// borrow ends.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut Network, &mut Vec<NodeCell>) -> R) -> R {
        let mut garbage = Vec::new();
        let result = {
            let mut network = self
                .network
                .try_borrow_mut()
                .unwrap_or_else(|_| panic!("engine re-entered from a node hook"));
            f(&mut network, &mut garbage)
        };

        drop(garbage);
        self.release_deferred();
        result
    }

    pub(crate) fn add_ref(&self, v: VertexId) {
        let mut network = self
            .network
            .try_borrow_mut()
            .unwrap_or_else(|_| panic!("handle cloned from a node hook"));
        network.add_ref(v);
    }

    pub(crate) fn release(&self, v: VertexId) {
        if self.pumping.get() || self.network.try_borrow_mut().is_err() {
            self.deferred.borrow_mut().push(v);
            return;
        }

        self.update(|network, garbage| network.release(v, garbage));
    }

    fn release_deferred(&self) {
        while !self.pumping.get() {
            let Some(v) = self.deferred.borrow_mut().pop() else {
                return;
            };

            let mut garbage = Vec::new();
            match self.network.try_borrow_mut() {
                Ok(mut network) => {
                    network.release(v, &mut garbage);
                }
                Err(_) => {
                    self.deferred.borrow_mut().push(v);
                    return;
                }
            }
            drop(garbage);
        }
    }

    /// Request an update of `v`.
    pub(crate) fn schedule(&self, v: VertexId) -> Result<()> {
        if self.pumping.get() {
            self.scheduled.borrow_mut().push(v);
            return Ok(());
        }

        let active = {
            let network = self.network.borrow();
            network.contains(v) && network.is_active(v)
        };
        if !active {
            return Ok(());
        }

        self.pump(Some(v))
    }

    /// Run a pump, starting from `start` if given. A pump is one pass,
    /// followed by another for as long as updates schedule vertices the
    /// previous pass had already gone past.
    pub(crate) fn pump(&self, start: Option<VertexId>) -> Result<()> {
        let result = {
            let _pumping = Pumping::enter(&self.pumping);
            if let Some(v) = start {
                self.network.borrow_mut().schedule(v);
            }
            self.run_passes()
        };

        self.release_deferred();
        result
    }

    fn run_passes(&self) -> Result<()> {
        loop {
            let before = {
                let mut network = self.network.borrow_mut();
                network.advance_time();
                network.stats
            };

            let result = self.run_pass();

            let mut network = self.network.borrow_mut();
            network.stats.pumps += 1;
            let after = network.stats;

            if let Err(error) = result {
                network.order.clear_marks();
                self.scheduled.borrow_mut().clear();
                self.next_pass.borrow_mut().clear();
                warn!(%error, "pump aborted");
                return Err(error);
            }

            debug!(
                updated = after.updated_nodes - before.updated_nodes,
                changed = after.changed_nodes - before.changed_nodes,
                "pass finished"
            );
            if network.options.verify_invariants {
                if let Some(violation) = network.invariant_violation() {
                    panic!("graph invariant violated: {}", violation);
                }
            }

            let next = std::mem::take(&mut *self.next_pass.borrow_mut());
            if next.is_empty() {
                return Ok(());
            }
            for v in next {
                network.schedule(v);
            }
        }
    }

    fn run_pass(&self) -> Result<()> {
        loop {
            let step = self.network.borrow_mut().next_step();

            match step {
                Step::Idle => return Ok(()),
                Step::Requeued => {}
                Step::Update(update) => {
                    let cursor = update.vertex();
                    let result = update.run();

                    let mut network = self.network.borrow_mut();
                    network.finish(update, result)?;
                    for v in self.scheduled.borrow_mut().drain(..) {
                        if !network.schedule_ahead(v, cursor) {
                            self.next_pass.borrow_mut().push(v);
                        }
                    }
                }
            }
        }
    }
}

/// The dataflow engine.
///
/// At most one engine runs per thread. Dropping it stops it; by then every
/// handle must be gone.
///
/// # Example
///
/// ```
/// use dataflow_core::Engine;
///
/// let engine = Engine::new();
/// let x = engine.var(10);
/// let y = engine.lift("inc", &x, |x| x + 1).unwrap();
/// let z = y.observe().unwrap();
/// assert_eq!(z.get().unwrap(), 11);
///
/// x.set(20).unwrap();
/// assert_eq!(z.get().unwrap(), 21);
/// ```
pub struct Engine {
    shared: Rc<Shared>,
    _context: EngineContext,
}

impl Engine {
    /// Start an engine with default options.
    ///
    /// # Panics
    ///
    /// Panics if an engine is already running on this thread.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let context = EngineContext::enter();
        debug!(?options, "engine started");

        Self {
            shared: Rc::new(Shared::new(options)),
            _context: context,
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.shared.network.borrow().options.clone()
    }

    pub fn stats(&self) -> PumpStats {
        self.shared.network.borrow().stats
    }

    /// Vertices in the graph, the root sentinel included.
    pub fn num_vertices(&self) -> usize {
        self.shared.network.borrow().num_vertices()
    }

    /// Entries in the topological order: the root sentinel plus every active
    /// node except constants.
    pub fn num_active_nodes(&self) -> usize {
        self.shared.network.borrow().num_active_nodes()
    }

    /// Total size of all nodes in bytes.
    pub fn memory_consumption(&self) -> usize {
        self.shared.network.borrow().memory_consumption()
    }

    pub fn is_pumping(&self) -> bool {
        self.shared.is_pumping()
    }

    pub(crate) fn shared(&self) -> &Rc<Shared> {
        &self.shared
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let network = self.shared.network.borrow();
        f.debug_struct("Engine")
            .field("vertices", &network.num_vertices())
            .field("active", &network.num_active_nodes())
            .field("stats", &network.stats)
            .finish()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let root = {
            let mut network = self.shared.network.borrow_mut();
            let leaked = network.num_vertices() - 1;

            if leaked > 0 {
                if std::thread::panicking() {
                    return;
                }
                panic!("engine stopped with {} live nodes", leaked);
            }

            debug!(stats = ?network.stats, "engine stopped");
            let root = network.root;
            network.graph.remove_vertex(root)
        };
        drop(root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn engine_starts_with_the_root_only() {
        let engine = Engine::new();
        assert_eq!(engine.num_vertices(), 1);
        assert_eq!(engine.num_active_nodes(), 1);
        assert_eq!(engine.stats(), PumpStats::default());
        assert!(!engine.is_pumping());
    }

    #[test]
    #[should_panic(expected = "already running")]
    fn second_engine_panics() {
        let _first = Engine::new();
        let _second = Engine::new();
    }

    #[test]
    fn engine_can_restart_after_stop() {
        drop(Engine::new());
        let engine = Engine::new();
        assert_eq!(engine.num_vertices(), 1);
    }

    #[test]
    #[should_panic(expected = "live nodes")]
    fn leaking_a_node_is_caught_at_stop() {
        let engine = Engine::new();
        let x = engine.var(1);
        std::mem::forget(x);
    }

    #[test]
    fn schedule_ignores_inactive_vertices() {
        let engine = Engine::new();
        let x = engine.var(1);
        x.set(2).unwrap();
        assert_eq!(engine.stats().pumps, 0);
    }

    #[test]
    fn failed_pump_leaves_the_engine_idle() {
        let engine = Engine::new();
        let x = engine.var(1);
        let y = engine
            .try_lift("checked", &x, |x| if *x > 0 { Ok(*x) } else { Err("negative") })
            .unwrap();
        let z = y.observe().unwrap();

        let error = x.set(-1).unwrap_err();
        assert!(matches!(error, Error::UpdateFailed { .. }));
        assert!(!engine.is_pumping());
        assert_eq!(z.get().unwrap(), 1);

        x.set(5).unwrap();
        assert_eq!(z.get().unwrap(), 5);
    }

    #[test]
    fn setting_a_visited_variable_runs_another_pass() {
        let engine = Engine::new();
        let x = engine.var(1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (input, log) = (x.clone(), seen.clone());
        let y = engine
            .lift("bounce", &x, move |x| {
                log.borrow_mut().push(*x);
                if *x == 2 {
                    input.set(3).unwrap();
                }
                *x
            })
            .unwrap();
        let z = y.observe().unwrap();
        let before = engine.stats();

        x.set(2).unwrap();
        let after = engine.stats();
        assert_eq!(z.get().unwrap(), 3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(after.pumps - before.pumps, 2);
        assert_eq!(after.updated_nodes - before.updated_nodes, 6);
    }

    #[test]
    fn setting_a_variable_ahead_joins_the_pass() {
        let engine = Engine::new();
        let x = engine.var(1);
        let w = engine.var(0);

        let target = w.clone();
        let y = engine
            .lift("forward", &x, move |x| {
                target.set(x * 10).unwrap();
                *x
            })
            .unwrap();
        let _y = y.observe().unwrap();
        let observed = w.observe().unwrap();
        assert_eq!(observed.get().unwrap(), 10);
        let before = engine.stats();

        x.set(2).unwrap();
        assert_eq!(observed.get().unwrap(), 20);
        assert_eq!(engine.stats().pumps - before.pumps, 1);
    }

    #[test]
    fn release_inside_an_update_is_deferred() {
        let engine = Engine::new();
        let x = engine.var(1);
        let held = RefCell::new(Some(engine.var(7)));
        let held = Rc::new(held);

        let inner = held.clone();
        let y = engine
            .lift("drop-held", &x, move |x| {
                inner.borrow_mut().take();
                *x
            })
            .unwrap();
        assert_eq!(engine.num_vertices(), 4);

        let z = y.observe().unwrap();
        assert!(held.borrow().is_none());
        assert_eq!(engine.num_vertices(), 4);
        assert_eq!(z.get().unwrap(), 1);
    }
}
