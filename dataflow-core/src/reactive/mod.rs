//! Reactive Engine
//!
//! This module implements the dataflow engine: activation of the observed
//! part of a dependency graph, propagation of changes through it, and the
//! reference-counted lifetime of its nodes.
//!
//! # Concepts
//!
//! ## Activation
//!
//! Nodes start inert. Observing a node makes it and everything it reads
//! active: they get a place in the topological order and receive updates.
//! When nothing observes a node any more it is deactivated again, together
//! with the dependencies only it kept active.
//!
//! ## Pumps
//!
//! Setting a variable marks it dirty and runs a pump: one pass over the
//! marked part of the order that updates each dirty node after its
//! dependencies and marks the consumers of every node that changed. Updates
//! that schedule nodes the pass already went past get a further pass.
//!
//! ## Conditionals
//!
//! A conditional node reads only the branch its selector picks. Switching
//! branches activates the new branch and may deactivate the old one during
//! the pump.
//!
//! ## Time
//!
//! Each pass of a pump is one tick of discrete time. The tick count is
//! available as a node, and signals let callers inject events that carry no
//! value.
//!
//! ## Lifetime
//!
//! Handles count references. Dropping the last handle to a node destroys it
//! and every dependency nothing else references.
//!
//! # Implementation Notes
//!
//! [`Engine`] is an explicit context object; at most one runs per thread.
//! Handles keep a weak link to it and report [`Error::EngineStopped`] once it
//! is gone.
//!
//! [`Error::EngineStopped`]: crate::Error::EngineStopped

mod activation;
mod conditional;
mod constant;
mod context;
mod eager;
mod handle;
mod lifecycle;
mod lift;
mod network;
mod node;
mod pump;
mod runtime;
mod state_machine;
mod time;
mod var;

pub use context::EngineContext;
pub use eager::Eager;
pub use handle::Ref;
pub use node::{Metadata, Node, NodeCell, UpdateStatus, Value};
pub use pump::PumpStats;
pub use runtime::Engine;
pub use time::Signal;
pub use var::Var;
