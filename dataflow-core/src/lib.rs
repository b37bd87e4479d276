//! Dataflow Core
//!
//! This crate provides an incremental dataflow engine. Programs build a
//! graph of nodes (variables, constants, lifted functions, conditionals and
//! state machines) and observe some of them; the engine keeps the observed
//! values up to date as variables change, recomputing each affected node
//! once per change.
//!
//! It implements:
//!
//! - A dependency graph with a dynamically maintained topological order
//! - Activation and deactivation of the observed part of the graph
//! - Single-pass change propagation ("pumps")
//! - Reference-counted node lifetime with transitive teardown
//! - Discrete time and signals
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Vertex arena, edges and the topological order
//! - `reactive`: The engine, its node kinds and handles
//! - `introspect`: Read-only views for diagnostics and tests
//!
//! # Example
//!
//! ```
//! use dataflow_core::Engine;
//!
//! let engine = Engine::new();
//! let celsius = engine.var(20.0);
//! let fahrenheit = engine.lift("to-f", &celsius, |c| c * 9.0 / 5.0 + 32.0).unwrap();
//!
//! let observed = fahrenheit.observe().unwrap();
//! assert_eq!(observed.get().unwrap(), 68.0);
//!
//! celsius.set(100.0).unwrap();
//! assert_eq!(observed.get().unwrap(), 212.0);
//! ```

pub mod graph;
pub mod introspect;
pub mod reactive;

mod config;
mod error;

pub use config::EngineOptions;
pub use error::{Error, NodeError, Result};
pub use reactive::{
    Eager, Engine, Metadata, Node, PumpStats, Ref, Signal, UpdateStatus, Value, Var,
};
