//! Dependency Graph
//!
//! This module implements the structures the engine keeps its dataflow
//! network in.
//!
//! # Overview
//!
//! - A directed acyclic graph where vertices are nodes and edges point from
//!   a consumer to a dependency. Edges exist structurally from construction
//!   on but only carry data while enabled.
//! - A topological order over the currently active vertices: every enabled
//!   dependency precedes its consumers. A subset of the order is marked dirty
//!   and drives propagation.
//!
//! # Design Decisions
//!
//! 1. Vertices live in an arena indexed by generation-checked ids rather than
//!    behind pointers, so a stale id is detected instead of aliasing a new
//!    vertex.
//!
//! 2. Positions in the order are stable slots of an intrusive linked list, so
//!    a vertex can be moved next to a known neighbour in O(1) and keep its
//!    dirty mark.
//!
//! 3. Edges carry an explicit kind. The logical (ordering) edge of an active
//!    vertex is always its last out-edge; the engine asserts this instead of
//!    relying on the convention silently.

mod dependency;
mod order;
mod vertex;

pub use dependency::DependencyGraph;
pub use order::{Iter, Position, TopologicalOrder};
pub use vertex::{Edge, EdgeKind, Vertex, VertexFlags, VertexId};
