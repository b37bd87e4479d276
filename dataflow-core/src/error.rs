//! Error types for the dataflow engine.
//!
//! Only conditions a caller can trigger are reported through [`Error`].
//! Broken engine invariants are bugs and panic instead.

use thiserror::Error;

/// Error returned by a node's update hook.
pub type NodeError = Box<dyn std::error::Error + 'static>;

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A handle was used after the engine it belongs to was dropped.
    #[error("the engine this handle belongs to has been stopped")]
    EngineStopped,

    /// A node was built from handles of another engine instance.
    #[error("handle belongs to a different engine instance")]
    EngineMismatch,

    /// An observation was requested while a pump was running.
    #[error("cannot observe a node while a pump is in progress")]
    PumpInProgress,

    /// A node update failed and the pump was abandoned.
    #[error("update of node `{label}` failed")]
    UpdateFailed {
        label: String,
        #[source]
        source: NodeError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
