//! Engine Context
//!
//! Tracks whether an engine is running on the current thread.
//!
//! # Implementation
//!
//! A thread-local flag is set when an [`Engine`](super::Engine) starts and
//! cleared when it stops. The engine holds an [`EngineContext`] guard, so the
//! flag follows ordinary ownership: dropping the engine (or unwinding through
//! it) releases the slot for the next one.

use std::cell::Cell;

thread_local! {
    static ENGINE_RUNNING: Cell<bool> = const { Cell::new(false) };
}

/// Guard that marks the current thread as running an engine.
#[derive(Debug)]
pub struct EngineContext {
    _private: (),
}

impl EngineContext {
    /// Claim the current thread for a new engine.
    ///
    /// # Panics
    ///
    /// Panics if an engine is already running on this thread.
    pub fn enter() -> Self {
        ENGINE_RUNNING.with(|running| {
            assert!(
                !running.replace(true),
                "an engine is already running on this thread"
            );
        });

        Self { _private: () }
    }

    /// Check if an engine is running on the current thread.
    pub fn is_active() -> bool {
        ENGINE_RUNNING.with(Cell::get)
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        ENGINE_RUNNING.with(|running| {
            let was_running = running.replace(false);
            debug_assert!(was_running, "engine context released twice");
        });
    }
}
