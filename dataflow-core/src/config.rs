//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Options an [`Engine`](crate::reactive::Engine) is started with.
///
/// Every field has a default, so partial documents deserialize:
///
/// ```rust
/// use dataflow_core::EngineOptions;
///
/// let options: EngineOptions = serde_json::from_str(r#"{ "trace_updates": true }"#).unwrap();
/// assert!(options.trace_updates);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Initial capacity of the vertex arena and the topological order.
    pub capacity: usize,

    /// Emit a `trace` event for every node update.
    pub trace_updates: bool,

    /// Check the graph invariants after every pump and panic on violation.
    pub verify_invariants: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            capacity: 64,
            trace_updates: false,
            verify_invariants: cfg!(debug_assertions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options: EngineOptions = serde_json::from_str(r#"{ "capacity": 1024 }"#).unwrap();

        assert_eq!(options.capacity, 1024);
        assert!(!options.trace_updates);
        assert_eq!(options.verify_invariants, cfg!(debug_assertions));
    }

    #[test]
    fn options_round_trip_through_json() {
        let options = EngineOptions {
            capacity: 8,
            trace_updates: true,
            verify_invariants: false,
        };

        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(serde_json::from_str::<EngineOptions>(&json).unwrap(), options);
    }
}
