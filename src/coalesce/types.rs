//! Error types for request coalescing.

use thiserror::Error;

/// Coalescing errors.
///
/// Clonable so that one failed shared execution can be delivered identically
/// to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoalesceError {
    /// The shared operation behind the key failed; every waiter for that key
    /// receives this same error.
    #[error("coalesced operation failed: {0}")]
    Operation(String),

    /// The driver task delivering the shared outcome went away, typically
    /// because the runtime is shutting down.
    #[error("coalesced execution was dropped before delivering a result")]
    ExecutionDropped,

    /// A batched loader returned a value list whose length does not match
    /// the requested key list.
    #[error("batch function returned {got} values for {expected} keys")]
    BatchShapeMismatch { expected: usize, got: usize },
}

impl CoalesceError {
    /// Wrap an arbitrary operation error.
    pub fn operation(err: impl std::fmt::Display) -> Self {
        Self::Operation(err.to_string())
    }
}
