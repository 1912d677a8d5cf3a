//! Compile errors for machine descriptions.

use thiserror::Error;

/// Errors that can occur when compiling a [`Description`](super::Description).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A malformed declaration: empty names, or a hook kind used where it is
    /// not accepted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A transition or immediate names a state that was never declared.
    #[error("Invalid transition target: {0}")]
    InvalidTransitionTarget(String),

    /// Unguarded first immediates that lead back to an already visited state.
    #[error("Unconditional immediate cycle: {}", .0.join(" -> "))]
    UnconditionalImmediateCycle(Vec<String>),
}
