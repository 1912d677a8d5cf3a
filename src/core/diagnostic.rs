//! Non-fatal runtime diagnostics.

use thiserror::Error;

/// Warnings raised while running effects.
///
/// These never interrupt the engine. They point at user effects that are
/// likely to leak work or state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Diagnostic {
    #[error(
        "effect started in state '{state}' returned a future without a cleanup; \
         use an invoke for async work"
    )]
    UnguardedAsyncEffect { state: String },

    #[error("event {event:?} sent through an effect that was already disposed; it was dropped")]
    PostDisposalSend { event: Option<String> },

    #[error("no async runtime available; a spawned task was dropped")]
    SpawnUnavailable,
}
