//! The effectful shell around the pure transition core.
//!
//! Effects are computed by [`step`](crate::core::step) but only started
//! here, once a session commits a settled state. A session keeps the
//! effects it started and disposes them on the next external transition
//! or when it stops.
//!
//! # Key Concepts
//!
//! - **Effects**: functions started with the settled context, returning an
//!   optional cleanup
//! - **Invokes**: async operations reported back as `done` / `error` events
//! - **Sessions**: the only mutable aggregate, serializing all sends

mod handle;
pub mod invoke;
pub(crate) mod runtime;
mod session;
mod spawn;

pub use crate::core::{
    Cleanup, Diagnostic, Dispatcher, EffectFn, EffectOutcome, EffectSender, InvokeFn, Lifecycle,
    PendingEffect,
};
pub use handle::EffectHandle;
pub use invoke::{DONE_EVENT, ERROR_EVENT};
pub use runtime::{dispose_effects, start_effects, stop_effects};
pub use session::{DiagnosticHook, EffectMode, Listener, Session, SessionBuilder, Subscription};
pub use spawn::{HandleSpawner, SpawnUnavailable, Spawner, TokioSpawner};
