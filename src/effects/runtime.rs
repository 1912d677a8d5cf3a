//! Starting and stopping effects.
//!
//! Effects and cleanups are user code and may panic. Disposal marks every
//! handle `Disposed` before the first cleanup runs and keeps going when a
//! cleanup panics; the first panic is re-raised once all cleanups have run.

use super::handle::EffectHandle;
use crate::core::{
    Diagnostic, Dispatcher, EffectOutcome, EffectSender, Lifecycle, PendingEffect, RuntimeState,
};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Payload of a panic raised by an effect or cleanup.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Start `effects` against the settled `state`.
///
/// Only effects that return a cleanup are retained in the returned list.
/// Effects returning a future have their work spawned and are reported as
/// [`Diagnostic::UnguardedAsyncEffect`]; effects returning nothing are
/// fire-and-forget.
///
/// If an effect panics, the effects already started from this batch are
/// disposed before the panic continues.
pub fn start_effects(
    effects: Vec<PendingEffect>,
    state: &RuntimeState,
    dispatcher: &Arc<dyn Dispatcher>,
) -> Vec<EffectHandle> {
    let mut running = Vec::new();
    for PendingEffect { run, event } in effects {
        let lifecycle = Arc::new(Mutex::new(Lifecycle::Pending));
        let sender = EffectSender::new(Arc::clone(dispatcher), Arc::clone(&lifecycle));
        let started =
            panic::catch_unwind(AssertUnwindSafe(|| run(&state.context, &event, sender)));
        let outcome = match started {
            Ok(outcome) => outcome,
            Err(payload) => {
                *lifecycle.lock() = Lifecycle::Disposed;
                if dispose_effects(running).is_err() {
                    warn!(state = ?state.name(), "cleanup panicked after a failed effect start");
                }
                panic::resume_unwind(payload);
            }
        };
        *lifecycle.lock() = Lifecycle::Running;

        match outcome {
            EffectOutcome::Cleanup(cleanup) => {
                running.push(EffectHandle::new(event, Some(cleanup), lifecycle));
            }
            EffectOutcome::Pending(work) => {
                dispatcher.report(Diagnostic::UnguardedAsyncEffect {
                    state: state.name().unwrap_or_default().to_string(),
                });
                dispatcher.spawn(work);
            }
            EffectOutcome::Detached => {}
        }
    }
    debug!(state = ?state.name(), retained = running.len(), "effects started");
    running
}

/// Dispose every handle without letting a cleanup panic escape.
///
/// Returns the first panic raised by a cleanup, after every cleanup has run.
pub fn dispose_effects(running: Vec<EffectHandle>) -> Result<(), PanicPayload> {
    for handle in &running {
        handle.mark_disposed();
    }

    let count = running.len();
    let mut first_panic = None;
    for mut handle in running {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handle.dispose())) {
            if first_panic.is_none() {
                first_panic = Some(payload);
            }
        }
    }
    if count > 0 {
        debug!(disposed = count, "effects stopped");
    }
    first_panic.map_or(Ok(()), Err)
}

/// Dispose every running effect and return the now-empty list.
pub fn stop_effects(running: Vec<EffectHandle>) -> Vec<EffectHandle> {
    if let Err(payload) = dispose_effects(running) {
        panic::resume_unwind(payload);
    }
    Vec::new()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::Event;
    use futures::future::BoxFuture;

    /// Dispatcher that records everything it is given.
    #[derive(Default)]
    pub struct RecordingDispatcher {
        pub posted: Mutex<Vec<Event>>,
        pub spawned: Mutex<Vec<BoxFuture<'static, ()>>>,
        pub reported: Mutex<Vec<Diagnostic>>,
    }

    impl Dispatcher for RecordingDispatcher {
        fn post(&self, event: Event) {
            self.posted.lock().push(event);
        }

        fn spawn(&self, task: BoxFuture<'static, ()>) {
            self.spawned.lock().push(task);
        }

        fn report(&self, diagnostic: Diagnostic) {
            self.reported.lock().push(diagnostic);
        }
    }
}
