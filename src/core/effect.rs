//! The effect vocabulary: effect functions, their outcomes, and the guarded
//! sender handed to them. Starting and disposing effects is left to
//! [`crate::effects`].

use super::context::Context;
use super::diagnostic::Diagnostic;
use super::event::Event;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Cleanup callback returned by an effect.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// A side effect started when its state settles.
pub type EffectFn = Arc<dyn Fn(&Context, &Event, EffectSender) -> EffectOutcome + Send + Sync>;

/// An async operation started on enter. `Ok` is reported as a `done` event,
/// `Err` as an `error` event.
pub type InvokeFn =
    Arc<dyn Fn(&Context, &Event) -> BoxFuture<'static, Result<Value, Value>> + Send + Sync>;

/// What an effect hands back when started.
pub enum EffectOutcome {
    /// A cleanup to run when the effect is disposed. The effect is retained.
    Cleanup(Cleanup),
    /// Async work with no cleanup handle. It is spawned, not retained, and
    /// reported as [`Diagnostic::UnguardedAsyncEffect`].
    Pending(BoxFuture<'static, ()>),
    /// Fire-and-forget; nothing to retain.
    Detached,
}

impl EffectOutcome {
    pub fn cleanup<F>(cleanup: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        EffectOutcome::Cleanup(Box::new(cleanup))
    }

    pub fn pending<F>(work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        EffectOutcome::Pending(work.boxed())
    }
}

impl fmt::Debug for EffectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EffectOutcome::Cleanup(_) => "Cleanup",
            EffectOutcome::Pending(_) => "Pending",
            EffectOutcome::Detached => "Detached",
        };
        f.write_str(label)
    }
}

/// Lifecycle of one started effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// The effect function is running.
    Pending,
    /// The effect has started and may still send events.
    Running,
    /// The effect was disposed; its sends are dropped.
    Disposed,
}

/// Where effects deliver their events and async work.
///
/// A session implements this for its own effects. Implementations must
/// tolerate being called from any thread and from inside a dispatch.
pub trait Dispatcher: Send + Sync {
    /// Deliver an event to the owner.
    fn post(&self, event: Event);

    /// Run detached async work.
    fn spawn(&self, task: BoxFuture<'static, ()>);

    /// Surface a non-fatal diagnostic.
    fn report(&self, diagnostic: Diagnostic);
}

/// Sender handed to a running effect.
///
/// Once the effect is disposed, `send` is a no-op that raises
/// [`Diagnostic::PostDisposalSend`].
#[derive(Clone)]
pub struct EffectSender {
    dispatcher: Arc<dyn Dispatcher>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl EffectSender {
    pub(crate) fn new(
        dispatcher: Arc<dyn Dispatcher>,
        lifecycle: Arc<Mutex<Lifecycle>>,
    ) -> Self {
        Self {
            dispatcher,
            lifecycle,
        }
    }

    pub fn send(&self, event: impl Into<Event>) {
        let event = event.into();
        if self.is_disposed() {
            self.dispatcher.report(Diagnostic::PostDisposalSend {
                event: event.name().map(str::to_string),
            });
            return;
        }
        self.dispatcher.post(event);
    }

    /// Spawn async work on the owner's executor.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.spawn(task.boxed());
    }

    pub fn is_disposed(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Disposed
    }
}

impl fmt::Debug for EffectSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSender")
            .field("lifecycle", &*self.lifecycle.lock())
            .finish()
    }
}

/// An effect computed by a step, waiting to be started.
#[derive(Clone)]
pub struct PendingEffect {
    pub(crate) run: EffectFn,
    pub(crate) event: Event,
}

impl PendingEffect {
    pub fn new(run: EffectFn, event: Event) -> Self {
        Self { run, event }
    }

    /// The event that led to the settle this effect belongs to.
    pub fn event(&self) -> &Event {
        &self.event
    }
}

impl fmt::Debug for PendingEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEffect")
            .field("event", &self.event)
            .finish()
    }
}

