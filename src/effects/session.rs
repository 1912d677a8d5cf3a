//! Sessions: a running instance of a shared machine.
//!
//! A [`Session`] owns one `(state, running effects)` pair. Every `send`
//! steps the machine, commits the new snapshot, reconciles effects when the
//! transition was external, and notifies subscribers.
//!
//! Events sent while a dispatch is already in progress on the same thread
//! (from an effect, a cleanup or a subscriber) are queued and processed in
//! order before the outermost `send` returns. A `send` from another thread
//! waits for the running dispatch to finish, so it returns only after its
//! own event has been applied. The state lock is never held while user code
//! runs.

use super::handle::EffectHandle;
use super::runtime::{dispose_effects, start_effects, stop_effects};
use super::spawn::{Spawner, TokioSpawner};
use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::core::{
    step, Context, Diagnostic, Dispatcher, Event, Machine, PendingEffect, RuntimeState,
    StateHistory, Step, TransitionRecord,
};
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::panic;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Callback notified with the new snapshot after every processed event.
pub type Listener = Arc<dyn Fn(&RuntimeState) + Send + Sync>;

/// Callback receiving runtime diagnostics.
pub type DiagnosticHook = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// When effects computed by a transition are started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EffectMode {
    /// `send` disposes old effects and starts new ones before returning.
    #[default]
    Immediate,
    /// Effects wait until the host calls [`Session::flush_effects`].
    Deferred,
}

/// Builder for configuring and starting a session.
///
/// # Example
///
/// ```rust
/// use statewise::builder::{transition, Description};
/// use statewise::core::Hooks;
/// use statewise::effects::{EffectMode, SessionBuilder};
/// use serde_json::json;
///
/// let machine = Description::new()
///     .state("idle", vec![transition("start", "running", Hooks::new())])
///     .state("running", vec![])
///     .compile()
///     .unwrap();
///
/// let session = SessionBuilder::new(machine)
///     .context(json!({ "attempts": 0 }))
///     .effect_mode(EffectMode::Deferred)
///     .record_history(true)
///     .build();
///
/// session.send("start");
/// assert!(session.state().matches("running"));
/// assert!(session.state().is_final);
/// ```
pub struct SessionBuilder {
    machine: Arc<Machine>,
    context: Context,
    spawner: Arc<dyn Spawner>,
    effect_mode: EffectMode,
    record_history: bool,
    on_diagnostic: Option<DiagnosticHook>,
}

impl SessionBuilder {
    pub fn new(machine: impl Into<Arc<Machine>>) -> Self {
        Self {
            machine: machine.into(),
            context: Value::Null,
            spawner: Arc::new(TokioSpawner),
            effect_mode: EffectMode::Immediate,
            record_history: true,
            on_diagnostic: None,
        }
    }

    /// Set the initial context.
    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Set the executor used for invokes and async effect work.
    pub fn spawner(mut self, spawner: impl Spawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    pub fn effect_mode(mut self, mode: EffectMode) -> Self {
        self.effect_mode = mode;
        self
    }

    /// Enable or disable transition history recording.
    pub fn record_history(mut self, enabled: bool) -> Self {
        self.record_history = enabled;
        self
    }

    /// Observe diagnostics in addition to the `tracing` warning.
    pub fn on_diagnostic<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        self.on_diagnostic = Some(Arc::new(hook));
        self
    }

    /// Create the session and run the machine's initial transition.
    pub fn build(self) -> Session {
        let context = self.context.clone();
        let shared = self.into_shared(RuntimeState::unstarted(context), StateHistory::new());
        shared.dispatch(Event::init());
        Session { shared }
    }

    /// Restore a session from a checkpoint without re-running the initial
    /// transition. The restored state's enter effects are started again.
    pub fn resume(self, checkpoint: Checkpoint) -> Result<Session, CheckpointError> {
        checkpoint.check_version()?;
        let Checkpoint { state, history, .. } = checkpoint;

        let Some(name) = state.name.clone() else {
            let shared = self.into_shared(state, history);
            shared.dispatch(Event::init());
            return Ok(Session { shared });
        };

        let node = self.machine.state(&name).ok_or_else(|| {
            CheckpointError::ValidationFailed(format!("state '{name}' is not part of this machine"))
        })?;
        let effects: Vec<PendingEffect> = node
            .enter()
            .effect_fns()
            .map(|run| PendingEffect::new(run.clone(), Event::init()))
            .collect();
        let state = RuntimeState {
            is_final: node.is_final(),
            ..state
        };

        let shared = self.into_shared(state, history);
        shared.core.lock().pending = Some(effects);
        if shared.options.effect_mode == EffectMode::Immediate {
            shared.flush_effects();
        }
        debug!(state = %name, "session resumed from checkpoint");
        Ok(Session { shared })
    }

    fn into_shared(self, state: RuntimeState, history: StateHistory) -> Arc<Shared> {
        Arc::new(Shared {
            machine: self.machine,
            options: Options {
                spawner: self.spawner,
                effect_mode: self.effect_mode,
                record_history: self.record_history,
                on_diagnostic: self.on_diagnostic,
            },
            core: Mutex::new(Core {
                state,
                prev: None,
                pending: None,
                running: Vec::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
                active: true,
                history,
            }),
            mailbox: Mutex::new(VecDeque::new()),
            turn: ReentrantMutex::new(Cell::new(false)),
        })
    }
}

struct Options {
    spawner: Arc<dyn Spawner>,
    effect_mode: EffectMode,
    record_history: bool,
    on_diagnostic: Option<DiagnosticHook>,
}

struct Core {
    state: RuntimeState,
    prev: Option<RuntimeState>,
    pending: Option<Vec<PendingEffect>>,
    running: Vec<EffectHandle>,
    subscribers: Vec<(u64, Listener)>,
    next_subscriber: u64,
    active: bool,
    history: StateHistory,
}

struct Shared {
    machine: Arc<Machine>,
    options: Options,
    core: Mutex<Core>,
    mailbox: Mutex<VecDeque<Event>>,
    /// Held by the thread processing events. The flag is set while that
    /// thread is draining the mailbox.
    turn: ReentrantMutex<Cell<bool>>,
}

impl Shared {
    fn dispatch(self: &Arc<Self>, event: Event) {
        if !self.core.lock().active {
            debug!(event = ?event.name(), "event sent to stopped session ignored");
            return;
        }
        let turn = self.turn.lock();
        self.mailbox.lock().push_back(event);
        if turn.get() {
            // Re-entrant send; the outer frame on this thread drains it.
            return;
        }

        turn.set(true);
        let _guard = DrainGuard {
            shared: self,
            draining: &turn,
        };
        loop {
            let next = self.mailbox.lock().pop_front();
            let Some(event) = next else { break };
            self.process(event);
        }
    }

    fn process(self: &Arc<Self>, event: Event) {
        let current = {
            let core = self.core.lock();
            if !core.active {
                return;
            }
            core.state.clone()
        };

        let Step { state: next, effects } = step(&self.machine, &current, &event);

        let listeners: Vec<Listener> = {
            let mut core = self.core.lock();
            if !core.active {
                return;
            }
            let external = effects.is_some();
            if let Some(to) = next.name().filter(|_| external && self.options.record_history) {
                core.history = core.history.record(TransitionRecord {
                    from: current.name.clone(),
                    to: to.to_string(),
                    event: event.name().map(str::to_string),
                    timestamp: Utc::now(),
                });
            }
            core.prev = Some(std::mem::replace(&mut core.state, next.clone()));
            if let Some(effects) = effects {
                core.pending = Some(effects);
            }
            core.subscribers
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        if self.options.effect_mode == EffectMode::Immediate {
            self.flush_effects();
        }
        for listener in listeners {
            listener(&next);
        }
    }

    /// Dispose the running effects and start the pending ones.
    ///
    /// A panicking cleanup does not stop the pending effects from starting.
    /// The panic is re-raised once the new effects are in place.
    fn flush_effects(self: &Arc<Self>) {
        let _turn = self.turn.lock();
        let (pending, previous, state) = {
            let mut core = self.core.lock();
            if !core.active {
                return;
            }
            let Some(pending) = core.pending.take() else {
                return;
            };
            (pending, std::mem::take(&mut core.running), core.state.clone())
        };

        let disposal = dispose_effects(previous);
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(SessionLink {
            shared: Arc::downgrade(self),
        });
        let started = start_effects(pending, &state, &dispatcher);

        let orphaned = {
            let mut core = self.core.lock();
            if core.active {
                core.running.extend(started);
                Vec::new()
            } else {
                started
            }
        };
        stop_effects(orphaned);

        if let Err(payload) = disposal {
            panic::resume_unwind(payload);
        }
    }

    fn stop(&self) {
        let running = {
            let mut core = self.core.lock();
            if !core.active {
                return;
            }
            core.active = false;
            core.pending = None;
            core.subscribers.clear();
            std::mem::take(&mut core.running)
        };
        self.mailbox.lock().clear();
        stop_effects(running);
        debug!("session stopped");
    }

    fn report(&self, diagnostic: Diagnostic) {
        warn!(%diagnostic, "effect diagnostic");
        if let Some(hook) = &self.options.on_diagnostic {
            hook(&diagnostic);
        }
    }
}

/// Resets the drain flag, and drops queued events if a hook panicked.
struct DrainGuard<'a> {
    shared: &'a Shared,
    draining: &'a Cell<bool>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared.mailbox.lock().clear();
        }
        self.draining.set(false);
    }
}

/// The dispatcher handed to a session's effects.
struct SessionLink {
    shared: Weak<Shared>,
}

impl Dispatcher for SessionLink {
    fn post(&self, event: Event) {
        match self.shared.upgrade() {
            Some(shared) => shared.dispatch(event),
            None => debug!(event = ?event.name(), "event sent after session was dropped"),
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if shared.options.spawner.spawn(task).is_err() {
            shared.report(Diagnostic::SpawnUnavailable);
        }
    }

    fn report(&self, diagnostic: Diagnostic) {
        match self.shared.upgrade() {
            Some(shared) => shared.report(diagnostic),
            None => warn!(%diagnostic, "effect diagnostic"),
        }
    }
}

/// A running machine instance.
///
/// Dropping a session stops it, disposing any running effects.
///
/// # Example
///
/// ```rust
/// use statewise::builder::{transition, Description};
/// use statewise::core::Hooks;
/// use statewise::effects::Session;
/// use serde_json::json;
///
/// let machine = Description::new()
///     .state("off", vec![transition("toggle", "on", Hooks::new())])
///     .state("on", vec![transition("toggle", "off", Hooks::new())])
///     .compile()
///     .unwrap();
///
/// let session = Session::new(machine, json!({}));
/// assert!(session.state().matches("off"));
///
/// session.send("toggle");
/// assert!(session.state().matches("on"));
/// ```
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Create a session with default options and run the initial transition.
    pub fn new(machine: impl Into<Arc<Machine>>, context: Context) -> Self {
        SessionBuilder::new(machine).context(context).build()
    }

    pub fn builder(machine: impl Into<Arc<Machine>>) -> SessionBuilder {
        SessionBuilder::new(machine)
    }

    /// Current snapshot.
    pub fn state(&self) -> RuntimeState {
        self.shared.core.lock().state.clone()
    }

    /// Snapshot before the most recently processed event.
    pub fn previous(&self) -> Option<RuntimeState> {
        self.shared.core.lock().prev.clone()
    }

    pub fn machine(&self) -> &Arc<Machine> {
        &self.shared.machine
    }

    /// Send an event or a bare event name. Ignored once stopped.
    ///
    /// Returns once the event and everything it queued have been processed.
    /// While another thread is processing events, this call blocks until that
    /// thread is done. A hook must therefore not wait on another thread that
    /// sends to the same session.
    pub fn send(&self, event: impl Into<Event>) {
        self.shared.dispatch(event.into());
    }

    /// Register a listener called after every processed event.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RuntimeState) + Send + Sync + 'static,
    {
        let mut core = self.shared.core.lock();
        let id = core.next_subscriber;
        core.next_subscriber += 1;
        if core.active {
            core.subscribers.push((id, Arc::new(listener)));
        }
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Dispose running effects and make the session permanently inert.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_running(&self) -> bool {
        self.shared.core.lock().active
    }

    /// Start effects computed by the last external transition, disposing
    /// the previous set first. Does nothing when no effects are pending.
    pub fn flush_effects(&self) {
        self.shared.flush_effects();
    }

    /// Number of started effects holding a cleanup.
    pub fn running_effects(&self) -> usize {
        self.shared.core.lock().running.len()
    }

    pub fn has_pending_effects(&self) -> bool {
        self.shared.core.lock().pending.is_some()
    }

    pub fn history(&self) -> StateHistory {
        self.shared.core.lock().history.clone()
    }

    /// Capture the current snapshot and history.
    pub fn checkpoint(&self) -> Checkpoint {
        let core = self.shared.core.lock();
        Checkpoint::new(core.state.clone(), core.history.clone())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("Session")
            .field("state", &core.state)
            .field("running_effects", &core.running.len())
            .field("active", &core.active)
            .finish()
    }
}

/// Handle returned by [`Session::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .core
                .lock()
                .subscribers
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{enter, internal, transition, Description};
    use crate::core::Hooks;
    use crate::effects::{EffectOutcome, EffectSender};
    use serde_json::json;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    /// Enter hooks whose effect counts starts and cleanups.
    fn counted(starts: &Arc<AtomicUsize>, stops: &Arc<AtomicUsize>) -> Hooks {
        let starts = Arc::clone(starts);
        let stops = Arc::clone(stops);
        Hooks::new().effect(move |_, _, _| {
            starts.fetch_add(1, Ordering::SeqCst);
            let stops = Arc::clone(&stops);
            EffectOutcome::cleanup(move || {
                stops.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    fn toggle() -> Machine {
        Description::new()
            .state("off", vec![transition("toggle", "on", Hooks::new())])
            .state("on", vec![transition("toggle", "off", Hooks::new())])
            .compile()
            .unwrap()
    }

    fn diagnostics(builder: SessionBuilder) -> (SessionBuilder, Arc<Mutex<Vec<Diagnostic>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let builder = builder.on_diagnostic(move |diagnostic| sink.lock().push(diagnostic.clone()));
        (builder, seen)
    }

    #[test]
    fn construction_enters_first_declared_state() {
        let session = Session::new(toggle(), json!({ "n": 1 }));
        let state = session.state();
        assert!(state.matches("off"));
        assert_eq!(state.context, json!({ "n": 1 }));
        assert_eq!(session.previous().and_then(|prev| prev.name), None);
    }

    #[test]
    fn empty_machine_stays_unstarted() {
        let session = Session::new(Description::new().compile().unwrap(), json!({}));
        assert_eq!(session.state().name(), None);
        session.send("anything");
        assert_eq!(session.state().name(), None);
    }

    #[test]
    fn subscribers_are_notified_after_every_send() {
        let session = Session::new(toggle(), json!({}));
        let calls = counter();
        let seen = Arc::clone(&calls);
        let _subscription = session.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        session.send("toggle");
        session.send("unknown");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(session.state().matches("on"));
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let session = Session::new(toggle(), json!({}));
        let calls = counter();
        let seen = Arc::clone(&calls);
        let subscription = session.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        session.send("toggle");
        subscription.unsubscribe();
        subscription.unsubscribe();
        session.send("toggle");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn external_transition_disposes_previous_effects() {
        let (starts, stops) = (counter(), counter());
        let machine = Description::new()
            .state(
                "a",
                vec![transition("go", "b", Hooks::new()), enter(counted(&starts, &stops))],
            )
            .state("b", vec![transition("back", "a", Hooks::new())])
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(session.running_effects(), 1);

        session.send("go");
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(session.running_effects(), 0);

        session.send("back");
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(session.running_effects(), 1);
    }

    #[test]
    fn internal_transition_keeps_effects_running() {
        let (starts, stops) = (counter(), counter());
        let machine = Description::new()
            .state(
                "counting",
                vec![
                    internal(
                        "tick",
                        Hooks::new()
                            .assign(|ctx, _| json!({ "n": ctx["n"].as_i64().unwrap_or(0) + 1 })),
                    ),
                    enter(counted(&starts, &stops)),
                ],
            )
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({ "n": 0 }));
        session.send("tick");
        session.send("tick");

        assert_eq!(session.state().context, json!({ "n": 2 }));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(session.running_effects(), 1);
    }

    #[test]
    fn self_transition_restarts_effects() {
        let (starts, stops) = (counter(), counter());
        let machine = Description::new()
            .state(
                "polling",
                vec![transition("retry", "polling", Hooks::new()), enter(counted(&starts, &stops))],
            )
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        session.send("retry");
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(session.running_effects(), 1);
    }

    #[test]
    fn sends_from_effects_are_queued_in_order() {
        let machine = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new())])
            .state(
                "b",
                vec![
                    transition("next", "c", Hooks::new()),
                    enter(Hooks::new().effect(|_, _, send: EffectSender| {
                        send.send("next");
                        EffectOutcome::Detached
                    })),
                ],
            )
            .state("c", vec![])
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = session.subscribe(move |state| {
            sink.lock().push(state.name.clone().unwrap_or_default());
        });

        session.send("go");
        assert_eq!(*seen.lock(), vec!["b".to_string(), "c".to_string()]);
        assert!(session.state().is_final);
    }

    #[test]
    fn send_after_disposal_is_reported_and_dropped() {
        let kept: Arc<Mutex<Option<EffectSender>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&kept);
        let machine = Description::new()
            .state(
                "a",
                vec![
                    transition("go", "b", Hooks::new()),
                    enter(Hooks::new().effect(move |_, _, send| {
                        *slot.lock() = Some(send);
                        EffectOutcome::cleanup(|| {})
                    })),
                ],
            )
            .state("b", vec![transition("late", "a", Hooks::new())])
            .compile()
            .unwrap();

        let (builder, seen) = diagnostics(SessionBuilder::new(machine));
        let session = builder.build();
        session.send("go");

        let stale = kept.lock().take().unwrap();
        stale.send("late");

        assert!(session.state().matches("b"));
        assert_eq!(
            *seen.lock(),
            vec![Diagnostic::PostDisposalSend {
                event: Some("late".to_string())
            }]
        );
    }

    #[test]
    fn panicking_hook_leaves_state_intact() {
        let machine = Description::new()
            .state(
                "a",
                vec![
                    transition(
                        "explode",
                        "b",
                        Hooks::new().reduce(|_, _| panic!("reducer failed")),
                    ),
                    transition("go", "b", Hooks::new().assign_value(json!({ "ok": true }))),
                ],
            )
            .state("b", vec![])
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        let outcome = catch_unwind(AssertUnwindSafe(|| session.send("explode")));
        assert!(outcome.is_err());
        assert!(session.state().matches("a"));
        assert_eq!(session.state().context, json!({}));

        session.send("go");
        assert!(session.state().matches("b"));
        assert_eq!(session.state().context, json!({ "ok": true }));
    }

    #[test]
    fn send_from_another_thread_waits_for_running_dispatch() {
        let machine = Description::new()
            .state("a", vec![transition("slow", "b", Hooks::new())])
            .state("b", vec![transition("fast", "c", Hooks::new())])
            .state("c", vec![])
            .compile()
            .unwrap();
        let session = Session::new(machine, json!({}));

        let entered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&entered);
        let _subscription = session.subscribe(move |state| {
            if state.matches("b") && !flag.swap(true, Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(300));
            }
        });

        thread::scope(|scope| {
            scope.spawn(|| session.send("slow"));
            scope.spawn(|| {
                while !entered.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
                session.send("fast");
                assert!(session.state().matches("c"));
            });
        });
        assert!(session.state().matches("c"));
    }

    #[test]
    fn panicking_cleanup_still_swaps_effects() {
        let (starts, stops) = (counter(), counter());
        let kept: Arc<Mutex<Option<EffectSender>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&kept);
        let machine = Description::new()
            .state(
                "a",
                vec![
                    transition("go", "b", Hooks::new()),
                    enter(
                        Hooks::new()
                            .effect(|_, _, _| EffectOutcome::cleanup(|| panic!("cleanup failed")))
                            .effect(move |_, _, send| {
                                *slot.lock() = Some(send);
                                EffectOutcome::cleanup(|| {})
                            }),
                    ),
                ],
            )
            .state(
                "b",
                vec![transition("back", "a", Hooks::new()), enter(counted(&starts, &stops))],
            )
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        assert_eq!(session.running_effects(), 2);

        let outcome = catch_unwind(AssertUnwindSafe(|| session.send("go")));
        assert!(outcome.is_err());
        assert!(session.state().matches("b"));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(session.running_effects(), 1);

        let stale = kept.lock().take().unwrap();
        assert!(stale.is_disposed());
        stale.send("back");
        assert!(session.state().matches("b"));
    }

    #[test]
    fn deferred_mode_waits_for_flush() {
        let (starts, stops) = (counter(), counter());
        let machine = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new())])
            .state("b", vec![enter(counted(&starts, &stops))])
            .compile()
            .unwrap();

        let session = SessionBuilder::new(machine)
            .effect_mode(EffectMode::Deferred)
            .build();
        session.flush_effects();
        session.send("go");

        assert!(session.has_pending_effects());
        assert_eq!(starts.load(Ordering::SeqCst), 0);

        session.flush_effects();
        assert!(!session.has_pending_effects());
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        session.flush_effects();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_disposes_effects_and_ignores_sends() {
        let (starts, stops) = (counter(), counter());
        let machine = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new()), enter(counted(&starts, &stops))])
            .state("b", vec![])
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        session.stop();
        session.stop();
        session.send("go");

        assert!(!session.is_running());
        assert!(session.state().matches("a"));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(session.running_effects(), 0);
    }

    #[test]
    fn dropping_session_disposes_effects() {
        let (starts, stops) = (counter(), counter());
        let machine = Description::new()
            .state("a", vec![enter(counted(&starts, &stops))])
            .compile()
            .unwrap();

        drop(Session::new(machine, json!({})));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn history_records_external_transitions_only() {
        let machine = Description::new()
            .state(
                "a",
                vec![transition("go", "b", Hooks::new()), internal("poke", Hooks::new())],
            )
            .state("b", vec![])
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        session.send("poke");
        session.send("go");

        let history = session.history();
        assert_eq!(history.get_path(), vec!["a", "b"]);
        assert_eq!(history.transitions()[1].event.as_deref(), Some("go"));
    }

    #[test]
    fn history_can_be_disabled() {
        let session = SessionBuilder::new(toggle()).record_history(false).build();
        session.send("toggle");
        assert!(session.history().is_empty());
    }

    #[test]
    fn invoke_without_runtime_reports_spawn_unavailable() {
        let machine = Description::new()
            .state(
                "loading",
                vec![enter(Hooks::new().invoke(|_, _| async { Ok::<_, Value>(json!(1)) }))],
            )
            .compile()
            .unwrap();

        let (builder, seen) = diagnostics(SessionBuilder::new(machine));
        let session = builder.build();
        assert!(session.state().matches("loading"));
        assert_eq!(*seen.lock(), vec![Diagnostic::SpawnUnavailable]);
    }

    #[tokio::test]
    async fn invoke_outcome_drives_next_transition() {
        let machine = Description::new()
            .state(
                "loading",
                vec![
                    transition(
                        "done",
                        "ready",
                        Hooks::new()
                            .assign(|_, event| json!({ "user": event.get("data").cloned() })),
                    ),
                    enter(Hooks::new().invoke(|ctx, _| {
                        let id = ctx["id"].clone();
                        async move { Ok::<_, Value>(json!({ "id": id, "name": "ada" })) }
                    })),
                ],
            )
            .state("ready", vec![])
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({ "id": 3 }));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _subscription = session.subscribe(move |state| {
            let _ = tx.send(state.clone());
        });

        let settled = loop {
            let state = rx.recv().await.unwrap();
            if state.matches("ready") {
                break state;
            }
        };
        assert_eq!(
            settled.context["user"],
            json!({ "id": 3, "name": "ada" })
        );
        assert!(settled.is_final);
    }

    #[tokio::test]
    async fn invoke_failure_sends_error_event() {
        let machine = Description::new()
            .state(
                "loading",
                vec![
                    transition("error", "failed", Hooks::new().assign_event()),
                    enter(Hooks::new().invoke(|_, _| async { Err::<Value, _>(json!("timeout")) })),
                ],
            )
            .state("failed", vec![])
            .compile()
            .unwrap();

        let session = Session::new(machine, json!({}));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _subscription = session.subscribe(move |state| {
            let _ = tx.send(state.clone());
        });

        let state = rx.recv().await.unwrap();
        assert!(state.matches("failed"));
        assert_eq!(state.context, json!({ "error": "timeout" }));
    }

    #[tokio::test]
    async fn async_effect_without_cleanup_is_reported() {
        let machine = Description::new()
            .state(
                "watching",
                vec![enter(Hooks::new().effect(|_, _, _| EffectOutcome::pending(async {})))],
            )
            .compile()
            .unwrap();

        let (builder, seen) = diagnostics(SessionBuilder::new(machine));
        let session = builder.build();
        assert_eq!(session.running_effects(), 0);
        assert_eq!(
            *seen.lock(),
            vec![Diagnostic::UnguardedAsyncEffect {
                state: "watching".to_string()
            }]
        );
    }

    #[test]
    fn resume_restores_state_and_restarts_enter_effects() {
        let (starts, stops) = (counter(), counter());
        let machine = Arc::new(
            Description::new()
                .state("a", vec![transition("go", "b", Hooks::new())])
                .state(
                    "b",
                    vec![transition("go", "a", Hooks::new()), enter(counted(&starts, &stops))],
                )
                .compile()
                .unwrap(),
        );

        let original = Session::new(Arc::clone(&machine), json!({ "k": "v" }));
        original.send("go");
        let checkpoint = original.checkpoint();
        drop(original);
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        let resumed = SessionBuilder::new(machine).resume(checkpoint).unwrap();
        assert!(resumed.state().matches("b"));
        assert_eq!(resumed.state().context, json!({ "k": "v" }));
        assert_eq!(resumed.history().get_path(), vec!["a", "b"]);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(resumed.running_effects(), 1);
    }

    #[test]
    fn resume_rejects_unknown_state() {
        let checkpoint = Checkpoint::new(
            RuntimeState {
                name: Some("gone".to_string()),
                context: json!({}),
                is_final: false,
            },
            StateHistory::new(),
        );

        let result = SessionBuilder::new(toggle()).resume(checkpoint);
        assert!(matches!(result, Err(CheckpointError::ValidationFailed(_))));
    }
}
