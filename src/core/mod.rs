//! Core state machine types and logic.
//!
//! This module contains the pure part of the engine:
//! - Events and contexts
//! - Guards, reducers and the hook registry that lowers declared hooks
//! - The compiled machine graph
//! - The `step` transition function
//! - The effect vocabulary (effect functions, senders, diagnostics)
//! - Runtime snapshots and transition history
//!
//! Nothing here starts effects or holds mutable session state; that lives in
//! [`crate::effects`].

mod context;
mod diagnostic;
mod effect;
mod event;
mod guard;
mod history;
mod hooks;
mod machine;
mod state;
mod step;

pub use context::{merge, Context, Reduced};
pub use diagnostic::Diagnostic;
pub use effect::{
    Cleanup, Dispatcher, EffectFn, EffectOutcome, EffectSender, InvokeFn, Lifecycle, PendingEffect,
};
pub use event::{Event, EventType};
pub use guard::{all_pass, reduce_all, Guard, Reducer};
pub use history::{StateHistory, TransitionRecord};
pub use hooks::{lower, Assign, Hook, HookKind, HookSite, Hooks, Lowered};
pub use machine::{
    EnterHooks, ExitHooks, Machine, Route, RouteOutline, StateNode, StateOutline,
};
pub use state::RuntimeState;
pub use step::{step, Step};
