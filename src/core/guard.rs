//! Guard predicates and reducers: the compiled, callable forms of hooks.
//!
//! Guards decide whether a transition may be taken; reducers compute the
//! next context. Both are pure by contract and cheap to clone, so a compiled
//! machine can be shared by any number of sessions.

use super::context::{Context, Reduced};
use super::event::Event;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&Context, &Event) -> bool + Send + Sync;
type ReduceStep = dyn Fn(&Context, &Event) -> Reduced + Send + Sync;

/// Pure predicate that determines if a transition can execute.
///
/// Guards see the context as it stands after any exit and transition
/// reducers that have already run in the current step.
///
/// # Example
///
/// ```rust
/// use statewise::core::{Event, Guard};
/// use serde_json::json;
///
/// let has_items = Guard::new(|ctx, _event| ctx["items"].as_u64().unwrap_or(0) > 0);
///
/// assert!(has_items.check(&json!({ "items": 2 }), &Event::new("checkout")));
/// assert!(!has_items.check(&json!({ "items": 0 }), &Event::new("checkout")));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<Predicate>,
}

impl Guard {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the guard.
    pub fn check(&self, context: &Context, event: &Event) -> bool {
        (self.predicate)(context, event)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard")
    }
}

/// True when every guard passes; an empty list always passes.
pub fn all_pass(guards: &[Guard], context: &Context, event: &Event) -> bool {
    guards.iter().all(|guard| guard.check(context, event))
}

/// A context reducer in its lowered form.
///
/// Every `reduce`, `assign` and `action` hook compiles down to one of these.
#[derive(Clone)]
pub struct Reducer {
    step: Arc<ReduceStep>,
}

impl Reducer {
    pub fn new<F>(step: F) -> Self
    where
        F: Fn(&Context, &Event) -> Reduced + Send + Sync + 'static,
    {
        Reducer {
            step: Arc::new(step),
        }
    }

    /// Run the reducer, consuming the current context.
    pub fn apply(&self, context: Context, event: &Event) -> Context {
        let reduced = (self.step)(&context, event);
        reduced.resolve(context)
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reducer")
    }
}

/// Fold a reducer list over a context, left to right.
pub fn reduce_all(reducers: &[Reducer], context: Context, event: &Event) -> Context {
    reducers
        .iter()
        .fold(context, |context, reducer| reducer.apply(context, event))
}
