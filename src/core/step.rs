//! The transition engine.
//!
//! [`step`] is a pure function of `(machine, state, event)`. It never fails:
//! unknown events, failed guards and unknown states all yield the input state
//! unchanged with no effects. User hooks are called synchronously; a panic in
//! one unwinds out of `step` before any result exists.

use super::context::Context;
use super::event::Event;
use super::guard::{all_pass, reduce_all};
use super::machine::{Machine, Route};
use super::effect::PendingEffect;
use super::state::RuntimeState;
use tracing::{debug, trace};

/// Result of one dispatch.
#[derive(Clone, Debug)]
pub struct Step {
    /// The next snapshot.
    pub state: RuntimeState,
    /// Effects for the settled state after an external transition; `None`
    /// when nothing matched or the dispatch ended on an internal transition.
    pub effects: Option<Vec<PendingEffect>>,
}

impl Step {
    fn unchanged(state: &RuntimeState) -> Self {
        Self {
            state: state.clone(),
            effects: None,
        }
    }

    /// Whether running effects must be replaced by `effects`.
    pub fn is_external(&self) -> bool {
        self.effects.is_some()
    }
}

/// Compute the next snapshot and the effects that should now be active.
///
/// # Example
///
/// ```rust
/// use statewise::builder::{transition, Description};
/// use statewise::core::{step, Event, Hooks, RuntimeState};
/// use serde_json::json;
///
/// let machine = Description::new()
///     .state("off", vec![transition("toggle", "on", Hooks::new())])
///     .state("on", vec![transition("toggle", "off", Hooks::new())])
///     .compile()
///     .unwrap();
///
/// let started = step(&machine, &RuntimeState::unstarted(json!({})), &Event::init());
/// assert!(started.state.matches("off"));
///
/// let toggled = step(&machine, &started.state, &Event::new("toggle"));
/// assert!(toggled.state.matches("on"));
/// assert!(toggled.is_external());
/// ```
pub fn step(machine: &Machine, state: &RuntimeState, event: &Event) -> Step {
    let Some(current) = state.name() else {
        return initial(machine, state, event);
    };

    let (Some(position), Some(event_name)) = (machine.position(current), event.name()) else {
        trace!(state = current, event = ?event.name(), "event ignored");
        return Step::unchanged(state);
    };

    let node = machine.node_at(position);
    let selected = node
        .transitions_for(event_name)
        .iter()
        .find(|route| all_pass(&route.guards, &state.context, event));

    match selected {
        Some(route) => apply(machine, Some(position), route, state.context.clone(), event),
        None => {
            trace!(state = current, event = event_name, "no transition matched");
            Step::unchanged(state)
        }
    }
}

fn initial(machine: &Machine, state: &RuntimeState, event: &Event) -> Step {
    if !event.is_init() || machine.is_empty() {
        return Step::unchanged(state);
    }
    let entry = Route {
        target: 0,
        internal: false,
        guards: Vec::new(),
        reducers: Vec::new(),
    };
    apply(machine, None, &entry, state.context.clone(), event)
}

/// Apply `route` from the node at `from`, then follow immediates until the
/// machine settles. Each matched immediate replaces the in-progress result,
/// so only the settled state contributes effects.
fn apply<'a>(
    machine: &'a Machine,
    mut from: Option<usize>,
    mut route: &'a Route,
    mut context: Context,
    event: &Event,
) -> Step {
    loop {
        let external = !route.internal;

        if external {
            if let Some(origin) = from {
                context = reduce_all(&machine.node_at(origin).exit.reducers, context, event);
            }
        }

        let target = machine.node_at(route.target);
        context = reduce_all(&route.reducers, context, event);
        if external {
            context = reduce_all(&target.enter.reducers, context, event);
        }

        if let Some(next) = target
            .immediates
            .iter()
            .find(|immediate| all_pass(&immediate.guards, &context, event))
        {
            from = Some(route.target);
            route = next;
            continue;
        }

        let effects = external.then(|| {
            target
                .enter
                .effect_fns()
                .map(|run| PendingEffect::new(run.clone(), event.clone()))
                .collect::<Vec<_>>()
        });

        debug!(
            from = ?from.map(|origin| machine.node_at(origin).name()),
            to = target.name(),
            event = ?event.name(),
            internal = !external,
            "transition settled"
        );

        return Step {
            state: RuntimeState {
                name: Some(target.name.clone()),
                context,
                is_final: target.is_final(),
            },
            effects,
        };
    }
}
