//! The compiled, immutable machine graph.
//!
//! A [`Machine`] is produced by [`crate::builder::compile`] and never changes
//! afterwards. Transition targets are resolved to node indices during
//! compilation, so the engine can follow them without name lookups.

use super::event::EventType;
use super::guard::{Guard, Reducer};
use super::effect::EffectFn;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A compiled transition, immediate, or internal transition.
#[derive(Clone, Debug)]
pub struct Route {
    pub(crate) target: usize,
    pub(crate) internal: bool,
    pub(crate) guards: Vec<Guard>,
    pub(crate) reducers: Vec<Reducer>,
}

impl Route {
    /// Index of the target node. Internal routes target their own state.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn reducers(&self) -> &[Reducer] {
        &self.reducers
    }
}

/// Reducers and effects run when a state is entered.
#[derive(Clone, Default)]
pub struct EnterHooks {
    pub(crate) reducers: Vec<Reducer>,
    pub(crate) invokes: Vec<EffectFn>,
    pub(crate) effects: Vec<EffectFn>,
}

impl EnterHooks {
    /// Effects to start on settle: wrapped invokes first, then plain effects.
    pub fn effect_fns(&self) -> impl Iterator<Item = &EffectFn> {
        self.invokes.iter().chain(self.effects.iter())
    }
}

impl fmt::Debug for EnterHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnterHooks")
            .field("reducers", &self.reducers.len())
            .field("invokes", &self.invokes.len())
            .field("effects", &self.effects.len())
            .finish()
    }
}

/// Reducers run when a state is left by an external transition.
#[derive(Clone, Debug, Default)]
pub struct ExitHooks {
    pub(crate) reducers: Vec<Reducer>,
}

/// One state of the machine.
#[derive(Clone, Debug)]
pub struct StateNode {
    pub(crate) name: String,
    pub(crate) transitions: BTreeMap<EventType, Vec<Route>>,
    pub(crate) immediates: Vec<Route>,
    pub(crate) enter: EnterHooks,
    pub(crate) exit: ExitHooks,
}

impl StateNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routes for `event`, in declaration order.
    pub fn transitions_for(&self, event: &str) -> &[Route] {
        self.transitions
            .get(event)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn immediates(&self) -> &[Route] {
        &self.immediates
    }

    pub fn enter(&self) -> &EnterHooks {
        &self.enter
    }

    pub fn exit(&self) -> &ExitHooks {
        &self.exit
    }

    /// A state is final when nothing can leave it.
    pub fn is_final(&self) -> bool {
        self.transitions.is_empty() && self.immediates.is_empty()
    }
}

/// Compiled machine: states in declaration order plus a name index.
///
/// Machines are read-only and meant to be shared (usually behind an `Arc`)
/// by every session created from the same description.
#[derive(Clone, Debug, Default)]
pub struct Machine {
    states: Vec<StateNode>,
    index: HashMap<String, usize>,
}

impl Machine {
    pub(crate) fn from_nodes(states: Vec<StateNode>) -> Self {
        let index = states
            .iter()
            .enumerate()
            .map(|(position, node)| (node.name.clone(), position))
            .collect();
        Self { states, index }
    }

    /// The entry state: the first one declared.
    pub fn initial(&self) -> Option<&StateNode> {
        self.states.first()
    }

    pub fn state(&self, name: &str) -> Option<&StateNode> {
        self.position(name).map(|position| &self.states[position])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn node(&self, position: usize) -> Option<&StateNode> {
        self.states.get(position)
    }

    /// Node at a position taken from a compiled route.
    pub(crate) fn node_at(&self, position: usize) -> &StateNode {
        &self.states[position]
    }

    pub fn states(&self) -> impl Iterator<Item = &StateNode> {
        self.states.iter()
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(StateNode::name).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Structural summary, used to compare compiled machines.
    pub fn outline(&self) -> Vec<StateOutline> {
        self.states
            .iter()
            .map(|node| StateOutline {
                name: node.name.clone(),
                transitions: node
                    .transitions
                    .iter()
                    .flat_map(|(event, routes)| {
                        routes
                            .iter()
                            .map(move |route| self.route_outline(Some(event.clone()), route))
                    })
                    .collect(),
                immediates: node
                    .immediates
                    .iter()
                    .map(|route| self.route_outline(None, route))
                    .collect(),
                enter_reducers: node.enter.reducers.len(),
                enter_invokes: node.enter.invokes.len(),
                enter_effects: node.enter.effects.len(),
                exit_reducers: node.exit.reducers.len(),
                is_final: node.is_final(),
            })
            .collect()
    }

    fn route_outline(&self, event: Option<EventType>, route: &Route) -> RouteOutline {
        RouteOutline {
            event,
            target: self.states[route.target].name.clone(),
            internal: route.internal,
            guards: route.guards.len(),
            reducers: route.reducers.len(),
        }
    }
}

/// Shape of one compiled state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateOutline {
    pub name: String,
    pub transitions: Vec<RouteOutline>,
    pub immediates: Vec<RouteOutline>,
    pub enter_reducers: usize,
    pub enter_invokes: usize,
    pub enter_effects: usize,
    pub exit_reducers: usize,
    pub is_final: bool,
}

/// Shape of one compiled route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteOutline {
    pub event: Option<EventType>,
    pub target: String,
    pub internal: bool,
    pub guards: usize,
    pub reducers: usize,
}
