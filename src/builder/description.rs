//! Descriptions and their compilation into machines.

use super::error::CompileError;
use super::parts::{Part, StateDecl};
use crate::core::{lower, EnterHooks, ExitHooks, HookKind, Hooks, Machine, Route, StateNode};
use crate::effects::invoke::lower_invoke;
use std::collections::{BTreeMap, HashMap};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::debug;

/// A machine description: states in declaration order.
///
/// # Example
///
/// ```rust
/// use statewise::builder::{enter, transition, Description};
/// use statewise::core::Hooks;
/// use serde_json::json;
///
/// let machine = Description::new()
///     .state("idle", vec![transition("load", "ready", Hooks::new())])
///     .state(
///         "ready",
///         vec![enter(Hooks::new().assign_value(json!({ "loaded": true })))],
///     )
///     .compile()
///     .unwrap();
///
/// assert_eq!(machine.state_names(), vec!["idle", "ready"]);
/// assert!(machine.state("ready").unwrap().is_final());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Description {
    states: Vec<StateDecl>,
}

impl Description {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a description from already declared states.
    pub fn from_states(states: impl IntoIterator<Item = StateDecl>) -> Self {
        states.into_iter().fold(Self::new(), Self::declare)
    }

    /// Declare a state. Redeclaring a name replaces its parts but keeps the
    /// position of the first declaration.
    pub fn state(self, name: impl Into<String>, parts: Vec<Part>) -> Self {
        self.declare(super::parts::state(name, parts))
    }

    pub fn declare(mut self, decl: StateDecl) -> Self {
        match self.states.iter_mut().find(|existing| existing.name == decl.name) {
            Some(existing) => existing.parts = decl.parts,
            None => self.states.push(decl),
        }
        self
    }

    pub fn states(&self) -> &[StateDecl] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Check the description, accumulating every problem found.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<CompileError>> {
        let checks: Vec<Validation<(), NonEmptyVec<CompileError>>> = self
            .problems()
            .into_iter()
            .map(Validation::fail)
            .collect();
        Validation::all_vec(checks).map(|_| ())
    }

    /// Compile into a machine, failing with the first problem found.
    ///
    /// Only immediate cycles that can never stop are rejected: a chain of
    /// states whose first immediate has no guard. A loop through guarded
    /// immediates compiles, and it must terminate on its own. If every guard
    /// on the loop keeps passing, the next `step` through it never returns.
    pub fn compile(&self) -> Result<Machine, CompileError> {
        if let Some(first) = self.problems().into_iter().next() {
            return Err(first);
        }

        let index: HashMap<&str, usize> = self
            .states
            .iter()
            .enumerate()
            .map(|(position, decl)| (decl.name.as_str(), position))
            .collect();

        let nodes = self
            .states
            .iter()
            .enumerate()
            .map(|(position, decl)| compile_state(decl, position, &index))
            .collect();

        let machine = Machine::from_nodes(nodes);
        debug!(states = machine.len(), "machine compiled");
        Ok(machine)
    }

    fn problems(&self) -> Vec<CompileError> {
        let mut problems = self.argument_problems();
        let target_problems = self.target_problems();
        let targets_resolved = target_problems.is_empty();
        problems.extend(target_problems);
        if targets_resolved {
            problems.extend(self.cycle_problems());
        }
        problems
    }

    fn argument_problems(&self) -> Vec<CompileError> {
        let mut problems = Vec::new();
        for decl in &self.states {
            if decl.name.is_empty() {
                problems.push(CompileError::InvalidArgument(
                    "state name must not be empty".to_string(),
                ));
            }
            for part in &decl.parts {
                match part {
                    Part::Transition { event, target, .. } => {
                        if event.is_empty() {
                            problems.push(invalid(decl, "transition must name its event"));
                        }
                        if target.is_empty() {
                            problems.push(invalid(decl, "transition must name its target"));
                        }
                    }
                    Part::Immediate { target, .. } if target.is_empty() => {
                        problems.push(invalid(decl, "immediate must name its target"));
                    }
                    Part::Internal { event, .. } if event.is_empty() => {
                        problems.push(invalid(decl, "internal transition must name its event"));
                    }
                    _ => {}
                }
                if let Some(kind) = part.hooks().rejected_at(part.site()) {
                    problems.push(invalid(
                        decl,
                        &format!("{kind} hooks are not accepted on {}", part.site()),
                    ));
                }
            }
        }
        problems
    }

    fn target_problems(&self) -> Vec<CompileError> {
        self.states
            .iter()
            .flat_map(|decl| decl.parts.iter())
            .filter_map(|part| match part {
                Part::Transition { target, .. } | Part::Immediate { target, .. } => Some(target),
                _ => None,
            })
            .filter(|target| !target.is_empty() && self.position(target).is_none())
            .map(|target| CompileError::InvalidTransitionTarget(target.clone()))
            .collect()
    }

    /// Follow each state's first immediate while it has no guards. Revisiting
    /// a state on that walk means dispatch could never settle.
    fn cycle_problems(&self) -> Vec<CompileError> {
        let forced: Vec<Option<usize>> = self
            .states
            .iter()
            .map(|decl| {
                let first = decl
                    .parts
                    .iter()
                    .find(|part| matches!(part, Part::Immediate { .. }));
                match first {
                    Some(Part::Immediate { target, hooks }) if !is_guarded(hooks) => {
                        self.position(target)
                    }
                    _ => None,
                }
            })
            .collect();

        let mut problems = Vec::new();
        let mut visited = vec![false; self.states.len()];
        for start in 0..self.states.len() {
            let mut path: Vec<usize> = Vec::new();
            let mut current = Some(start);
            while let Some(position) = current {
                if visited[position] {
                    break;
                }
                if let Some(at) = path.iter().position(|seen| *seen == position) {
                    let mut cycle: Vec<String> = path[at..]
                        .iter()
                        .map(|seen| self.states[*seen].name.clone())
                        .collect();
                    cycle.push(self.states[position].name.clone());
                    problems.push(CompileError::UnconditionalImmediateCycle(cycle));
                    break;
                }
                path.push(position);
                current = forced[position];
            }
            for seen in path {
                visited[seen] = true;
            }
        }
        problems
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|decl| decl.name == name)
    }
}

/// Compile a description. Equivalent to [`Description::compile`].
pub fn compile(description: &Description) -> Result<Machine, CompileError> {
    description.compile()
}

fn invalid(decl: &StateDecl, problem: &str) -> CompileError {
    CompileError::InvalidArgument(format!("state '{}': {problem}", decl.name))
}

fn is_guarded(hooks: &Hooks) -> bool {
    hooks.kinds().contains(&HookKind::Guard)
}

fn compile_state(decl: &StateDecl, position: usize, index: &HashMap<&str, usize>) -> StateNode {
    let mut transitions: BTreeMap<String, Vec<Route>> = BTreeMap::new();
    let mut immediates = Vec::new();
    let mut enter = EnterHooks::default();
    let mut exit = ExitHooks::default();

    for part in &decl.parts {
        let lowered = lower(part.hooks());
        match part {
            Part::Transition { event, target, .. } => {
                transitions.entry(event.clone()).or_default().push(Route {
                    target: index[target.as_str()],
                    internal: false,
                    guards: lowered.guards,
                    reducers: lowered.reducers,
                });
            }
            Part::Immediate { target, .. } => immediates.push(Route {
                target: index[target.as_str()],
                internal: false,
                guards: lowered.guards,
                reducers: lowered.reducers,
            }),
            Part::Internal { event, .. } => {
                transitions.entry(event.clone()).or_default().push(Route {
                    target: position,
                    internal: true,
                    guards: lowered.guards,
                    reducers: lowered.reducers,
                });
            }
            Part::Enter(_) => {
                enter.reducers.extend(lowered.reducers);
                enter.invokes.extend(lowered.invokes.into_iter().map(lower_invoke));
                enter.effects.extend(lowered.effects);
            }
            Part::Exit(_) => exit.reducers.extend(lowered.reducers),
        }
    }

    StateNode {
        name: decl.name.clone(),
        transitions,
        immediates,
        enter,
        exit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{enter, exit, immediate, internal, state, transition};
    use serde_json::json;

    fn unwrap_err(description: Description) -> CompileError {
        match description.compile() {
            Ok(_) => panic!("expected compilation to fail"),
            Err(error) => error,
        }
    }

    #[test]
    fn missing_target_is_rejected() {
        let error = unwrap_err(
            Description::new().state("a", vec![transition("go", "missing", Hooks::new())]),
        );
        assert_eq!(
            error,
            CompileError::InvalidTransitionTarget("missing".to_string())
        );
    }

    #[test]
    fn missing_immediate_target_is_rejected() {
        let error =
            unwrap_err(Description::new().state("a", vec![immediate("nowhere", Hooks::new())]));
        assert_eq!(
            error,
            CompileError::InvalidTransitionTarget("nowhere".to_string())
        );
    }

    #[test]
    fn forward_references_resolve() {
        let machine = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new())])
            .state("b", vec![])
            .compile()
            .unwrap();
        let route = &machine.state("a").unwrap().transitions_for("go")[0];
        assert_eq!(machine.node(route.target()).unwrap().name(), "b");
    }

    #[test]
    fn empty_event_is_invalid_argument() {
        let error =
            unwrap_err(Description::new().state("a", vec![transition("", "a", Hooks::new())]));
        assert!(matches!(error, CompileError::InvalidArgument(message) if message.contains("'a'")));
    }

    #[test]
    fn empty_internal_event_is_invalid_argument() {
        let error = unwrap_err(Description::new().state("a", vec![internal("", Hooks::new())]));
        assert!(matches!(error, CompileError::InvalidArgument(_)));
    }

    #[test]
    fn empty_state_name_is_invalid_argument() {
        let error = unwrap_err(Description::new().state("", vec![]));
        assert!(matches!(error, CompileError::InvalidArgument(_)));
    }

    #[test]
    fn hook_at_wrong_site_names_the_state() {
        let error = unwrap_err(Description::new().state(
            "loading",
            vec![exit(Hooks::new().effect(|_, _, _| crate::effects::EffectOutcome::Detached))],
        ));
        match error {
            CompileError::InvalidArgument(message) => {
                assert!(message.contains("loading"));
                assert!(message.contains("effect"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn guards_are_rejected_on_enter() {
        let error = unwrap_err(
            Description::new().state("a", vec![enter(Hooks::new().guard(|_, _| true))]),
        );
        assert!(matches!(error, CompileError::InvalidArgument(_)));
    }

    #[test]
    fn argument_errors_come_before_target_errors() {
        let error = unwrap_err(
            Description::new()
                .state("a", vec![transition("go", "missing", Hooks::new())])
                .state("b", vec![transition("", "a", Hooks::new())]),
        );
        assert!(matches!(error, CompileError::InvalidArgument(_)));
    }

    #[test]
    fn validate_accumulates_every_problem() {
        let description = Description::new()
            .state("a", vec![transition("", "missing", Hooks::new())])
            .state("b", vec![immediate("gone", Hooks::new())]);

        match description.validate() {
            Validation::Failure(errors) => {
                let errors: Vec<_> = errors.iter().cloned().collect();
                assert_eq!(errors.len(), 3);
                assert!(matches!(errors[0], CompileError::InvalidArgument(_)));
                assert_eq!(
                    errors[1],
                    CompileError::InvalidTransitionTarget("missing".to_string())
                );
                assert_eq!(
                    errors[2],
                    CompileError::InvalidTransitionTarget("gone".to_string())
                );
            }
            Validation::Success(_) => panic!("expected validation to fail"),
        }
    }

    #[test]
    fn valid_description_validates() {
        let description = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new())])
            .state("b", vec![]);
        assert!(description.validate().is_success());
    }

    #[test]
    fn unconditional_immediate_cycle_is_rejected() {
        let error = unwrap_err(
            Description::new()
                .state("a", vec![immediate("b", Hooks::new())])
                .state("b", vec![immediate("a", Hooks::new())]),
        );
        assert_eq!(
            error,
            CompileError::UnconditionalImmediateCycle(vec![
                "a".to_string(),
                "b".to_string(),
                "a".to_string()
            ])
        );
    }

    #[test]
    fn self_immediate_is_a_cycle() {
        let error = unwrap_err(Description::new().state("a", vec![immediate("a", Hooks::new())]));
        assert_eq!(
            error,
            CompileError::UnconditionalImmediateCycle(vec!["a".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn guarded_immediate_loop_is_allowed() {
        let machine = Description::new()
            .state("a", vec![immediate("b", Hooks::new().guard(|ctx, _| ctx["go"] == json!(true)))])
            .state("b", vec![immediate("a", Hooks::new())])
            .compile();
        assert!(machine.is_ok());
    }

    #[test]
    fn redeclared_state_keeps_position_and_last_parts() {
        let machine = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new())])
            .state("b", vec![])
            .state("a", vec![])
            .compile()
            .unwrap();

        assert_eq!(machine.state_names(), vec!["a", "b"]);
        assert!(machine.state("a").unwrap().is_final());
    }

    #[test]
    fn from_states_matches_chained_declarations() {
        let chained = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new())])
            .state("b", vec![])
            .compile()
            .unwrap();
        let collected = Description::from_states(vec![
            state("a", vec![transition("go", "b", Hooks::new())]),
            state("b", vec![]),
        ])
        .compile()
        .unwrap();

        assert_eq!(chained.outline(), collected.outline());
    }

    #[test]
    fn internal_routes_target_their_own_state() {
        let machine = Description::new()
            .state("a", vec![transition("go", "b", Hooks::new())])
            .state("b", vec![internal("tick", Hooks::new())])
            .compile()
            .unwrap();
        let route = &machine.state("b").unwrap().transitions_for("tick")[0];
        assert!(route.is_internal());
        assert_eq!(route.target(), 1);
    }

    #[test]
    fn multiple_enter_parts_concatenate() {
        let machine = Description::new()
            .state(
                "a",
                vec![
                    enter(Hooks::new().assign_value(json!({ "x": 1 }))),
                    enter(Hooks::new().effect(|_, _, _| crate::effects::EffectOutcome::Detached)),
                ],
            )
            .compile()
            .unwrap();
        let outline = &machine.outline()[0];
        assert_eq!(outline.enter_reducers, 1);
        assert_eq!(outline.enter_effects, 1);
    }

    #[test]
    fn free_compile_matches_method() {
        let description = Description::new().state("a", vec![]);
        assert_eq!(
            compile(&description).unwrap().outline(),
            description.compile().unwrap().outline()
        );
    }
}
