//! Declarative building blocks of a description.
//!
//! Each constructor returns a plain value; nothing is validated until the
//! description is compiled.

use crate::core::{HookSite, Hooks};

/// One part of a state declaration.
#[derive(Clone, Debug)]
pub enum Part {
    /// Leave for `target` when `event` arrives and the guards pass.
    Transition {
        event: String,
        target: String,
        hooks: Hooks,
    },
    /// Leave for `target` as soon as the state is entered and the guards pass.
    Immediate { target: String, hooks: Hooks },
    /// Handle `event` without leaving the state.
    Internal { event: String, hooks: Hooks },
    /// Hooks run when the state is entered.
    Enter(Hooks),
    /// Hooks run when the state is left.
    Exit(Hooks),
}

impl Part {
    pub fn site(&self) -> HookSite {
        match self {
            Part::Transition { .. } => HookSite::Transition,
            Part::Immediate { .. } => HookSite::Immediate,
            Part::Internal { .. } => HookSite::Internal,
            Part::Enter(_) => HookSite::Enter,
            Part::Exit(_) => HookSite::Exit,
        }
    }

    pub fn hooks(&self) -> &Hooks {
        match self {
            Part::Transition { hooks, .. }
            | Part::Immediate { hooks, .. }
            | Part::Internal { hooks, .. }
            | Part::Enter(hooks)
            | Part::Exit(hooks) => hooks,
        }
    }
}

/// A named state with its parts.
#[derive(Clone, Debug)]
pub struct StateDecl {
    pub(crate) name: String,
    pub(crate) parts: Vec<Part>,
}

impl StateDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

pub fn transition(event: impl Into<String>, target: impl Into<String>, hooks: Hooks) -> Part {
    Part::Transition {
        event: event.into(),
        target: target.into(),
        hooks,
    }
}

pub fn immediate(target: impl Into<String>, hooks: Hooks) -> Part {
    Part::Immediate {
        target: target.into(),
        hooks,
    }
}

pub fn internal(event: impl Into<String>, hooks: Hooks) -> Part {
    Part::Internal {
        event: event.into(),
        hooks,
    }
}

pub fn enter(hooks: Hooks) -> Part {
    Part::Enter(hooks)
}

pub fn exit(hooks: Hooks) -> Part {
    Part::Exit(hooks)
}

/// Declare a state. Parts keep their order within each kind.
pub fn state(name: impl Into<String>, parts: Vec<Part>) -> StateDecl {
    StateDecl {
        name: name.into(),
        parts,
    }
}
