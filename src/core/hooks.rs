//! Hook registry and lowering.
//!
//! A [`Hooks`] value is the option list attached to a transition, an
//! immediate, an internal transition, or an `enter`/`exit` block. Compilation
//! lowers it once into plain guard/reducer/effect lists so dispatch never
//! inspects hook shapes:
//!
//! - `assign` and `action` become reducers,
//! - `invoke` operations are kept apart so the builder can wrap each one as
//!   an effect,
//! - lowering walks [`HookKind::ALL`] in order, so within one option list the
//!   explicit `reduce` entries run before lowered `assign` entries, which run
//!   before lowered `action` entries.

use super::context::{merge, Context, Reduced};
use super::event::Event;
use super::guard::{Guard, Reducer};
use super::effect::{EffectFn, EffectOutcome, EffectSender, InvokeFn};
use futures::future::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ReduceHook = Arc<dyn Fn(&Context, &Event) -> Context + Send + Sync>;
type ActionHook = Arc<dyn Fn(&Context, &Event) + Send + Sync>;
type PatchHook = Arc<dyn Fn(&Context, &Event) -> Value + Send + Sync>;

/// Recognized hook kinds, in lowering order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Guard,
    Reduce,
    Assign,
    Action,
    Invoke,
    Effect,
}

impl HookKind {
    /// Every kind, in the fixed order lowering visits them.
    pub const ALL: [HookKind; 6] = [
        HookKind::Guard,
        HookKind::Reduce,
        HookKind::Assign,
        HookKind::Action,
        HookKind::Invoke,
        HookKind::Effect,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HookKind::Guard => "guard",
            HookKind::Reduce => "reduce",
            HookKind::Assign => "assign",
            HookKind::Action => "action",
            HookKind::Invoke => "invoke",
            HookKind::Effect => "effect",
        }
    }

    /// The kind a hook is rewritten into by lowering.
    pub fn lowers_to(self) -> HookKind {
        match self {
            HookKind::Assign | HookKind::Action => HookKind::Reduce,
            HookKind::Invoke => HookKind::Effect,
            other => other,
        }
    }

    /// Whether a hook of this kind may be declared at `site`.
    pub fn accepted_at(self, site: HookSite) -> bool {
        match self {
            HookKind::Reduce | HookKind::Assign | HookKind::Action => true,
            HookKind::Guard => matches!(
                site,
                HookSite::Transition | HookSite::Immediate | HookSite::Internal
            ),
            HookKind::Invoke | HookKind::Effect => site == HookSite::Enter,
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a hook list is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookSite {
    Transition,
    Immediate,
    Internal,
    Enter,
    Exit,
}

impl fmt::Display for HookSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookSite::Transition => "transition",
            HookSite::Immediate => "immediate",
            HookSite::Internal => "internal",
            HookSite::Enter => "enter",
            HookSite::Exit => "exit",
        };
        f.write_str(name)
    }
}

/// The shapes an `assign` hook accepts.
#[derive(Clone)]
pub enum Assign {
    /// Compute a partial object from the context and event.
    Compute(PatchHook),
    /// Merge a constant partial object.
    Patch(Value),
    /// Merge the triggering event's payload.
    Payload,
}

impl Assign {
    fn patch(&self, context: &Context, event: &Event) -> Value {
        match self {
            Assign::Compute(compute) => compute(context, event),
            Assign::Patch(patch) => patch.clone(),
            Assign::Payload => Value::Object(event.payload().clone()),
        }
    }
}

/// A single declared hook.
#[derive(Clone)]
pub enum Hook {
    Guard(Guard),
    Reduce(ReduceHook),
    Assign(Assign),
    Action(ActionHook),
    Invoke(InvokeFn),
    Effect(EffectFn),
}

impl Hook {
    pub fn kind(&self) -> HookKind {
        match self {
            Hook::Guard(_) => HookKind::Guard,
            Hook::Reduce(_) => HookKind::Reduce,
            Hook::Assign(_) => HookKind::Assign,
            Hook::Action(_) => HookKind::Action,
            Hook::Invoke(_) => HookKind::Invoke,
            Hook::Effect(_) => HookKind::Effect,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook::{}", self.kind())
    }
}

/// Ordered hook options for one transition or enter/exit block.
///
/// Each method appends, so calling `.guard(..)` twice yields a two-guard list.
///
/// # Example
///
/// ```rust
/// use statewise::core::{HookKind, Hooks};
/// use serde_json::json;
///
/// let hooks = Hooks::new()
///     .guard(|ctx, _| ctx["ready"] == json!(true))
///     .assign_value(json!({ "started": true }))
///     .action(|_, _| {});
///
/// assert_eq!(
///     hooks.kinds(),
///     vec![HookKind::Guard, HookKind::Assign, HookKind::Action]
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct Hooks {
    entries: Vec<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already-built hook.
    pub fn push(mut self, hook: Hook) -> Self {
        self.entries.push(hook);
        self
    }

    pub fn guard<F>(self, predicate: F) -> Self
    where
        F: Fn(&Context, &Event) -> bool + Send + Sync + 'static,
    {
        self.push(Hook::Guard(Guard::new(predicate)))
    }

    /// Replace the context with the value the function returns.
    pub fn reduce<F>(self, reducer: F) -> Self
    where
        F: Fn(&Context, &Event) -> Context + Send + Sync + 'static,
    {
        self.push(Hook::Reduce(Arc::new(reducer)))
    }

    /// Merge the partial object the function returns into the context.
    pub fn assign<F>(self, compute: F) -> Self
    where
        F: Fn(&Context, &Event) -> Value + Send + Sync + 'static,
    {
        self.push(Hook::Assign(Assign::Compute(Arc::new(compute))))
    }

    /// Merge a constant partial object into the context.
    pub fn assign_value(self, patch: Value) -> Self {
        self.push(Hook::Assign(Assign::Patch(patch)))
    }

    /// Merge the triggering event's payload into the context.
    pub fn assign_event(self) -> Self {
        self.push(Hook::Assign(Assign::Payload))
    }

    /// Run a function for its side effect; the context is left as is.
    pub fn action<F>(self, action: F) -> Self
    where
        F: Fn(&Context, &Event) + Send + Sync + 'static,
    {
        self.push(Hook::Action(Arc::new(action)))
    }

    /// Start an async operation on enter; its outcome is sent back as a
    /// `done` (payload `data`) or `error` (payload `error`) event.
    pub fn invoke<F, Fut>(self, operation: F) -> Self
    where
        F: Fn(&Context, &Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        let operation: InvokeFn =
            Arc::new(move |context, event| operation(context, event).boxed());
        self.push(Hook::Invoke(operation))
    }

    /// Start a side effect on enter.
    pub fn effect<F>(self, effect: F) -> Self
    where
        F: Fn(&Context, &Event, EffectSender) -> EffectOutcome + Send + Sync + 'static,
    {
        self.push(Hook::Effect(Arc::new(effect)))
    }

    pub fn entries(&self) -> &[Hook] {
        &self.entries
    }

    /// Declared kinds, in declaration order.
    pub fn kinds(&self) -> Vec<HookKind> {
        self.entries.iter().map(Hook::kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first declared kind not accepted at `site`, if any.
    pub fn rejected_at(&self, site: HookSite) -> Option<HookKind> {
        self.entries
            .iter()
            .map(Hook::kind)
            .find(|kind| !kind.accepted_at(site))
    }
}

/// Hook lists after lowering.
#[derive(Clone, Default)]
pub struct Lowered {
    pub guards: Vec<Guard>,
    pub reducers: Vec<Reducer>,
    pub invokes: Vec<InvokeFn>,
    pub effects: Vec<EffectFn>,
}

/// Lower a hook list, visiting kinds in registry order.
pub fn lower(hooks: &Hooks) -> Lowered {
    let mut lowered = Lowered::default();
    for kind in HookKind::ALL {
        for hook in hooks.entries.iter().filter(|hook| hook.kind() == kind) {
            match hook {
                Hook::Guard(guard) => lowered.guards.push(guard.clone()),
                Hook::Reduce(reduce) => lowered.reducers.push(lower_reduce(reduce.clone())),
                Hook::Assign(assign) => lowered.reducers.push(lower_assign(assign.clone())),
                Hook::Action(action) => lowered.reducers.push(lower_action(action.clone())),
                Hook::Invoke(operation) => lowered.invokes.push(operation.clone()),
                Hook::Effect(effect) => lowered.effects.push(effect.clone()),
            }
        }
    }
    lowered
}

fn lower_reduce(reduce: ReduceHook) -> Reducer {
    Reducer::new(move |context, event| Reduced::Replace(reduce(context, event)))
}

fn lower_assign(assign: Assign) -> Reducer {
    Reducer::new(move |context, event| {
        let patch = assign.patch(context, event);
        Reduced::Replace(merge(context, &patch))
    })
}

fn lower_action(action: ActionHook) -> Reducer {
    Reducer::new(move |context, event| {
        action(context, event);
        Reduced::Unchanged
    })
}
