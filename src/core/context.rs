//! Machine context and the reducer result type.

use serde_json::{Map, Value};

/// The data payload owned by the current state.
///
/// Contexts are replaced, never mutated in place: every reducer receives a
/// reference and hands back a fresh value.
pub type Context = Value;

/// Outcome of running a single reducer.
#[derive(Clone, Debug, PartialEq)]
pub enum Reduced {
    /// The reducer produced a new context.
    Replace(Context),
    /// The reducer ran for effect only; keep the current context.
    Unchanged,
}

impl Reduced {
    /// Resolve against the context the reducer was given.
    pub fn resolve(self, current: Context) -> Context {
        match self {
            Reduced::Replace(next) => next,
            Reduced::Unchanged => current,
        }
    }
}

/// Shallow-merge `patch` into `context`, returning the merged value.
///
/// Keys present in `patch` overwrite those in `context`. A non-object context
/// is treated as empty, and a non-object patch contributes nothing.
pub fn merge(context: &Context, patch: &Value) -> Context {
    let mut merged = match context {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    if let Value::Object(fields) = patch {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}
