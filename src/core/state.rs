//! The externally observable snapshot of a running machine.

use super::context::Context;
use serde::{Deserialize, Serialize};

/// Current state name, context and finality.
///
/// `name` is `None` only before the initial transition has run. `is_final`
/// is computed from the machine graph: a state is final when it has no
/// outgoing transitions and no immediates.
///
/// # Example
///
/// ```rust
/// use statewise::core::RuntimeState;
/// use serde_json::json;
///
/// let state = RuntimeState::unstarted(json!({ "count": 0 }));
/// assert_eq!(state.name(), None);
/// assert!(!state.is_final);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub name: Option<String>,
    pub context: Context,
    #[serde(rename = "final", default, skip_serializing_if = "is_false")]
    pub is_final: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl RuntimeState {
    /// Snapshot before the machine has entered any state.
    pub fn unstarted(context: Context) -> Self {
        Self {
            name: None,
            context,
            is_final: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Check whether the machine currently rests in `name`.
    pub fn matches(&self, name: &str) -> bool {
        self.name() == Some(name)
    }
}
