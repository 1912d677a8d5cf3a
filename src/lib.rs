//! Statewise: a flat state machine engine with managed effects
//!
//! Statewise follows a "pure core, imperative shell" split. Compiling a
//! description and stepping a machine are pure: `step` returns the next
//! snapshot plus the effects that should now be active, and never runs them.
//! Sessions form the shell that starts, retains and disposes those effects.
//!
//! # Core Concepts
//!
//! - **Description**: states built from `transition`, `immediate`,
//!   `internal`, `enter` and `exit` parts, compiled into an immutable machine
//! - **Hooks**: guards, reducers, assigns and actions on transitions; invokes
//!   and effects on enter
//! - **Step**: guarded dispatch with immediate chaining and internal transitions
//! - **Session**: one running instance with subscribers and effect lifecycle
//! - **Checkpoint**: serializable snapshot and history for resuming sessions
//!
//! # Example
//!
//! ```rust
//! use statewise::builder::{enter, immediate, transition, Description};
//! use statewise::core::Hooks;
//! use statewise::effects::Session;
//! use serde_json::json;
//!
//! let machine = Description::new()
//!     .state(
//!         "idle",
//!         vec![transition(
//!             "add",
//!             "counting",
//!             Hooks::new().assign(|ctx, event| {
//!                 let by = event.get("by").and_then(|v| v.as_i64()).unwrap_or(1);
//!                 json!({ "total": ctx["total"].as_i64().unwrap_or(0) + by })
//!             }),
//!         )],
//!     )
//!     .state(
//!         "counting",
//!         vec![
//!             immediate("done", Hooks::new().guard(|ctx, _| ctx["total"].as_i64() >= Some(10))),
//!             immediate("idle", Hooks::new()),
//!         ],
//!     )
//!     .state("done", vec![enter(Hooks::new().assign_value(json!({ "closed": true })))])
//!     .compile()
//!     .unwrap();
//!
//! let session = Session::new(machine, json!({ "total": 0 }));
//! session.send(statewise::core::Event::new("add").with("by", json!(4)));
//! assert!(session.state().matches("idle"));
//!
//! session.send(statewise::core::Event::new("add").with("by", json!(6)));
//! let state = session.state();
//! assert!(state.matches("done"));
//! assert!(state.is_final);
//! assert_eq!(state.context, json!({ "total": 10, "closed": true }));
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod effects;

// Re-export commonly used types
pub use crate::builder::{compile, CompileError, Description};
pub use crate::checkpoint::{Checkpoint, CheckpointError};
pub use crate::core::{Event, Hooks, Machine, RuntimeState, StateHistory};
pub use crate::effects::{EffectOutcome, Session, SessionBuilder};
