//! Builder API for declaring machines.
//!
//! A description is collected from plain constructors and compiled in a
//! separate pass that validates names and targets and lowers every hook.
//!
//! # Example
//!
//! ```
//! use statewise::builder::{immediate, state, transition, Description};
//! use statewise::core::Hooks;
//!
//! let machine = Description::from_states(vec![
//!     state("checking", vec![immediate("ready", Hooks::new())]),
//!     state("ready", vec![transition("reset", "checking", Hooks::new())]),
//! ])
//! .compile()
//! .unwrap();
//!
//! assert_eq!(machine.initial().unwrap().name(), "checking");
//! ```

mod description;
pub mod error;
mod parts;

pub use description::{compile, Description};
pub use error::CompileError;
pub use parts::{enter, exit, immediate, internal, state, transition, Part, StateDecl};
