//! Checkpoint and resume for sessions.
//!
//! A checkpoint holds the observable snapshot and transition history of a
//! session. Hooks and effects are not serializable; resuming pairs a
//! checkpoint with the compiled machine it was taken from and restarts the
//! enter effects of the restored state.
//!
//! # Example
//!
//! ```rust
//! use statewise::builder::{transition, Description};
//! use statewise::checkpoint::Checkpoint;
//! use statewise::core::Hooks;
//! use statewise::effects::{Session, SessionBuilder};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let machine = Arc::new(
//!     Description::new()
//!         .state("draft", vec![transition("submit", "review", Hooks::new())])
//!         .state("review", vec![transition("approve", "done", Hooks::new())])
//!         .state("done", vec![])
//!         .compile()
//!         .unwrap(),
//! );
//!
//! let session = Session::new(Arc::clone(&machine), json!({ "doc": 1 }));
//! session.send("submit");
//! let saved = session.checkpoint().to_json().unwrap();
//!
//! let restored = SessionBuilder::new(machine)
//!     .resume(Checkpoint::from_json(&saved).unwrap())
//!     .unwrap();
//! assert!(restored.state().matches("review"));
//! assert_eq!(restored.state().context, json!({ "doc": 1 }));
//! ```

use crate::core::{RuntimeState, StateHistory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// When the checkpoint was taken
    pub timestamp: DateTime<Utc>,

    /// Snapshot at the time of the checkpoint
    pub state: RuntimeState,

    pub history: StateHistory,
}

impl Checkpoint {
    pub fn new(state: RuntimeState, history: StateHistory) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            state,
            history,
        }
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string(self)
            .map_err(|error| CheckpointError::SerializationFailed(error.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|error| CheckpointError::SerializationFailed(error.to_string()))
    }

    /// Parse a checkpoint, rejecting unsupported format versions.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    pub fn check_version(&self) -> Result<(), CheckpointError> {
        if self.version == CHECKPOINT_VERSION {
            Ok(())
        } else {
            Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            })
        }
    }
}
