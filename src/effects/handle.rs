//! Handles to started effects.

use crate::core::{Cleanup, Event, Lifecycle};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A started effect that returned a cleanup.
pub struct EffectHandle {
    event: Event,
    cleanup: Option<Cleanup>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl EffectHandle {
    pub(crate) fn new(
        event: Event,
        cleanup: Option<Cleanup>,
        lifecycle: Arc<Mutex<Lifecycle>>,
    ) -> Self {
        Self {
            event,
            cleanup,
            lifecycle,
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// Suppress further sends without running the cleanup yet.
    pub(crate) fn mark_disposed(&self) {
        *self.lifecycle.lock() = Lifecycle::Disposed;
    }

    /// Mark the effect disposed, then run its cleanup.
    ///
    /// The lifecycle flips first so sends issued from inside the cleanup are
    /// already suppressed. Disposing twice is a no-op.
    pub fn dispose(&mut self) {
        self.mark_disposed();
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("event", &self.event)
            .field("lifecycle", &self.lifecycle())
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}
