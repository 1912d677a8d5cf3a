//! Executors for async effect work.

use futures::future::BoxFuture;
use std::fmt;

/// Why a task could not be spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnUnavailable;

/// Runs detached futures on behalf of a session.
pub trait Spawner: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), SpawnUnavailable>;
}

/// Spawns onto the tokio runtime current at the time of the call.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), SpawnUnavailable> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SpawnUnavailable)?;
        handle.spawn(task);
        Ok(())
    }
}

/// Spawns onto a fixed tokio runtime handle, usable from outside the runtime.
#[derive(Clone)]
pub struct HandleSpawner {
    handle: tokio::runtime::Handle,
}

impl HandleSpawner {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Spawner for HandleSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), SpawnUnavailable> {
        self.handle.spawn(task);
        Ok(())
    }
}

impl fmt::Debug for HandleSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandleSpawner")
    }
}
